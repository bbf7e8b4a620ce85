use actix_cors::Cors;
use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{CredentialStore, PasswordHasher, TokenService};
use crate::clock::Clock;
use crate::configuration::{Environment, Settings};
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::middleware::{Authenticator, ErrorDetail};
use crate::routes::{
    change_password, create_link, delete_link, get_profile, health_check, index, list_links,
    login, logout, me, route_not_found, signup, update_link,
};
use crate::storage::{LinkStore, MemoryStore, UserStore};

/// Services shared by every worker, built once from settings
pub struct AppContext {
    pub credentials: Arc<CredentialStore>,
    pub tokens: Arc<TokenService>,
    pub links: Arc<dyn LinkStore>,
    pub environment: Environment,
    pub allowed_origins: Vec<String>,
}

impl AppContext {
    pub fn new(
        settings: &Settings,
        users: Arc<dyn UserStore>,
        links: Arc<dyn LinkStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let hasher = PasswordHasher::new(settings.hashing.cost);
        Self {
            credentials: Arc::new(CredentialStore::new(users, hasher)),
            tokens: Arc::new(TokenService::new(&settings.jwt, clock)),
            links,
            environment: settings.application.environment,
            allowed_origins: settings.application.allowed_origins.clone(),
        }
    }

    /// Both stores backed by one `MemoryStore`
    pub fn in_memory(settings: &Settings, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(settings, store.clone(), store, clock)
    }
}

/// Malformed or mistyped JSON bodies use the error envelope too
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        tracing::debug!(error = %err, "Rejected request body");
        AppError::from(ValidationError::general("Invalid JSON payload")).into()
    })
}

/// Any origin when none are configured, otherwise only the listed ones
fn cors(allowed_origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);

    if allowed_origins.is_empty() {
        return cors.allow_any_origin();
    }

    allowed_origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}

pub fn run(listener: TcpListener, context: AppContext) -> Result<Server, std::io::Error> {
    let context = web::Data::new(context);

    let server = HttpServer::new(move || {
        let tokens = context.tokens.clone();
        let credentials = context.credentials.clone();
        let required = || Authenticator::required(tokens.clone(), credentials.clone());

        App::new()
            // Global middleware, outermost last
            .wrap(ErrorDetail::new(context.environment))
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)
            .wrap(cors(&context.allowed_origins))

            // Shared state
            .app_data(context.clone())
            .app_data(json_config())

            // Public routes
            .route("/", web::get().to(index))
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api")
                    .route("/auth/signup", web::post().to(signup))
                    .route("/auth/login", web::post().to(login))

                    // Protected routes
                    .service(
                        web::resource("/auth/me")
                            .wrap(required())
                            .route(web::get().to(me)),
                    )
                    .service(
                        web::resource("/auth/logout")
                            .wrap(required())
                            .route(web::post().to(logout)),
                    )
                    .service(
                        web::resource("/auth/password")
                            .wrap(required())
                            .route(web::put().to(change_password)),
                    )
                    .service(
                        web::scope("/links")
                            .wrap(required())
                            .route("", web::get().to(list_links))
                            .route("", web::post().to(create_link))
                            .route("/{id}", web::put().to(update_link))
                            .route("/{id}", web::delete().to(delete_link)),
                    )

                    // Identity-aware, never rejects
                    .service(
                        web::resource("/profiles/{handle}")
                            .wrap(Authenticator::optional(tokens.clone(), credentials.clone()))
                            .route(web::get().to(get_profile)),
                    ),
            )
            .default_service(web::to(route_not_found))
    })
    .listen(listener)?
    .run();

    Ok(server)
}

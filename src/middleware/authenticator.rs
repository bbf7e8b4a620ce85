/// Authenticator Middleware
///
/// Resolves `Authorization: Bearer <token>` into a `Principal` and
/// attaches an `Identity` to the request extensions.
///
/// Per request:
/// - no token             -> 401 "Access token required"
/// - bad signature/format -> 401 "Invalid token"
/// - expired              -> 401 "Token expired"
/// - principal vanished   -> 401 "Invalid token - user not found"
/// - storage fault        -> 500
/// - otherwise            -> `Identity::Authenticated`, pipeline continues
///
/// The optional variant turns every failure into `Identity::Anonymous`.
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, FromRequest, HttpMessage, HttpRequest,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::{CredentialStore, Principal, TokenService};
use crate::error::{AppError, AuthError};

/// Who the request is acting as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Authenticated(Principal),
    Anonymous,
}

impl Identity {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Identity::Authenticated(principal) => Some(principal),
            Identity::Anonymous => None,
        }
    }
}

/// Extracts the request identity; `Anonymous` when no authenticator ran.
impl FromRequest for Identity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let identity = req
            .extensions()
            .get::<Identity>()
            .cloned()
            .unwrap_or(Identity::Anonymous);
        ready(Ok(identity))
    }
}

/// Extractor for handlers behind `Authenticator::required`
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal(pub Principal);

impl FromRequest for AuthenticatedPrincipal {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let result = match req.extensions().get::<Identity>() {
            Some(Identity::Authenticated(principal)) => Ok(Self(principal.clone())),
            _ => Err(AuthError::Unauthenticated.into()),
        };
        ready(result)
    }
}

/// Token from a `Bearer` authorization header value
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let (scheme, token) = header?.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// Run the token -> principal resolution for one request
pub async fn resolve_principal(
    header: Option<&str>,
    tokens: &TokenService,
    credentials: &CredentialStore,
) -> Result<Principal, AppError> {
    let token = bearer_token(header).ok_or(AuthError::MissingToken)?;
    let claims = tokens.verify(token).map_err(AuthError::from)?;
    let principal_id = claims.principal_id().ok_or(AuthError::TokenInvalid)?;

    match credentials.find_by_id(principal_id).await? {
        Some(principal) => Ok(principal),
        None => {
            tracing::warn!(user_id = %principal_id, "Valid token for missing principal");
            Err(AuthError::PrincipalNotFound.into())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Required,
    Optional,
}

pub struct Authenticator {
    tokens: Arc<TokenService>,
    credentials: Arc<CredentialStore>,
    mode: Mode,
}

impl Authenticator {
    /// Reject requests that do not resolve to a principal
    pub fn required(tokens: Arc<TokenService>, credentials: Arc<CredentialStore>) -> Self {
        Self {
            tokens,
            credentials,
            mode: Mode::Required,
        }
    }

    /// Attach a principal when possible, never reject
    pub fn optional(tokens: Arc<TokenService>, credentials: Arc<CredentialStore>) -> Self {
        Self {
            tokens,
            credentials,
            mode: Mode::Optional,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authenticator
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthenticatorService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticatorService {
            service: Rc::new(service),
            tokens: self.tokens.clone(),
            credentials: self.credentials.clone(),
            mode: self.mode,
        }))
    }
}

pub struct AuthenticatorService<S> {
    service: Rc<S>,
    tokens: Arc<TokenService>,
    credentials: Arc<CredentialStore>,
    mode: Mode,
}

impl<S, B> Service<ServiceRequest> for AuthenticatorService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let header = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);

        let service = self.service.clone();
        let tokens = self.tokens.clone();
        let credentials = self.credentials.clone();
        let mode = self.mode;

        Box::pin(async move {
            let identity = match resolve_principal(header.as_deref(), &tokens, &credentials).await {
                Ok(principal) => {
                    tracing::debug!(user_id = %principal.id, "Request authenticated");
                    Identity::Authenticated(principal)
                }
                Err(err) if mode == Mode::Required => {
                    return Ok(req.error_response(err).map_into_right_body());
                }
                Err(err) => {
                    tracing::debug!(error = %err, "Optional authentication fell through");
                    Identity::Anonymous
                }
            };

            req.extensions_mut().insert(identity);
            service.call(req).await.map(ServiceResponse::map_into_left_body)
        })
    }
}

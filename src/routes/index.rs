use actix_web::HttpResponse;
use serde_json::json;

use crate::response::ApiResponse;

/// GET /
pub async fn index() -> HttpResponse {
    HttpResponse::Ok().json(
        ApiResponse::data(json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "auth": {
                    "signup": "POST /api/auth/signup",
                    "login": "POST /api/auth/login",
                    "logout": "POST /api/auth/logout",
                    "me": "GET /api/auth/me",
                    "password": "PUT /api/auth/password"
                },
                "links": {
                    "list": "GET /api/links",
                    "create": "POST /api/links",
                    "update": "PUT /api/links/{id}",
                    "delete": "DELETE /api/links/{id}"
                },
                "profiles": {
                    "get": "GET /api/profiles/{handle}"
                },
                "health": "GET /health_check"
            }
        }))
        .with_message("one-link API"),
    )
}

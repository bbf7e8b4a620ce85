/// Public profile
///
/// Readable by anyone. Wrapped in `Authenticator::optional` so the owner
/// can be told apart from visitors.
use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::error::AppError;
use crate::middleware::Identity;
use crate::response::ApiResponse;
use crate::startup::AppContext;
use crate::storage::Link;

/// No email, no hash: only what a visitor may see
#[derive(Serialize)]
pub struct ProfilePayload {
    pub handle: String,
    pub links: Vec<Link>,
    pub is_owner: bool,
}

/// GET /api/profiles/{handle}
pub async fn get_profile(
    identity: Identity,
    path: web::Path<String>,
    context: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let owner = context
        .credentials
        .find_by_handle(&path)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    let links = context.links.list_for_owner(owner.id).await?;
    let is_owner = identity
        .principal()
        .map_or(false, |principal| principal.id == owner.id);

    Ok(HttpResponse::Ok().json(ApiResponse::data(ProfilePayload {
        handle: owner.handle,
        links,
        is_owner,
    })))
}

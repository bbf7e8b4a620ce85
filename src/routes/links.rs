/// Link Routes
///
/// Every handler sits behind `Authenticator::required` and scopes storage
/// calls to the caller's id, so another principal's link looks missing.
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, ValidationError};
use crate::middleware::AuthenticatedPrincipal;
use crate::response::ApiResponse;
use crate::routes::{missing_fields, present};
use crate::startup::AppContext;
use crate::storage::{Link, LinkChanges, NewLink};
use crate::validators::{validate_order, validate_title, validate_url};

const LINK_NOT_FOUND: &str = "Link not found or access denied";

#[derive(Deserialize)]
pub struct CreateLinkRequest {
    pub title: Option<String>,
    pub url: Option<String>,
    pub order: Option<i64>,
}

#[derive(Deserialize)]
pub struct UpdateLinkRequest {
    pub title: Option<String>,
    pub url: Option<String>,
    pub order: Option<i64>,
}

#[derive(Serialize)]
pub struct LinkPayload {
    pub link: Link,
}

#[derive(Serialize)]
pub struct LinksPayload {
    pub links: Vec<Link>,
}

/// GET /api/links
pub async fn list_links(
    AuthenticatedPrincipal(user): AuthenticatedPrincipal,
    context: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let links = context.links.list_for_owner(user.id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::data(LinksPayload { links })))
}

/// POST /api/links
///
/// Without `order` the link goes after the caller's last one.
pub async fn create_link(
    AuthenticatedPrincipal(user): AuthenticatedPrincipal,
    body: web::Json<CreateLinkRequest>,
    context: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let (title, url) = match (present(&body.title), present(&body.url)) {
        (Some(title), Some(url)) => (title, url),
        (title, url) => {
            let missing = missing_fields(&[("title", title.is_none()), ("url", url.is_none())]);
            return Err(ValidationError::missing(&missing, "Title and URL are required").into());
        }
    };

    validate_title(title)?;
    validate_url(url)?;

    let position = match body.order {
        Some(order) => validate_order(order)?,
        None => next_position(context.links.max_position(user.id).await?)?,
    };

    let link = context
        .links
        .insert(NewLink {
            owner_id: user.id,
            title: title.to_string(),
            url: url.to_string(),
            position,
        })
        .await?;

    tracing::info!(user_id = %user.id, link_id = %link.id, "Link created");

    Ok(HttpResponse::Created()
        .json(ApiResponse::data(LinkPayload { link }).with_message("Link created successfully")))
}

/// PUT /api/links/{id}
///
/// Partial update: absent fields are left untouched.
pub async fn update_link(
    AuthenticatedPrincipal(user): AuthenticatedPrincipal,
    path: web::Path<String>,
    body: web::Json<UpdateLinkRequest>,
    context: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let link_id = parse_link_id(&path)?;
    let changes = link_changes(&body)?;

    let link = context
        .links
        .update_for_owner(user.id, link_id, changes)
        .await?
        .ok_or_else(|| AppError::NotFound(LINK_NOT_FOUND.to_string()))?;

    tracing::info!(user_id = %user.id, link_id = %link.id, "Link updated");

    Ok(HttpResponse::Ok()
        .json(ApiResponse::data(LinkPayload { link }).with_message("Link updated successfully")))
}

/// DELETE /api/links/{id}
pub async fn delete_link(
    AuthenticatedPrincipal(user): AuthenticatedPrincipal,
    path: web::Path<String>,
    context: web::Data<AppContext>,
) -> Result<HttpResponse, AppError> {
    let link_id = parse_link_id(&path)?;

    if !context.links.delete_for_owner(user.id, link_id).await? {
        return Err(AppError::NotFound(LINK_NOT_FOUND.to_string()));
    }

    tracing::info!(user_id = %user.id, link_id = %link_id, "Link deleted");
    Ok(HttpResponse::Ok().json(ApiResponse::message("Link deleted successfully")))
}

fn parse_link_id(raw: &str) -> Result<Uuid, ValidationError> {
    Uuid::parse_str(raw).map_err(|_| ValidationError::field("id", "Invalid link ID"))
}

fn next_position(max: Option<i32>) -> Result<i32, ValidationError> {
    match max {
        None => Ok(0),
        Some(max) => max
            .checked_add(1)
            .ok_or_else(|| ValidationError::field("order", "Order is too large")),
    }
}

fn link_changes(body: &UpdateLinkRequest) -> Result<LinkChanges, ValidationError> {
    let title = match body.title.as_deref().map(str::trim) {
        Some(title) => {
            validate_title(title)?;
            Some(title.to_string())
        }
        None => None,
    };

    let url = match body.url.as_deref().map(str::trim) {
        Some(url) => {
            validate_url(url)?;
            Some(url.to_string())
        }
        None => None,
    };

    let position = body.order.map(validate_order).transpose()?;

    Ok(LinkChanges {
        title,
        url,
        position,
    })
}

use actix_web::{get, http::header::CONTENT_TYPE, post, web, Error, HttpRequest};
use std::sync::Arc;
use tracing::{debug, error};

use crate::middleware::auth::AuthenticatedUser;
use crate::types::{ChoiceRequest, ContactDetails, DashboardView, SelectImageQuery};
use crate::AppState;

#[get("")]
pub async fn current_view(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
) -> Result<web::Json<DashboardView>, Error> {
    Ok(web::Json(app_state.workflow.view(&authenticated_user).await))
}

/// The raw image is the request body; its `Content-Type` is recorded as the MIME type.
#[post("/image")]
pub async fn select_image(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    req: HttpRequest,
    query: web::Query<SelectImageQuery>,
    body: web::Bytes,
) -> Result<web::Json<DashboardView>, Error> {
    let mime = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if body.is_empty() || !mime.starts_with("image/") {
        debug!(
            "Ignoring image selection: {} bytes of {:?}",
            body.len(),
            mime
        );
        return Ok(web::Json(app_state.workflow.view(&authenticated_user).await));
    }

    let view = app_state
        .workflow
        .select_image(
            &authenticated_user,
            body,
            &mime,
            query.into_inner().preview_ref,
        )
        .await;

    Ok(web::Json(view))
}

#[post("/analyze")]
pub async fn analyze(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
) -> Result<web::Json<DashboardView>, Error> {
    let view = app_state
        .workflow
        .analyze(&authenticated_user)
        .await
        .map_err(|e| {
            error!("Image analysis failed: {}", e);
            e
        })?;

    Ok(web::Json(view))
}

#[post("/choice")]
pub async fn choose(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    choice_request: web::Json<ChoiceRequest>,
) -> Result<web::Json<DashboardView>, Error> {
    let view = app_state
        .workflow
        .choose(&authenticated_user, choice_request.choice)
        .await
        .map_err(|e| {
            error!("Failed to record choice: {}", e);
            e
        })?;

    Ok(web::Json(view))
}

#[post("/details")]
pub async fn submit_details(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    details: web::Json<ContactDetails>,
) -> Result<web::Json<DashboardView>, Error> {
    let view = app_state
        .workflow
        .submit_details(&authenticated_user, details.into_inner())
        .await
        .map_err(|e| {
            error!("Failed to submit details: {}", e);
            e
        })?;

    Ok(web::Json(view))
}

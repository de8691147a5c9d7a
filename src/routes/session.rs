use actix_web::{get, post, web, Error};
use std::sync::Arc;
use tracing::error;

use crate::middleware::auth::AuthenticatedUser;
use crate::types::{ActivityQuery, ActivityResponse, DashboardView};
use crate::AppState;

/// Called when the dashboard loads: registers the user and loads points and recent activity.
#[post("/session")]
pub async fn start_session(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
) -> Result<web::Json<DashboardView>, Error> {
    let view = app_state
        .workflow
        .start_session(&authenticated_user)
        .await
        .map_err(|e| {
            error!("Failed to start session: {}", e);
            e
        })?;

    Ok(web::Json(view))
}

#[get("/activity")]
pub async fn activity(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    query: web::Query<ActivityQuery>,
) -> Result<web::Json<ActivityResponse>, Error> {
    let page = app_state
        .workflow
        .activity(&authenticated_user, &query)
        .await
        .map_err(|e| {
            error!("Failed to load activity: {}", e);
            e
        })?;

    Ok(web::Json(page))
}

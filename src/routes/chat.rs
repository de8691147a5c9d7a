use actix_web::{post, web, Error};
use std::sync::Arc;
use tracing::error;

use crate::middleware::auth::AuthenticatedUser;
use crate::types::{AskRequest, DashboardView};
use crate::AppState;

#[post("/ask")]
pub async fn ask(
    app_state: web::Data<Arc<AppState>>,
    authenticated_user: AuthenticatedUser,
    ask_request: web::Json<AskRequest>,
) -> Result<web::Json<DashboardView>, Error> {
    let view = app_state
        .workflow
        .ask(&authenticated_user, &ask_request.question)
        .await
        .map_err(|e| {
            error!("Failed to answer question: {}", e);
            e
        })?;

    Ok(web::Json(view))
}

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{get, web};
use anyhow::Context;
use shuttle_actix_web::ShuttleActixWeb;
use shuttle_runtime::SecretStore;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

mod auth;
mod cloudinary;
mod config;
mod docs;
mod error;
mod gemini;
mod middleware;
mod models;
mod prompts;
mod routes;
mod store;
#[cfg(test)]
mod testing;
mod types;
mod workflow;

use crate::auth::JWTKeys;
use crate::cloudinary::CloudinaryClient;
use crate::config::AppConfig;
use crate::docs::ApiDoc;
use crate::gemini::GeminiClient;
use crate::middleware::auth::Authentication;
use crate::store::PgStore;
use crate::workflow::UploadWorkflow;

// Phone photos routinely exceed actix's 256KB default.
const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

pub struct AppState {
    pub workflow: UploadWorkflow,
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

fn cors(origins: &[String]) -> Cors {
    if origins.is_empty() {
        return Cors::permissive();
    }
    origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600)
}

#[shuttle_runtime::main]
async fn main(
    #[shuttle_runtime::Secrets] secret_store: SecretStore,
) -> ShuttleActixWeb<impl FnOnce(&mut web::ServiceConfig) + Send + Clone + 'static> {
    let app_config = AppConfig::new(&secret_store)?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&app_config.database_url)
        .await
        .context("Failed to connect to Postgres")?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let workflow = UploadWorkflow::new(
        Arc::new(GeminiClient::from_config(&app_config)),
        Arc::new(CloudinaryClient::from_config(&app_config)),
        Arc::new(PgStore::new(pool)),
        app_config.workflow,
    );
    info!("Workflow options: {:?}", workflow.options());

    let app_state = web::Data::new(Arc::new(AppState { workflow }));
    let keys = Arc::new(JWTKeys::new(app_config.jwt_secret.as_bytes()));
    let cors_origins = app_config.cors_origins.clone();

    let config = move |cfg: &mut web::ServiceConfig| {
        cfg.service(health);
        cfg.service(Scalar::with_url("/docs", ApiDoc::openapi()));
        cfg.service(
            web::scope("")
                .wrap(Authentication { keys })
                .wrap(cors(&cors_origins))
                .app_data(app_state)
                .app_data(web::PayloadConfig::new(MAX_IMAGE_BYTES))
                .configure(routes::configure),
        );
    };

    Ok(config.into())
}

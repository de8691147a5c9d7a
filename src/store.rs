use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::{NewUpload, Upload, User};
use crate::types::ActivityQuery;

/// The document store behind the dashboard: users with a points balance, and their uploads.
#[async_trait]
pub trait UploadStore: Send + Sync {
    async fn ensure_user(&self, user_id: &str, display_name: &str, email: &str) -> Result<User>;

    /// Appends an upload record; the store assigns id and timestamp.
    async fn insert_upload(&self, upload: NewUpload) -> Result<Upload>;

    /// Atomically creates the balance if absent and adds `points`. Returns the new balance.
    async fn add_points(&self, user_id: &str, points: i64) -> Result<i64>;

    async fn points_total(&self, user_id: &str) -> Result<i64>;

    /// One page of the user's uploads, newest first by `(created_at, id)`.
    async fn list_uploads(&self, user_id: &str, page: &ActivityQuery) -> Result<Vec<Upload>>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UploadStore for PgStore {
    async fn ensure_user(&self, user_id: &str, display_name: &str, email: &str) -> Result<User> {
        User::get_or_create(&self.pool, user_id, display_name, email).await
    }

    async fn insert_upload(&self, upload: NewUpload) -> Result<Upload> {
        Upload::create(&self.pool, upload).await
    }

    async fn add_points(&self, user_id: &str, points: i64) -> Result<i64> {
        User::add_points(&self.pool, user_id, points).await
    }

    async fn points_total(&self, user_id: &str) -> Result<i64> {
        User::points(&self.pool, user_id).await
    }

    async fn list_uploads(&self, user_id: &str, page: &ActivityQuery) -> Result<Vec<Upload>> {
        Upload::list_for_user(&self.pool, user_id, page).await
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Upload;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Cursor page over a user's uploads, newest first by `(created_at, id)`.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
    pub before: Option<DateTime<Utc>>,
    /// Tie-breaker for uploads sharing the `before` timestamp.
    pub before_id: Option<Uuid>,
}

impl ActivityQuery {
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// Whether an upload sorts strictly after the cursor.
    pub fn admits(&self, created_at: DateTime<Utc>, id: Uuid) -> bool {
        match (self.before, self.before_id) {
            (None, _) => true,
            (Some(before), None) => created_at < before,
            (Some(before), Some(before_id)) => (created_at, id) < (before, before_id),
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ActivityEntry {
    #[serde(flatten)]
    pub upload: Upload,
    pub recognized_item: Option<String>,
}

impl From<Upload> for ActivityEntry {
    fn from(upload: Upload) -> Self {
        let recognized_item = upload.recognized_item();
        ActivityEntry {
            upload,
            recognized_item,
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ActivityResponse {
    pub total_points: i64,
    pub items: Vec<ActivityEntry>,
    /// Pass as `before` and `before_id` to fetch the next page; absent on the last page.
    pub next_before: Option<DateTime<Utc>>,
    pub next_before_id: Option<Uuid>,
}

impl ActivityResponse {
    pub fn new(total_points: i64, uploads: Vec<Upload>, limit: i64) -> Self {
        let cursor = if uploads.len() as i64 >= limit {
            uploads.last().map(|upload| (upload.created_at, upload.id))
        } else {
            None
        };
        ActivityResponse {
            total_points,
            items: uploads.into_iter().map(ActivityEntry::from).collect(),
            next_before: cursor.map(|(created_at, _)| created_at),
            next_before_id: cursor.map(|(_, id)| id),
        }
    }
}

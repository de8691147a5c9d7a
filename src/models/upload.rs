use anyhow::Result;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{query_as, FromRow, PgPool, Type};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::types::{ActivityQuery, ContactDetails};

lazy_static! {
    static ref RECOGNIZED_ITEM: Regex =
        Regex::new(r"(?mi)^[ \t*#]*recognized item[ \t*]*:[ \t*]*(.+?)[ \t*\r]*$").unwrap();
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "upload_status_enum", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Recycled,
    NotInterested,
    Accepted,
    PickupScheduled,
}

/// One analyzed-and-resolved item. Rows are written once and never updated.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Upload {
    pub id: Uuid,
    pub user_id: String,
    pub url: String,
    pub ai_message: String,
    pub status: UploadStatus,
    pub points: i64,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub item_name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields the caller decides; id and timestamp are assigned on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUpload {
    pub user_id: String,
    pub url: String,
    pub ai_message: String,
    pub status: UploadStatus,
    pub points: i64,
    pub contact: Option<ContactDetails>,
}

/// Contact columns in table order; blank fields are stored as NULL.
fn contact_columns(contact: Option<ContactDetails>) -> [Option<String>; 6] {
    let contact = contact.unwrap_or_default();
    [
        contact.name,
        contact.email,
        contact.phone,
        contact.item_name,
        contact.description,
        contact.location,
    ]
    .map(|value| Some(value).filter(|v| !v.is_empty()))
}

impl Upload {
    #[cfg(test)]
    pub fn from_new(new_upload: NewUpload, created_at: DateTime<Utc>) -> Self {
        let [contact_name, contact_email, contact_phone, item_name, description, location] =
            contact_columns(new_upload.contact);
        Upload {
            id: Uuid::new_v4(),
            user_id: new_upload.user_id,
            url: new_upload.url,
            ai_message: new_upload.ai_message,
            status: new_upload.status,
            points: new_upload.points,
            contact_name,
            contact_email,
            contact_phone,
            item_name,
            description,
            location,
            created_at,
        }
    }

    /// Inserts the record; id and created_at are assigned here.
    pub async fn create(pool: &PgPool, new_upload: NewUpload) -> Result<Self> {
        let [contact_name, contact_email, contact_phone, item_name, description, location] =
            contact_columns(new_upload.contact);

        let upload = query_as::<_, Upload>(
            r#"
            INSERT INTO uploads (id, user_id, url, ai_message, status, points,
                contact_name, contact_email, contact_phone, item_name, description, location, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_upload.user_id)
        .bind(&new_upload.url)
        .bind(&new_upload.ai_message)
        .bind(new_upload.status)
        .bind(new_upload.points)
        .bind(contact_name)
        .bind(contact_email)
        .bind(contact_phone)
        .bind(item_name)
        .bind(description)
        .bind(location)
        .fetch_one(pool)
        .await?;

        debug!("Upload created: {:?} ({:?})", upload.id, upload.status);
        Ok(upload)
    }

    /// Newest first. The page cursor is exclusive on `(created_at, id)`.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: &str,
        page: &ActivityQuery,
    ) -> Result<Vec<Self>> {
        let uploads = query_as::<_, Upload>(
            r#"
            SELECT * FROM uploads
            WHERE user_id = $1
            AND (
                $2::timestamptz IS NULL
                OR created_at < $2
                OR ($3::uuid IS NOT NULL AND created_at = $2 AND id < $3)
            )
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(page.before)
        .bind(page.before_id)
        .bind(page.limit())
        .fetch_all(pool)
        .await?;

        Ok(uploads)
    }

    pub fn recognized_item(&self) -> Option<String> {
        recognized_item(&self.ai_message)
    }
}

/// Pulls the `Recognized Item: <x>` line out of hazard text, tolerating markdown emphasis.
pub fn recognized_item(ai_message: &str) -> Option<String> {
    RECOGNIZED_ITEM
        .captures(ai_message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|item| !item.is_empty())
}

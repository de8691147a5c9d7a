use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_as, query_scalar, FromRow, PgPool};
use tracing::debug;
use utoipa::ToSchema;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub eco_points: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for User {
    fn default() -> Self {
        User {
            id: String::new(),
            display_name: String::new(),
            email: String::new(),
            eco_points: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

impl User {
    /// Returns the user row, creating it with a zero balance on first sight.
    /// The profile fields follow the latest session claims; the id never changes.
    pub async fn get_or_create(
        pool: &PgPool,
        id: &str,
        display_name: &str,
        email: &str,
    ) -> Result<Self> {
        let user = query_as::<_, User>(
            r#"
            INSERT INTO users (id, display_name, email, eco_points, created_at, updated_at)
            VALUES ($1, $2, $3, 0, now(), now())
            ON CONFLICT (id) DO UPDATE
            SET display_name = EXCLUDED.display_name, email = EXCLUDED.email, updated_at = now()
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(display_name)
        .bind(email)
        .fetch_one(pool)
        .await?;

        debug!("User loaded: {:?}", user.id);
        Ok(user)
    }

    /// Adds to the points balance in one statement, creating the row if it is missing.
    /// Returns the new balance.
    pub async fn add_points(pool: &PgPool, id: &str, points: i64) -> Result<i64> {
        let total = query_scalar::<_, i64>(
            r#"
            INSERT INTO users (id, eco_points, created_at, updated_at)
            VALUES ($1, $2, now(), now())
            ON CONFLICT (id) DO UPDATE
            SET eco_points = users.eco_points + EXCLUDED.eco_points, updated_at = now()
            RETURNING eco_points
            "#,
        )
        .bind(id)
        .bind(points)
        .fetch_one(pool)
        .await?;

        debug!("User {} now has {} points", id, total);
        Ok(total)
    }

    pub async fn points(pool: &PgPool, id: &str) -> Result<i64> {
        let total = query_scalar::<_, i64>(
            "SELECT COALESCE((SELECT eco_points FROM users WHERE id = $1), 0)",
        )
        .bind(id)
        .fetch_one(pool)
        .await?;

        Ok(total)
    }
}

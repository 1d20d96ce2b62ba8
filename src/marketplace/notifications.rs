/// Notification persistence
use crate::marketplace::types::{Notification, NotificationKind};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::SqlitePool;

#[derive(Debug, Clone)]
pub struct NotificationStorage {
    pool: SqlitePool,
}

impl NotificationStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store one notification per recipient
    pub async fn insert_for(
        &self,
        user_ids: &[String],
        kind: NotificationKind,
        payload: &Value,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for user_id in user_ids {
            sqlx::query(
                "INSERT INTO notifications (id, user_id, kind, payload, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(user_id)
            .bind(kind)
            .bind(sqlx::types::Json(payload))
            .bind(at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn list(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
        let sql = if unread_only {
            "SELECT * FROM notifications WHERE user_id = ? AND read_at IS NULL ORDER BY created_at DESC"
        } else {
            "SELECT * FROM notifications WHERE user_id = ? ORDER BY created_at DESC"
        };

        let notifications = sqlx::query_as::<_, Notification>(sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(notifications)
    }

    /// Mark one of the user's notifications read; false when it doesn't exist
    pub async fn mark_read(&self, user_id: &str, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = COALESCE(read_at, ?) WHERE id = ? AND user_id = ?",
        )
        .bind(at)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_all_read(&self, user_id: &str, at: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = ? WHERE user_id = ? AND read_at IS NULL",
        )
        .bind(at)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

/// User persistence
use crate::marketplace::types::{User, UserRole};
use crate::quota::QuotaOverrides;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

#[derive(Debug, Clone)]
pub struct UserStorage {
    pool: SqlitePool,
}

impl UserStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, role, token_hash, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.role)
        .bind(&user.token_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_admins(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn get(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn by_token_hash(&self, token_hash: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE token_hash = ?")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// True when the username or the email is already registered
    pub async fn identity_taken(&self, username: &str, email: &str) -> Result<bool> {
        let taken: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE username = ? OR email = ?",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken > 0)
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY username")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    pub async fn admin_ids(&self) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar(
            "SELECT id FROM users WHERE role = 'admin' AND banned_at IS NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    pub async fn set_token_hash(&self, id: &str, token_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET token_hash = ? WHERE id = ?")
            .bind(token_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Ban (`Some`) or unban (`None`) a user
    pub async fn set_ban(&self, id: &str, ban: Option<(DateTime<Utc>, &str)>) -> Result<()> {
        let (banned_at, reason) = match ban {
            Some((at, reason)) => (Some(at), Some(reason)),
            None => (None, None),
        };
        sqlx::query("UPDATE users SET banned_at = ?, ban_reason = ? WHERE id = ?")
            .bind(banned_at)
            .bind(reason)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_role(&self, id: &str, role: UserRole) -> Result<()> {
        sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_quota(&self, id: &str, quota: &QuotaOverrides) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                quota_project_storage = ?,
                quota_version_size = ?,
                quota_file_size = ?,
                quota_files_per_version = ?,
                quota_versions_per_day = ?,
                quota_projects_per_day = ?
            WHERE id = ?
            "#,
        )
        .bind(quota.project_storage)
        .bind(quota.version_size)
        .bind(quota.file_size)
        .bind(quota.files_per_version)
        .bind(quota.versions_per_day)
        .bind(quota.projects_per_day)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

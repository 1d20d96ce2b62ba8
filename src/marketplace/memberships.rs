/// Membership persistence
use crate::marketplace::types::{MemberRole, MemberView, Membership};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

#[derive(Debug, Clone)]
pub struct MembershipStorage {
    pool: SqlitePool,
}

impl MembershipStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, membership: &Membership) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO memberships (project_id, user_id, role, is_primary, accepted_at, invited_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&membership.project_id)
        .bind(&membership.user_id)
        .bind(membership.role)
        .bind(membership.is_primary)
        .bind(membership.accepted_at)
        .bind(&membership.invited_by)
        .bind(membership.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, project_id: &str, user_id: &str) -> Result<Option<Membership>> {
        let membership = sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships WHERE project_id = ? AND user_id = ?",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(membership)
    }

    /// Members with usernames; primary first, then by role and name
    pub async fn list(&self, project_id: &str) -> Result<Vec<MemberView>> {
        let members = sqlx::query_as::<_, MemberView>(
            r#"
            SELECT m.user_id, u.username, m.role, m.is_primary, m.accepted_at
            FROM memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.project_id = ?
            ORDER BY m.is_primary DESC,
                     CASE m.role WHEN 'owner' THEN 0 WHEN 'maintainer' THEN 1 ELSE 2 END,
                     u.username
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    pub async fn primary(&self, project_id: &str) -> Result<Option<Membership>> {
        let membership = sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships WHERE project_id = ? AND is_primary = 1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(membership)
    }

    pub async fn accept(&self, project_id: &str, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE memberships SET accepted_at = ? WHERE project_id = ? AND user_id = ?")
            .bind(at)
            .bind(project_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_role(&self, project_id: &str, user_id: &str, role: MemberRole) -> Result<()> {
        sqlx::query("UPDATE memberships SET role = ? WHERE project_id = ? AND user_id = ?")
            .bind(role)
            .bind(project_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, project_id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM memberships WHERE project_id = ? AND user_id = ?")
            .bind(project_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move the primary flag to `to_user`, who also becomes an owner
    pub async fn transfer_primary(&self, project_id: &str, to_user: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE memberships SET is_primary = 0 WHERE project_id = ?")
            .bind(project_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE memberships SET is_primary = 1, role = 'owner' WHERE project_id = ? AND user_id = ?",
        )
        .bind(project_id)
        .bind(to_user)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Accepted members holding at least `min_role`
    pub async fn active_user_ids(&self, project_id: &str, min_role: MemberRole) -> Result<Vec<String>> {
        let members = self.list(project_id).await?;
        Ok(members
            .into_iter()
            .filter(|m| m.accepted_at.is_some() && m.role.at_least(min_role))
            .map(|m| m.user_id)
            .collect())
    }
}

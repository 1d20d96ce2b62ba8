/// Abuse report persistence
use crate::marketplace::types::{AbuseReport, ReportStatus, ReportTarget};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

#[derive(Debug, Clone)]
pub struct ReportStorage {
    pool: SqlitePool,
}

impl ReportStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, report: &AbuseReport) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO abuse_reports (id, reporter_id, target_kind, target_id, reason, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&report.id)
        .bind(&report.reporter_id)
        .bind(report.target_kind)
        .bind(&report.target_id)
        .bind(&report.reason)
        .bind(report.status)
        .bind(report.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<AbuseReport>> {
        let report = sqlx::query_as::<_, AbuseReport>("SELECT * FROM abuse_reports WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(report)
    }

    pub async fn open_exists(
        &self,
        reporter_id: &str,
        target_kind: ReportTarget,
        target_id: &str,
    ) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM abuse_reports
            WHERE reporter_id = ? AND target_kind = ? AND target_id = ? AND status = 'open'
            "#,
        )
        .bind(reporter_id)
        .bind(target_kind)
        .bind(target_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Open reports, oldest first
    pub async fn open(&self) -> Result<Vec<AbuseReport>> {
        let reports = sqlx::query_as::<_, AbuseReport>(
            "SELECT * FROM abuse_reports WHERE status = 'open' ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(reports)
    }

    pub async fn resolve(
        &self,
        id: &str,
        status: ReportStatus,
        note: Option<&str>,
        resolved_by: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE abuse_reports
            SET status = ?, resolution_note = ?, resolved_by = ?, resolved_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(note)
        .bind(resolved_by)
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Background maintenance scheduler
///
/// Uses tokio-cron-scheduler to periodically purge projects and versions whose
/// soft-delete is older than the retention window, together with their files.

use crate::config::MaintenanceConfig;
use crate::files::FileStore;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqlitePool, Row};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

/// What a prune run removed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub projects: u64,
    pub versions: u64,
}

/// Hard-delete everything soft-deleted before `cutoff`
///
/// Pins on pruned versions held by surviving versions are cleared, so the
/// dependency falls back to the project itself.
pub async fn prune_deleted(pool: &SqlitePool, files: &FileStore, cutoff: DateTime<Utc>) -> Result<PruneReport> {
    let project_ids: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM projects WHERE deleted_at IS NOT NULL AND deleted_at < ?",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    let version_rows = sqlx::query(
        r#"
        SELECT v.id, v.project_id FROM project_versions v
        WHERE (v.deleted_at IS NOT NULL AND v.deleted_at < ?)
           OR v.project_id IN (SELECT id FROM projects WHERE deleted_at IS NOT NULL AND deleted_at < ?)
        "#,
    )
    .bind(cutoff)
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    let versions: Vec<(String, String)> = version_rows
        .iter()
        .map(|row| (row.get("id"), row.get("project_id")))
        .collect();

    if project_ids.is_empty() && versions.is_empty() {
        return Ok(PruneReport::default());
    }

    let mut tx = pool.begin().await?;

    for (version_id, _) in &versions {
        sqlx::query("UPDATE version_dependencies SET dependency_version_id = NULL WHERE dependency_version_id = ?")
            .bind(version_id)
            .execute(&mut *tx)
            .await?;
        for statement in [
            "DELETE FROM version_dependencies WHERE version_id = ?",
            "DELETE FROM version_tags WHERE version_id = ?",
            "DELETE FROM project_files WHERE version_id = ?",
            "DELETE FROM project_versions WHERE id = ?",
        ] {
            sqlx::query(statement).bind(version_id).execute(&mut *tx).await?;
        }
    }

    for project_id in &project_ids {
        for statement in [
            "DELETE FROM version_dependencies WHERE dependency_project_id = ?",
            "DELETE FROM project_tags WHERE project_id = ?",
            "DELETE FROM memberships WHERE project_id = ?",
            "DELETE FROM projects WHERE id = ?",
        ] {
            sqlx::query(statement).bind(project_id).execute(&mut *tx).await?;
        }
    }

    tx.commit().await?;

    // Database rows are gone; leftover files are only wasted space, so log and go on
    for (version_id, project_id) in &versions {
        if let Err(e) = files.remove_version(project_id, version_id).await {
            tracing::warn!("⚠️ Failed to remove files of version {}: {}", version_id, e);
        }
    }
    for project_id in &project_ids {
        if let Err(e) = files.remove_project(project_id).await {
            tracing::warn!("⚠️ Failed to remove files of project {}: {}", project_id, e);
        }
    }

    let report = PruneReport {
        projects: project_ids.len() as u64,
        versions: versions.len() as u64,
    };
    tracing::info!("🧹 Pruned {} projects and {} versions", report.projects, report.versions);
    Ok(report)
}

pub struct MaintenanceScheduler {
    scheduler: Arc<RwLock<JobScheduler>>,
    pool: SqlitePool,
    files: FileStore,
    config: MaintenanceConfig,
}

impl MaintenanceScheduler {
    pub async fn new(config: MaintenanceConfig, pool: SqlitePool, files: FileStore) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            pool,
            files,
            config,
        })
    }

    fn cutoff(retention_days: i64) -> DateTime<Utc> {
        Utc::now() - Duration::days(retention_days)
    }

    /// Register the prune job and start the scheduler
    pub async fn start(&self) -> Result<()> {
        tracing::info!(
            "⏰ Starting maintenance scheduler (prune: '{}', retention: {} days)",
            self.config.prune_schedule,
            self.config.retention_days
        );

        let pool = self.pool.clone();
        let files = self.files.clone();
        let retention_days = self.config.retention_days;

        let job = CronJob::new_async(self.config.prune_schedule.as_str(), move |_uuid, _l| {
            let pool = pool.clone();
            let files = files.clone();

            Box::pin(async move {
                tracing::debug!("🔔 Prune job triggered");
                if let Err(e) = prune_deleted(&pool, &files, Self::cutoff(retention_days)).await {
                    tracing::error!("❌ Prune job failed: {}", e);
                }
            })
        })?;

        {
            let scheduler = self.scheduler.read().await;
            scheduler.add(job).await?;
            scheduler.start().await?;
        }

        tracing::info!("✅ Maintenance scheduler started");
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        let mut scheduler = self.scheduler.write().await;
        scheduler.shutdown().await?;
        tracing::info!("✅ Maintenance scheduler stopped");
        Ok(())
    }

    /// Run a prune immediately with the configured retention
    pub async fn prune_now(&self) -> Result<PruneReport> {
        prune_deleted(&self.pool, &self.files, Self::cutoff(self.config.retention_days)).await
    }
}

/// SQLite persistence for project types
///
/// Project types are seeded by the schema; only their quota overrides change at runtime.

use crate::marketplace::types::ProjectType;
use crate::quota::QuotaOverrides;
use anyhow::Result;
use sqlx::sqlite::SqlitePool;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ProjectTypeStorage {
    pool: SqlitePool,
}

impl ProjectTypeStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, slug: &str) -> Result<Option<ProjectType>> {
        let project_type = sqlx::query_as::<_, ProjectType>("SELECT * FROM project_types WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(project_type)
    }

    /// Load all project types keyed by slug for registry initialization
    pub async fn load_all(&self) -> Result<HashMap<String, ProjectType>> {
        let rows = sqlx::query_as::<_, ProjectType>("SELECT * FROM project_types")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|project_type| (project_type.slug.clone(), project_type))
            .collect())
    }

    pub async fn set_quota(&self, slug: &str, quota: &QuotaOverrides) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE project_types SET
                quota_project_storage = ?,
                quota_version_size = ?,
                quota_file_size = ?,
                quota_files_per_version = ?,
                quota_versions_per_day = ?,
                quota_projects_per_day = ?
            WHERE slug = ?
            "#,
        )
        .bind(quota.project_storage)
        .bind(quota.version_size)
        .bind(quota.file_size)
        .bind(quota.files_per_version)
        .bind(quota.versions_per_day)
        .bind(quota.projects_per_day)
        .bind(slug)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

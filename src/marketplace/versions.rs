/// Version, file and dependency persistence
use crate::graph::ProjectEdge;
use crate::marketplace::types::{
    Dependency, DependencyView, DependentRef, ProjectFile, ProjectVersion, Tag,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

/// Everything written when a version is published
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub version: ProjectVersion,
    pub files: Vec<ProjectFile>,
    pub dependencies: Vec<Dependency>,
    pub tag_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct VersionStorage {
    pool: SqlitePool,
}

impl VersionStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a version with its files, dependencies and tags atomically
    pub async fn insert(&self, new: &NewVersion) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let version = &new.version;

        sqlx::query(
            r#"
            INSERT INTO project_versions (
                id, project_id, version, changelog, release_type, downloads, created_by, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&version.id)
        .bind(&version.project_id)
        .bind(&version.version)
        .bind(&version.changelog)
        .bind(version.release_type)
        .bind(version.downloads)
        .bind(&version.created_by)
        .bind(version.created_at)
        .execute(&mut *tx)
        .await?;

        for file in &new.files {
            sqlx::query(
                r#"
                INSERT INTO project_files (id, version_id, filename, path, size_bytes, sha256, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&file.id)
            .bind(&file.version_id)
            .bind(&file.filename)
            .bind(&file.path)
            .bind(file.size_bytes)
            .bind(&file.sha256)
            .bind(file.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for dependency in &new.dependencies {
            sqlx::query(
                r#"
                INSERT INTO version_dependencies (
                    id, version_id, dependency_project_id, dependency_version_id, kind
                )
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&dependency.id)
            .bind(&dependency.version_id)
            .bind(&dependency.dependency_project_id)
            .bind(&dependency.dependency_version_id)
            .bind(dependency.kind)
            .execute(&mut *tx)
            .await?;
        }

        for tag_id in &new.tag_ids {
            sqlx::query("INSERT OR IGNORE INTO version_tags (version_id, tag_id) VALUES (?, ?)")
                .bind(&version.id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<ProjectVersion>> {
        let version = sqlx::query_as::<_, ProjectVersion>("SELECT * FROM project_versions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(version)
    }

    /// Live version of a project by its label
    pub async fn by_label(&self, project_id: &str, label: &str) -> Result<Option<ProjectVersion>> {
        let version = sqlx::query_as::<_, ProjectVersion>(
            "SELECT * FROM project_versions WHERE project_id = ? AND version = ? AND deleted_at IS NULL",
        )
        .bind(project_id)
        .bind(label)
        .fetch_optional(&self.pool)
        .await?;
        Ok(version)
    }

    /// Live versions, newest first
    pub async fn list(&self, project_id: &str) -> Result<Vec<ProjectVersion>> {
        let versions = sqlx::query_as::<_, ProjectVersion>(
            "SELECT * FROM project_versions WHERE project_id = ? AND deleted_at IS NULL ORDER BY created_at DESC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(versions)
    }

    pub async fn live_count(&self, project_id: &str) -> Result<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM project_versions WHERE project_id = ? AND deleted_at IS NULL",
        )
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Versions created since the given instant, deleted ones included
    pub async fn count_created_since(&self, project_id: &str, since: DateTime<Utc>) -> Result<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM project_versions WHERE project_id = ? AND created_at >= ?",
        )
        .bind(project_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn soft_delete(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE project_versions SET deleted_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn files(&self, version_id: &str) -> Result<Vec<ProjectFile>> {
        let files = sqlx::query_as::<_, ProjectFile>(
            "SELECT * FROM project_files WHERE version_id = ? ORDER BY filename",
        )
        .bind(version_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(files)
    }

    pub async fn file(&self, id: &str) -> Result<Option<ProjectFile>> {
        let file = sqlx::query_as::<_, ProjectFile>("SELECT * FROM project_files WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(file)
    }

    pub async fn dependencies(&self, version_id: &str) -> Result<Vec<DependencyView>> {
        let dependencies = sqlx::query_as::<_, DependencyView>(
            r#"
            SELECT p.slug AS project, v.version AS version, d.kind AS kind
            FROM version_dependencies d
            JOIN projects p ON p.id = d.dependency_project_id
            LEFT JOIN project_versions v ON v.id = d.dependency_version_id
            WHERE d.version_id = ?
            ORDER BY p.slug
            "#,
        )
        .bind(version_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(dependencies)
    }

    pub async fn tags(&self, version_id: &str) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>(
            r#"
            SELECT g.* FROM tags g
            JOIN version_tags vt ON vt.tag_id = g.id
            WHERE vt.version_id = ?
            ORDER BY g.slug
            "#,
        )
        .bind(version_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    pub async fn increment_downloads(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE project_versions SET downloads = downloads + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Live versions of other projects pinned to the given version
    pub async fn dependents_of_version(&self, version_id: &str) -> Result<Vec<DependentRef>> {
        let dependents = sqlx::query_as::<_, DependentRef>(
            r#"
            SELECT DISTINCT p.id AS project_id, p.slug AS project_slug, v.id AS version_id, v.version AS version
            FROM version_dependencies d
            JOIN project_versions v ON v.id = d.version_id
            JOIN projects p ON p.id = v.project_id
            WHERE d.dependency_version_id = ?
              AND v.deleted_at IS NULL AND p.deleted_at IS NULL
              AND p.id <> d.dependency_project_id
            ORDER BY p.slug, v.version
            "#,
        )
        .bind(version_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(dependents)
    }

    /// Live versions of other projects depending on the project, pinned or not
    pub async fn dependents_of_project(&self, project_id: &str) -> Result<Vec<DependentRef>> {
        let dependents = sqlx::query_as::<_, DependentRef>(
            r#"
            SELECT DISTINCT p.id AS project_id, p.slug AS project_slug, v.id AS version_id, v.version AS version
            FROM version_dependencies d
            JOIN project_versions v ON v.id = d.version_id
            JOIN projects p ON p.id = v.project_id
            WHERE d.dependency_project_id = ?
              AND v.deleted_at IS NULL AND p.deleted_at IS NULL
              AND p.id <> d.dependency_project_id
            ORDER BY p.slug, v.version
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(dependents)
    }

    /// Project-level dependency edges declared by live versions of live projects
    pub async fn dependency_edges(&self) -> Result<Vec<ProjectEdge>> {
        let edges = sqlx::query_as::<_, ProjectEdge>(
            r#"
            SELECT DISTINCT p.id AS dependent, d.dependency_project_id AS dependency, d.kind AS kind
            FROM version_dependencies d
            JOIN project_versions v ON v.id = d.version_id
            JOIN projects p ON p.id = v.project_id
            JOIN projects target ON target.id = d.dependency_project_id
            WHERE v.deleted_at IS NULL AND p.deleted_at IS NULL AND target.deleted_at IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(edges)
    }
}

/// Project persistence
///
/// Projects are soft-deleted: `deleted_at` is set on the project and on every live
/// version in the same statement batch, so a restore can bring back exactly the
/// versions that went down with the project.

use crate::marketplace::types::{Page, Project, ProjectStatus, Tag};
use crate::quota::QuotaOverrides;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{sqlite::SqlitePool, QueryBuilder, Sqlite};

/// Sort orders offered when browsing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowseSort {
    #[default]
    Downloads,
    Updated,
    Created,
    Name,
}

impl BrowseSort {
    fn order_by(&self) -> &'static str {
        match self {
            BrowseSort::Downloads => " ORDER BY p.downloads DESC, p.name ASC",
            BrowseSort::Updated => " ORDER BY p.updated_at DESC",
            BrowseSort::Created => " ORDER BY p.created_at DESC",
            BrowseSort::Name => " ORDER BY p.name COLLATE NOCASE ASC",
        }
    }
}

/// Filters for the public project listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrowseQuery {
    /// Project type slug
    #[serde(rename = "type")]
    pub project_type: Option<String>,
    /// Tag slug
    pub tag: Option<String>,
    /// Free text matched against name and summary
    pub q: Option<String>,
    #[serde(default)]
    pub sort: BrowseSort,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl BrowseQuery {
    pub const MAX_PER_PAGE: i64 = 100;
    pub const DEFAULT_PER_PAGE: i64 = 20;

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page
            .unwrap_or(Self::DEFAULT_PER_PAGE)
            .clamp(1, Self::MAX_PER_PAGE)
    }

    fn push_filters(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(
            " FROM projects p JOIN project_types t ON t.id = p.project_type_id \
             WHERE p.deleted_at IS NULL AND p.status = 'approved'",
        );

        if let Some(project_type) = self.project_type.as_deref().filter(|s| !s.is_empty()) {
            qb.push(" AND t.slug = ").push_bind(project_type.to_string());
        }

        if let Some(tag) = self.tag.as_deref().filter(|s| !s.is_empty()) {
            qb.push(
                " AND EXISTS (SELECT 1 FROM project_tags pt JOIN tags g ON g.id = pt.tag_id \
                 WHERE pt.project_id = p.id AND g.slug = ",
            )
            .push_bind(tag.to_string())
            .push(")");
        }

        if let Some(q) = self.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", q);
            qb.push(" AND (p.name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.summary LIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectStorage {
    pool: SqlitePool,
}

impl ProjectStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, project: &Project) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO projects (
                id, project_type_id, slug, name, summary, description, status,
                downloads, created_by, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&project.id)
        .bind(&project.project_type_id)
        .bind(&project.slug)
        .bind(&project.name)
        .bind(&project.summary)
        .bind(&project.description)
        .bind(project.status)
        .bind(project.downloads)
        .bind(&project.created_by)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up a project by slug, deleted projects included
    pub async fn by_slug(&self, slug: &str) -> Result<Option<Project>> {
        let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(project)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Project>> {
        let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(project)
    }

    pub async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE slug = ?")
            .bind(slug)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn update_details(
        &self,
        id: &str,
        name: &str,
        summary: &str,
        description: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE projects SET name = ?, summary = ?, description = ?, updated_at = ? WHERE id = ?",
        )
        .bind(name)
        .bind(summary)
        .bind(description)
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_status(
        &self,
        id: &str,
        status: ProjectStatus,
        review_note: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE projects SET status = ?, review_note = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(review_note)
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Soft-delete a project together with its live versions
    pub async fn soft_delete(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE project_versions SET deleted_at = ? WHERE project_id = ? AND deleted_at IS NULL",
        )
        .bind(at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE projects SET deleted_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Undo `soft_delete`, restoring the versions deleted along with the project
    pub async fn restore(&self, project: &Project) -> Result<()> {
        let Some(deleted_at) = project.deleted_at else {
            return Ok(());
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE project_versions SET deleted_at = NULL WHERE project_id = ? AND deleted_at = ?",
        )
        .bind(&project.id)
        .bind(deleted_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE projects SET deleted_at = NULL, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(&project.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Number of projects a user created since the given instant (deleted ones count too)
    pub async fn count_created_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM projects WHERE created_by = ? AND created_at >= ?",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Public listing: approved, live projects matching the query
    pub async fn browse(&self, query: &BrowseQuery) -> Result<Page<Project>> {
        let page = query.page();
        let per_page = query.per_page();

        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*)");
        query.push_filters(&mut count_qb);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT p.*");
        query.push_filters(&mut qb);
        qb.push(query.sort.order_by());
        qb.push(" LIMIT ").push_bind(per_page);
        qb.push(" OFFSET ").push_bind((page - 1) * per_page);

        let items = qb.build_query_as::<Project>().fetch_all(&self.pool).await?;

        Ok(Page { items, page, per_page, total })
    }

    pub async fn pending(&self) -> Result<Vec<Project>> {
        let projects = sqlx::query_as::<_, Project>(
            "SELECT * FROM projects WHERE status = 'pending' AND deleted_at IS NULL ORDER BY updated_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(projects)
    }

    /// Projects a user is an accepted member of
    pub async fn for_member(&self, user_id: &str) -> Result<Vec<Project>> {
        let projects = sqlx::query_as::<_, Project>(
            r#"
            SELECT p.* FROM projects p
            JOIN memberships m ON m.project_id = p.id
            WHERE m.user_id = ? AND m.accepted_at IS NOT NULL AND p.deleted_at IS NULL
            ORDER BY p.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(projects)
    }

    pub async fn increment_downloads(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE projects SET downloads = downloads + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_quota(&self, id: &str, quota: &QuotaOverrides) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE projects SET
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

    /// Bytes used by all files of the project's live versions
    pub async fn storage_used(&self, id: &str) -> Result<i64> {
        let used = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(f.size_bytes), 0) FROM project_files f
            JOIN project_versions v ON v.id = f.version_id
            WHERE v.project_id = ? AND v.deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(used)
    }

    /// Replace the project's tag set
    pub async fn set_tags(&self, id: &str, tag_ids: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM project_tags WHERE project_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for tag_id in tag_ids {
            sqlx::query("INSERT OR IGNORE INTO project_tags (project_id, tag_id) VALUES (?, ?)")
                .bind(id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn tags(&self, id: &str) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>(
            r#"
            SELECT g.* FROM tags g
            JOIN project_tags pt ON pt.tag_id = g.id
            WHERE pt.project_id = ?
            ORDER BY g.slug
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }
}

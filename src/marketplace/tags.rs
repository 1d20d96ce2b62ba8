/// Tag persistence
use crate::marketplace::types::Tag;
use anyhow::Result;
use sqlx::{sqlite::SqlitePool, QueryBuilder, Sqlite};

#[derive(Debug, Clone)]
pub struct TagStorage {
    pool: SqlitePool,
}

impl TagStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, tag: &Tag) -> Result<()> {
        sqlx::query("INSERT INTO tags (id, slug, name, project_type_id) VALUES (?, ?, ?, ?)")
            .bind(&tag.id)
            .bind(&tag.slug)
            .bind(&tag.name)
            .bind(&tag.project_type_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT * FROM tags ORDER BY slug")
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    pub async fn by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tag)
    }

    /// Tags matching any of the slugs; unknown slugs are simply absent
    pub async fn by_slugs(&self, slugs: &[String]) -> Result<Vec<Tag>> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM tags WHERE slug IN (");
        let mut separated = qb.separated(", ");
        for slug in slugs {
            separated.push_bind(slug.clone());
        }
        separated.push_unseparated(")");

        let tags = qb.build_query_as::<Tag>().fetch_all(&self.pool).await?;
        Ok(tags)
    }
}

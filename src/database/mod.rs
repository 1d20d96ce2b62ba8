/// Database management
///
/// Owns the SQLite connection pool and creates the marketplace schema.
/// The schema is created idempotently on every start (IF NOT EXISTS).

mod schema;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// SQLite database holding every marketplace table
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) {data_dir}/modvault.db and initialize the schema
    pub async fn open(data_dir: &str) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| anyhow::anyhow!("Failed to create data directory '{}': {}", data_dir, e))?;
        let db_path = Path::new(data_dir).join("modvault.db");

        tracing::info!("🗄️ Opening marketplace database: {}", db_path.display());

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(options).await?;

        let database = Self { pool };
        database.init().await?;
        Ok(database)
    }

    /// Private in-memory database used by tests
    ///
    /// A single connection that never expires; every new connection to
    /// `sqlite::memory:` would otherwise see an empty database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let database = Self { pool };
        database.init().await?;
        Ok(database)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init(&self) -> Result<()> {
        schema::create_tables(&self.pool).await?;
        schema::seed_project_types(&self.pool).await?;
        tracing::info!("✅ Marketplace schema ready");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    #[tokio::test]
    async fn schema_is_idempotent_and_seeded() {
        let db = Database::in_memory().await.unwrap();
        db.init().await.unwrap();

        let row = sqlx::query("SELECT COUNT(*) AS n FROM project_types")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(row.get::<i64, _>("n"), 3);
    }

    #[tokio::test]
    async fn bound_timestamps_sort_as_text() {
        use chrono::{TimeZone, Utc};

        let db = Database::in_memory().await.unwrap();
        let whole = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 5).unwrap();
        let fractional = whole + chrono::Duration::milliseconds(250);
        let next_day = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();

        let row = sqlx::query("SELECT typeof(?) AS kind, ? < ? AS a, ? < ? AS b")
            .bind(whole)
            .bind(whole)
            .bind(fractional)
            .bind(fractional)
            .bind(next_day)
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("kind"), "text");
        assert!(row.get::<bool, _>("a"));
        assert!(row.get::<bool, _>("b"));

        let text: String = sqlx::query_scalar("SELECT ?").bind(whole).fetch_one(db.pool()).await.unwrap();
        assert_eq!(chrono::DateTime::parse_from_rfc3339(&text).unwrap(), whole);
    }

    #[tokio::test]
    async fn open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested");
        Database::open(data_dir.to_str().unwrap()).await.unwrap();
        assert!(data_dir.join("modvault.db").exists());
    }
}

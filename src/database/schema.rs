/// Marketplace schema
///
/// Timestamps are bound as `DateTime<Utc>` and never filled in by SQLite defaults.
/// sqlx's chrono encoder writes them as RFC 3339 text with a `+00:00` offset, and
/// the `created_at >= ?` window queries rely on that text sorting chronologically.
/// `bound_timestamps_sort_as_text` in the database tests pins this down.

use anyhow::Result;
use sqlx::sqlite::SqlitePool;

const QUOTA_COLUMNS: &str = "
    quota_project_storage INTEGER,
    quota_version_size INTEGER,
    quota_file_size INTEGER,
    quota_files_per_version INTEGER,
    quota_versions_per_day INTEGER,
    quota_projects_per_day INTEGER";

pub(super) async fn create_tables(pool: &SqlitePool) -> Result<()> {
    let statements = [
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE COLLATE NOCASE,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                role TEXT NOT NULL DEFAULT 'user',
                token_hash TEXT NOT NULL UNIQUE,
                banned_at TEXT,
                ban_reason TEXT,
                {QUOTA_COLUMNS},
                created_at TEXT NOT NULL
            )
            "#
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS project_types (
                id TEXT PRIMARY KEY,
                slug TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                {QUOTA_COLUMNS}
            )
            "#
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                project_type_id TEXT NOT NULL REFERENCES project_types(id),
                slug TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                summary TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'draft',
                review_note TEXT,
                downloads INTEGER NOT NULL DEFAULT 0,
                {QUOTA_COLUMNS},
                created_by TEXT NOT NULL REFERENCES users(id),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT
            )
            "#
        ),
        r#"
        CREATE TABLE IF NOT EXISTS project_versions (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id),
            version TEXT NOT NULL,
            changelog TEXT NOT NULL DEFAULT '',
            release_type TEXT NOT NULL DEFAULT 'release',
            downloads INTEGER NOT NULL DEFAULT 0,
            created_by TEXT NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL,
            deleted_at TEXT
        )
        "#
        .to_string(),
        r#"
        CREATE TABLE IF NOT EXISTS project_files (
            id TEXT PRIMARY KEY,
            version_id TEXT NOT NULL REFERENCES project_versions(id),
            filename TEXT NOT NULL,
            path TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            sha256 TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#
        .to_string(),
        r#"
        CREATE TABLE IF NOT EXISTS version_dependencies (
            id TEXT PRIMARY KEY,
            version_id TEXT NOT NULL REFERENCES project_versions(id),
            dependency_project_id TEXT NOT NULL REFERENCES projects(id),
            dependency_version_id TEXT REFERENCES project_versions(id),
            kind TEXT NOT NULL
        )
        "#
        .to_string(),
        r#"
        CREATE TABLE IF NOT EXISTS memberships (
            project_id TEXT NOT NULL REFERENCES projects(id),
            user_id TEXT NOT NULL REFERENCES users(id),
            role TEXT NOT NULL,
            is_primary INTEGER NOT NULL DEFAULT 0,
            accepted_at TEXT,
            invited_by TEXT,
            created_at TEXT NOT NULL,
            PRIMARY KEY (project_id, user_id)
        )
        "#
        .to_string(),
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            project_type_id TEXT REFERENCES project_types(id)
        )
        "#
        .to_string(),
        r#"
        CREATE TABLE IF NOT EXISTS project_tags (
            project_id TEXT NOT NULL REFERENCES projects(id),
            tag_id TEXT NOT NULL REFERENCES tags(id),
            PRIMARY KEY (project_id, tag_id)
        )
        "#
        .to_string(),
        r#"
        CREATE TABLE IF NOT EXISTS version_tags (
            version_id TEXT NOT NULL REFERENCES project_versions(id),
            tag_id TEXT NOT NULL REFERENCES tags(id),
            PRIMARY KEY (version_id, tag_id)
        )
        "#
        .to_string(),
        r#"
        CREATE TABLE IF NOT EXISTS abuse_reports (
            id TEXT PRIMARY KEY,
            reporter_id TEXT NOT NULL REFERENCES users(id),
            target_kind TEXT NOT NULL,
            target_id TEXT NOT NULL,
            reason TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'open',
            resolution_note TEXT,
            resolved_by TEXT,
            created_at TEXT NOT NULL,
            resolved_at TEXT
        )
        "#
        .to_string(),
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            kind TEXT NOT NULL,
            payload JSON NOT NULL,
            read_at TEXT,
            created_at TEXT NOT NULL
        )
        "#
        .to_string(),
    ];

    for statement in &statements {
        sqlx::query(statement).execute(pool).await?;
    }

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_projects_status ON projects(status, deleted_at)",
        "CREATE INDEX IF NOT EXISTS idx_projects_created_by ON projects(created_by, created_at)",
        "CREATE INDEX IF NOT EXISTS idx_versions_project ON project_versions(project_id, created_at)",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_versions_live_label \
         ON project_versions(project_id, version) WHERE deleted_at IS NULL",
        "CREATE INDEX IF NOT EXISTS idx_files_version ON project_files(version_id)",
        "CREATE INDEX IF NOT EXISTS idx_dependencies_version ON version_dependencies(version_id)",
        "CREATE INDEX IF NOT EXISTS idx_dependencies_target ON version_dependencies(dependency_project_id)",
        "CREATE INDEX IF NOT EXISTS idx_memberships_user ON memberships(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_reports_status ON abuse_reports(status)",
        "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, read_at)",
    ];

    for index in indexes {
        sqlx::query(index).execute(pool).await?;
    }

    Ok(())
}

/// Seed the built-in project types (mods, tile sets, sound packs)
pub(super) async fn seed_project_types(pool: &SqlitePool) -> Result<()> {
    let builtin = [
        ("mod", "Mod"),
        ("tile_set", "Tile set"),
        ("sound_pack", "Sound pack"),
    ];

    for (slug, name) in builtin {
        sqlx::query("INSERT OR IGNORE INTO project_types (id, slug, name) VALUES (?, ?, ?)")
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(slug)
            .bind(name)
            .execute(pool)
            .await?;
    }

    Ok(())
}

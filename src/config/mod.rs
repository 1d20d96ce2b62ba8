/// Configuration management for the modvault marketplace
///
/// Handles server configuration, storage locations, quota defaults, mail transport
/// and maintenance scheduling. Every value can be overridden through MODVAULT_* env vars.

use crate::quota::QuotaDefaults;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Upload storage configuration
    pub storage: StorageConfig,
    /// Global quota defaults (last link of the quota precedence chain)
    pub quotas: QuotaDefaults,
    /// Outgoing mail configuration
    pub mail: MailConfig,
    /// Background maintenance configuration
    pub maintenance: MaintenanceConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding modvault.db (default: "data")
    pub data_dir: String,
}

/// Upload storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for uploaded files: {upload_dir}/{project_id}/{version_id}/{filename}
    pub upload_dir: String,
    /// Maximum accepted request body size in bytes
    pub max_upload_bytes: usize,
}

/// Which mail transport delivers queued mail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailTransport {
    /// Write mail to the tracing log
    Log,
    /// Write every mail as an .eml file into `MailConfig::dir`
    File,
}

/// Outgoing mail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub transport: MailTransport,
    pub dir: String,
    pub from: String,
}

/// Background maintenance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Cron expression (with seconds) for the prune job
    pub prune_schedule: String,
    /// Days a soft-deleted project or version stays restorable
    pub retention_days: i64,
}

impl Config {
    /// Build a configuration whose data, uploads and mail live under `data_dir`
    pub fn for_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        let mut config = Self::default();
        config.database.data_dir = data_dir.display().to_string();
        config.storage.upload_dir = data_dir.join("uploads").display().to_string();
        config.mail.dir = data_dir.join("mail").display().to_string();
        config
    }

    /// Address the HTTP listener binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for k8s/container deployment
    fn default() -> Self {
        let data_dir = env_or("MODVAULT_DATA_DIR", "data");

        Self {
            server: ServerConfig {
                host: env_or("MODVAULT_HOST", "0.0.0.0"),
                port: env_parse("MODVAULT_PORT", 3005),
            },
            storage: StorageConfig {
                upload_dir: std::env::var("MODVAULT_UPLOAD_DIR")
                    .unwrap_or_else(|_| format!("{}/uploads", data_dir)),
                max_upload_bytes: env_parse("MODVAULT_MAX_UPLOAD_BYTES", 256 * 1024 * 1024),
            },
            quotas: QuotaDefaults {
                project_storage: env_parse("MODVAULT_QUOTA_PROJECT_STORAGE", 1024 * 1024 * 1024),
                version_size: env_parse("MODVAULT_QUOTA_VERSION_SIZE", 200 * 1024 * 1024),
                file_size: env_parse("MODVAULT_QUOTA_FILE_SIZE", 100 * 1024 * 1024),
                files_per_version: env_parse("MODVAULT_QUOTA_FILES_PER_VERSION", 10),
                versions_per_day: env_parse("MODVAULT_QUOTA_VERSIONS_PER_DAY", 10),
                projects_per_day: env_parse("MODVAULT_QUOTA_PROJECTS_PER_DAY", 3),
            },
            mail: MailConfig {
                transport: match std::env::var("MODVAULT_MAIL_TRANSPORT").as_deref() {
                    Ok("file") => MailTransport::File,
                    _ => MailTransport::Log,
                },
                dir: std::env::var("MODVAULT_MAIL_DIR")
                    .unwrap_or_else(|_| format!("{}/mail", data_dir)),
                from: env_or("MODVAULT_MAIL_FROM", "modvault <noreply@modvault.local>"),
            },
            maintenance: MaintenanceConfig {
                prune_schedule: env_or("MODVAULT_PRUNE_SCHEDULE", "0 0 3 * * *"),
                retention_days: env_parse("MODVAULT_RETENTION_DAYS", 30),
            },
            database: DatabaseConfig { data_dir },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_data_dir_roots_every_path() {
        let config = Config::for_data_dir("/tmp/mv");
        assert_eq!(config.database.data_dir, "/tmp/mv");
        assert_eq!(config.storage.upload_dir, "/tmp/mv/uploads");
        assert_eq!(config.mail.dir, "/tmp/mv/mail");
    }

    #[test]
    fn unparsable_env_falls_back_to_default() {
        assert_eq!(env_parse::<u16>("MODVAULT_TEST_UNSET_PORT_VALUE", 4242), 4242);
    }
}

/// Quota type definitions
///
/// Every quota kind can be overridden independently on a user, a project or a
/// project type. Overrides are nullable integer columns named `quota_<kind>`.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single limit enforced by the marketplace
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaKind {
    /// Total bytes of all live files of a project
    ProjectStorage,
    /// Total bytes of the files of one version
    VersionSize,
    /// Bytes of a single file
    FileSize,
    /// Number of files in one version
    FilesPerVersion,
    /// Versions a project may publish within 24 hours
    VersionsPerDay,
    /// Projects a user may create within 24 hours
    ProjectsPerDay,
}

impl QuotaKind {
    pub const ALL: [QuotaKind; 6] = [
        QuotaKind::ProjectStorage,
        QuotaKind::VersionSize,
        QuotaKind::FileSize,
        QuotaKind::FilesPerVersion,
        QuotaKind::VersionsPerDay,
        QuotaKind::ProjectsPerDay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaKind::ProjectStorage => "project_storage",
            QuotaKind::VersionSize => "version_size",
            QuotaKind::FileSize => "file_size",
            QuotaKind::FilesPerVersion => "files_per_version",
            QuotaKind::VersionsPerDay => "versions_per_day",
            QuotaKind::ProjectsPerDay => "projects_per_day",
        }
    }

    /// Rate quotas count actions over time instead of measuring size
    pub fn is_rate(&self) -> bool {
        matches!(self, QuotaKind::VersionsPerDay | QuotaKind::ProjectsPerDay)
    }
}

impl fmt::Display for QuotaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional per-kind overrides stored on users, projects and project types
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuotaOverrides {
    #[sqlx(rename = "quota_project_storage")]
    #[serde(default)]
    pub project_storage: Option<i64>,
    #[sqlx(rename = "quota_version_size")]
    #[serde(default)]
    pub version_size: Option<i64>,
    #[sqlx(rename = "quota_file_size")]
    #[serde(default)]
    pub file_size: Option<i64>,
    #[sqlx(rename = "quota_files_per_version")]
    #[serde(default)]
    pub files_per_version: Option<i64>,
    #[sqlx(rename = "quota_versions_per_day")]
    #[serde(default)]
    pub versions_per_day: Option<i64>,
    #[sqlx(rename = "quota_projects_per_day")]
    #[serde(default)]
    pub projects_per_day: Option<i64>,
}

impl QuotaOverrides {
    pub fn get(&self, kind: QuotaKind) -> Option<i64> {
        match kind {
            QuotaKind::ProjectStorage => self.project_storage,
            QuotaKind::VersionSize => self.version_size,
            QuotaKind::FileSize => self.file_size,
            QuotaKind::FilesPerVersion => self.files_per_version,
            QuotaKind::VersionsPerDay => self.versions_per_day,
            QuotaKind::ProjectsPerDay => self.projects_per_day,
        }
    }

    pub fn set(&mut self, kind: QuotaKind, value: Option<i64>) {
        let slot = match kind {
            QuotaKind::ProjectStorage => &mut self.project_storage,
            QuotaKind::VersionSize => &mut self.version_size,
            QuotaKind::FileSize => &mut self.file_size,
            QuotaKind::FilesPerVersion => &mut self.files_per_version,
            QuotaKind::VersionsPerDay => &mut self.versions_per_day,
            QuotaKind::ProjectsPerDay => &mut self.projects_per_day,
        };
        *slot = value;
    }

    pub fn is_empty(&self) -> bool {
        QuotaKind::ALL.iter().all(|kind| self.get(*kind).is_none())
    }

    /// Reject negative overrides before they reach the database
    pub fn validate(&self) -> AppResult<()> {
        for kind in QuotaKind::ALL {
            if let Some(value) = self.get(kind) {
                if value < 0 {
                    return Err(AppError::validation(format!(
                        "quota override for {} must not be negative (got {})",
                        kind, value
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Global defaults, the last link of the precedence chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDefaults {
    pub project_storage: i64,
    pub version_size: i64,
    pub file_size: i64,
    pub files_per_version: i64,
    pub versions_per_day: i64,
    pub projects_per_day: i64,
}

impl QuotaDefaults {
    pub fn get(&self, kind: QuotaKind) -> i64 {
        match kind {
            QuotaKind::ProjectStorage => self.project_storage,
            QuotaKind::VersionSize => self.version_size,
            QuotaKind::FileSize => self.file_size,
            QuotaKind::FilesPerVersion => self.files_per_version,
            QuotaKind::VersionsPerDay => self.versions_per_day,
            QuotaKind::ProjectsPerDay => self.projects_per_day,
        }
    }
}

/// Where a resolved limit came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaSource {
    User,
    Project,
    ProjectType,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedQuota {
    pub limit: i64,
    pub source: QuotaSource,
}

/// Fully resolved limits for one (user, project, project type) combination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QuotaLimits {
    pub(crate) entries: BTreeMap<QuotaKind, ResolvedQuota>,
}

impl QuotaLimits {
    pub fn resolved(&self, kind: QuotaKind) -> ResolvedQuota {
        // Every kind is inserted by the resolver
        self.entries.get(&kind).copied().unwrap_or(ResolvedQuota {
            limit: 0,
            source: QuotaSource::Default,
        })
    }

    pub fn limit(&self, kind: QuotaKind) -> i64 {
        self.resolved(kind).limit
    }
}

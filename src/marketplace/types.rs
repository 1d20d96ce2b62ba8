/// Marketplace entity definitions
///
/// Rows map directly onto the SQLite tables through `sqlx::FromRow`; enums are
/// stored as snake_case text.

use crate::quota::QuotaOverrides;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

/// A registered marketplace user
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    #[serde(skip)]
    pub token_hash: String,
    pub banned_at: Option<DateTime<Utc>>,
    pub ban_reason: Option<String>,
    #[sqlx(flatten)]
    pub quota: QuotaOverrides,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_banned(&self) -> bool {
        self.banned_at.is_some()
    }
}

/// Public view of a user, safe to embed in other responses
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self { id: user.id.clone(), username: user.username.clone() }
    }
}

/// Category of project (mod, tile set, sound pack) with its own quota overrides
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProjectType {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[sqlx(flatten)]
    pub quota: QuotaOverrides,
}

/// Review lifecycle of a project
///
/// draft -> pending -> approved | rejected, rejected -> pending on resubmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
}

/// A user-submitted project
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Project {
    pub id: String,
    pub project_type_id: String,
    pub slug: String,
    pub name: String,
    pub summary: String,
    pub description: String,
    pub status: ProjectStatus,
    pub review_note: Option<String>,
    pub downloads: i64,
    #[sqlx(flatten)]
    pub quota: QuotaOverrides,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_public(&self) -> bool {
        self.status == ProjectStatus::Approved && !self.is_deleted()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ReleaseType {
    Release,
    Beta,
    Alpha,
}

/// A release of a project
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProjectVersion {
    pub id: String,
    pub project_id: String,
    pub version: String,
    pub changelog: String,
    pub release_type: ReleaseType,
    pub downloads: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A file attached to a version
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProjectFile {
    pub id: String,
    pub version_id: String,
    pub filename: String,
    /// Path relative to the upload root
    #[serde(skip)]
    pub path: String,
    pub size_bytes: i64,
    pub sha256: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum DependencyKind {
    #[default]
    Required,
    Optional,
    Incompatible,
    Embedded,
}

/// Dependency of a version on another project, optionally pinned to one version
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Dependency {
    pub id: String,
    pub version_id: String,
    pub dependency_project_id: String,
    pub dependency_version_id: Option<String>,
    pub kind: DependencyKind,
}

/// Dependency as shown to clients, with slugs and labels resolved
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DependencyView {
    pub project: String,
    pub version: Option<String>,
    pub kind: DependencyKind,
}

/// A live version that depends on something being deleted
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DependentRef {
    pub project_id: String,
    pub project_slug: String,
    pub version_id: String,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum MemberRole {
    Owner,
    Maintainer,
    Contributor,
}

impl MemberRole {
    /// Higher rank grants more permissions
    pub fn rank(&self) -> u8 {
        match self {
            MemberRole::Owner => 3,
            MemberRole::Maintainer => 2,
            MemberRole::Contributor => 1,
        }
    }

    pub fn at_least(&self, other: MemberRole) -> bool {
        self.rank() >= other.rank()
    }
}

/// Pivot linking a user to a project
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Membership {
    pub project_id: String,
    pub user_id: String,
    pub role: MemberRole,
    pub is_primary: bool,
    pub accepted_at: Option<DateTime<Utc>>,
    pub invited_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Membership {
    pub fn is_active(&self) -> bool {
        self.accepted_at.is_some()
    }

    /// Active membership with at least the given role
    pub fn grants(&self, role: MemberRole) -> bool {
        self.is_active() && self.role.at_least(role)
    }
}

/// Membership joined with the member's username
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MemberView {
    pub user_id: String,
    pub username: String,
    pub role: MemberRole,
    pub is_primary: bool,
    pub accepted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Tag {
    pub id: String,
    pub slug: String,
    pub name: String,
    /// Tags bound to a project type may only be used by projects of that type
    pub project_type_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ReportTarget {
    Project,
    Version,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ReportStatus {
    Open,
    Resolved,
    Dismissed,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AbuseReport {
    pub id: String,
    pub reporter_id: String,
    pub target_kind: ReportTarget,
    pub target_id: String,
    pub reason: String,
    pub status: ReportStatus,
    pub resolution_note: Option<String>,
    pub resolved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum NotificationKind {
    Welcome,
    MembershipInvite,
    MembershipChanged,
    DependencyRemoved,
    ProjectSubmitted,
    ProjectApproved,
    ProjectRejected,
    ReportResolved,
    AccountBanned,
}

impl NotificationKind {
    /// Mail subject line for this notification
    pub fn subject(&self) -> &'static str {
        match self {
            NotificationKind::Welcome => "Welcome to modvault",
            NotificationKind::MembershipInvite => "You have been invited to a project",
            NotificationKind::MembershipChanged => "Your project membership changed",
            NotificationKind::DependencyRemoved => "A dependency of your project was removed",
            NotificationKind::ProjectSubmitted => "A project is waiting for review",
            NotificationKind::ProjectApproved => "Your project was approved",
            NotificationKind::ProjectRejected => "Your project was rejected",
            NotificationKind::ReportResolved => "Your report was reviewed",
            NotificationKind::AccountBanned => "Your account was suspended",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: NotificationKind,
    pub payload: sqlx::types::Json<Value>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One page of results
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

/// Derive a URL-safe slug: lowercase ascii alphanumerics separated by single dashes
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug.truncate(64);
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  Better Grass -- HD!! "), "better-grass-hd");
        assert_eq!(slugify("Ünïcode Pack 2"), "n-code-pack-2");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn member_roles_are_ranked() {
        assert!(MemberRole::Owner.at_least(MemberRole::Maintainer));
        assert!(MemberRole::Maintainer.at_least(MemberRole::Maintainer));
        assert!(!MemberRole::Contributor.at_least(MemberRole::Maintainer));
    }
}

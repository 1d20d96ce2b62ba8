/// Marketplace persistence layer
///
/// Entity definitions and one SQLite-backed storage type per table group.
/// Business rules live in `crate::services`; nothing here checks permissions.

pub mod types;

pub mod memberships;
pub mod notifications;
pub mod projects;
pub mod reports;
pub mod tags;
pub mod users;
pub mod versions;

pub use memberships::MembershipStorage;
pub use notifications::NotificationStorage;
pub use projects::{BrowseQuery, BrowseSort, ProjectStorage};
pub use reports::ReportStorage;
pub use tags::TagStorage;
pub use types::*;
pub use users::UserStorage;
pub use versions::{NewVersion, VersionStorage};

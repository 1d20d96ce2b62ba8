/// Quota layer
///
/// Storage and rate limits resolved through the user > project > project type >
/// default precedence chain, plus the checks run before uploads and project creation.

pub mod resolver;
pub mod types;

pub use resolver::{
    check_project_creation, check_version_upload, resolve, ProjectUsage, QuotaChain,
    QuotaReportLine,
};
pub use types::{QuotaDefaults, QuotaKind, QuotaLimits, QuotaOverrides, QuotaSource, ResolvedQuota};

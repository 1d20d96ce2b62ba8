/// Quota resolution and enforcement
///
/// Limits are resolved per kind through the chain
/// user override > project override > project type override > configured default.
/// Each kind is resolved on its own, so a user may override the file size while
/// the project type still decides the storage limit.

use crate::error::{AppError, AppResult};
use crate::quota::types::{
    QuotaDefaults, QuotaKind, QuotaLimits, QuotaOverrides, QuotaSource, ResolvedQuota,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// The override layers taking part in one resolution
#[derive(Debug, Clone, Copy, Default)]
pub struct QuotaChain<'a> {
    pub user: Option<&'a QuotaOverrides>,
    pub project: Option<&'a QuotaOverrides>,
    pub project_type: Option<&'a QuotaOverrides>,
}

impl<'a> QuotaChain<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, overrides: &'a QuotaOverrides) -> Self {
        self.user = Some(overrides);
        self
    }

    pub fn project(mut self, overrides: &'a QuotaOverrides) -> Self {
        self.project = Some(overrides);
        self
    }

    pub fn project_type(mut self, overrides: &'a QuotaOverrides) -> Self {
        self.project_type = Some(overrides);
        self
    }
}

/// Resolve every quota kind through the precedence chain
pub fn resolve(defaults: &QuotaDefaults, chain: QuotaChain<'_>) -> QuotaLimits {
    let layers = [
        (chain.user, QuotaSource::User),
        (chain.project, QuotaSource::Project),
        (chain.project_type, QuotaSource::ProjectType),
    ];

    let entries = QuotaKind::ALL
        .iter()
        .map(|&kind| {
            let resolved = layers
                .iter()
                .find_map(|(layer, source)| {
                    layer
                        .and_then(|overrides| overrides.get(kind))
                        .map(|limit| ResolvedQuota { limit, source: *source })
                })
                .unwrap_or(ResolvedQuota {
                    limit: defaults.get(kind),
                    source: QuotaSource::Default,
                });
            (kind, resolved)
        })
        .collect::<BTreeMap<_, _>>();

    QuotaLimits { entries }
}

/// Current consumption of a project, measured before an upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectUsage {
    /// Bytes of all live files of the project
    pub storage_used: i64,
    /// Versions created in the last 24 hours
    pub versions_last_day: i64,
}

/// A limit of 0 blocks the action outright, even when nothing is requested
fn ensure_within(limits: &QuotaLimits, kind: QuotaKind, requested: i64) -> AppResult<()> {
    let limit = limits.limit(kind);
    if limit == 0 || requested > limit {
        return Err(AppError::QuotaExceeded { kind, limit, requested });
    }
    Ok(())
}

/// Check a new version with the given file sizes against resolved limits
pub fn check_version_upload(
    limits: &QuotaLimits,
    usage: ProjectUsage,
    file_sizes: &[i64],
) -> AppResult<()> {
    ensure_within(limits, QuotaKind::VersionsPerDay, usage.versions_last_day + 1)?;
    ensure_within(limits, QuotaKind::FilesPerVersion, file_sizes.len() as i64)?;

    for &size in file_sizes {
        ensure_within(limits, QuotaKind::FileSize, size)?;
    }

    let total: i64 = file_sizes.iter().sum();
    ensure_within(limits, QuotaKind::VersionSize, total)?;
    ensure_within(limits, QuotaKind::ProjectStorage, usage.storage_used + total)?;

    Ok(())
}

/// Check whether a user who created `created_last_day` projects may create another
pub fn check_project_creation(limits: &QuotaLimits, created_last_day: i64) -> AppResult<()> {
    ensure_within(limits, QuotaKind::ProjectsPerDay, created_last_day + 1)
}

/// One line of a quota report shown to project members
#[derive(Debug, Clone, Serialize)]
pub struct QuotaReportLine {
    pub kind: QuotaKind,
    pub limit: i64,
    pub source: QuotaSource,
    /// Consumption, for kinds that are measured per project
    pub used: Option<i64>,
    pub remaining: Option<i64>,
}

/// Describe limits and the remaining capacity of a project
pub fn report(limits: &QuotaLimits, usage: ProjectUsage) -> Vec<QuotaReportLine> {
    QuotaKind::ALL
        .iter()
        .map(|&kind| {
            let resolved = limits.resolved(kind);
            let used = match kind {
                QuotaKind::ProjectStorage => Some(usage.storage_used),
                QuotaKind::VersionsPerDay => Some(usage.versions_last_day),
                _ => None,
            };
            QuotaReportLine {
                kind,
                limit: resolved.limit,
                source: resolved.source,
                used,
                remaining: used.map(|used| (resolved.limit - used).max(0)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> QuotaDefaults {
        QuotaDefaults {
            project_storage: 1000,
            version_size: 500,
            file_size: 200,
            files_per_version: 3,
            versions_per_day: 2,
            projects_per_day: 1,
        }
    }

    fn overrides(kind: QuotaKind, value: i64) -> QuotaOverrides {
        let mut overrides = QuotaOverrides::default();
        overrides.set(kind, Some(value));
        overrides
    }

    #[test]
    fn defaults_apply_without_overrides() {
        let limits = resolve(&defaults(), QuotaChain::new());
        for kind in QuotaKind::ALL {
            assert_eq!(limits.resolved(kind).source, QuotaSource::Default);
            assert_eq!(limits.limit(kind), defaults().get(kind));
        }
    }

    #[test]
    fn user_beats_project_beats_type() {
        let user = overrides(QuotaKind::FileSize, 10);
        let project = overrides(QuotaKind::FileSize, 20);
        let project_type = overrides(QuotaKind::FileSize, 30);

        let all = resolve(
            &defaults(),
            QuotaChain::new().user(&user).project(&project).project_type(&project_type),
        );
        assert_eq!(all.resolved(QuotaKind::FileSize), ResolvedQuota { limit: 10, source: QuotaSource::User });

        let no_user = resolve(&defaults(), QuotaChain::new().project(&project).project_type(&project_type));
        assert_eq!(no_user.resolved(QuotaKind::FileSize), ResolvedQuota { limit: 20, source: QuotaSource::Project });

        let type_only = resolve(&defaults(), QuotaChain::new().project_type(&project_type));
        assert_eq!(type_only.resolved(QuotaKind::FileSize), ResolvedQuota { limit: 30, source: QuotaSource::ProjectType });
    }

    #[test]
    fn kinds_resolve_independently() {
        let user = overrides(QuotaKind::FileSize, 10);
        let project_type = overrides(QuotaKind::ProjectStorage, 5000);

        let limits = resolve(&defaults(), QuotaChain::new().user(&user).project_type(&project_type));
        assert_eq!(limits.resolved(QuotaKind::FileSize).source, QuotaSource::User);
        assert_eq!(limits.resolved(QuotaKind::ProjectStorage).source, QuotaSource::ProjectType);
        assert_eq!(limits.resolved(QuotaKind::VersionSize).source, QuotaSource::Default);
    }

    #[test]
    fn zero_override_is_a_real_limit() {
        let user = overrides(QuotaKind::VersionsPerDay, 0);
        let limits = resolve(&defaults(), QuotaChain::new().user(&user));
        let err = check_version_upload(&limits, ProjectUsage::default(), &[1]).unwrap_err();
        assert!(matches!(err, AppError::QuotaExceeded { kind: QuotaKind::VersionsPerDay, limit: 0, requested: 1 }));
    }

    #[test]
    fn zero_size_limits_block_empty_files() {
        for kind in [QuotaKind::FileSize, QuotaKind::VersionSize, QuotaKind::ProjectStorage] {
            let user = overrides(kind, 0);
            let limits = resolve(&defaults(), QuotaChain::new().user(&user));
            let err = check_version_upload(&limits, ProjectUsage::default(), &[0]).unwrap_err();
            assert!(
                matches!(err, AppError::QuotaExceeded { kind: k, limit: 0, requested: 0 } if k == kind),
                "{:?}",
                kind
            );
        }
    }

    #[test]
    fn upload_checks_each_dimension() {
        let limits = resolve(&defaults(), QuotaChain::new());
        let usage = ProjectUsage { storage_used: 0, versions_last_day: 0 };

        assert!(check_version_upload(&limits, usage, &[200, 200]).is_ok());

        let err = check_version_upload(&limits, usage, &[1, 1, 1, 1]).unwrap_err();
        assert!(matches!(err, AppError::QuotaExceeded { kind: QuotaKind::FilesPerVersion, .. }));

        let err = check_version_upload(&limits, usage, &[201]).unwrap_err();
        assert!(matches!(err, AppError::QuotaExceeded { kind: QuotaKind::FileSize, .. }));

        let err = check_version_upload(&limits, usage, &[200, 200, 200]).unwrap_err();
        assert!(matches!(err, AppError::QuotaExceeded { kind: QuotaKind::VersionSize, limit: 500, requested: 600 }));

        let full = ProjectUsage { storage_used: 900, versions_last_day: 0 };
        let err = check_version_upload(&limits, full, &[150]).unwrap_err();
        assert!(matches!(err, AppError::QuotaExceeded { kind: QuotaKind::ProjectStorage, limit: 1000, requested: 1050 }));

        let busy = ProjectUsage { storage_used: 0, versions_last_day: 2 };
        let err = check_version_upload(&limits, busy, &[1]).unwrap_err();
        assert!(matches!(err, AppError::QuotaExceeded { kind: QuotaKind::VersionsPerDay, .. }));
    }

    #[test]
    fn project_creation_rate() {
        let limits = resolve(&defaults(), QuotaChain::new());
        assert!(check_project_creation(&limits, 0).is_ok());
        assert!(check_project_creation(&limits, 1).is_err());
    }

    #[test]
    fn report_computes_remaining_capacity() {
        let limits = resolve(&defaults(), QuotaChain::new());
        let lines = report(&limits, ProjectUsage { storage_used: 1200, versions_last_day: 1 });

        let storage = lines.iter().find(|line| line.kind == QuotaKind::ProjectStorage).unwrap();
        assert_eq!(storage.used, Some(1200));
        assert_eq!(storage.remaining, Some(0));

        let versions = lines.iter().find(|line| line.kind == QuotaKind::VersionsPerDay).unwrap();
        assert_eq!(versions.remaining, Some(1));

        let file_size = lines.iter().find(|line| line.kind == QuotaKind::FileSize).unwrap();
        assert_eq!(file_size.used, None);
    }

    #[test]
    fn negative_overrides_are_rejected() {
        assert!(overrides(QuotaKind::FileSize, -1).validate().is_err());
        assert!(overrides(QuotaKind::FileSize, 0).validate().is_ok());
    }
}

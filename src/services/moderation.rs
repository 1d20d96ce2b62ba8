/// Review queue, abuse reports and account administration
use crate::error::{AppError, AppResult};
use crate::marketplace::{
    AbuseReport, NotificationKind, Project, ProjectStatus, ProjectType, ReportStatus, ReportTarget,
    User, UserRole,
};
use crate::quota::QuotaOverrides;
use crate::services::{required_text, Marketplace};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

const REASON_MIN: usize = 10;
const REASON_MAX: usize = 2000;

#[derive(Debug, Clone, Deserialize)]
pub struct ReportRequest {
    pub target_kind: ReportTarget,
    pub target_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveAction {
    Resolve,
    Dismiss,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveRequest {
    pub action: ResolveAction,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BanRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleRequest {
    pub role: UserRole,
}

fn require_admin(user: &User) -> AppResult<()> {
    if !user.is_admin() {
        return Err(AppError::forbidden("administrator access required"));
    }
    Ok(())
}

impl Marketplace {
    pub async fn pending_projects(&self, admin: &User) -> AppResult<Vec<Project>> {
        require_admin(admin)?;
        Ok(self.projects.pending().await?)
    }

    async fn pending_project(&self, slug: &str) -> AppResult<Project> {
        let project = self
            .projects
            .by_slug(slug)
            .await?
            .filter(|p| !p.is_deleted())
            .ok_or_else(|| AppError::not_found(format!("project '{}'", slug)))?;

        if project.status != ProjectStatus::Pending {
            return Err(AppError::conflict(format!(
                "project '{}' is {:?}, not pending review",
                slug, project.status
            )));
        }
        Ok(project)
    }

    pub async fn approve_project(&self, admin: &User, slug: &str) -> AppResult<Project> {
        require_admin(admin)?;
        let project = self.pending_project(slug).await?;

        self.projects
            .set_status(&project.id, ProjectStatus::Approved, None, Utc::now())
            .await?;
        tracing::info!("✅ {} approved {}", admin.username, project.slug);

        self.notify_maintainers(
            &project,
            Some(admin),
            NotificationKind::ProjectApproved,
            json!({
                "project": project.slug,
                "message": format!("'{}' is now listed", project.name),
            }),
        )
        .await?;

        self.reload_project(&project.id).await
    }

    pub async fn reject_project(&self, admin: &User, slug: &str, note: &str) -> AppResult<Project> {
        require_admin(admin)?;
        let note = required_text("note", note, REASON_MAX)?;
        let project = self.pending_project(slug).await?;

        self.projects
            .set_status(&project.id, ProjectStatus::Rejected, Some(&note), Utc::now())
            .await?;
        tracing::info!("⛔ {} rejected {}", admin.username, project.slug);

        self.notify_maintainers(
            &project,
            Some(admin),
            NotificationKind::ProjectRejected,
            json!({
                "project": project.slug,
                "note": note,
                "message": format!("'{}' was rejected: {}", project.name, note),
            }),
        )
        .await?;

        self.reload_project(&project.id).await
    }

    pub async fn report(&self, actor: &User, request: ReportRequest) -> AppResult<AbuseReport> {
        let reason = request.reason.trim().to_string();
        let length = reason.chars().count();
        if !(REASON_MIN..=REASON_MAX).contains(&length) {
            return Err(AppError::validation(format!(
                "reason must be {} to {} characters",
                REASON_MIN, REASON_MAX
            )));
        }

        let exists = match request.target_kind {
            ReportTarget::Project => self.projects.get(&request.target_id).await?.is_some_and(|p| !p.is_deleted()),
            ReportTarget::Version => self
                .versions
                .get(&request.target_id)
                .await?
                .is_some_and(|v| v.deleted_at.is_none()),
            ReportTarget::User => self.users.get(&request.target_id).await?.is_some(),
        };
        if !exists {
            return Err(AppError::not_found(format!(
                "{:?} '{}'",
                request.target_kind, request.target_id
            )));
        }

        if self
            .reports
            .open_exists(&actor.id, request.target_kind, &request.target_id)
            .await?
        {
            return Err(AppError::conflict("you already have an open report for this target"));
        }

        let report = AbuseReport {
            id: uuid::Uuid::new_v4().to_string(),
            reporter_id: actor.id.clone(),
            target_kind: request.target_kind,
            target_id: request.target_id,
            reason,
            status: ReportStatus::Open,
            resolution_note: None,
            resolved_by: None,
            created_at: Utc::now(),
            resolved_at: None,
        };
        self.reports.insert(&report).await?;
        tracing::info!("🚩 {} reported {:?} {}", actor.username, report.target_kind, report.target_id);
        Ok(report)
    }

    pub async fn open_reports(&self, admin: &User) -> AppResult<Vec<AbuseReport>> {
        require_admin(admin)?;
        Ok(self.reports.open().await?)
    }

    pub async fn resolve_report(&self, admin: &User, id: &str, request: ResolveRequest) -> AppResult<AbuseReport> {
        require_admin(admin)?;
        let report = self
            .reports
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("report '{}'", id)))?;
        if report.status != ReportStatus::Open {
            return Err(AppError::conflict(format!("report '{}' is already closed", id)));
        }

        let status = match request.action {
            ResolveAction::Resolve => ReportStatus::Resolved,
            ResolveAction::Dismiss => ReportStatus::Dismissed,
        };
        let note = request.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        self.reports
            .resolve(id, status, note.as_deref(), &admin.id, Utc::now())
            .await?;
        tracing::info!("📋 {} closed report {} as {:?}", admin.username, id, status);

        self.notify_users(
            vec![report.reporter_id.clone()],
            Some(admin),
            NotificationKind::ReportResolved,
            json!({
                "report": id,
                "status": status,
                "message": note.unwrap_or_else(|| "Thank you for your report.".to_string()),
            }),
        )
        .await;

        self.reports
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("report '{}'", id)))
    }

    pub async fn list_users(&self, admin: &User) -> AppResult<Vec<User>> {
        require_admin(admin)?;
        Ok(self.users.list().await?)
    }

    pub async fn ban_user(&self, admin: &User, username: &str, reason: &str) -> AppResult<User> {
        require_admin(admin)?;
        let reason = required_text("reason", reason, REASON_MAX)?;
        let target = self.user_by_name(username).await?;
        if target.id == admin.id {
            return Err(AppError::validation("administrators cannot ban themselves"));
        }

        self.users.set_ban(&target.id, Some((Utc::now(), &reason))).await?;
        tracing::warn!("🔨 {} banned {}: {}", admin.username, target.username, reason);

        self.notify_users(
            vec![target.id.clone()],
            Some(admin),
            NotificationKind::AccountBanned,
            json!({ "message": format!("Your account was suspended: {}", reason) }),
        )
        .await;

        self.user_by_name(username).await
    }

    pub async fn unban_user(&self, admin: &User, username: &str) -> AppResult<User> {
        require_admin(admin)?;
        let target = self.user_by_name(username).await?;
        self.users.set_ban(&target.id, None).await?;
        tracing::info!("🕊️ {} unbanned {}", admin.username, target.username);
        self.user_by_name(username).await
    }

    pub async fn set_user_role(&self, admin: &User, username: &str, role: UserRole) -> AppResult<User> {
        require_admin(admin)?;
        let target = self.user_by_name(username).await?;

        if target.is_admin() && role == UserRole::User && self.users.count_admins().await? <= 1 {
            return Err(AppError::conflict("the last administrator cannot be demoted"));
        }

        self.users.set_role(&target.id, role).await?;
        tracing::info!("🔧 {} set role of {} to {:?}", admin.username, target.username, role);
        self.user_by_name(username).await
    }

    pub async fn set_user_quota(&self, admin: &User, username: &str, quota: &QuotaOverrides) -> AppResult<User> {
        require_admin(admin)?;
        quota.validate()?;
        let target = self.user_by_name(username).await?;
        self.users.set_quota(&target.id, quota).await?;
        tracing::info!("📏 {} updated quota overrides of user {}", admin.username, target.username);
        self.user_by_name(username).await
    }

    pub async fn set_project_quota(&self, admin: &User, slug: &str, quota: &QuotaOverrides) -> AppResult<Project> {
        require_admin(admin)?;
        quota.validate()?;
        let project = self
            .projects
            .by_slug(slug)
            .await?
            .ok_or_else(|| AppError::not_found(format!("project '{}'", slug)))?;
        self.projects.set_quota(&project.id, quota).await?;
        tracing::info!("📏 {} updated quota overrides of project {}", admin.username, project.slug);
        self.reload_project(&project.id).await
    }

    pub async fn set_type_quota(&self, admin: &User, slug: &str, quota: &QuotaOverrides) -> AppResult<ProjectType> {
        require_admin(admin)?;
        quota.validate()?;
        if !self.project_types.set_quota(slug, quota).await? {
            return Err(AppError::not_found(format!("project type '{}'", slug)));
        }
        tracing::info!("📏 {} updated quota overrides of project type {}", admin.username, slug);
        self.project_types
            .get_by_slug(slug)
            .ok_or_else(|| AppError::not_found(format!("project type '{}'", slug)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::market;

    #[tokio::test]
    async fn review_flow_notifies_owners() {
        let t = market().await;
        let admin = t.user("admin").await;
        let alice = t.user("alice").await;
        let project = t.project(&alice, "Pack").await;
        t.version(&alice, &project.slug, "1", Vec::new()).await;

        assert!(matches!(t.market.approve_project(&admin, &project.slug).await, Err(AppError::Conflict(_))));

        t.market.submit_project(&alice, &project.slug).await.unwrap();
        assert_eq!(t.market.pending_projects(&admin).await.unwrap().len(), 1);

        let rejected = t.market.reject_project(&admin, &project.slug, "Missing screenshots").await.unwrap();
        assert_eq!(rejected.status, ProjectStatus::Rejected);
        assert_eq!(rejected.review_note.as_deref(), Some("Missing screenshots"));
        assert!(t.unread(&alice).await.contains(&NotificationKind::ProjectRejected));

        t.market.submit_project(&alice, &project.slug).await.unwrap();
        let approved = t.market.approve_project(&admin, &project.slug).await.unwrap();
        assert_eq!(approved.status, ProjectStatus::Approved);
        assert!(t.unread(&alice).await.contains(&NotificationKind::ProjectApproved));

        // editing keeps the listing approved
        let updated = t
            .market
            .update_project(
                &alice,
                &project.slug,
                crate::services::UpdateProject { summary: Some("New summary".into()), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, ProjectStatus::Approved);
    }

    #[tokio::test]
    async fn non_admins_cannot_moderate() {
        let t = market().await;
        let _admin = t.user("admin").await;
        let alice = t.user("alice").await;
        assert!(matches!(t.market.pending_projects(&alice).await, Err(AppError::Forbidden(_))));
        assert!(matches!(t.market.ban_user(&alice, "admin", "no reason").await, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn reports_are_validated_and_deduplicated() {
        let t = market().await;
        let admin = t.user("admin").await;
        let alice = t.user("alice").await;
        let bob = t.user("bob").await;

        let report = |reason: &str, target: &str| ReportRequest {
            target_kind: ReportTarget::User,
            target_id: target.to_string(),
            reason: reason.to_string(),
        };

        assert!(matches!(t.market.report(&alice, report("short", &bob.id)).await, Err(AppError::Validation(_))));
        assert!(matches!(
            t.market.report(&alice, report("spamming everywhere", "ghost")).await,
            Err(AppError::NotFound(_))
        ));

        let created = t.market.report(&alice, report("spamming everywhere", &bob.id)).await.unwrap();
        assert!(matches!(
            t.market.report(&alice, report("spamming everywhere", &bob.id)).await,
            Err(AppError::Conflict(_))
        ));

        let resolved = t
            .market
            .resolve_report(&admin, &created.id, ResolveRequest { action: ResolveAction::Dismiss, note: None })
            .await
            .unwrap();
        assert_eq!(resolved.status, ReportStatus::Dismissed);
        assert_eq!(resolved.resolved_by.as_deref(), Some(admin.id.as_str()));
        assert!(t.unread(&alice).await.contains(&NotificationKind::ReportResolved));
        assert!(t.market.open_reports(&admin).await.unwrap().is_empty());

        // a closed report no longer blocks a new one
        t.market.report(&alice, report("spamming everywhere", &bob.id)).await.unwrap();
    }

    #[tokio::test]
    async fn ban_rules() {
        let t = market().await;
        let admin = t.user("admin").await;
        let _alice = t.user("alice").await;

        assert!(matches!(t.market.ban_user(&admin, "admin", "testing").await, Err(AppError::Validation(_))));

        let banned = t.market.ban_user(&admin, "alice", "spam").await.unwrap();
        assert!(banned.is_banned());
        assert_eq!(banned.ban_reason.as_deref(), Some("spam"));

        let unbanned = t.market.unban_user(&admin, "alice").await.unwrap();
        assert!(!unbanned.is_banned());
    }

    #[tokio::test]
    async fn last_admin_cannot_step_down() {
        let t = market().await;
        let admin = t.user("admin").await;
        t.user("alice").await;

        assert!(matches!(
            t.market.set_user_role(&admin, "admin", UserRole::User).await,
            Err(AppError::Conflict(_))
        ));

        t.market.set_user_role(&admin, "alice", UserRole::Admin).await.unwrap();
        let demoted = t.market.set_user_role(&admin, "admin", UserRole::User).await.unwrap();
        assert!(!demoted.is_admin());
    }

    #[tokio::test]
    async fn quota_overrides_are_validated_and_applied() {
        let t = market().await;
        let admin = t.user("admin").await;

        let negative = QuotaOverrides { file_size: Some(-1), ..Default::default() };
        assert!(matches!(
            t.market.set_user_quota(&admin, "admin", &negative).await,
            Err(AppError::Validation(_))
        ));

        let overrides = QuotaOverrides { file_size: Some(1024), ..Default::default() };
        let project_type = t.market.set_type_quota(&admin, "sound_pack", &overrides).await.unwrap();
        assert_eq!(project_type.quota.file_size, Some(1024));
        assert_eq!(
            t.market.project_types.get_by_slug("sound_pack").unwrap().quota.file_size,
            Some(1024)
        );

        assert!(matches!(
            t.market.set_type_quota(&admin, "shader", &overrides).await,
            Err(AppError::NotFound(_))
        ));
    }
}

/// Marketplace rules
///
/// `Marketplace` combines the storages, the project type registry, the file store
/// and the job queue. Each submodule adds one group of operations to it; all of
/// them take the acting user and enforce permissions, quotas and state transitions
/// before touching storage.

pub mod memberships;
pub mod moderation;
pub mod projects;
pub mod users;
pub mod versions;

use crate::catalog::ProjectTypeRegistry;
use crate::config::Config;
use crate::database::Database;
use crate::error::{AppError, AppResult};
use crate::files::FileStore;
use crate::jobs::{JobProcessor, JobQueue, Mailer};
use crate::marketplace::{
    MemberRole, Membership, MembershipStorage, NotificationKind, NotificationStorage, Project,
    ProjectStorage, ProjectType, ReportStorage, TagStorage, User, UserStorage, VersionStorage,
};
use crate::quota::QuotaDefaults;
use serde_json::Value;
use std::sync::Arc;

pub use memberships::{InviteRequest, RoleChange, TransferRequest};
pub use moderation::{BanRequest, ReportRequest, ResolveAction, ResolveRequest, RoleRequest};
pub use projects::{CreateProject, CreateTag, ProjectDetails, UpdateProject};
pub use users::{Registered, RegisterUser};
pub use versions::{DependencyRequest, Download, NewVersionRequest, UploadedFile, VersionDetails};

#[derive(Debug)]
pub struct Marketplace {
    pub(crate) users: UserStorage,
    pub(crate) projects: ProjectStorage,
    pub(crate) versions: VersionStorage,
    pub(crate) memberships: MembershipStorage,
    pub(crate) tags: TagStorage,
    pub(crate) reports: ReportStorage,
    pub(crate) notifications: NotificationStorage,
    pub(crate) project_types: Arc<ProjectTypeRegistry>,
    pub(crate) files: FileStore,
    pub(crate) jobs: JobQueue,
    pub(crate) quotas: QuotaDefaults,
    pub(crate) retention_days: i64,
}

impl Marketplace {
    pub fn new(
        db: &Database,
        config: &Config,
        project_types: Arc<ProjectTypeRegistry>,
        jobs: JobQueue,
    ) -> Self {
        let pool = db.pool().clone();
        Self {
            users: UserStorage::new(pool.clone()),
            projects: ProjectStorage::new(pool.clone()),
            versions: VersionStorage::new(pool.clone()),
            memberships: MembershipStorage::new(pool.clone()),
            tags: TagStorage::new(pool.clone()),
            reports: ReportStorage::new(pool.clone()),
            notifications: NotificationStorage::new(pool),
            project_types,
            files: FileStore::new(&config.storage.upload_dir),
            jobs,
            quotas: config.quotas.clone(),
            retention_days: config.maintenance.retention_days,
        }
    }

    /// Job processor bound to the same database as the marketplace
    pub fn job_processor(db: &Database, mailer: Arc<dyn Mailer>) -> JobProcessor {
        let pool = db.pool().clone();
        JobProcessor::new(NotificationStorage::new(pool.clone()), UserStorage::new(pool), mailer)
    }

    pub fn project_types(&self) -> &ProjectTypeRegistry {
        &self.project_types
    }

    pub fn file_store(&self) -> &FileStore {
        &self.files
    }

    pub(crate) fn project_type_of(&self, project: &Project) -> AppResult<ProjectType> {
        self.project_types
            .get_by_id(&project.project_type_id)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!(
                "project {} references unknown project type {}",
                project.slug,
                project.project_type_id
            )))
    }

    /// Load a project the viewer is allowed to see
    ///
    /// Approved projects are public. Unapproved ones are visible to anyone holding a
    /// membership row (invitees included) and to admins. Deleted projects are
    /// visible to admins only.
    pub(crate) async fn visible_project(
        &self,
        slug: &str,
        viewer: Option<&User>,
    ) -> AppResult<(Project, Option<Membership>)> {
        let project = self
            .projects
            .by_slug(slug)
            .await?
            .ok_or_else(|| AppError::not_found(format!("project '{}'", slug)))?;

        let membership = match viewer {
            Some(user) => self.memberships.get(&project.id, &user.id).await?,
            None => None,
        };
        let is_admin = viewer.is_some_and(User::is_admin);

        let visible = if project.is_deleted() {
            is_admin
        } else {
            project.is_public() || is_admin || membership.is_some()
        };

        if !visible {
            return Err(AppError::not_found(format!("project '{}'", slug)));
        }

        Ok((project, membership))
    }

    /// Load a live project and require an accepted membership of at least `min_role`
    ///
    /// Admins pass regardless of membership.
    pub(crate) async fn project_with_role(
        &self,
        slug: &str,
        actor: &User,
        min_role: MemberRole,
    ) -> AppResult<(Project, Option<Membership>)> {
        let (project, membership) = self.visible_project(slug, Some(actor)).await?;

        if project.is_deleted() {
            return Err(AppError::not_found(format!("project '{}'", slug)));
        }

        let allowed = actor.is_admin()
            || membership.as_ref().is_some_and(|m| m.grants(min_role));
        if !allowed {
            return Err(AppError::forbidden(format!(
                "requires {:?} access to project '{}'",
                min_role, slug
            )));
        }

        Ok((project, membership))
    }

    /// Queue a notification for the given users, leaving out the actor
    pub(crate) async fn notify_users(
        &self,
        mut user_ids: Vec<String>,
        actor: Option<&User>,
        kind: NotificationKind,
        payload: Value,
    ) {
        if let Some(actor) = actor {
            user_ids.retain(|id| id != &actor.id);
        }
        if user_ids.is_empty() {
            return;
        }
        self.jobs.notify(user_ids, kind, payload).await;
    }

    /// Queue a notification for the project's active owners and maintainers
    pub(crate) async fn notify_maintainers(
        &self,
        project: &Project,
        actor: Option<&User>,
        kind: NotificationKind,
        payload: Value,
    ) -> AppResult<()> {
        let recipients = self
            .memberships
            .active_user_ids(&project.id, MemberRole::Maintainer)
            .await?;
        self.notify_users(recipients, actor, kind, payload).await;
        Ok(())
    }
}

/// Trim and bound a required text field
pub(crate) fn required_text(field: &str, value: &str, max: usize) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{} must not be empty", field)));
    }
    if value.chars().count() > max {
        return Err(AppError::validation(format!("{} must be at most {} characters", field, max)));
    }
    Ok(value.to_string())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::catalog::ProjectTypeStorage;
    use crate::jobs::FileMailer;
    use tempfile::TempDir;

    /// A marketplace over an in-memory database with inline jobs
    pub(crate) struct TestMarket {
        pub market: Marketplace,
        pub db: Database,
        pub dir: TempDir,
    }

    pub(crate) async fn market() -> TestMarket {
        market_with(|_| {}).await
    }

    pub(crate) async fn market_with(adjust: impl FnOnce(&mut Config)) -> TestMarket {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::for_data_dir(dir.path());
        adjust(&mut config);

        let db = Database::in_memory().await.unwrap();
        let registry = Arc::new(ProjectTypeRegistry::new(ProjectTypeStorage::new(db.pool().clone())));
        registry.init_from_storage().await.unwrap();

        let mailer = FileMailer::new(&config.mail.dir, config.mail.from.clone());
        let jobs = JobQueue::inline(Marketplace::job_processor(&db, Arc::new(mailer)));
        let market = Marketplace::new(&db, &config, registry, jobs);
        market.files.ensure_root().await.unwrap();

        TestMarket { market, db, dir }
    }

    impl TestMarket {
        pub(crate) async fn user(&self, name: &str) -> User {
            let registered = self
                .market
                .register(RegisterUser {
                    username: name.to_string(),
                    email: format!("{}@example.com", name),
                })
                .await
                .unwrap();
            registered.user
        }

        pub(crate) async fn project(&self, owner: &User, name: &str) -> Project {
            self.market
                .create_project(
                    owner,
                    CreateProject {
                        project_type: "mod".to_string(),
                        name: name.to_string(),
                        summary: format!("{} summary", name),
                        description: None,
                        tags: Vec::new(),
                    },
                )
                .await
                .unwrap()
        }

        pub(crate) async fn version(
            &self,
            actor: &User,
            slug: &str,
            label: &str,
            dependencies: Vec<DependencyRequest>,
        ) -> VersionDetails {
            self.market
                .create_version(
                    actor,
                    slug,
                    NewVersionRequest {
                        version: label.to_string(),
                        changelog: String::new(),
                        release_type: None,
                        dependencies,
                        tags: Vec::new(),
                        files: vec![UploadedFile {
                            filename: format!("{}-{}.zip", slug, label),
                            bytes: label.as_bytes().to_vec().into(),
                        }],
                    },
                )
                .await
                .unwrap()
        }

        /// Rendered mails delivered so far, oldest first
        pub(crate) fn mails(&self) -> Vec<String> {
            let Ok(entries) = std::fs::read_dir(self.dir.path().join("mail")) else {
                return Vec::new();
            };
            let mut paths: Vec<_> = entries.map(|e| e.unwrap().path()).collect();
            paths.sort();
            paths.into_iter().map(|p| std::fs::read_to_string(p).unwrap()).collect()
        }

        pub(crate) async fn unread(&self, user: &User) -> Vec<NotificationKind> {
            self.market
                .notifications
                .list(&user.id, true)
                .await
                .unwrap()
                .into_iter()
                .map(|n| n.kind)
                .collect()
        }
    }
}

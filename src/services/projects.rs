/// Project lifecycle
///
/// draft -> pending (owner submits) -> approved | rejected (admin reviews). A
/// rejected project may be resubmitted. Deletion is soft and reversible until the
/// retention window passes and the maintenance job purges it.

use crate::error::{is_unique_violation, AppError, AppResult};
use crate::graph::DependencyGraph;
use crate::marketplace::{
    slugify, BrowseQuery, DependentRef, MemberRole, MemberView, Membership, NotificationKind, Page,
    Project, ProjectStatus, ProjectType, Tag, User,
};
use crate::quota::{self, resolver::report, ProjectUsage, QuotaChain, QuotaOverrides, QuotaReportLine};
use crate::services::{required_text, Marketplace};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;

const NAME_MAX: usize = 100;
const SUMMARY_MAX: usize = 255;
const DESCRIPTION_MAX: usize = 20_000;
const SLUG_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    /// Project type slug
    pub project_type: String,
    pub name: String,
    pub summary: String,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update; absent fields stay untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTag {
    pub name: String,
    pub slug: Option<String>,
    /// Restrict the tag to one project type
    pub project_type: Option<String>,
}

/// A project with everything its page shows
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetails {
    #[serde(flatten)]
    pub project: Project,
    pub project_type: String,
    pub tags: Vec<Tag>,
    pub members: Vec<MemberView>,
}

/// Short reference to a project, used in dependent listings
#[derive(Debug, Clone, Serialize)]
pub struct ProjectRef {
    pub slug: String,
    pub name: String,
}

fn optional_text(field: &str, value: Option<String>, max: usize) -> AppResult<String> {
    let value = value.unwrap_or_default().trim().to_string();
    if value.chars().count() > max {
        return Err(AppError::validation(format!("{} must be at most {} characters", field, max)));
    }
    Ok(value)
}

impl Marketplace {
    pub async fn create_project(&self, actor: &User, request: CreateProject) -> AppResult<Project> {
        let project_type = self
            .project_types
            .get_by_slug(&request.project_type)
            .ok_or_else(|| AppError::validation(format!("unknown project type '{}'", request.project_type)))?;

        let name = required_text("name", &request.name, NAME_MAX)?;
        let summary = required_text("summary", &request.summary, SUMMARY_MAX)?;
        let description = optional_text("description", request.description, DESCRIPTION_MAX)?;

        let limits = quota::resolve(
            &self.quotas,
            QuotaChain::new().user(&actor.quota).project_type(&project_type.quota),
        );
        let now = Utc::now();
        let created_last_day = self
            .projects
            .count_created_since(&actor.id, now - Duration::hours(24))
            .await?;
        quota::check_project_creation(&limits, created_last_day)?;

        let tags = self.resolve_tags(&project_type, &request.tags).await?;

        let mut project = Project {
            id: uuid::Uuid::new_v4().to_string(),
            project_type_id: project_type.id.clone(),
            slug: String::new(),
            name,
            summary,
            description,
            status: ProjectStatus::Draft,
            review_note: None,
            downloads: 0,
            quota: QuotaOverrides::default(),
            created_by: actor.id.clone(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        // another project may claim the slug between the lookup and the insert
        let mut attempts = 0;
        loop {
            project.slug = self.unique_slug(&project.name).await?;
            match self.projects.insert(&project).await {
                Ok(()) => break,
                Err(e) if is_unique_violation(&e) && attempts < SLUG_ATTEMPTS => attempts += 1,
                Err(e) if is_unique_violation(&e) => {
                    return Err(AppError::conflict(format!("slug '{}' is already taken", project.slug)))
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.memberships
            .insert(&Membership {
                project_id: project.id.clone(),
                user_id: actor.id.clone(),
                role: MemberRole::Owner,
                is_primary: true,
                accepted_at: Some(now),
                invited_by: None,
                created_at: now,
            })
            .await?;

        if !tags.is_empty() {
            let tag_ids: Vec<String> = tags.into_iter().map(|t| t.id).collect();
            self.projects.set_tags(&project.id, &tag_ids).await?;
        }

        tracing::info!("📦 {} created project {} ({})", actor.username, project.slug, project_type.slug);
        Ok(project)
    }

    /// Slug derived from the name, suffixed until no project (deleted ones included) holds it
    async fn unique_slug(&self, name: &str) -> AppResult<String> {
        let base = slugify(name);
        if base.is_empty() {
            return Err(AppError::validation("name must contain at least one letter or digit"));
        }

        if !self.projects.slug_exists(&base).await? {
            return Ok(base);
        }
        for suffix in 2..1000 {
            let candidate = format!("{}-{}", base, suffix);
            if !self.projects.slug_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(AppError::conflict(format!("no free slug for '{}'", name)))
    }

    /// Look up tag slugs and make sure each one fits the project type
    pub(crate) async fn resolve_tags(&self, project_type: &ProjectType, slugs: &[String]) -> AppResult<Vec<Tag>> {
        let wanted: BTreeSet<String> = slugs.iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let wanted: Vec<String> = wanted.into_iter().collect();
        let tags = self.tags.by_slugs(&wanted).await?;

        if let Some(missing) = wanted.iter().find(|slug| !tags.iter().any(|t| &t.slug == *slug)) {
            return Err(AppError::validation(format!("unknown tag '{}'", missing)));
        }
        if let Some(tag) = tags
            .iter()
            .find(|t| t.project_type_id.as_ref().is_some_and(|id| id != &project_type.id))
        {
            return Err(AppError::validation(format!(
                "tag '{}' cannot be used on {} projects",
                tag.slug, project_type.slug
            )));
        }

        Ok(tags)
    }

    pub async fn update_project(&self, actor: &User, slug: &str, request: UpdateProject) -> AppResult<Project> {
        let (project, _) = self.project_with_role(slug, actor, MemberRole::Maintainer).await?;

        let name = match request.name {
            Some(name) => required_text("name", &name, NAME_MAX)?,
            None => project.name.clone(),
        };
        let summary = match request.summary {
            Some(summary) => required_text("summary", &summary, SUMMARY_MAX)?,
            None => project.summary.clone(),
        };
        let description = match request.description {
            Some(description) => optional_text("description", Some(description), DESCRIPTION_MAX)?,
            None => project.description.clone(),
        };

        self.projects
            .update_details(&project.id, &name, &summary, &description, Utc::now())
            .await?;

        self.reload_project(&project.id).await
    }

    pub async fn submit_project(&self, actor: &User, slug: &str) -> AppResult<Project> {
        let (project, _) = self.project_with_role(slug, actor, MemberRole::Owner).await?;

        if !matches!(project.status, ProjectStatus::Draft | ProjectStatus::Rejected) {
            return Err(AppError::conflict(format!(
                "project '{}' is {:?} and cannot be submitted",
                project.slug, project.status
            )));
        }
        if self.versions.live_count(&project.id).await? == 0 {
            return Err(AppError::validation("a project needs at least one version before review"));
        }

        self.projects
            .set_status(&project.id, ProjectStatus::Pending, None, Utc::now())
            .await?;
        tracing::info!("📨 {} submitted {} for review", actor.username, project.slug);

        let admins = self.users.admin_ids().await?;
        self.notify_users(
            admins,
            Some(actor),
            NotificationKind::ProjectSubmitted,
            json!({
                "project": project.slug,
                "message": format!("{} submitted '{}' for review", actor.username, project.name),
            }),
        )
        .await;

        self.reload_project(&project.id).await
    }

    pub async fn project_details(&self, slug: &str, viewer: Option<&User>) -> AppResult<ProjectDetails> {
        let (project, _) = self.visible_project(slug, viewer).await?;
        let project_type = self.project_type_of(&project)?;

        Ok(ProjectDetails {
            tags: self.projects.tags(&project.id).await?,
            members: self.memberships.list(&project.id).await?,
            project_type: project_type.slug,
            project,
        })
    }

    pub async fn browse(&self, query: &BrowseQuery) -> AppResult<Page<Project>> {
        Ok(self.projects.browse(query).await?)
    }

    /// Soft-delete a project and its versions, then tell dependent projects
    pub async fn delete_project(&self, actor: &User, slug: &str) -> AppResult<()> {
        let (project, membership) = self.project_with_role(slug, actor, MemberRole::Owner).await?;
        let is_primary = membership.as_ref().is_some_and(|m| m.is_primary);
        if !is_primary && !actor.is_admin() {
            return Err(AppError::forbidden("only the primary owner can delete a project"));
        }

        let dependents = self.versions.dependents_of_project(&project.id).await?;
        self.projects.soft_delete(&project.id, Utc::now()).await?;
        tracing::info!("🗑️ {} deleted project {}", actor.username, project.slug);

        self.cascade_removal(
            actor,
            &dependents,
            json!({
                "project": project.slug,
                "message": format!("'{}' was deleted", project.name),
            }),
        )
        .await
    }

    pub async fn restore_project(&self, actor: &User, slug: &str) -> AppResult<Project> {
        let project = self
            .projects
            .by_slug(slug)
            .await?
            .ok_or_else(|| AppError::not_found(format!("project '{}'", slug)))?;

        let is_primary = self
            .memberships
            .get(&project.id, &actor.id)
            .await?
            .is_some_and(|m| m.is_primary);
        if !is_primary && !actor.is_admin() {
            return Err(AppError::not_found(format!("project '{}'", slug)));
        }

        let Some(deleted_at) = project.deleted_at else {
            return Err(AppError::conflict(format!("project '{}' is not deleted", slug)));
        };
        if deleted_at < Utc::now() - Duration::days(self.retention_days) {
            return Err(AppError::conflict(format!(
                "project '{}' is past the {} day retention window",
                slug, self.retention_days
            )));
        }

        self.projects.restore(&project).await?;
        tracing::info!("♻️ {} restored project {}", actor.username, project.slug);
        self.reload_project(&project.id).await
    }

    pub async fn set_project_tags(&self, actor: &User, slug: &str, tags: &[String]) -> AppResult<Vec<Tag>> {
        let (project, _) = self.project_with_role(slug, actor, MemberRole::Maintainer).await?;
        let project_type = self.project_type_of(&project)?;

        let tags = self.resolve_tags(&project_type, tags).await?;
        let tag_ids: Vec<String> = tags.iter().map(|t| t.id.clone()).collect();
        self.projects.set_tags(&project.id, &tag_ids).await?;

        Ok(self.projects.tags(&project.id).await?)
    }

    /// Limits and remaining capacity as seen by the acting member
    pub async fn quota_report(&self, actor: &User, slug: &str) -> AppResult<Vec<QuotaReportLine>> {
        let (project, _) = self.project_with_role(slug, actor, MemberRole::Contributor).await?;
        let project_type = self.project_type_of(&project)?;

        let limits = quota::resolve(
            &self.quotas,
            QuotaChain::new()
                .user(&actor.quota)
                .project(&project.quota)
                .project_type(&project_type.quota),
        );
        let usage = self.project_usage(&project).await?;
        Ok(report(&limits, usage))
    }

    pub(crate) async fn project_usage(&self, project: &Project) -> AppResult<ProjectUsage> {
        Ok(ProjectUsage {
            storage_used: self.projects.storage_used(&project.id).await?,
            versions_last_day: self
                .versions
                .count_created_since(&project.id, Utc::now() - Duration::hours(24))
                .await?,
        })
    }

    /// Projects reaching this one through dependency edges, nearest first
    pub async fn transitive_dependents(&self, slug: &str, viewer: Option<&User>) -> AppResult<Vec<ProjectRef>> {
        let (project, _) = self.visible_project(slug, viewer).await?;
        let graph = DependencyGraph::from_edges(self.versions.dependency_edges().await?);
        let show_all = viewer.is_some_and(User::is_admin);

        let mut dependents = Vec::new();
        for id in graph.transitive_dependents(&project.id) {
            let Some(dependent) = self.projects.get(&id).await? else {
                continue;
            };
            if dependent.is_public() || (show_all && !dependent.is_deleted()) {
                dependents.push(ProjectRef { slug: dependent.slug, name: dependent.name });
            }
        }
        Ok(dependents)
    }

    /// Notify owners and maintainers of every project holding one of the dependents
    pub(crate) async fn cascade_removal(
        &self,
        actor: &User,
        dependents: &[DependentRef],
        payload: serde_json::Value,
    ) -> AppResult<()> {
        if dependents.is_empty() {
            return Ok(());
        }

        let projects: BTreeSet<&str> = dependents.iter().map(|d| d.project_id.as_str()).collect();
        let mut recipients = BTreeSet::new();
        for project_id in &projects {
            recipients.extend(
                self.memberships
                    .active_user_ids(project_id, MemberRole::Maintainer)
                    .await?,
            );
        }

        let mut payload = payload;
        payload["affected"] = json!(dependents
            .iter()
            .map(|d| json!({ "project": d.project_slug, "version": d.version }))
            .collect::<Vec<_>>());

        tracing::info!(
            "📣 Notifying {} member(s) of {} dependent project(s)",
            recipients.len(),
            projects.len()
        );
        self.notify_users(
            recipients.into_iter().collect(),
            Some(actor),
            NotificationKind::DependencyRemoved,
            payload,
        )
        .await;
        Ok(())
    }

    pub fn list_project_types(&self) -> Vec<ProjectType> {
        self.project_types.list()
    }

    pub async fn list_tags(&self) -> AppResult<Vec<Tag>> {
        Ok(self.tags.list().await?)
    }

    pub async fn create_tag(&self, admin: &User, request: CreateTag) -> AppResult<Tag> {
        let name = required_text("name", &request.name, 64)?;
        let slug = slugify(request.slug.as_deref().unwrap_or(&name));
        if slug.is_empty() {
            return Err(AppError::validation("tag slug must contain at least one letter or digit"));
        }
        if self.tags.by_slug(&slug).await?.is_some() {
            return Err(AppError::conflict(format!("tag '{}' already exists", slug)));
        }

        let project_type_id = match request.project_type.as_deref() {
            Some(type_slug) => Some(
                self.project_types
                    .get_by_slug(type_slug)
                    .ok_or_else(|| AppError::validation(format!("unknown project type '{}'", type_slug)))?
                    .id,
            ),
            None => None,
        };

        let tag = Tag { id: uuid::Uuid::new_v4().to_string(), slug, name, project_type_id };
        self.tags.insert(&tag).await?;
        tracing::info!("🏷️ {} created tag {}", admin.username, tag.slug);
        Ok(tag)
    }

    pub(crate) async fn reload_project(&self, id: &str) -> AppResult<Project> {
        self.projects
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("project {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::QuotaKind;
    use crate::services::testing::{market, market_with};
    use crate::services::DependencyRequest;

    fn request(name: &str) -> CreateProject {
        CreateProject {
            project_type: "mod".into(),
            name: name.into(),
            summary: "A summary".into(),
            description: None,
            tags: Vec::new(),
        }
    }

    #[tokio::test]
    async fn create_assigns_slug_and_primary_owner() {
        let t = market().await;
        let alice = t.user("alice").await;

        let first = t.market.create_project(&alice, request("Better Grass")).await.unwrap();
        let second = t.market.create_project(&alice, request("Better  grass!")).await.unwrap();

        assert_eq!(first.slug, "better-grass");
        assert_eq!(second.slug, "better-grass-2");
        assert_eq!(first.status, ProjectStatus::Draft);

        let primary = t.market.memberships.primary(&first.id).await.unwrap().unwrap();
        assert_eq!(primary.user_id, alice.id);
        assert_eq!(primary.role, MemberRole::Owner);
        assert!(primary.is_active());
    }

    #[tokio::test]
    async fn create_rejects_unknown_type_and_blank_fields() {
        let t = market().await;
        let alice = t.user("alice").await;

        let mut bad_type = request("Thing");
        bad_type.project_type = "shader".into();
        assert!(matches!(t.market.create_project(&alice, bad_type).await, Err(AppError::Validation(_))));

        let mut blank = request("Thing");
        blank.summary = "   ".into();
        assert!(matches!(t.market.create_project(&alice, blank).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn projects_per_day_quota_follows_precedence() {
        let t = market_with(|config| config.quotas.projects_per_day = 1).await;
        let alice = t.user("alice").await;

        t.market.create_project(&alice, request("One")).await.unwrap();
        let err = t.market.create_project(&alice, request("Two")).await.unwrap_err();
        assert!(matches!(err, AppError::QuotaExceeded { kind: QuotaKind::ProjectsPerDay, limit: 1, .. }));

        // a user override wins over the default
        let mut overrides = QuotaOverrides::default();
        overrides.projects_per_day = Some(5);
        t.market.users.set_quota(&alice.id, &overrides).await.unwrap();
        let alice = t.market.users.get(&alice.id).await.unwrap().unwrap();
        t.market.create_project(&alice, request("Two")).await.unwrap();
    }

    #[tokio::test]
    async fn tags_must_exist_and_match_the_type() {
        let t = market().await;
        let admin = t.user("admin").await;

        t.market
            .create_tag(&admin, CreateTag { name: "Graphics".into(), slug: None, project_type: None })
            .await
            .unwrap();
        t.market
            .create_tag(&admin, CreateTag { name: "Ambient".into(), slug: None, project_type: Some("sound_pack".into()) })
            .await
            .unwrap();

        let mut ok = request("Pretty");
        ok.tags = vec!["graphics".into()];
        let project = t.market.create_project(&admin, ok).await.unwrap();
        assert_eq!(t.market.projects.tags(&project.id).await.unwrap().len(), 1);

        let wrong_type = t.market.set_project_tags(&admin, &project.slug, &["ambient".into()]).await;
        assert!(matches!(wrong_type, Err(AppError::Validation(_))));

        let unknown = t.market.set_project_tags(&admin, &project.slug, &["nope".into()]).await;
        assert!(matches!(unknown, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn unapproved_projects_are_hidden_from_strangers() {
        let t = market().await;
        let _admin = t.user("admin").await;
        let alice = t.user("alice").await;
        let bob = t.user("bob").await;
        let project = t.project(&alice, "Secret").await;

        assert!(t.market.project_details(&project.slug, Some(&alice)).await.is_ok());
        assert!(matches!(
            t.market.project_details(&project.slug, Some(&bob)).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(t.market.project_details(&project.slug, None).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn submit_requires_a_version_and_notifies_admins() {
        let t = market().await;
        let admin = t.user("admin").await;
        let alice = t.user("alice").await;
        let project = t.project(&alice, "Pack").await;

        assert!(matches!(
            t.market.submit_project(&alice, &project.slug).await,
            Err(AppError::Validation(_))
        ));

        t.version(&alice, &project.slug, "1.0.0", Vec::new()).await;
        let submitted = t.market.submit_project(&alice, &project.slug).await.unwrap();
        assert_eq!(submitted.status, ProjectStatus::Pending);
        assert!(t.unread(&admin).await.contains(&NotificationKind::ProjectSubmitted));

        assert!(matches!(
            t.market.submit_project(&alice, &project.slug).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn delete_and_restore_bring_back_versions() {
        let t = market().await;
        let _admin = t.user("admin").await;
        let alice = t.user("alice").await;
        let project = t.project(&alice, "Pack").await;
        t.version(&alice, &project.slug, "1.0.0", Vec::new()).await;

        t.market.delete_project(&alice, &project.slug).await.unwrap();
        assert_eq!(t.market.versions.live_count(&project.id).await.unwrap(), 0);
        assert!(matches!(
            t.market.project_details(&project.slug, Some(&alice)).await,
            Err(AppError::NotFound(_))
        ));

        let restored = t.market.restore_project(&alice, &project.slug).await.unwrap();
        assert!(!restored.is_deleted());
        assert_eq!(t.market.versions.live_count(&project.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn restore_needs_primary_owner_and_retention() {
        let t = market().await;
        let admin = t.user("admin").await;
        let alice = t.user("alice").await;
        let bob = t.user("bob").await;
        let project = t.project(&alice, "Pack").await;

        assert!(matches!(
            t.market.restore_project(&alice, &project.slug).await,
            Err(AppError::Conflict(_))
        ));

        t.market.delete_project(&alice, &project.slug).await.unwrap();
        assert!(matches!(
            t.market.restore_project(&bob, &project.slug).await,
            Err(AppError::NotFound(_))
        ));

        let expired = Utc::now() - Duration::days(t.market.retention_days + 1);
        sqlx::query("UPDATE projects SET deleted_at = ? WHERE id = ?")
            .bind(expired)
            .bind(&project.id)
            .execute(t.db.pool())
            .await
            .unwrap();

        for actor in [&alice, &admin] {
            assert!(matches!(
                t.market.restore_project(actor, &project.slug).await,
                Err(AppError::Conflict(_))
            ));
        }
        let still_deleted = t.market.projects.get(&project.id).await.unwrap().unwrap();
        assert!(still_deleted.is_deleted());
    }

    #[tokio::test]
    async fn concurrent_creations_get_distinct_slugs() {
        let t = market().await;
        let alice = t.user("alice").await;
        let bob = t.user("bob").await;

        let (first, second) = tokio::join!(
            t.market.create_project(&alice, request("Shared Name")),
            t.market.create_project(&bob, request("Shared Name")),
        );
        let mut slugs = vec![first.unwrap().slug, second.unwrap().slug];
        slugs.sort();
        assert_eq!(slugs, vec!["shared-name", "shared-name-2"]);
    }

    #[tokio::test]
    async fn only_primary_owner_or_admin_deletes() {
        let t = market().await;
        let admin = t.user("admin").await;
        let alice = t.user("alice").await;
        let bob = t.user("bob").await;
        let project = t.project(&alice, "Pack").await;

        t.market
            .memberships
            .insert(&Membership {
                project_id: project.id.clone(),
                user_id: bob.id.clone(),
                role: MemberRole::Owner,
                is_primary: false,
                accepted_at: Some(Utc::now()),
                invited_by: Some(alice.id.clone()),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        assert!(matches!(
            t.market.delete_project(&bob, &project.slug).await,
            Err(AppError::Forbidden(_))
        ));
        t.market.delete_project(&admin, &project.slug).await.unwrap();
    }

    #[tokio::test]
    async fn deleting_a_dependency_notifies_dependent_maintainers() {
        let t = market().await;
        let admin = t.user("admin").await;
        let alice = t.user("alice").await;
        let bob = t.user("bob").await;

        let library = t.project(&alice, "Library").await;
        t.version(&alice, &library.slug, "1.0.0", Vec::new()).await;
        t.market.submit_project(&alice, &library.slug).await.unwrap();
        t.market.approve_project(&admin, &library.slug).await.unwrap();
        let app = t.project(&bob, "App").await;
        t.version(
            &bob,
            &app.slug,
            "0.1.0",
            vec![DependencyRequest { project: library.slug.clone(), version: None, kind: Default::default() }],
        )
        .await;

        t.market.delete_project(&alice, &library.slug).await.unwrap();

        assert!(t.unread(&bob).await.contains(&NotificationKind::DependencyRemoved));
        assert!(!t.unread(&alice).await.contains(&NotificationKind::DependencyRemoved));
    }

    #[tokio::test]
    async fn transitive_dependents_walk_the_graph() {
        let t = market().await;
        let admin = t.user("admin").await;

        let base = t.project(&admin, "Base").await;
        t.version(&admin, &base.slug, "1", Vec::new()).await;
        let middle = t.project(&admin, "Middle").await;
        t.version(
            &admin,
            &middle.slug,
            "1",
            vec![DependencyRequest { project: base.slug.clone(), version: None, kind: Default::default() }],
        )
        .await;
        let top = t.project(&admin, "Top").await;
        t.version(
            &admin,
            &top.slug,
            "1",
            vec![DependencyRequest { project: middle.slug.clone(), version: None, kind: Default::default() }],
        )
        .await;

        let dependents = t.market.transitive_dependents(&base.slug, Some(&admin)).await.unwrap();
        let slugs: Vec<&str> = dependents.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["middle", "top"]);
    }

    #[tokio::test]
    async fn quota_report_shows_sources() {
        let t = market().await;
        let alice = t.user("alice").await;
        let project = t.project(&alice, "Pack").await;

        let mut overrides = QuotaOverrides::default();
        overrides.file_size = Some(10);
        t.market.projects.set_quota(&project.id, &overrides).await.unwrap();

        let lines = t.market.quota_report(&alice, &project.slug).await.unwrap();
        let file_size = lines.iter().find(|l| l.kind == QuotaKind::FileSize).unwrap();
        assert_eq!(file_size.limit, 10);
        assert_eq!(file_size.source, crate::quota::QuotaSource::Project);
    }
}

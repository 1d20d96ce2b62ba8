/// Version publishing, dependency validation and downloads
///
/// Publishing writes the files first and records every row in one transaction
/// afterwards; when recording fails, the files written for the version are removed
/// again.

use crate::error::{is_unique_violation, AppError, AppResult};
use crate::files::{sanitize_filename, StoredFile};
use crate::graph::DependencyGraph;
use crate::marketplace::{
    Dependency, DependencyKind, DependencyView, MemberRole, NewVersion, Project, ProjectFile,
    ProjectVersion, ReleaseType, Tag, User,
};
use crate::quota::{self, QuotaChain};
use crate::services::{required_text, Marketplace};
use axum::body::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;

const LABEL_MAX: usize = 64;
const CHANGELOG_MAX: usize = 20_000;

/// A dependency as declared by the uploader
#[derive(Debug, Clone, Deserialize)]
pub struct DependencyRequest {
    /// Slug of the target project
    pub project: String,
    /// Optional version label of the target project
    pub version: Option<String>,
    #[serde(default)]
    pub kind: DependencyKind,
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct NewVersionRequest {
    pub version: String,
    pub changelog: String,
    pub release_type: Option<ReleaseType>,
    pub dependencies: Vec<DependencyRequest>,
    pub tags: Vec<String>,
    pub files: Vec<UploadedFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionDetails {
    #[serde(flatten)]
    pub version: ProjectVersion,
    pub files: Vec<ProjectFile>,
    pub dependencies: Vec<DependencyView>,
    pub tags: Vec<Tag>,
}

/// An opened file ready to be streamed to the client
#[derive(Debug)]
pub struct Download {
    pub filename: String,
    pub sha256: String,
    pub size_bytes: i64,
    pub file: tokio::fs::File,
}

impl Marketplace {
    pub async fn create_version(
        &self,
        actor: &User,
        slug: &str,
        request: NewVersionRequest,
    ) -> AppResult<VersionDetails> {
        let (project, _) = self.project_with_role(slug, actor, MemberRole::Contributor).await?;
        let project_type = self.project_type_of(&project)?;

        let label = required_text("version", &request.version, LABEL_MAX)?;
        if self.versions.by_label(&project.id, &label).await?.is_some() {
            return Err(AppError::conflict(format!("version '{}' already exists", label)));
        }
        if request.changelog.chars().count() > CHANGELOG_MAX {
            return Err(AppError::validation(format!(
                "changelog must be at most {} characters",
                CHANGELOG_MAX
            )));
        }

        if request.files.is_empty() {
            return Err(AppError::validation("a version needs at least one file"));
        }
        let mut filenames = Vec::with_capacity(request.files.len());
        for file in &request.files {
            let name = sanitize_filename(&file.filename)
                .ok_or_else(|| AppError::validation(format!("invalid filename '{}'", file.filename)))?;
            if filenames.contains(&name) {
                return Err(AppError::validation(format!("duplicate filename '{}'", name)));
            }
            filenames.push(name);
        }

        let limits = quota::resolve(
            &self.quotas,
            QuotaChain::new()
                .user(&actor.quota)
                .project(&project.quota)
                .project_type(&project_type.quota),
        );
        let sizes: Vec<i64> = request.files.iter().map(|f| f.bytes.len() as i64).collect();
        let usage = self.project_usage(&project).await?;
        quota::check_version_upload(&limits, usage, &sizes)?;

        let version_id = uuid::Uuid::new_v4().to_string();
        let dependencies = self
            .validate_dependencies(actor, &project, &version_id, &request.dependencies)
            .await?;
        let tags = self.resolve_tags(&project_type, &request.tags).await?;

        let now = Utc::now();
        let version = ProjectVersion {
            id: version_id.clone(),
            project_id: project.id.clone(),
            version: label,
            changelog: request.changelog,
            release_type: request.release_type.unwrap_or(ReleaseType::Release),
            downloads: 0,
            created_by: actor.id.clone(),
            created_at: now,
            deleted_at: None,
        };

        let stored = match self.store_files(&project, &version_id, &filenames, &request.files).await {
            Ok(stored) => stored,
            Err(e) => {
                self.discard_files(&project, &version_id).await;
                return Err(e);
            }
        };

        let files: Vec<ProjectFile> = stored
            .into_iter()
            .map(|file| ProjectFile {
                id: uuid::Uuid::new_v4().to_string(),
                version_id: version_id.clone(),
                filename: file.filename,
                path: file.path,
                size_bytes: file.size_bytes,
                sha256: file.sha256,
                created_at: now,
            })
            .collect();

        let new_version = NewVersion {
            version,
            files,
            dependencies,
            tag_ids: tags.iter().map(|t| t.id.clone()).collect(),
        };
        if let Err(e) = self.versions.insert(&new_version).await {
            self.discard_files(&project, &version_id).await;
            // a concurrent upload took the label after our check
            if is_unique_violation(&e) {
                return Err(AppError::conflict(format!(
                    "version '{}' already exists",
                    new_version.version.version
                )));
            }
            return Err(e.into());
        }

        tracing::info!(
            "🚀 {} published {} {} ({} file(s))",
            actor.username,
            project.slug,
            new_version.version.version,
            new_version.files.len()
        );

        Ok(VersionDetails {
            dependencies: self.versions.dependencies(&version_id).await?,
            version: new_version.version,
            files: new_version.files,
            tags,
        })
    }

    async fn store_files(
        &self,
        project: &Project,
        version_id: &str,
        filenames: &[String],
        files: &[UploadedFile],
    ) -> AppResult<Vec<StoredFile>> {
        let mut stored = Vec::with_capacity(files.len());
        for (name, file) in filenames.iter().zip(files) {
            stored.push(self.files.store(&project.id, version_id, name, &file.bytes).await?);
        }
        Ok(stored)
    }

    async fn discard_files(&self, project: &Project, version_id: &str) {
        if let Err(e) = self.files.remove_version(&project.id, version_id).await {
            tracing::warn!("⚠️ Failed to clean up files of version {}: {}", version_id, e);
        }
    }

    /// Resolve declared dependencies into rows, rejecting anything that would break the graph
    async fn validate_dependencies(
        &self,
        actor: &User,
        project: &Project,
        version_id: &str,
        requests: &[DependencyRequest],
    ) -> AppResult<Vec<Dependency>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let mut graph: Option<DependencyGraph> = None;
        let mut seen = HashSet::new();
        let mut dependencies = Vec::with_capacity(requests.len());

        for request in requests {
            let (target, _) = match self.visible_project(&request.project, Some(actor)).await {
                Ok(found) => found,
                Err(AppError::NotFound(_)) => {
                    return Err(AppError::validation(format!("unknown dependency '{}'", request.project)))
                }
                Err(e) => return Err(e),
            };
            if target.is_deleted() {
                return Err(AppError::validation(format!("dependency '{}' was deleted", target.slug)));
            }
            if target.id == project.id {
                return Err(AppError::validation("a version cannot depend on its own project"));
            }
            if !seen.insert(target.id.clone()) {
                return Err(AppError::validation(format!("duplicate dependency on '{}'", target.slug)));
            }

            let pinned = match request.version.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                Some(label) => Some(
                    self.versions
                        .by_label(&target.id, label)
                        .await?
                        .ok_or_else(|| {
                            AppError::validation(format!("'{}' has no version '{}'", target.slug, label))
                        })?
                        .id,
                ),
                None => None,
            };

            if request.kind == DependencyKind::Required {
                if graph.is_none() {
                    graph = Some(DependencyGraph::required_only(self.versions.dependency_edges().await?));
                }
                if let Some(graph) = graph.as_ref() {
                    if graph.would_create_cycle(&project.id, &target.id) {
                        return Err(AppError::validation(format!(
                            "requiring '{}' would create a dependency cycle",
                            target.slug
                        )));
                    }
                }
            }

            dependencies.push(Dependency {
                id: uuid::Uuid::new_v4().to_string(),
                version_id: version_id.to_string(),
                dependency_project_id: target.id,
                dependency_version_id: pinned,
                kind: request.kind,
            });
        }

        Ok(dependencies)
    }

    pub async fn list_versions(&self, slug: &str, viewer: Option<&User>) -> AppResult<Vec<ProjectVersion>> {
        let (project, _) = self.visible_project(slug, viewer).await?;
        Ok(self.versions.list(&project.id).await?)
    }

    pub async fn version_details(
        &self,
        slug: &str,
        label: &str,
        viewer: Option<&User>,
    ) -> AppResult<VersionDetails> {
        let (project, _) = self.visible_project(slug, viewer).await?;
        let version = self.live_version(&project, label).await?;

        Ok(VersionDetails {
            files: self.versions.files(&version.id).await?,
            dependencies: self.versions.dependencies(&version.id).await?,
            tags: self.versions.tags(&version.id).await?,
            version,
        })
    }

    async fn live_version(&self, project: &Project, label: &str) -> AppResult<ProjectVersion> {
        self.versions
            .by_label(&project.id, label)
            .await?
            .ok_or_else(|| AppError::not_found(format!("version '{}' of '{}'", label, project.slug)))
    }

    /// Soft-delete one version and tell projects pinned to it
    pub async fn delete_version(&self, actor: &User, slug: &str, label: &str) -> AppResult<()> {
        let (project, _) = self.project_with_role(slug, actor, MemberRole::Maintainer).await?;
        let version = self.live_version(&project, label).await?;

        let dependents = self.versions.dependents_of_version(&version.id).await?;
        self.versions.soft_delete(&version.id, Utc::now()).await?;
        tracing::info!("🗑️ {} deleted {} {}", actor.username, project.slug, version.version);

        self.cascade_removal(
            actor,
            &dependents,
            json!({
                "project": project.slug,
                "version": version.version,
                "message": format!("Version {} of '{}' was deleted", version.version, project.name),
            }),
        )
        .await
    }

    /// Open a file and count the download against its version and project
    pub async fn download(&self, file_id: &str, viewer: Option<&User>) -> AppResult<Download> {
        let not_found = || AppError::not_found(format!("file '{}'", file_id));

        let file = self.versions.file(file_id).await?.ok_or_else(not_found)?;
        let version = self.versions.get(&file.version_id).await?.ok_or_else(not_found)?;
        let project = self.projects.get(&version.project_id).await?.ok_or_else(not_found)?;

        match self.visible_project(&project.slug, viewer).await {
            Ok(_) => {}
            Err(AppError::NotFound(_)) => return Err(not_found()),
            Err(e) => return Err(e),
        }
        if version.deleted_at.is_some() && !viewer.is_some_and(User::is_admin) {
            return Err(not_found());
        }

        let handle = self.files.open(&file.path).await.map_err(|e| {
            tracing::error!("❌ File {} is recorded but unreadable: {}", file.path, e);
            not_found()
        })?;

        self.versions.increment_downloads(&version.id).await?;
        self.projects.increment_downloads(&project.id).await?;

        Ok(Download {
            filename: file.filename,
            sha256: file.sha256,
            size_bytes: file.size_bytes,
            file: handle,
        })
    }
}

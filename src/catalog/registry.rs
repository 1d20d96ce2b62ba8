/// Hot-reload project type registry using ArcSwap
///
/// Project types are read on nearly every request (quota resolution, browsing,
/// tag validation) and change only when an admin edits their quotas. Reads are
/// lock-free; each update swaps the whole map.

use crate::catalog::storage::ProjectTypeStorage;
use crate::marketplace::types::ProjectType;
use crate::quota::QuotaOverrides;
use anyhow::Result;
use arc_swap::ArcSwap;
use std::{collections::HashMap, sync::Arc};

#[derive(Debug)]
pub struct ProjectTypeRegistry {
    /// Key: project type slug
    types: ArcSwap<HashMap<String, ProjectType>>,
    storage: ProjectTypeStorage,
}

impl ProjectTypeRegistry {
    pub fn new(storage: ProjectTypeStorage) -> Self {
        Self {
            types: ArcSwap::new(Arc::new(HashMap::new())),
            storage,
        }
    }

    /// Populate the registry from storage (startup)
    pub async fn init_from_storage(&self) -> Result<()> {
        let types = self.storage.load_all().await?;
        self.types.store(Arc::new(types));

        tracing::info!("Initialized project type registry with {} types", self.types.load().len());
        Ok(())
    }

    /// Reload one project type after it changed in storage
    pub async fn reload(&self, slug: &str) -> Result<()> {
        let project_type = self
            .storage
            .get(slug)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Project type not found: {}", slug))?;

        let current = self.types.load();
        let mut next = (**current).clone();
        next.insert(slug.to_string(), project_type);
        self.types.store(Arc::new(next));

        tracing::info!("Hot-reloaded project type: {}", slug);
        Ok(())
    }

    pub fn get_by_slug(&self, slug: &str) -> Option<ProjectType> {
        self.types.load().get(slug).cloned()
    }

    pub fn get_by_id(&self, id: &str) -> Option<ProjectType> {
        self.types.load().values().find(|t| t.id == id).cloned()
    }

    /// All project types ordered by slug
    pub fn list(&self) -> Vec<ProjectType> {
        let mut types: Vec<ProjectType> = self.types.load().values().cloned().collect();
        types.sort_by(|a, b| a.slug.cmp(&b.slug));
        types
    }

    /// Persist new quota overrides for a type and hot-reload it
    pub async fn set_quota(&self, slug: &str, quota: &QuotaOverrides) -> Result<bool> {
        if !self.storage.set_quota(slug, quota).await? {
            return Ok(false);
        }
        self.reload(slug).await?;
        Ok(true)
    }
}

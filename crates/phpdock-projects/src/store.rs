//! Persisted project records.
//!
//! A keyed map of [`Project`]s in a single versioned JSON document. All
//! mutating operations require prior [`ProjectStore::initialize`]; calling
//! them earlier is a programmer error, not a recoverable condition.

use async_trait::async_trait;
use phpdock_core::{JsonStore, Project, ProjectId};
use phpdock_proxy::ProjectCatalog;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

use crate::error::{ProjectError, Result};

type ProjectMap = BTreeMap<ProjectId, Project>;

/// Keyed map of project records, cached in memory and persisted atomically
/// on every change.
pub struct ProjectStore {
    store: JsonStore<ProjectMap>,
    cache: RwLock<Option<ProjectMap>>,
}

impl ProjectStore {
    /// Creates a store backed by the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { store: JsonStore::new(path), cache: RwLock::new(None) }
    }

    /// Loads persisted records into the cache. Must be called once before
    /// any other operation.
    pub async fn initialize(&self) -> Result<()> {
        let data = self.store.load_or_default().await?;
        *self.cache.write().await = Some(data);
        Ok(())
    }

    /// Returns a project by id.
    pub async fn get(&self, id: ProjectId) -> Result<Option<Project>> {
        let cache = self.cache.read().await;
        let map = cache.as_ref().ok_or(ProjectError::NotInitialized)?;
        Ok(map.get(&id).cloned())
    }

    /// Returns the project with the given slug, if any.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Project>> {
        let cache = self.cache.read().await;
        let map = cache.as_ref().ok_or(ProjectError::NotInitialized)?;
        Ok(map.values().find(|p| p.name == name).cloned())
    }

    /// Returns all projects ordered by display order, then name.
    pub async fn all(&self) -> Result<Vec<Project>> {
        let cache = self.cache.read().await;
        let map = cache.as_ref().ok_or(ProjectError::NotInitialized)?;
        let mut projects: Vec<Project> = map.values().cloned().collect();
        projects.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(projects)
    }

    /// Inserts or replaces a project and persists the map.
    pub async fn upsert(&self, project: Project) -> Result<()> {
        let mut cache = self.cache.write().await;
        let map = cache.as_mut().ok_or(ProjectError::NotInitialized)?;
        map.insert(project.id, project);
        self.store.save(map).await?;
        Ok(())
    }

    /// Removes a project and persists the map. Returns the removed record.
    pub async fn remove(&self, id: ProjectId) -> Result<Option<Project>> {
        let mut cache = self.cache.write().await;
        let map = cache.as_mut().ok_or(ProjectError::NotInitialized)?;
        let removed = map.remove(&id);
        if removed.is_some() {
            self.store.save(map).await?;
        }
        Ok(removed)
    }
}

#[async_trait]
impl ProjectCatalog for ProjectStore {
    async fn projects(&self) -> std::result::Result<Vec<Project>, String> {
        self.all().await.map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phpdock_core::ProjectKind;

    fn project(name: &str) -> Project {
        Project::new(name, ProjectKind::Basic, PathBuf::from("/srv").join(name))
    }

    #[tokio::test]
    async fn mutating_before_initialize_is_a_programmer_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path().join("projects.json"));

        let err = store.upsert(project("blog")).await.unwrap_err();
        assert!(matches!(err, ProjectError::NotInitialized));

        let err = store.all().await.unwrap_err();
        assert!(matches!(err, ProjectError::NotInitialized));
    }

    #[tokio::test]
    async fn upsert_get_remove_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path().join("projects.json"));
        store.initialize().await.unwrap();

        let p = project("blog");
        store.upsert(p.clone()).await.unwrap();

        assert_eq!(store.get(p.id).await.unwrap().unwrap().name, "blog");
        assert_eq!(store.find_by_name("blog").await.unwrap().unwrap().id, p.id);

        let removed = store.remove(p.id).await.unwrap().unwrap();
        assert_eq!(removed.id, p.id);
        assert!(store.get(p.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn records_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projects.json");

        let p = project("shop");
        {
            let store = ProjectStore::new(&path);
            store.initialize().await.unwrap();
            store.upsert(p.clone()).await.unwrap();
        }

        let store = ProjectStore::new(&path);
        store.initialize().await.unwrap();
        assert_eq!(store.get(p.id).await.unwrap().unwrap().volume_name, "proj_shop");
    }

    #[tokio::test]
    async fn all_orders_by_display_order_then_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::new(dir.path().join("projects.json"));
        store.initialize().await.unwrap();

        let mut a = project("zeta");
        a.display_order = 0;
        let mut b = project("alpha");
        b.display_order = 1;
        let mut c = project("beta");
        c.display_order = 1;

        for p in [b.clone(), c.clone(), a.clone()] {
            store.upsert(p).await.unwrap();
        }

        let names: Vec<String> = store
            .all()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "beta"]);
    }
}

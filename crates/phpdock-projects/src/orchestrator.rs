//! The project lifecycle orchestrator.

use phpdock_core::project::Framework;
use phpdock_core::{
    sanitize_name, EnvEvent, EventBus, PhpVersion, Project, ProjectId, ProjectKind, SyncDirection,
};
use phpdock_proxy::ProxySynchronizer;
use phpdock_runtime::ContainerRuntime;
use phpdock_transfer::{SyncOptions, TransferEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::collaborators::{HostsEditor, TemplateContext, TemplateGenerator};
use crate::detect::detect_framework;
use crate::error::{ProjectError, Result};
use crate::saga::CompensationStack;
use crate::scaffold::scaffold_into_volume;
use crate::store::ProjectStore;

/// Where a new project's files come from.
#[derive(Debug, Clone)]
pub enum ProjectSource {
    /// A fresh project folder under `parent_dir/<slug>`.
    New {
        /// Directory the project folder is created in.
        parent_dir: PathBuf,
        /// Framework the project is built on, if any.
        framework: Option<Framework>,
        /// Install a fresh framework skeleton into the volume before any
        /// host files exist.
        scaffold: bool,
    },

    /// An existing folder imported as-is; the framework is auto-detected.
    Import {
        /// The existing project folder.
        path: PathBuf,
    },
}

/// Input to [`ProjectOrchestrator::create_project`].
#[derive(Debug, Clone)]
pub struct CreateProjectRequest {
    /// Raw project name; sanitized into the slug.
    pub name: String,

    /// File source.
    pub source: ProjectSource,

    /// PHP runtime version.
    pub php_version: PhpVersion,

    /// Image variant suffix.
    pub php_variant: String,

    /// Companion Node.js major version.
    pub node_version: Option<u8>,

    /// PHP extensions.
    pub extensions: Vec<String>,

    /// Whether Xdebug is enabled.
    pub xdebug: bool,

    /// Permit overwriting an existing devcontainer configuration.
    pub overwrite_files: bool,
}

impl CreateProjectRequest {
    /// Creates a request with default runtime selections.
    pub fn new(name: impl Into<String>, source: ProjectSource) -> Self {
        Self {
            name: name.into(),
            source,
            php_version: PhpVersion::V8_3,
            php_variant: "fpm-alpine".to_string(),
            node_version: None,
            extensions: Vec::new(),
            xdebug: false,
            overwrite_files: false,
        }
    }
}

/// Partial update applied by [`ProjectOrchestrator::update_project`].
#[derive(Debug, Clone, Default)]
pub struct UpdateProject {
    /// New PHP version.
    pub php_version: Option<PhpVersion>,

    /// New image variant.
    pub php_variant: Option<String>,

    /// New Node version (outer `None` keeps the current value).
    pub node_version: Option<Option<u8>>,

    /// New extension list.
    pub extensions: Option<Vec<String>>,

    /// Toggle Xdebug.
    pub xdebug: Option<bool>,

    /// New display order.
    pub display_order: Option<u32>,

    /// New domain.
    pub domain: Option<String>,

    /// Re-validate constraints and regenerate devcontainer files
    /// (overwrite permitted).
    pub regenerate_files: bool,
}

/// Drives project create/update/delete with transactional rollback.
pub struct ProjectOrchestrator {
    runtime: Arc<dyn ContainerRuntime>,
    transfer: Arc<TransferEngine>,
    store: Arc<ProjectStore>,
    hosts: Arc<dyn HostsEditor>,
    templates: Arc<dyn TemplateGenerator>,
    proxy: Arc<ProxySynchronizer>,
    bus: EventBus,
}

impl ProjectOrchestrator {
    /// Creates an orchestrator over its collaborators.
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        transfer: Arc<TransferEngine>,
        store: Arc<ProjectStore>,
        hosts: Arc<dyn HostsEditor>,
        templates: Arc<dyn TemplateGenerator>,
        proxy: Arc<ProxySynchronizer>,
        bus: EventBus,
    ) -> Self {
        Self { runtime, transfer, store, hosts, templates, proxy, bus }
    }

    /// Creates a project: folder, volume, optional scaffold, devcontainer
    /// files, bulk copy, hosts entry, record, then an asynchronous proxy
    /// sync. If any step from volume creation onward fails, compensations
    /// run in strict reverse order and the original error is returned.
    pub async fn create_project(&self, request: CreateProjectRequest) -> Result<Project> {
        let slug = sanitize_name(&request.name);
        if slug.is_empty() {
            return Err(ProjectError::validation(
                "project name must contain at least one letter or digit",
            ));
        }
        if self.store.find_by_name(&slug).await?.is_some() {
            return Err(ProjectError::validation(format!(
                "a project named {slug} already exists"
            )));
        }

        let (folder, kind, scaffold) = match &request.source {
            ProjectSource::Import { path } => {
                if !path.is_dir() {
                    return Err(ProjectError::validation(format!(
                        "import path {} is not a directory",
                        path.display()
                    )));
                }
                // Two independent signals are required for high-confidence
                // detection; anything less imports as a generic project.
                let kind = match detect_framework(path) {
                    Some(framework) => ProjectKind::Framework(framework),
                    None => ProjectKind::Imported,
                };
                (path.clone(), kind, false)
            }
            ProjectSource::New { parent_dir, framework, scaffold } => {
                let kind = framework
                    .map(ProjectKind::Framework)
                    .unwrap_or(ProjectKind::Basic);
                (parent_dir.join(&slug), kind, *scaffold)
            }
        };

        // Fail fast on version constraints, before any side effect.
        if let Some(framework) = kind.framework() {
            if request.php_version < framework.min_php() {
                return Err(ProjectError::VersionConstraint {
                    framework,
                    required: framework.min_php(),
                    actual: request.php_version,
                });
            }
        }

        let mut project = Project::new(slug, kind, folder);
        project.php_version = request.php_version;
        project.php_variant = request.php_variant.clone();
        project.node_version = request.node_version;
        project.extensions = request.extensions.clone();
        project.xdebug = request.xdebug;

        info!(project = %project.name, volume = %project.volume_name, "creating project");

        let mut saga = CompensationStack::new();
        match self.run_create_steps(&mut project, &request, scaffold, &mut saga).await {
            Ok(()) => {
                saga.discard();
                self.bus.publish(EnvEvent::ProjectsChanged);
                self.spawn_proxy_sync();
                info!(project = %project.name, "project created");
                Ok(project)
            }
            Err(e) => {
                error!(project = %project.name, error = %e, "project creation failed, rolling back");
                saga.unwind().await;
                Err(e)
            }
        }
    }

    async fn run_create_steps(
        &self,
        project: &mut Project,
        request: &CreateProjectRequest,
        scaffold: bool,
        saga: &mut CompensationStack,
    ) -> Result<()> {
        // Folder. Removed on rollback only if this operation created it,
        // never when importing or reusing an existing folder.
        if !project.path.exists() {
            tokio::fs::create_dir_all(&project.path).await?;
            let path = project.path.clone();
            saga.push("remove created folder", move || async move {
                tokio::fs::remove_dir_all(&path).await.map_err(|e| e.to_string())
            });
        }

        // Volume. Removing it also discards any scaffolded content.
        self.runtime.create_volume(&project.volume_name).await?;
        {
            let runtime = Arc::clone(&self.runtime);
            let volume = project.volume_name.clone();
            saga.push("remove volume", move || async move {
                runtime.remove_volume(&volume, true).await.map_err(|e| e.to_string())
            });
        }

        // Fresh framework install into the empty volume, before any host
        // files exist.
        if scaffold {
            if let Some(framework) = project.kind.framework() {
                scaffold_into_volume(&self.runtime, framework, &project.volume_name).await?;
            }
        }

        // Devcontainer/build files. The generator refuses to overwrite an
        // existing configuration unless explicitly permitted.
        let context = TemplateContext::for_project(project);
        self.templates
            .generate(&context, request.overwrite_files)
            .await
            .map_err(ProjectError::Template)?;
        project.files_generated = true;

        // Bulk copy host files into the volume.
        self.transfer
            .copy_to_volume(project.id, &project.path, &project.volume_name)
            .await?;
        project.volume_copied = true;

        // Hosts entry is advisory: failure is logged and creation continues.
        match self.hosts.add_entry(&project.domain).await {
            Ok(()) => {
                let hosts = Arc::clone(&self.hosts);
                let domain = project.domain.clone();
                saga.push("remove hosts entry", move || async move {
                    hosts.remove_entry(&domain).await
                });
            }
            Err(e) => {
                warn!(domain = %project.domain, error = %e, "could not add hosts entry");
            }
        }

        self.store.upsert(project.clone()).await?;
        Ok(())
    }

    /// Applies a partial update to a project.
    pub async fn update_project(&self, id: ProjectId, patch: UpdateProject) -> Result<Project> {
        let mut project = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| ProjectError::NotFound(id.to_string()))?;

        let old_domain = project.domain.clone();

        if let Some(php_version) = patch.php_version {
            project.php_version = php_version;
        }
        if let Some(php_variant) = patch.php_variant {
            project.php_variant = php_variant;
        }
        if let Some(node_version) = patch.node_version {
            project.node_version = node_version;
        }
        if let Some(extensions) = patch.extensions {
            project.extensions = extensions;
        }
        if let Some(xdebug) = patch.xdebug {
            project.xdebug = xdebug;
        }
        if let Some(display_order) = patch.display_order {
            project.display_order = display_order;
        }
        if let Some(domain) = patch.domain {
            project.domain = domain;
        }

        if patch.regenerate_files {
            if let Some(framework) = project.kind.framework() {
                if project.php_version < framework.min_php() {
                    return Err(ProjectError::VersionConstraint {
                        framework,
                        required: framework.min_php(),
                        actual: project.php_version,
                    });
                }
            }
            let context = TemplateContext::for_project(&project);
            self.templates
                .generate(&context, true)
                .await
                .map_err(ProjectError::Template)?;
            project.files_generated = true;
        }

        if project.domain != old_domain {
            if let Err(e) = self.hosts.remove_entry(&old_domain).await {
                warn!(domain = %old_domain, error = %e, "could not remove old hosts entry");
            }
            if let Err(e) = self.hosts.add_entry(&project.domain).await {
                warn!(domain = %project.domain, error = %e, "could not add hosts entry");
            }
        }

        project.updated_at = chrono::Utc::now();
        self.store.upsert(project.clone()).await?;
        self.bus.publish(EnvEvent::ProjectsChanged);
        self.spawn_proxy_sync();
        Ok(project)
    }

    /// Deletes a project. Destructive side effects (volume, folder) happen
    /// only behind their explicit opt-in flags.
    pub async fn delete_project(
        &self,
        id: ProjectId,
        remove_volume: bool,
        remove_folder: bool,
    ) -> Result<()> {
        let project = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| ProjectError::NotFound(id.to_string()))?;

        info!(project = %project.name, remove_volume, remove_folder, "deleting project");

        if let Err(e) = self.hosts.remove_entry(&project.domain).await {
            warn!(domain = %project.domain, error = %e, "could not remove hosts entry");
        }

        // The project container may or may not exist; removal is idempotent.
        self.runtime.remove_container(&project.container_name, true).await?;

        if remove_volume {
            self.runtime.remove_volume(&project.volume_name, true).await?;
        }
        if remove_folder && project.path.exists() {
            tokio::fs::remove_dir_all(&project.path).await?;
        }

        self.store.remove(id).await?;
        self.bus.publish(EnvEvent::ProjectsChanged);
        self.spawn_proxy_sync();
        Ok(())
    }

    /// Runs a sync for a project. The call is intended to be spawned; a
    /// second sync for the same project while one is active is rejected.
    pub async fn sync_project(
        &self,
        id: ProjectId,
        direction: SyncDirection,
        options: SyncOptions,
    ) -> Result<()> {
        let project = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| ProjectError::NotFound(id.to_string()))?;

        self.transfer
            .sync(project.id, direction, &project.path, &project.volume_name, options)
            .await?;
        Ok(())
    }

    /// Cancels the project's active sync, if any.
    pub async fn cancel_sync(&self, id: ProjectId) -> Result<bool> {
        Ok(self.transfer.cancel_sync(id).await?)
    }

    /// Direction of the project's active sync, if one is in flight.
    pub fn sync_status(&self, id: ProjectId) -> Option<SyncDirection> {
        self.transfer.sync_status(id)
    }

    fn spawn_proxy_sync(&self) {
        let proxy = Arc::clone(&self.proxy);
        // Secondary effect of an operation that already succeeded: never
        // awaited, never surfaced.
        tokio::spawn(async move {
            if let Err(e) = proxy.sync_projects().await {
                warn!(error = %e, "proxy sync failed");
            }
        });
    }
}

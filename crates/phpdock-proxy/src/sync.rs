//! The synchronizer itself.

use crate::caddyfile;
use crate::error::{ProxyError, Result};
use async_trait::async_trait;
use phpdock_core::Project;
use phpdock_runtime::ContainerRuntime;
use std::sync::Arc;
use tracing::{debug, info};

/// Read access to the persisted project set.
///
/// Implemented by the project store; the synchronizer never owns project
/// data, it only renders it.
#[async_trait]
pub trait ProjectCatalog: Send + Sync {
    /// Returns all persisted projects.
    async fn projects(&self) -> std::result::Result<Vec<Project>, String>;
}

/// Where the proxy lives and where its configuration goes.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Name of the Caddy container.
    pub container_name: String,

    /// Configuration file path inside the container.
    pub caddyfile_path: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            container_name: "svc_caddy".to_string(),
            caddyfile_path: "/etc/caddy/Caddyfile".to_string(),
        }
    }
}

/// Outcome of a sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// True when the proxy container was not running and nothing was done.
    pub skipped: bool,

    /// Number of project routes written.
    pub routes: usize,
}

impl SyncReport {
    fn skipped() -> Self {
        Self { skipped: true, routes: 0 }
    }
}

/// Regenerates and reloads the proxy routing table.
pub struct ProxySynchronizer {
    runtime: Arc<dyn ContainerRuntime>,
    catalog: Arc<dyn ProjectCatalog>,
    config: ProxyConfig,
}

impl ProxySynchronizer {
    /// Creates a synchronizer with the default Caddy locations.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, catalog: Arc<dyn ProjectCatalog>) -> Self {
        Self::with_config(runtime, catalog, ProxyConfig::default())
    }

    /// Creates a synchronizer with explicit locations.
    pub fn with_config(
        runtime: Arc<dyn ContainerRuntime>,
        catalog: Arc<dyn ProjectCatalog>,
        config: ProxyConfig,
    ) -> Self {
        Self { runtime, catalog, config }
    }

    /// Regenerates the routing table inside the proxy container and
    /// hot-reloads it.
    ///
    /// If the proxy container is not currently running this is a successful
    /// no-op: there is nothing to configure, and no write, format, or
    /// reload command is issued.
    pub async fn sync_projects(&self) -> Result<SyncReport> {
        let container = &self.config.container_name;

        let status = self.runtime.inspect_container(container).await?;
        let running = status.map(|s| s.running).unwrap_or(false);
        if !running {
            debug!(container = %container, "proxy not running, sync skipped");
            return Ok(SyncReport::skipped());
        }

        let projects = self
            .catalog
            .projects()
            .await
            .map_err(ProxyError::Catalog)?;
        let doc = caddyfile::render(&projects);

        self.write_config(&doc).await?;
        self.format_config().await?;
        self.reload().await?;

        info!(routes = projects.len(), "proxy configuration synced");
        Ok(SyncReport { skipped: false, routes: projects.len() })
    }

    async fn write_config(&self, doc: &str) -> Result<()> {
        let script = format!(
            "cat > {} << 'PHPDOCK_EOF'\n{}\nPHPDOCK_EOF",
            self.config.caddyfile_path, doc
        );
        let output = self
            .runtime
            .exec(&self.config.container_name, &["sh", "-c", &script])
            .await?;
        if !output.success() {
            return Err(ProxyError::WriteFailed(output.combined()));
        }
        Ok(())
    }

    async fn format_config(&self) -> Result<()> {
        let output = self
            .runtime
            .exec(
                &self.config.container_name,
                &["caddy", "fmt", "--overwrite", &self.config.caddyfile_path],
            )
            .await?;
        if !output.success() {
            return Err(ProxyError::FormatFailed(output.combined()));
        }
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        let output = self
            .runtime
            .exec(
                &self.config.container_name,
                &["caddy", "reload", "--config", &self.config.caddyfile_path],
            )
            .await?;
        if !output.success() {
            return Err(ProxyError::ReloadFailed(output.combined()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phpdock_core::ProjectKind;
    use phpdock_runtime::fake::FakeRuntime;
    use phpdock_runtime::{ContainerSpec, ExecOutput};
    use std::path::PathBuf;

    struct StaticCatalog(Vec<Project>);

    #[async_trait]
    impl ProjectCatalog for StaticCatalog {
        async fn projects(&self) -> std::result::Result<Vec<Project>, String> {
            Ok(self.0.clone())
        }
    }

    fn caddy_spec() -> ContainerSpec {
        ContainerSpec::builder("svc_caddy", "caddy:2-alpine").build()
    }

    fn synchronizer(fake: &FakeRuntime, projects: Vec<Project>) -> ProxySynchronizer {
        ProxySynchronizer::new(Arc::new(fake.clone()), Arc::new(StaticCatalog(projects)))
    }

    #[tokio::test]
    async fn sync_is_a_no_op_when_proxy_is_down() {
        let fake = FakeRuntime::new();
        // Container exists but is stopped.
        fake.add_container(caddy_spec(), false);

        let report = synchronizer(&fake, vec![]).sync_projects().await.unwrap();
        assert!(report.skipped);

        // No write/format/reload was issued.
        assert!(fake.mutation_calls().is_empty());
    }

    #[tokio::test]
    async fn sync_is_a_no_op_when_proxy_is_absent() {
        let fake = FakeRuntime::new();
        let report = synchronizer(&fake, vec![]).sync_projects().await.unwrap();
        assert!(report.skipped);
        assert!(fake.mutation_calls().is_empty());
    }

    #[tokio::test]
    async fn running_proxy_gets_write_format_reload() {
        let fake = FakeRuntime::new();
        fake.add_container(caddy_spec(), true);

        let project = Project::new("blog", ProjectKind::Basic, PathBuf::from("/srv/blog"));
        let report = synchronizer(&fake, vec![project]).sync_projects().await.unwrap();

        assert!(!report.skipped);
        assert_eq!(report.routes, 1);
        assert_eq!(
            fake.mutation_calls(),
            vec!["exec:svc_caddy:sh", "exec:svc_caddy:caddy", "exec:svc_caddy:caddy"]
        );
    }

    #[tokio::test]
    async fn format_failure_propagates() {
        let fake = FakeRuntime::new();
        fake.add_container(caddy_spec(), true);
        // Write succeeds, fmt fails.
        fake.push_exec_result(ExecOutput::default());
        fake.push_exec_result(ExecOutput {
            stdout: String::new(),
            stderr: "Caddyfile:12: unexpected token".to_string(),
            exit_code: 1,
        });

        let err = synchronizer(&fake, vec![]).sync_projects().await.unwrap_err();
        assert!(matches!(err, ProxyError::FormatFailed(_)));
        assert!(err.to_string().contains("unexpected token"));
    }
}

//! The [`ContainerRuntime`] trait and its transport types.
//!
//! The trait abstracts the container engine's control API so orchestration
//! code can run against the real Docker daemon or an in-memory fake. Runtime
//! state (existence, running flag, port bindings) is always fetched fresh
//! through [`ContainerRuntime::inspect_container`]: it is the single source
//! of truth for install and running status and is never cached beyond a
//! single orchestration step.

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use phpdock_core::PortPair;
use std::collections::HashMap;

/// Restart policy for a created container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartPolicyKind {
    /// No automatic restart (helper containers).
    #[default]
    No,

    /// Restart unless explicitly stopped (project and service containers).
    UnlessStopped,
}

/// Specification for creating a container.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    /// Container name.
    pub name: String,

    /// Image reference.
    pub image: String,

    /// Environment variables.
    pub env: Vec<(String, String)>,

    /// Bind specs in `source:target[:ro]` form. Named volumes and host
    /// paths are distinguished by the leading `/` of the source.
    pub binds: Vec<String>,

    /// Ports to publish.
    pub ports: Vec<PortPair>,

    /// Network to join, if any.
    pub network: Option<String>,

    /// Labels.
    pub labels: HashMap<String, String>,

    /// Command override.
    pub cmd: Option<Vec<String>>,

    /// Entrypoint override.
    pub entrypoint: Option<Vec<String>>,

    /// Working directory override.
    pub working_dir: Option<String>,

    /// Restart policy.
    pub restart: RestartPolicyKind,
}

impl ContainerSpec {
    /// Starts building a spec for the given name and image.
    pub fn builder(name: impl Into<String>, image: impl Into<String>) -> ContainerSpecBuilder {
        ContainerSpecBuilder {
            spec: ContainerSpec {
                name: name.into(),
                image: image.into(),
                env: Vec::new(),
                binds: Vec::new(),
                ports: Vec::new(),
                network: None,
                labels: HashMap::new(),
                cmd: None,
                entrypoint: None,
                working_dir: None,
                restart: RestartPolicyKind::No,
            },
        }
    }
}

/// Builder for [`ContainerSpec`].
#[derive(Debug)]
pub struct ContainerSpecBuilder {
    spec: ContainerSpec,
}

impl ContainerSpecBuilder {
    /// Adds an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.env.push((key.into(), value.into()));
        self
    }

    /// Adds a bind spec.
    pub fn bind(mut self, bind: impl Into<String>) -> Self {
        self.spec.binds.push(bind.into());
        self
    }

    /// Adds a published port pair.
    pub fn port(mut self, pair: PortPair) -> Self {
        self.spec.ports.push(pair);
        self
    }

    /// Sets the network.
    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.spec.network = Some(network.into());
        self
    }

    /// Adds a label.
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.labels.insert(key.into(), value.into());
        self
    }

    /// Sets the command.
    pub fn cmd(mut self, cmd: Vec<String>) -> Self {
        self.spec.cmd = Some(cmd);
        self
    }

    /// Sets the entrypoint.
    pub fn entrypoint(mut self, entrypoint: Vec<String>) -> Self {
        self.spec.entrypoint = Some(entrypoint);
        self
    }

    /// Sets the working directory.
    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.spec.working_dir = Some(dir.into());
        self
    }

    /// Sets the restart policy.
    pub fn restart(mut self, restart: RestartPolicyKind) -> Self {
        self.spec.restart = restart;
        self
    }

    /// Finishes the build.
    pub fn build(self) -> ContainerSpec {
        self.spec
    }
}

/// Fresh snapshot of a container's runtime state.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerStatus {
    /// Container id assigned by the runtime.
    pub id: String,

    /// Container name.
    pub name: String,

    /// Whether the container is currently running.
    pub running: bool,

    /// Lifecycle state string as reported by the runtime
    /// (`created`, `running`, `exited`, ...).
    pub state: String,

    /// Health status, if a health check is configured.
    pub health: Option<String>,

    /// Actual port bindings.
    pub ports: Vec<PortPair>,

    /// Bind specs the container was created with.
    pub binds: Vec<String>,
}

/// Output from executing a command inside a container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecOutput {
    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Exit code.
    pub exit_code: i64,
}

impl ExecOutput {
    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns the combined stdout and stderr.
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// One unit of image pull progress.
#[derive(Debug, Clone, PartialEq)]
pub struct PullProgress {
    /// Status line from the registry (e.g. `Downloading`).
    pub status: String,

    /// Bytes downloaded for the current layer.
    pub current: Option<i64>,

    /// Total bytes for the current layer.
    pub total: Option<i64>,
}

/// Stream of log lines from a running container.
pub type LogStream = BoxStream<'static, Result<String>>;

/// Abstraction over the container engine's control API.
///
/// Implementations must be thread-safe; orchestration code holds them as
/// `Arc<dyn ContainerRuntime>` and issues concurrent calls.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Checks that the engine is reachable.
    async fn ping(&self) -> Result<()>;

    /// Pulls an image, forwarding registry progress to `on_progress`.
    async fn pull_image(
        &self,
        reference: &str,
        on_progress: &(dyn Fn(PullProgress) + Send + Sync),
    ) -> Result<()>;

    /// Creates a container and returns its id.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String>;

    /// Starts a container by name or id.
    async fn start_container(&self, name: &str) -> Result<()>;

    /// Stops a container, waiting up to `timeout_secs` before killing it.
    async fn stop_container(&self, name: &str, timeout_secs: i64) -> Result<()>;

    /// Restarts a container.
    async fn restart_container(&self, name: &str) -> Result<()>;

    /// Removes a container. `force` kills it first if running.
    async fn remove_container(&self, name: &str, force: bool) -> Result<()>;

    /// Inspects a container; `Ok(None)` if it does not exist.
    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerStatus>>;

    /// Lists containers matching a label filter (`key=value`), including
    /// stopped ones.
    async fn list_containers(&self, label_filter: Option<&str>) -> Result<Vec<ContainerStatus>>;

    /// Creates a named volume.
    async fn create_volume(&self, name: &str) -> Result<()>;

    /// Removes a named volume.
    async fn remove_volume(&self, name: &str, force: bool) -> Result<()>;

    /// Lists volume names, optionally filtered by prefix.
    async fn list_volumes(&self, prefix: Option<&str>) -> Result<Vec<String>>;

    /// Runs a command inside a running container and collects its output.
    async fn exec(&self, container: &str, argv: &[&str]) -> Result<ExecOutput>;

    /// Returns the last `tail` lines of a container's logs.
    async fn container_logs(&self, name: &str, tail: usize) -> Result<String>;

    /// Attaches to a container's log stream, following new output.
    async fn attach_logs(&self, name: &str) -> Result<LogStream>;

    /// Waits for a container to exit and returns its exit code.
    async fn wait_container(&self, name: &str) -> Result<i64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_builder_accumulates() {
        let spec = ContainerSpec::builder("svc_redis", "redis:7-alpine")
            .env("MAXMEMORY", "256mb")
            .bind("svc_redis_data:/data")
            .port(PortPair::same(6379))
            .network("phpdock")
            .label("phpdock.service", "redis")
            .restart(RestartPolicyKind::UnlessStopped)
            .build();

        assert_eq!(spec.name, "svc_redis");
        assert_eq!(spec.env.len(), 1);
        assert_eq!(spec.binds, vec!["svc_redis_data:/data"]);
        assert_eq!(spec.ports, vec![PortPair::same(6379)]);
        assert_eq!(spec.network.as_deref(), Some("phpdock"));
        assert_eq!(spec.restart, RestartPolicyKind::UnlessStopped);
    }

    #[test]
    fn exec_output_combined() {
        let out = ExecOutput { stdout: "out".into(), stderr: "err".into(), exit_code: 0 };
        assert!(out.success());
        assert_eq!(out.combined(), "out\nerr");

        let out = ExecOutput { stdout: String::new(), stderr: "err".into(), exit_code: 1 };
        assert!(!out.success());
        assert_eq!(out.combined(), "err");
    }
}

//! Docker implementation of the runtime gateway.
//!
//! Thin translation layer between the [`ContainerRuntime`] trait and the
//! Docker Engine API via bollard. No orchestration logic lives here.

use crate::error::{Result, RuntimeError};
use crate::gateway::{
    ContainerRuntime, ContainerSpec, ContainerStatus, ExecOutput, LogStream, PullProgress,
    RestartPolicyKind,
};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, RestartContainerOptions, StartContainerOptions, StopContainerOptions,
    WaitContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::secret::{HostConfig, PortBinding, RestartPolicy, RestartPolicyNameEnum};
use bollard::volume::{CreateVolumeOptions, ListVolumesOptions, RemoveVolumeOptions};
use bollard::Docker;
use futures::StreamExt;
use phpdock_core::PortPair;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Gateway to a local Docker daemon.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connects with the platform's local defaults and verifies the
    /// connection with a ping.
    pub async fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        docker
            .ping()
            .await
            .map_err(|e| RuntimeError::unavailable(e.to_string()))?;
        info!("connected to Docker daemon");
        Ok(Self { docker })
    }

    fn is_missing(err: &bollard::errors::Error) -> bool {
        matches!(
            err,
            bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }
        )
    }
}

fn status_from_inspect(
    name: &str,
    inspect: bollard::secret::ContainerInspectResponse,
) -> ContainerStatus {
    let state = inspect.state.as_ref();
    let ports = inspect
        .network_settings
        .as_ref()
        .and_then(|n| n.ports.as_ref())
        .map(|map| parse_port_map(map))
        .unwrap_or_default();

    ContainerStatus {
        id: inspect.id.clone().unwrap_or_default(),
        name: inspect
            .name
            .as_deref()
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_else(|| name.to_string()),
        running: state.and_then(|s| s.running).unwrap_or(false),
        state: state
            .and_then(|s| s.status)
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        health: state
            .and_then(|s| s.health.as_ref())
            .and_then(|h| h.status)
            .map(|h| h.to_string()),
        ports,
        binds: inspect
            .host_config
            .as_ref()
            .and_then(|h| h.binds.clone())
            .unwrap_or_default(),
    }
}

fn parse_port_map(map: &HashMap<String, Option<Vec<PortBinding>>>) -> Vec<PortPair> {
    let mut pairs = Vec::new();
    for (key, bindings) in map {
        let container: u16 = match key.split('/').next().and_then(|p| p.parse().ok()) {
            Some(p) => p,
            None => continue,
        };
        let Some(bindings) = bindings else { continue };
        for binding in bindings {
            if let Some(host) = binding.host_port.as_deref().and_then(|p| p.parse().ok()) {
                pairs.push(PortPair { container, host });
            }
        }
    }
    pairs.sort_by_key(|p| (p.container, p.host));
    pairs
}

fn config_from_spec(spec: &ContainerSpec) -> Config<String> {
    let env: Vec<String> = spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect();

    let exposed_ports: HashMap<String, HashMap<(), ()>> = spec
        .ports
        .iter()
        .map(|p| (format!("{}/tcp", p.container), HashMap::new()))
        .collect();

    let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = spec
        .ports
        .iter()
        .map(|p| {
            let binding = PortBinding {
                host_ip: None,
                host_port: Some(p.host.to_string()),
            };
            (format!("{}/tcp", p.container), Some(vec![binding]))
        })
        .collect();

    let restart_policy = match spec.restart {
        RestartPolicyKind::No => None,
        RestartPolicyKind::UnlessStopped => Some(RestartPolicy {
            name: Some(RestartPolicyNameEnum::UNLESS_STOPPED),
            maximum_retry_count: None,
        }),
    };

    let host_config = HostConfig {
        binds: (!spec.binds.is_empty()).then(|| spec.binds.clone()),
        port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
        network_mode: spec.network.clone(),
        restart_policy,
        ..Default::default()
    };

    Config {
        image: Some(spec.image.clone()),
        env: (!env.is_empty()).then_some(env),
        labels: (!spec.labels.is_empty()).then(|| spec.labels.clone()),
        exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
        cmd: spec.cmd.clone(),
        entrypoint: spec.entrypoint.clone(),
        working_dir: spec.working_dir.clone(),
        host_config: Some(host_config),
        ..Default::default()
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| RuntimeError::unavailable(e.to_string()))
    }

    async fn pull_image(
        &self,
        reference: &str,
        on_progress: &(dyn Fn(PullProgress) + Send + Sync),
    ) -> Result<()> {
        info!(image = %reference, "pulling image");

        let options = CreateImageOptions { from_image: reference, ..Default::default() };
        let mut stream = self.docker.create_image(Some(options), None, None);

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    let detail = info.progress_detail.as_ref();
                    on_progress(PullProgress {
                        status: info.status.clone().unwrap_or_default(),
                        current: detail.and_then(|d| d.current),
                        total: detail.and_then(|d| d.total),
                    });
                }
                Err(e) => {
                    return Err(RuntimeError::image_pull_failed(reference, e.to_string()));
                }
            }
        }

        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let options = CreateContainerOptions { name: spec.name.as_str(), platform: None };
        let response = self
            .docker
            .create_container(Some(options), config_from_spec(spec))
            .await?;

        info!(container = %spec.name, id = %response.id, "created container");
        Ok(response.id)
    }

    async fn start_container(&self, name: &str) -> Result<()> {
        self.docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await?;
        info!(container = %name, "started container");
        Ok(())
    }

    async fn stop_container(&self, name: &str, timeout_secs: i64) -> Result<()> {
        self.docker
            .stop_container(name, Some(StopContainerOptions { t: timeout_secs }))
            .await?;
        info!(container = %name, "stopped container");
        Ok(())
    }

    async fn restart_container(&self, name: &str) -> Result<()> {
        self.docker
            .restart_container(name, Some(RestartContainerOptions { t: 10 }))
            .await?;
        info!(container = %name, "restarted container");
        Ok(())
    }

    async fn remove_container(&self, name: &str, force: bool) -> Result<()> {
        let options = RemoveContainerOptions { force, ..Default::default() };
        match self.docker.remove_container(name, Some(options)).await {
            Ok(()) => {
                info!(container = %name, "removed container");
                Ok(())
            }
            // Removing an absent container is not an error; rollback paths
            // must be repeatable.
            Err(e) if Self::is_missing(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerStatus>> {
        match self.docker.inspect_container(name, None).await {
            Ok(inspect) => Ok(Some(status_from_inspect(name, inspect))),
            Err(e) if Self::is_missing(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_containers(&self, label_filter: Option<&str>) -> Result<Vec<ContainerStatus>> {
        let mut filters: HashMap<String, Vec<String>> = HashMap::new();
        if let Some(label) = label_filter {
            filters.insert("label".to_string(), vec![label.to_string()]);
        }

        let options = ListContainersOptions::<String> { all: true, filters, ..Default::default() };
        let summaries = self.docker.list_containers(Some(options)).await?;

        Ok(summaries
            .into_iter()
            .map(|summary| {
                let ports = summary
                    .ports
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|p| {
                        p.public_port.map(|host| PortPair { container: p.private_port, host })
                    })
                    .collect();
                ContainerStatus {
                    id: summary.id.unwrap_or_default(),
                    name: summary
                        .names
                        .unwrap_or_default()
                        .first()
                        .map(|n| n.trim_start_matches('/').to_string())
                        .unwrap_or_default(),
                    running: summary.state.as_deref() == Some("running"),
                    state: summary.state.unwrap_or_else(|| "unknown".to_string()),
                    health: None,
                    ports,
                    binds: Vec::new(),
                }
            })
            .collect())
    }

    async fn create_volume(&self, name: &str) -> Result<()> {
        let options = CreateVolumeOptions { name, ..Default::default() };
        self.docker.create_volume(options).await?;
        info!(volume = %name, "created volume");
        Ok(())
    }

    async fn remove_volume(&self, name: &str, force: bool) -> Result<()> {
        match self
            .docker
            .remove_volume(name, Some(RemoveVolumeOptions { force }))
            .await
        {
            Ok(()) => {
                info!(volume = %name, "removed volume");
                Ok(())
            }
            Err(e) if Self::is_missing(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_volumes(&self, prefix: Option<&str>) -> Result<Vec<String>> {
        let response = self
            .docker
            .list_volumes(None::<ListVolumesOptions<String>>)
            .await?;

        let mut names: Vec<String> = response
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(|v| v.name)
            .filter(|name| prefix.map_or(true, |p| name.starts_with(p)))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn exec(&self, container: &str, argv: &[&str]) -> Result<ExecOutput> {
        debug!(container = %container, cmd = ?argv, "executing command");

        let options = CreateExecOptions {
            cmd: Some(argv.iter().map(|s| s.to_string()).collect()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let exec = self.docker.create_exec(container, options).await?;
        let start_result = self.docker.start_exec(&exec.id, None).await?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        if let StartExecResults::Attached { mut output, .. } = start_result {
            while let Some(result) = output.next().await {
                match result {
                    Ok(LogOutput::StdOut { message }) => {
                        stdout.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(LogOutput::StdErr { message }) => {
                        stderr.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        return Err(RuntimeError::exec_failed(container, e.to_string()));
                    }
                }
            }
        }

        let inspect = self.docker.inspect_exec(&exec.id).await?;
        let exit_code = inspect.exit_code.unwrap_or(-1);

        Ok(ExecOutput { stdout, stderr, exit_code })
    }

    async fn container_logs(&self, name: &str, tail: usize) -> Result<String> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: tail.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.logs(name, Some(options));
        let mut output = String::new();

        while let Some(result) = stream.next().await {
            match result {
                Ok(log) => output.push_str(&log.to_string()),
                Err(e) => {
                    warn!(container = %name, error = %e, "log capture truncated");
                    break;
                }
            }
        }

        Ok(output)
    }

    async fn attach_logs(&self, name: &str) -> Result<LogStream> {
        // Forwarded through a channel so the returned stream owns no
        // borrow of the client.
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let docker = self.docker.clone();
        let name = name.to_string();

        tokio::spawn(async move {
            let options = LogsOptions::<String> {
                stdout: true,
                stderr: true,
                follow: true,
                ..Default::default()
            };
            let mut stream = docker.logs(&name, Some(options));
            while let Some(item) = stream.next().await {
                let mapped = item.map(|log| log.to_string()).map_err(RuntimeError::Api);
                if tx.send(mapped).is_err() {
                    break;
                }
            }
        });

        Ok(Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx)))
    }

    async fn wait_container(&self, name: &str) -> Result<i64> {
        let mut stream = self
            .docker
            .wait_container(name, None::<WaitContainerOptions<String>>);

        let mut exit_code = 0;
        while let Some(result) = stream.next().await {
            match result {
                Ok(response) => exit_code = response.status_code,
                // bollard surfaces a non-zero exit as an error variant; for
                // the caller it is an ordinary exit code, not a failure of
                // the wait itself.
                Err(bollard::errors::Error::DockerContainerWaitError { code, .. }) => {
                    exit_code = code;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(exit_code)
    }
}

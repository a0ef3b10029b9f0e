//! The service lifecycle manager.
//!
//! State machine per service id:
//! `uninstalled → installed(stopped) → installed(running) → installed(stopped) → uninstalled`.
//!
//! Install and running status are always derived live from the runtime:
//! the container's existence is the source of truth, never a cached flag.
//! `start` and `stop` are idempotent: driving a service into the state it
//! is already in succeeds without issuing any runtime mutation.

use phpdock_core::{
    EnvEvent, EventBus, PortPair, ServiceConfig, ServiceDefinition, ServiceId, ServiceState,
};
use phpdock_proxy::ProxySynchronizer;
use phpdock_runtime::{ContainerRuntime, ContainerSpec, PortResolver, RestartPolicyKind};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{Result, ServiceError};
use crate::registry::{self, registry, PROXY_SERVICE_ID};
use crate::store::ServiceStore;

/// Network all service containers join.
const SERVICE_NETWORK: &str = "phpdock";

/// Options for installing a service.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Start the container after creating it.
    pub start: bool,

    /// Configuration override; the registry default is used when absent.
    pub config: Option<ServiceConfig>,
}

impl InstallOptions {
    /// Install and start, with the default configuration.
    pub fn and_start() -> Self {
        Self { start: true, config: None }
    }
}

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Id of the created container.
    pub container_id: String,

    /// Message from the post-install hook, when one ran successfully.
    pub post_install_message: Option<String>,
}

/// Result of a start/stop/restart call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleReport {
    /// The service operated on.
    pub service: ServiceId,

    /// Whether a runtime mutation was issued.
    pub changed: bool,

    /// Human-readable description of what happened.
    pub message: String,
}

impl LifecycleReport {
    fn changed(service: &ServiceId, message: &str) -> Self {
        Self { service: service.clone(), changed: true, message: message.to_string() }
    }

    fn unchanged(service: &ServiceId, message: &str) -> Self {
        Self { service: service.clone(), changed: false, message: message.to_string() }
    }
}

/// Live status of a service, derived from runtime inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    /// The service id.
    pub id: ServiceId,

    /// Whether the service container exists.
    pub installed: bool,

    /// Whether the container is running.
    pub running: bool,

    /// Actual host port bindings.
    pub ports: Vec<PortPair>,

    /// Whether the service starts with the environment.
    pub enabled: bool,
}

/// Installs, starts, stops, and uninstalls auxiliary service containers.
pub struct ServiceManager {
    runtime: Arc<dyn ContainerRuntime>,
    ports: Arc<PortResolver>,
    store: ServiceStore,
    bus: EventBus,
    proxy: Option<Arc<ProxySynchronizer>>,
    init: OnceCell<()>,
}

impl ServiceManager {
    /// Creates a manager. Initialization (seeding default state for every
    /// registry entry) happens lazily on first use and is memoized, so
    /// concurrent first callers do not double-initialize.
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        ports: Arc<PortResolver>,
        store: ServiceStore,
        bus: EventBus,
    ) -> Self {
        Self { runtime, ports, store, bus, proxy: None, init: OnceCell::new() }
    }

    /// Attaches the proxy synchronizer invoked after the proxy service
    /// starts.
    pub fn with_proxy(mut self, proxy: Arc<ProxySynchronizer>) -> Self {
        self.proxy = Some(proxy);
        self
    }

    async fn ensure_init(&self) -> Result<()> {
        self.init
            .get_or_try_init(|| async {
                self.store
                    .initialize(registry().iter().map(|d| d.id.clone()))
                    .await?;
                debug!("service state initialized");
                Ok::<(), ServiceError>(())
            })
            .await?;
        Ok(())
    }

    fn lookup(id: &ServiceId) -> Result<&'static ServiceDefinition> {
        registry::definition(id).ok_or_else(|| ServiceError::UnknownService(id.to_string()))
    }

    async fn container_name(&self, id: &ServiceId, def: &ServiceDefinition) -> String {
        self.store
            .get(id)
            .await
            .custom_config
            .map(|c| c.container_name)
            .unwrap_or_else(|| def.config.container_name.clone())
    }

    fn spec_from_config(def: &ServiceDefinition, config: &ServiceConfig) -> ContainerSpec {
        let mut builder = ContainerSpec::builder(&config.container_name, &config.image)
            .network(SERVICE_NETWORK)
            .label("phpdock.service", def.id.as_str())
            .restart(RestartPolicyKind::UnlessStopped);
        for (key, value) in &config.env {
            builder = builder.env(key, value);
        }
        for bind in &config.binds {
            builder = builder.bind(bind);
        }
        for pair in &config.ports {
            builder = builder.port(*pair);
        }
        if let Some(cmd) = &config.cmd {
            builder = builder.cmd(cmd.clone());
        }
        builder.build()
    }

    /// Installs a service: pull, resolve ports, create, optionally start,
    /// then persist the configuration with the actually-bound ports.
    pub async fn install(&self, id: &ServiceId, options: InstallOptions) -> Result<InstallReport> {
        self.ensure_init().await?;
        let def = Self::lookup(id)?;
        self.runtime.ping().await?;

        let mut config = options.config.unwrap_or_else(|| def.config.clone());

        let bus = self.bus.clone();
        let progress_id = id.clone();
        let on_progress = move |p: phpdock_runtime::PullProgress| {
            bus.publish(EnvEvent::PullProgress {
                service: progress_id.clone(),
                status: p.status,
                current: p.current,
                total: p.total,
            });
        };
        self.runtime.pull_image(&config.image, &on_progress).await?;

        let desired: Vec<u16> = config.ports.iter().map(|p| p.host).collect();
        let resolved = self.ports.resolve_all(&desired).await?;
        for pair in &mut config.ports {
            if let Some(actual) = resolved.get(&pair.host) {
                pair.host = *actual;
            }
        }

        let spec = Self::spec_from_config(def, &config);
        let container_id = self.runtime.create_container(&spec).await?;

        if options.start {
            self.runtime.start_container(&config.container_name).await?;
        }

        // The runtime may have bound different ports than requested;
        // persist what it actually did.
        if let Some(status) = self.runtime.inspect_container(&config.container_name).await? {
            if !status.ports.is_empty() {
                config.ports = status.ports;
            }
        }

        self.store
            .set(
                id,
                ServiceState {
                    installed: true,
                    enabled: options.start,
                    custom_config: Some(config.clone()),
                },
            )
            .await?;

        let post_install_message = if options.start {
            self.run_post_install(def, &config.container_name).await
        } else {
            None
        };

        self.bus.publish(EnvEvent::ServiceChanged { service: id.clone() });
        info!(service = %id, container = %container_id, "service installed");

        Ok(InstallReport { container_id, post_install_message })
    }

    /// Runs the registered post-install hook, best-effort: a failing hook
    /// is logged and the install still counts as successful.
    async fn run_post_install(&self, def: &ServiceDefinition, container: &str) -> Option<String> {
        let hook = def.post_install.as_ref()?;
        let argv: Vec<&str> = hook.argv.iter().map(String::as_str).collect();
        match self.runtime.exec(container, &argv).await {
            Ok(output) if output.success() => Some(hook.message.clone()),
            Ok(output) => {
                warn!(
                    service = %def.id,
                    status = output.exit_code,
                    "post-install hook exited non-zero"
                );
                None
            }
            Err(e) => {
                warn!(service = %def.id, error = %e, "post-install hook failed");
                None
            }
        }
    }

    /// Uninstalls a service. Volumes survive unless `remove_volumes` is
    /// set, in which case named volumes are parsed out of the stored bind
    /// specs and removed individually.
    pub async fn uninstall(&self, id: &ServiceId, remove_volumes: bool) -> Result<()> {
        self.ensure_init().await?;
        let def = Self::lookup(id)?;

        let state = self.store.get(id).await;
        let config = state.custom_config.clone().unwrap_or_else(|| def.config.clone());

        let status = self.runtime.inspect_container(&config.container_name).await?;
        if status.is_none() && !state.installed {
            return Err(ServiceError::NotInstalled(id.to_string()));
        }

        self.runtime.remove_container(&config.container_name, true).await?;
        for pair in &config.ports {
            self.ports.release(pair.host).await;
        }

        if remove_volumes {
            for volume in config.named_volumes() {
                self.runtime.remove_volume(&volume, true).await?;
            }
        }

        self.store.set(id, ServiceState::default()).await?;
        self.bus.publish(EnvEvent::ServiceChanged { service: id.clone() });
        info!(service = %id, removed_volumes = remove_volumes, "service uninstalled");
        Ok(())
    }

    /// Starts a service. Starting an already-running service succeeds
    /// without touching the runtime.
    pub async fn start(&self, id: &ServiceId) -> Result<LifecycleReport> {
        self.ensure_init().await?;
        let def = Self::lookup(id)?;
        let name = self.container_name(id, def).await;

        match self.runtime.inspect_container(&name).await? {
            None => Err(ServiceError::NotInstalled(id.to_string())),
            Some(status) if status.running => {
                debug!(service = %id, "start requested but already running");
                Ok(LifecycleReport::unchanged(id, "already running"))
            }
            Some(_) => {
                self.runtime.start_container(&name).await?;
                if id.as_str() == PROXY_SERVICE_ID {
                    self.spawn_proxy_sync();
                }
                self.bus.publish(EnvEvent::ServiceChanged { service: id.clone() });
                Ok(LifecycleReport::changed(id, "started"))
            }
        }
    }

    /// Stops a service. Stopping an already-stopped service succeeds
    /// without touching the runtime.
    pub async fn stop(&self, id: &ServiceId) -> Result<LifecycleReport> {
        self.ensure_init().await?;
        let def = Self::lookup(id)?;
        let name = self.container_name(id, def).await;

        match self.runtime.inspect_container(&name).await? {
            None => Err(ServiceError::NotInstalled(id.to_string())),
            Some(status) if !status.running => {
                debug!(service = %id, "stop requested but already stopped");
                Ok(LifecycleReport::unchanged(id, "already stopped"))
            }
            Some(_) => {
                self.runtime.stop_container(&name, 10).await?;
                self.bus.publish(EnvEvent::ServiceChanged { service: id.clone() });
                Ok(LifecycleReport::changed(id, "stopped"))
            }
        }
    }

    /// Restarts a service.
    pub async fn restart(&self, id: &ServiceId) -> Result<LifecycleReport> {
        self.ensure_init().await?;
        let def = Self::lookup(id)?;
        let name = self.container_name(id, def).await;

        if self.runtime.inspect_container(&name).await?.is_none() {
            return Err(ServiceError::NotInstalled(id.to_string()));
        }

        self.runtime.restart_container(&name).await?;
        if id.as_str() == PROXY_SERVICE_ID {
            self.spawn_proxy_sync();
        }
        self.bus.publish(EnvEvent::ServiceChanged { service: id.clone() });
        Ok(LifecycleReport::changed(id, "restarted"))
    }

    /// Persists a configuration override. The service must be installed.
    ///
    /// If the container is currently running the change does not take
    /// effect until it is explicitly recreated; this is deliberate, since
    /// automatic recreation would destroy container state.
    pub async fn update_config(&self, id: &ServiceId, config: ServiceConfig) -> Result<()> {
        self.ensure_init().await?;
        let def = Self::lookup(id)?;

        let mut state = self.store.get(id).await;
        let current_name = state
            .custom_config
            .as_ref()
            .map(|c| c.container_name.clone())
            .unwrap_or_else(|| def.config.container_name.clone());

        let status = self.runtime.inspect_container(&current_name).await?;
        if status.is_none() && !state.installed {
            return Err(ServiceError::NotInstalled(id.to_string()));
        }

        if status.map(|s| s.running).unwrap_or(false) {
            warn!(
                service = %id,
                "service is running; configuration changes take effect after the container is recreated"
            );
        }

        state.custom_config = Some(config);
        self.store.set(id, state).await?;
        Ok(())
    }

    /// Live status for one service.
    pub async fn status(&self, id: &ServiceId) -> Result<ServiceStatus> {
        self.ensure_init().await?;
        let def = Self::lookup(id)?;
        let name = self.container_name(id, def).await;
        let state = self.store.get(id).await;

        let status = self.runtime.inspect_container(&name).await?;
        Ok(ServiceStatus {
            id: id.clone(),
            installed: status.is_some(),
            running: status.as_ref().map(|s| s.running).unwrap_or(false),
            ports: status.map(|s| s.ports).unwrap_or_default(),
            enabled: state.enabled,
        })
    }

    fn spawn_proxy_sync(&self) {
        let Some(proxy) = self.proxy.clone() else { return };
        // Best-effort and asynchronous: the caller of start() never waits
        // for, or hears about, the routing-table sync.
        tokio::spawn(async move {
            if let Err(e) = proxy.sync_projects().await {
                warn!(error = %e, "proxy sync after start failed");
            }
        });
    }
}

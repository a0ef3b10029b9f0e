//! Auxiliary service definitions and state.
//!
//! A service is a containerized dependency (database, cache, search engine,
//! mail catcher, reverse proxy) independent of any single project. The
//! static [`ServiceDefinition`] comes from the registry and is never
//! mutated; the per-service [`ServiceState`] is persisted and tracks what
//! the user has installed and customized.

use crate::types::ServiceId;
use serde::{Deserialize, Serialize};

/// A container-port/host-port pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortPair {
    /// Port inside the container.
    pub container: u16,

    /// Desired (or, after install, actual) port on the host.
    pub host: u16,
}

impl PortPair {
    /// Creates a pair mapping the same port on both sides.
    pub fn same(port: u16) -> Self {
        Self { container: port, host: port }
    }

    /// Creates a pair with distinct container and host ports.
    pub fn new(container: u16, host: u16) -> Self {
        Self { container, host }
    }
}

/// Category a service is shown under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    Database,
    Cache,
    Search,
    Mail,
    Storage,
    Proxy,
}

/// Concrete container configuration for a service.
///
/// The registry carries the default; users may persist an override, and the
/// install flow writes back the actually-bound host ports after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Image reference, e.g. `redis:7-alpine`.
    pub image: String,

    /// Fixed container name, e.g. `svc_redis`.
    pub container_name: String,

    /// Port pairs to publish.
    pub ports: Vec<PortPair>,

    /// Volume bindings in `source:target` form. A source without a leading
    /// `/` is a named volume.
    pub binds: Vec<String>,

    /// Environment variables.
    pub env: Vec<(String, String)>,

    /// Command override, for images that need one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,
}

impl ServiceConfig {
    /// Named volumes referenced by the bind specs, in order.
    pub fn named_volumes(&self) -> Vec<String> {
        self.binds
            .iter()
            .filter_map(|bind| {
                let source = bind.split(':').next()?;
                if source.is_empty() || source.starts_with('/') || source.starts_with('.') {
                    None
                } else {
                    Some(source.to_string())
                }
            })
            .collect()
    }
}

/// A best-effort command run inside the service container after install.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostInstall {
    /// Command and arguments.
    pub argv: Vec<String>,

    /// Message returned to the caller when the hook ran.
    pub message: String,
}

/// Static registry entry for a service. Loaded once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Registry id.
    pub id: ServiceId,

    /// Human-readable name.
    pub label: String,

    /// Display category.
    pub category: ServiceCategory,

    /// Whether the environment cannot function without this service
    /// (the reverse proxy is the only required one).
    pub required: bool,

    /// Default configuration.
    pub config: ServiceConfig,

    /// Optional post-install hook.
    pub post_install: Option<PostInstall>,
}

/// Persisted per-service state.
///
/// Install/running status itself is always derived live from the container
/// runtime; this record only stores what cannot be derived: the user's
/// custom configuration and whether the service should come up with the
/// environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceState {
    /// Whether the user has installed this service.
    pub installed: bool,

    /// Whether the service starts with the environment.
    pub enabled: bool,

    /// Custom configuration override, if any. After a successful install
    /// this holds the configuration with the actually-bound host ports.
    pub custom_config: Option<ServiceConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_volumes_skip_host_paths() {
        let config = ServiceConfig {
            image: "mysql:8".to_string(),
            container_name: "svc_mysql".to_string(),
            ports: vec![PortPair::same(3306)],
            binds: vec![
                "svc_mysql_data:/var/lib/mysql".to_string(),
                "/etc/localtime:/etc/localtime".to_string(),
                "./conf:/etc/mysql/conf.d".to_string(),
            ],
            env: vec![("MYSQL_ROOT_PASSWORD".to_string(), "root".to_string())],
            cmd: None,
        };
        assert_eq!(config.named_volumes(), vec!["svc_mysql_data".to_string()]);
    }

    #[test]
    fn port_pair_constructors() {
        assert_eq!(PortPair::same(6379), PortPair { container: 6379, host: 6379 });
        assert_eq!(PortPair::new(80, 8080), PortPair { container: 80, host: 8080 });
    }
}

//! The project record.
//!
//! A project binds one container, one volume, and one domain to a directory
//! on the host. The record is owned exclusively by the project orchestrator
//! and persisted as a keyed map.

use crate::types::{ProjectId, ServiceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Prefix shared by project volume and container names.
const RESOURCE_PREFIX: &str = "proj_";

/// Top-level domain appended to project slugs.
const DOMAIN_SUFFIX: &str = "local";

/// What kind of project this is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "framework")]
pub enum ProjectKind {
    /// A plain PHP project with no framework scaffolding.
    Basic,

    /// A project created from (or detected as) a known framework.
    Framework(Framework),

    /// An existing folder imported as-is.
    Imported,
}

impl ProjectKind {
    /// Returns the framework, if any.
    pub fn framework(&self) -> Option<Framework> {
        match self {
            Self::Framework(fw) => Some(*fw),
            _ => None,
        }
    }
}

/// Frameworks the environment knows how to scaffold and detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framework {
    Laravel,
    Symfony,
}

impl Framework {
    /// Minimum PHP version the current major release of the framework
    /// supports. Creating or regenerating a project below this bound fails
    /// validation before any resource is created.
    pub fn min_php(&self) -> PhpVersion {
        match self {
            Self::Laravel | Self::Symfony => PhpVersion::V8_2,
        }
    }

    /// Composer package that marks a project as using this framework.
    pub fn manifest_dependency(&self) -> &'static str {
        match self {
            Self::Laravel => "laravel/framework",
            Self::Symfony => "symfony/framework-bundle",
        }
    }

    /// CLI entry-point file relative to the project root.
    pub fn cli_entrypoint(&self) -> &'static str {
        match self {
            Self::Laravel => "artisan",
            Self::Symfony => "bin/console",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Laravel => f.write_str("laravel"),
            Self::Symfony => f.write_str("symfony"),
        }
    }
}

/// Supported PHP runtime versions, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PhpVersion {
    #[serde(rename = "8.1")]
    V8_1,
    #[serde(rename = "8.2")]
    V8_2,
    #[serde(rename = "8.3")]
    V8_3,
    #[serde(rename = "8.4")]
    V8_4,
}

impl PhpVersion {
    /// Version string as used in image tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V8_1 => "8.1",
            Self::V8_2 => "8.2",
            Self::V8_3 => "8.3",
            Self::V8_4 => "8.4",
        }
    }
}

impl fmt::Display for PhpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user project: one container, one volume, one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Opaque unique identifier.
    pub id: ProjectId,

    /// Canonical slug, derived once at creation via
    /// [`sanitize_name`](crate::types::sanitize_name).
    pub name: String,

    /// Project kind.
    #[serde(flatten)]
    pub kind: ProjectKind,

    /// Host filesystem path of the project folder.
    pub path: PathBuf,

    /// Backing volume name (`proj_<name>`).
    pub volume_name: String,

    /// Container name (`proj_<name>`).
    pub container_name: String,

    /// Public domain (`<name>.local`).
    pub domain: String,

    /// PHP runtime version.
    pub php_version: PhpVersion,

    /// Image variant suffix (e.g. `fpm-alpine`).
    pub php_variant: String,

    /// Companion Node.js major version, if enabled.
    pub node_version: Option<u8>,

    /// PHP extensions installed into the project image.
    pub extensions: Vec<String>,

    /// Whether Xdebug is enabled.
    pub xdebug: bool,

    /// Host port forwarded to the container's HTTP port.
    pub forwarded_port: Option<u16>,

    /// Docker network the container joins.
    pub network_name: String,

    /// Whether devcontainer/build files have been generated into the folder.
    pub files_generated: bool,

    /// Whether the host tree has been copied into the volume.
    pub volume_copied: bool,

    /// Position in UI listings.
    pub display_order: u32,

    /// Bundled auxiliary services and their resolved container names.
    pub bundled_services: HashMap<ServiceId, String>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Creates a project record from an already-sanitized slug.
    ///
    /// The slug must be non-empty; the caller validates raw input first.
    pub fn new(name: impl Into<String>, kind: ProjectKind, path: PathBuf) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            id: ProjectId::new(),
            volume_name: Self::volume_name_for(&name),
            container_name: Self::container_name_for(&name),
            domain: Self::domain_for(&name),
            name,
            kind,
            path,
            php_version: PhpVersion::V8_3,
            php_variant: "fpm-alpine".to_string(),
            node_version: None,
            extensions: Vec::new(),
            xdebug: false,
            forwarded_port: None,
            network_name: "phpdock".to_string(),
            files_generated: false,
            volume_copied: false,
            display_order: 0,
            bundled_services: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Volume name for a slug.
    pub fn volume_name_for(name: &str) -> String {
        format!("{RESOURCE_PREFIX}{name}")
    }

    /// Container name for a slug.
    pub fn container_name_for(name: &str) -> String {
        format!("{RESOURCE_PREFIX}{name}")
    }

    /// Public domain for a slug.
    pub fn domain_for(name: &str) -> String {
        format!("{name}.{DOMAIN_SUFFIX}")
    }

    /// Address of the project's HTTP port as reachable from other containers
    /// on the shared network.
    pub fn upstream_addr(&self) -> String {
        format!("{}:80", self.container_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_names_are_deterministic() {
        let p = Project::new("my-site", ProjectKind::Basic, PathBuf::from("/home/u/sites/my-site"));
        assert_eq!(p.volume_name, "proj_my-site");
        assert_eq!(p.container_name, "proj_my-site");
        assert_eq!(p.domain, "my-site.local");
        assert_eq!(p.upstream_addr(), "proj_my-site:80");
    }

    #[test]
    fn framework_constraints() {
        assert_eq!(Framework::Laravel.min_php(), PhpVersion::V8_2);
        assert!(PhpVersion::V8_1 < PhpVersion::V8_2);
        assert!(PhpVersion::V8_4 > PhpVersion::V8_3);
    }

    #[test]
    fn project_round_trips_through_json() {
        let p = Project::new("shop", ProjectKind::Framework(Framework::Laravel), PathBuf::from("/srv/shop"));
        let json = serde_json::to_string(&p).unwrap();
        let back: Project = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}

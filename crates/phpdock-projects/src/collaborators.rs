//! Seams to the out-of-scope collaborators.
//!
//! The hosts-file editor and the devcontainer template generator are owned
//! by the host application; the orchestrator only depends on these traits.
//! Both report failures as strings; the orchestrator decides which calls
//! are advisory and which abort the pipeline.

use async_trait::async_trait;
use phpdock_core::{PhpVersion, Project};
use std::path::PathBuf;

/// Edits the loopback entries in the host's hosts file.
#[async_trait]
pub trait HostsEditor: Send + Sync {
    /// Adds a loopback entry for the domain.
    async fn add_entry(&self, domain: &str) -> Result<(), String>;

    /// Removes the entry for the domain.
    async fn remove_entry(&self, domain: &str) -> Result<(), String>;
}

/// Everything the template generator needs to render devcontainer and
/// build files into a project folder.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateContext {
    /// Project folder the files are written into.
    pub project_dir: PathBuf,

    /// Project slug.
    pub name: String,

    /// Public domain.
    pub domain: String,

    /// PHP runtime version.
    pub php_version: PhpVersion,

    /// Image variant suffix.
    pub php_variant: String,

    /// Companion Node.js major version.
    pub node_version: Option<u8>,

    /// PHP extensions to install.
    pub extensions: Vec<String>,

    /// Whether Xdebug is enabled.
    pub xdebug: bool,
}

impl TemplateContext {
    /// Builds the context for a project record.
    pub fn for_project(project: &Project) -> Self {
        Self {
            project_dir: project.path.clone(),
            name: project.name.clone(),
            domain: project.domain.clone(),
            php_version: project.php_version,
            php_variant: project.php_variant.clone(),
            node_version: project.node_version,
            extensions: project.extensions.clone(),
            xdebug: project.xdebug,
        }
    }
}

/// Renders devcontainer/build configuration files into the project folder.
#[async_trait]
pub trait TemplateGenerator: Send + Sync {
    /// Generates the files. Must refuse to overwrite an existing
    /// configuration unless `overwrite` is set.
    async fn generate(&self, context: &TemplateContext, overwrite: bool) -> Result<(), String>;
}

//! Fresh-framework scaffolding into an empty volume.
//!
//! Runs composer's project installer inside a helper container with the
//! volume mounted, before any host files exist. The helper follows the same
//! removal guarantee as every other transfer helper.

use phpdock_core::project::Framework;
use phpdock_runtime::{ContainerRuntime, ContainerSpec};
use phpdock_transfer::helper::{helper_name, run_helper, HelperHooks};
use phpdock_transfer::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Image providing composer.
const SCAFFOLD_IMAGE: &str = "composer:2";

/// Fresh installs download a full dependency tree.
pub const SCAFFOLD_TIMEOUT: Duration = Duration::from_secs(15 * 60);

fn starter_package(framework: Framework) -> &'static str {
    match framework {
        Framework::Laravel => "laravel/laravel",
        Framework::Symfony => "symfony/skeleton",
    }
}

/// Builds the helper spec for scaffolding `framework` into `volume`.
pub fn scaffold_spec(framework: Framework, volume: &str) -> ContainerSpec {
    ContainerSpec::builder(helper_name("scaffold"), SCAFFOLD_IMAGE)
        .bind(format!("{volume}:/app"))
        .working_dir("/app")
        .cmd(vec![
            "composer".to_string(),
            "create-project".to_string(),
            "--no-interaction".to_string(),
            "--prefer-dist".to_string(),
            starter_package(framework).to_string(),
            ".".to_string(),
        ])
        .build()
}

/// Installs a fresh framework skeleton into the volume.
pub async fn scaffold_into_volume(
    runtime: &Arc<dyn ContainerRuntime>,
    framework: Framework,
    volume: &str,
) -> Result<()> {
    info!(framework = %framework, volume = %volume, "scaffolding fresh project");
    run_helper(
        runtime,
        scaffold_spec(framework, volume),
        SCAFFOLD_TIMEOUT,
        HelperHooks::none(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use phpdock_transfer::HELPER_PREFIX;

    #[test]
    fn spec_runs_composer_in_the_volume() {
        let spec = scaffold_spec(Framework::Laravel, "proj_blog");
        assert!(spec.name.starts_with(HELPER_PREFIX));
        assert_eq!(spec.binds, vec!["proj_blog:/app"]);
        assert_eq!(spec.working_dir.as_deref(), Some("/app"));

        let cmd = spec.cmd.unwrap().join(" ");
        assert!(cmd.contains("create-project"));
        assert!(cmd.contains("laravel/laravel"));
    }

    #[test]
    fn symfony_uses_the_skeleton() {
        let spec = scaffold_spec(Framework::Symfony, "proj_api");
        assert!(spec.cmd.unwrap().join(" ").contains("symfony/skeleton"));
    }
}

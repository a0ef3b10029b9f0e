//! One-shot bulk copy into a fresh volume.
//!
//! Runs a tar pipe inside a helper container that sees the host tree
//! read-only at `/source` and the target volume read-write at `/target`,
//! then fixes ownership recursively. Progress is coarse: three stages, not
//! byte-accurate.

use phpdock_runtime::paths::to_bind_path;
use phpdock_runtime::ContainerSpec;
use std::path::Path;
use std::time::Duration;

use crate::helper::helper_name;

/// Image used for the tar pipe.
const COPY_IMAGE: &str = "alpine:3.20";

/// Dependency-manager trees skipped by the bulk copy; they are restored by
/// the dependency manager inside the container.
const COPY_EXCLUDES: &[&str] = &["./vendor", "./node_modules"];

/// Owner applied to the copied tree: www-data in the alpine PHP images.
const WEB_OWNER: &str = "82:82";

/// Bulk copies take minutes on large trees, never tens of minutes.
pub const COPY_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Number of coarse progress stages a bulk copy reports.
pub const COPY_STEPS: u32 = 3;

/// Builds the helper spec for copying `host_path` into `volume`.
pub fn copy_spec(host_path: &Path, volume: &str) -> ContainerSpec {
    let excludes: String = COPY_EXCLUDES
        .iter()
        .map(|dir| format!("--exclude={dir} "))
        .collect();

    let script = format!(
        "cd /source && tar -cf - {excludes}. | tar -xf - -C /target && chown -R {WEB_OWNER} /target"
    );

    ContainerSpec::builder(helper_name("copy"), COPY_IMAGE)
        .bind(format!("{}:/source:ro", to_bind_path(host_path)))
        .bind(format!("{volume}:/target"))
        .cmd(vec!["sh".to_string(), "-c".to_string(), script])
        .build()
}

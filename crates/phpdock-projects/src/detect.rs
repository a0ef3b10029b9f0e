//! Framework auto-detection for imported projects.
//!
//! Detection is deliberately conservative: a framework is accepted only
//! when two independent signals agree: the composer manifest declares the
//! framework's package AND the framework's CLI entry-point file exists.
//! Either signal alone falls back to a generic project.

use phpdock_core::project::Framework;
use std::path::Path;
use tracing::debug;

const FRAMEWORKS: &[Framework] = &[Framework::Laravel, Framework::Symfony];

/// Detects the framework of an existing project folder, if any.
pub fn detect_framework(path: &Path) -> Option<Framework> {
    let manifest = read_manifest(path)?;

    for &framework in FRAMEWORKS {
        let has_dependency = manifest_declares(&manifest, framework.manifest_dependency());
        let has_entrypoint = path.join(framework.cli_entrypoint()).is_file();

        if has_dependency && has_entrypoint {
            debug!(framework = %framework, path = %path.display(), "framework detected");
            return Some(framework);
        }
        if has_dependency || has_entrypoint {
            debug!(
                framework = %framework,
                dependency = has_dependency,
                entrypoint = has_entrypoint,
                "single detection signal, treating as generic project"
            );
        }
    }

    None
}

fn read_manifest(path: &Path) -> Option<serde_json::Value> {
    let raw = std::fs::read_to_string(path.join("composer.json")).ok()?;
    serde_json::from_str(&raw).ok()
}

fn manifest_declares(manifest: &serde_json::Value, package: &str) -> bool {
    manifest
        .get("require")
        .and_then(|require| require.get(package))
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_composer(dir: &Path, require: &str) {
        fs::write(
            dir.join("composer.json"),
            format!(r#"{{"name":"acme/app","require":{{{require}}}}}"#),
        )
        .unwrap();
    }

    #[test]
    fn both_signals_detect_laravel() {
        let dir = tempfile::tempdir().unwrap();
        write_composer(dir.path(), r#""laravel/framework":"^11.0""#);
        fs::write(dir.path().join("artisan"), "#!/usr/bin/env php\n").unwrap();

        assert_eq!(detect_framework(dir.path()), Some(Framework::Laravel));
    }

    #[test]
    fn manifest_alone_is_not_enough() {
        let dir = tempfile::tempdir().unwrap();
        write_composer(dir.path(), r#""laravel/framework":"^11.0""#);

        assert_eq!(detect_framework(dir.path()), None);
    }

    #[test]
    fn entrypoint_alone_is_not_enough() {
        let dir = tempfile::tempdir().unwrap();
        write_composer(dir.path(), r#""guzzlehttp/guzzle":"^7.0""#);
        fs::write(dir.path().join("artisan"), "").unwrap();

        assert_eq!(detect_framework(dir.path()), None);
    }

    #[test]
    fn symfony_uses_its_own_signals() {
        let dir = tempfile::tempdir().unwrap();
        write_composer(dir.path(), r#""symfony/framework-bundle":"^7.0""#);
        fs::create_dir(dir.path().join("bin")).unwrap();
        fs::write(dir.path().join("bin/console"), "#!/usr/bin/env php\n").unwrap();

        assert_eq!(detect_framework(dir.path()), Some(Framework::Symfony));
    }

    #[test]
    fn missing_or_invalid_manifest_detects_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(detect_framework(dir.path()), None);

        fs::write(dir.path().join("composer.json"), "not json").unwrap();
        assert_eq!(detect_framework(dir.path()), None);
    }
}

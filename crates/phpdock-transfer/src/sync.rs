//! Bidirectional delta sync between a volume and the host tree.
//!
//! Runs rsync inside a helper container with both sides mounted, streams
//! its `--info=progress2` output, and turns lines of the
//! `<bytes> <percent>%` shape into byte-accurate progress callbacks.

use phpdock_core::SyncDirection;
use phpdock_runtime::paths::to_bind_path;
use phpdock_runtime::ContainerSpec;
use std::path::Path;
use std::time::Duration;

use crate::helper::helper_name;

/// Image providing rsync.
const SYNC_IMAGE: &str = "instrumentisto/rsync-ssh";

/// Large trees sync in tens of minutes at worst.
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Options chosen by the user for a sync run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Also sync `vendor/` and `node_modules/`.
    pub include_dependencies: bool,

    /// Delete files on the destination that no longer exist on the source.
    pub delete: bool,
}

/// Builds the helper spec for syncing between `host_path` and `volume`.
pub fn sync_spec(
    direction: SyncDirection,
    host_path: &Path,
    volume: &str,
    options: SyncOptions,
) -> ContainerSpec {
    let mut argv = vec![
        "rsync".to_string(),
        "-rltD".to_string(),
        "--info=progress2".to_string(),
    ];

    if options.delete {
        argv.push("--delete".to_string());
    }
    if !options.include_dependencies {
        argv.push("--exclude=vendor/".to_string());
        argv.push("--exclude=node_modules/".to_string());
    }

    let (src, dst) = match direction {
        SyncDirection::VolumeToHost => ("/volume/", "/host/"),
        SyncDirection::HostToVolume => ("/host/", "/volume/"),
    };
    argv.push(src.to_string());
    argv.push(dst.to_string());

    ContainerSpec::builder(helper_name("sync"), SYNC_IMAGE)
        .bind(format!("{}:/host", to_bind_path(host_path)))
        .bind(format!("{volume}:/volume"))
        .entrypoint(argv)
        .build()
}

/// Parses one rsync progress line into `(bytes, percent)`.
///
/// rsync's `--info=progress2` emits lines like
/// `  1,234,567  42%  12.3MB/s  0:00:10`; anything else returns `None`.
pub fn parse_progress_line(line: &str) -> Option<(u64, u8)> {
    let mut tokens = line.split_whitespace();

    let bytes: u64 = {
        let raw = tokens.next()?;
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() || digits.len() != raw.chars().filter(|c| *c != ',').count() {
            return None;
        }
        digits.parse().ok()?
    };

    let percent: u8 = {
        let raw = tokens.next()?;
        let stripped = raw.strip_suffix('%')?;
        stripped.parse().ok()?
    };

    Some((bytes, percent.min(100)))
}

/// Splits a raw output chunk into logical lines. rsync rewrites its
/// progress line with carriage returns, so both `\r` and `\n` delimit.
pub fn split_chunk(chunk: &str) -> impl Iterator<Item = &str> {
    chunk
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|l| !l.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_progress2_lines() {
        assert_eq!(parse_progress_line("  1,234,567  42%  12.3MB/s  0:00:10"), Some((1_234_567, 42)));
        assert_eq!(parse_progress_line("987 100% 1.1kB/s 0:00:00"), Some((987, 100)));
    }

    #[test]
    fn rejects_non_progress_lines() {
        assert_eq!(parse_progress_line("sending incremental file list"), None);
        assert_eq!(parse_progress_line("src/main.php"), None);
        assert_eq!(parse_progress_line(""), None);
        assert_eq!(parse_progress_line("12abc 42%"), None);
    }

    #[test]
    fn chunk_splitting_handles_carriage_returns() {
        let chunk = "  100 1%\r  2,000 20%\r\n  5,000 50%";
        let lines: Vec<&str> = split_chunk(chunk).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(parse_progress_line(lines[2]), Some((5_000, 50)));
    }

    #[test]
    fn direction_selects_source_and_destination() {
        let spec = sync_spec(
            SyncDirection::VolumeToHost,
            Path::new("/srv/app"),
            "proj_app",
            SyncOptions::default(),
        );
        let argv = spec.entrypoint.as_ref().unwrap();
        assert_eq!(&argv[argv.len() - 2..], ["/volume/", "/host/"]);

        let spec = sync_spec(
            SyncDirection::HostToVolume,
            Path::new("/srv/app"),
            "proj_app",
            SyncOptions::default(),
        );
        let argv = spec.entrypoint.as_ref().unwrap();
        assert_eq!(&argv[argv.len() - 2..], ["/host/", "/volume/"]);
    }

    #[test]
    fn dependency_excludes_follow_options() {
        let with_deps = sync_spec(
            SyncDirection::HostToVolume,
            Path::new("/srv/app"),
            "proj_app",
            SyncOptions { include_dependencies: true, delete: true },
        );
        let argv = with_deps.entrypoint.as_ref().unwrap().join(" ");
        assert!(!argv.contains("--exclude"));
        assert!(argv.contains("--delete"));

        let without = sync_spec(
            SyncDirection::HostToVolume,
            Path::new("/srv/app"),
            "proj_app",
            SyncOptions::default(),
        );
        let argv = without.entrypoint.as_ref().unwrap().join(" ");
        assert!(argv.contains("--exclude=vendor/"));
        assert!(argv.contains("--exclude=node_modules/"));
    }
}

//! The transfer engine facade.

use phpdock_core::{EnvEvent, EventBus, ProjectId, SyncDirection, TransferProgress};
use phpdock_runtime::ContainerRuntime;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::copy::{copy_spec, COPY_STEPS, COPY_TIMEOUT};
use crate::error::{Result, TransferError};
use crate::helper::{run_helper, HelperHooks};
use crate::sync::{parse_progress_line, split_chunk, sync_spec, SyncOptions, SYNC_TIMEOUT};
use crate::tracker::{CancelSignal, SyncTracker};

/// Copies and syncs file trees between the host and named volumes.
///
/// Long-running operations are intended to be spawned, not awaited by the
/// triggering request; progress is delivered through the event bus keyed by
/// project id.
pub struct TransferEngine {
    runtime: Arc<dyn ContainerRuntime>,
    bus: EventBus,
    tracker: Arc<SyncTracker>,
    copy_timeout: Duration,
    sync_timeout: Duration,
}

impl TransferEngine {
    /// Creates an engine with production timeouts.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, bus: EventBus) -> Self {
        Self::with_timeouts(runtime, bus, COPY_TIMEOUT, SYNC_TIMEOUT)
    }

    /// Creates an engine with explicit timeouts.
    pub fn with_timeouts(
        runtime: Arc<dyn ContainerRuntime>,
        bus: EventBus,
        copy_timeout: Duration,
        sync_timeout: Duration,
    ) -> Self {
        Self { runtime, bus, tracker: Arc::new(SyncTracker::new()), copy_timeout, sync_timeout }
    }

    /// Bulk-copies the host tree into the volume (used once, at project
    /// creation). Emits coarse starting/copying/completed progress.
    pub async fn copy_to_volume(
        &self,
        project: ProjectId,
        host_path: &Path,
        volume: &str,
    ) -> Result<()> {
        info!(project = %project, volume = %volume, "starting bulk copy");
        self.publish_copy(project, TransferProgress::starting(COPY_STEPS));

        let bus = self.bus.clone();
        let hooks = HelperHooks {
            on_started: Some(Box::new(move |_: &str| {
                bus.publish(EnvEvent::CopyProgress {
                    project,
                    progress: TransferProgress::copying(50, 0, 2, COPY_STEPS),
                });
            })),
            line_sink: None,
        };

        let spec = copy_spec(host_path, volume);
        match run_helper(&self.runtime, spec, self.copy_timeout, hooks).await {
            Ok(()) => {
                self.publish_copy(project, TransferProgress::completed(COPY_STEPS));
                info!(project = %project, "bulk copy completed");
                Ok(())
            }
            Err(e) => {
                self.publish_copy(project, TransferProgress::failed(2, COPY_STEPS));
                Err(e)
            }
        }
    }

    /// Runs a delta sync in the given direction. Rejected if a sync for the
    /// project is already in flight.
    pub async fn sync(
        &self,
        project: ProjectId,
        direction: SyncDirection,
        host_path: &Path,
        volume: &str,
        options: SyncOptions,
    ) -> Result<()> {
        if let Err(active) = self.tracker.begin(project, direction) {
            return Err(TransferError::AlreadySyncing { direction: active });
        }

        info!(project = %project, ?direction, "starting sync");
        self.publish_sync(project, direction, TransferProgress::starting(1));

        let result = self
            .run_sync(project, direction, host_path, volume, options)
            .await;

        let cancelled = self.tracker.finish(project);
        match result {
            Ok(()) => {
                self.publish_sync(project, direction, TransferProgress::completed(1));
                info!(project = %project, ?direction, "sync completed");
                Ok(())
            }
            Err(e) => {
                self.publish_sync(project, direction, TransferProgress::failed(1, 1));
                if cancelled {
                    info!(project = %project, "sync cancelled");
                    Err(TransferError::Cancelled)
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn run_sync(
        &self,
        project: ProjectId,
        direction: SyncDirection,
        host_path: &Path,
        volume: &str,
        options: SyncOptions,
    ) -> Result<()> {
        let tracker_bus = self.bus.clone();
        let sink_bus = self.bus.clone();

        let spec = sync_spec(direction, host_path, volume, options);
        let tracker = Arc::clone(&self.tracker);
        let hooks = HelperHooks {
            // The helper name is exposed the moment the container is up, so
            // a cancel request can stop it out-of-band.
            on_started: Some(Box::new(move |name: &str| {
                tracker.set_helper(project, name);
                tracker_bus.publish(EnvEvent::SyncProgress {
                    project,
                    direction,
                    progress: TransferProgress::copying(0, 0, 1, 1),
                });
            })),
            line_sink: Some(Box::new(move |chunk: &str| {
                for line in split_chunk(chunk) {
                    if let Some((bytes, percent)) = parse_progress_line(line) {
                        sink_bus.publish(EnvEvent::SyncProgress {
                            project,
                            direction,
                            progress: TransferProgress::copying(percent, bytes, 1, 1),
                        });
                    }
                }
            })),
        };

        run_helper(&self.runtime, spec, self.sync_timeout, hooks).await
    }

    /// Requests cancellation of the project's active sync. Returns `false`
    /// if no sync was active. The helper is stopped out-of-band; the
    /// in-flight wait resolves through the normal failure path and cleanup
    /// still runs.
    pub async fn cancel_sync(&self, project: ProjectId) -> Result<bool> {
        match self.tracker.request_cancel(project) {
            CancelSignal::NotSyncing => Ok(false),
            CancelSignal::Flagged => Ok(true),
            CancelSignal::StopHelper(helper) => {
                if let Err(e) = self.runtime.stop_container(&helper, 0).await {
                    warn!(helper = %helper, error = %e, "failed to stop sync helper");
                }
                Ok(true)
            }
        }
    }

    /// Direction of the project's active sync, if one is in flight.
    pub fn sync_status(&self, project: ProjectId) -> Option<SyncDirection> {
        self.tracker.status(project)
    }

    fn publish_copy(&self, project: ProjectId, progress: TransferProgress) {
        self.bus.publish(EnvEvent::CopyProgress { project, progress });
    }

    fn publish_sync(&self, project: ProjectId, direction: SyncDirection, progress: TransferProgress) {
        self.bus.publish(EnvEvent::SyncProgress { project, direction, progress });
    }
}

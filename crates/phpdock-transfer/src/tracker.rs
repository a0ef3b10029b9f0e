//! Per-project sync status tracking.
//!
//! A project can have at most one sync in flight. The tracker records the
//! direction and, once the helper has started, its container name, so a
//! cancel request can stop the helper out-of-band while the in-flight wait
//! resolves through the normal failure path.

use phpdock_core::{ProjectId, SyncDirection};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug)]
struct ActiveSync {
    direction: SyncDirection,
    helper: Option<String>,
    cancel_requested: bool,
}

/// Result of a cancel request.
#[derive(Debug, PartialEq, Eq)]
pub enum CancelSignal {
    /// No sync is active for the project.
    NotSyncing,

    /// Cancel recorded; the helper has not started yet.
    Flagged,

    /// Cancel recorded; this helper container should be stopped.
    StopHelper(String),
}

/// Tracks in-flight syncs keyed by project id.
#[derive(Default)]
pub struct SyncTracker {
    active: Mutex<HashMap<ProjectId, ActiveSync>>,
}

impl SyncTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new sync. Returns the direction of the existing sync if
    /// one is already active for the project.
    pub fn begin(&self, project: ProjectId, direction: SyncDirection) -> Result<(), SyncDirection> {
        let mut active = self.active.lock().unwrap();
        if let Some(existing) = active.get(&project) {
            return Err(existing.direction);
        }
        active.insert(project, ActiveSync { direction, helper: None, cancel_requested: false });
        Ok(())
    }

    /// Records the helper container name once it has started.
    pub fn set_helper(&self, project: ProjectId, helper: &str) {
        if let Some(sync) = self.active.lock().unwrap().get_mut(&project) {
            sync.helper = Some(helper.to_string());
        }
    }

    /// Marks the sync as cancelled and reports what the caller must do.
    pub fn request_cancel(&self, project: ProjectId) -> CancelSignal {
        let mut active = self.active.lock().unwrap();
        match active.get_mut(&project) {
            None => CancelSignal::NotSyncing,
            Some(sync) => {
                sync.cancel_requested = true;
                match &sync.helper {
                    Some(helper) => CancelSignal::StopHelper(helper.clone()),
                    None => CancelSignal::Flagged,
                }
            }
        }
    }

    /// Removes the entry and returns whether a cancel had been requested.
    pub fn finish(&self, project: ProjectId) -> bool {
        self.active
            .lock()
            .unwrap()
            .remove(&project)
            .map(|sync| sync.cancel_requested)
            .unwrap_or(false)
    }

    /// Direction of the active sync for a project, if any.
    pub fn status(&self, project: ProjectId) -> Option<SyncDirection> {
        self.active.lock().unwrap().get(&project).map(|s| s.direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_sync_for_same_project_is_rejected() {
        let tracker = SyncTracker::new();
        let project = ProjectId::new();

        tracker.begin(project, SyncDirection::HostToVolume).unwrap();
        let err = tracker.begin(project, SyncDirection::VolumeToHost).unwrap_err();
        assert_eq!(err, SyncDirection::HostToVolume);

        // A different project is unaffected.
        tracker.begin(ProjectId::new(), SyncDirection::VolumeToHost).unwrap();
    }

    #[test]
    fn cancel_before_helper_start_is_flagged() {
        let tracker = SyncTracker::new();
        let project = ProjectId::new();
        tracker.begin(project, SyncDirection::HostToVolume).unwrap();

        assert_eq!(tracker.request_cancel(project), CancelSignal::Flagged);
        assert!(tracker.finish(project));
    }

    #[test]
    fn cancel_after_helper_start_names_the_helper() {
        let tracker = SyncTracker::new();
        let project = ProjectId::new();
        tracker.begin(project, SyncDirection::VolumeToHost).unwrap();
        tracker.set_helper(project, "phpdock_helper_sync_abc");

        assert_eq!(
            tracker.request_cancel(project),
            CancelSignal::StopHelper("phpdock_helper_sync_abc".to_string())
        );
    }

    #[test]
    fn finish_releases_the_entry() {
        let tracker = SyncTracker::new();
        let project = ProjectId::new();
        tracker.begin(project, SyncDirection::HostToVolume).unwrap();
        assert_eq!(tracker.status(project), Some(SyncDirection::HostToVolume));

        assert!(!tracker.finish(project));
        assert_eq!(tracker.status(project), None);
        assert_eq!(tracker.request_cancel(project), CancelSignal::NotSyncing);
    }
}

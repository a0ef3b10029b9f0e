//! In-process pub/sub bus for progress and change notifications.
//!
//! Long-running operations are not awaited by their triggering request;
//! progress is delivered out-of-band through this bus, keyed by project or
//! service id, and forwarded to the UI layer by the subscriber.

use crate::progress::{SyncDirection, TransferProgress};
use crate::types::{ProjectId, ServiceId};
use tokio::sync::broadcast;

/// Events published by the orchestration crates.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvEvent {
    /// Bulk copy progress for a project.
    CopyProgress { project: ProjectId, progress: TransferProgress },

    /// Sync progress for a project.
    SyncProgress {
        project: ProjectId,
        direction: SyncDirection,
        progress: TransferProgress,
    },

    /// Image pull progress during a service install.
    PullProgress {
        service: ServiceId,
        status: String,
        current: Option<i64>,
        total: Option<i64>,
    },

    /// The set of persisted projects changed.
    ProjectsChanged,

    /// A service was installed, removed, started, or stopped.
    ServiceChanged { service: ServiceId },
}

/// Broadcast bus carrying [`EnvEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EnvEvent>,
}

impl EventBus {
    /// Creates a new bus with the provided channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// Publishing with no subscribers is not an error; progress producers do
    /// not care whether anyone is listening.
    pub fn publish(&self, event: EnvEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribes to all future events.
    ///
    /// NOTE: `tokio::sync::broadcast` drops older messages if a receiver
    /// lags behind channel capacity. Slow consumers must handle
    /// `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<EnvEvent> {
        self.tx.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::TransferStage;

    #[tokio::test]
    async fn publish_subscribe_round_trip() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let project = ProjectId::new();
        bus.publish(EnvEvent::CopyProgress {
            project,
            progress: TransferProgress::starting(3),
        });

        match rx.recv().await.expect("event should be received") {
            EnvEvent::CopyProgress { project: p, progress } => {
                assert_eq!(p, project);
                assert_eq!(progress.stage, TransferStage::Starting);
            }
            other => panic!("unexpected event variant: {other:?}"),
        }
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.publish(EnvEvent::ProjectsChanged);
        assert_eq!(bus.subscriber_count(), 0);
    }
}

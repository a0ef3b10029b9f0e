//! Ephemeral transfer progress records.
//!
//! Progress exists only for the duration of an operation and is pushed to
//! observers over the event bus; it is never persisted.

use serde::{Deserialize, Serialize};

/// Stage of a volume transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStage {
    Starting,
    Copying,
    Completed,
    Failed,
}

/// Direction of a bidirectional sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Volume contents overwrite the host tree.
    VolumeToHost,

    /// Host tree overwrites the volume contents.
    HostToVolume,
}

/// A point-in-time snapshot of a transfer operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferProgress {
    /// Current stage.
    pub stage: TransferStage,

    /// Percentage complete, 0-100. Coarse for bulk copies, byte-accurate
    /// for syncs.
    pub percent: u8,

    /// Bytes transferred so far (0 when unknown).
    pub bytes: u64,

    /// Current step, 1-based.
    pub step: u32,

    /// Total steps.
    pub total_steps: u32,
}

impl TransferProgress {
    /// Progress at the start of an operation.
    pub fn starting(total_steps: u32) -> Self {
        Self { stage: TransferStage::Starting, percent: 0, bytes: 0, step: 1, total_steps }
    }

    /// Progress mid-copy.
    pub fn copying(percent: u8, bytes: u64, step: u32, total_steps: u32) -> Self {
        Self { stage: TransferStage::Copying, percent: percent.min(100), bytes, step, total_steps }
    }

    /// Progress at successful completion.
    pub fn completed(total_steps: u32) -> Self {
        Self {
            stage: TransferStage::Completed,
            percent: 100,
            bytes: 0,
            step: total_steps,
            total_steps,
        }
    }

    /// Progress after a failure.
    pub fn failed(step: u32, total_steps: u32) -> Self {
        Self { stage: TransferStage::Failed, percent: 0, bytes: 0, step, total_steps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_clamped() {
        let p = TransferProgress::copying(150, 10, 2, 3);
        assert_eq!(p.percent, 100);
    }

    #[test]
    fn completed_reports_final_step() {
        let p = TransferProgress::completed(3);
        assert_eq!(p.step, 3);
        assert_eq!(p.percent, 100);
        assert_eq!(p.stage, TransferStage::Completed);
    }
}

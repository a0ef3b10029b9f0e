//! Volume transfer engine.
//!
//! Moves file trees between the host filesystem and named volumes by
//! running short-lived helper containers:
//!
//! - [`TransferEngine::copy_to_volume`]: one-shot full-tree copy at project
//!   creation (tar pipe, coarse three-stage progress)
//! - [`TransferEngine::sync`]: repeatable bidirectional delta sync (rsync,
//!   byte-accurate progress, cooperative cancellation)
//!
//! Helper containers are always removed when their operation ends,
//! regardless of success, failure, timeout, or cancellation.

#![warn(missing_docs)]

pub mod copy;
pub mod error;
pub mod helper;
pub mod sync;
pub mod tracker;

mod engine;

pub use engine::TransferEngine;
pub use error::{Result, TransferError};
pub use helper::HELPER_PREFIX;
pub use sync::SyncOptions;

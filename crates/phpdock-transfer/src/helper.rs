//! Short-lived helper container execution.
//!
//! Every transfer runs inside a throwaway container created here. The
//! invariant this module enforces: no helper container outlives its
//! operation. The container is removed on success, on non-zero exit, on
//! timeout, and on cancellation. The result of the run is computed first
//! and removal always happens before it is returned.

use crate::error::{Result, TransferError};
use futures::StreamExt;
use phpdock_runtime::{ContainerRuntime, ContainerSpec};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Name prefix shared by all helper containers.
pub const HELPER_PREFIX: &str = "phpdock_helper_";

/// Lines of helper output captured into a failure.
const LOG_TAIL: usize = 40;

/// Generates a unique helper container name for an operation kind.
pub fn helper_name(kind: &str) -> String {
    format!("{HELPER_PREFIX}{kind}_{}", Uuid::new_v4().simple())
}

/// Hooks observing a helper run.
pub struct HelperHooks {
    /// Called with the container name as soon as the helper has started,
    /// so a stop signal can kill it out-of-band.
    pub on_started: Option<Box<dyn FnOnce(&str) + Send>>,

    /// Receives raw chunks of the helper's output while it runs.
    pub line_sink: Option<Box<dyn FnMut(&str) + Send>>,
}

impl HelperHooks {
    /// Hooks that observe nothing.
    pub fn none() -> Self {
        Self { on_started: None, line_sink: None }
    }
}

/// Creates, starts, and waits for a helper container, enforcing the
/// deadline and the removal guarantee.
pub async fn run_helper(
    runtime: &Arc<dyn ContainerRuntime>,
    spec: ContainerSpec,
    timeout: Duration,
    hooks: HelperHooks,
) -> Result<()> {
    let name = spec.name.clone();
    debug!(helper = %name, image = %spec.image, "launching helper container");

    runtime.create_container(&spec).await?;

    let result = drive_helper(runtime, &name, timeout, hooks).await;

    // Guaranteed cleanup, on every path.
    if let Err(e) = runtime.remove_container(&name, true).await {
        warn!(helper = %name, error = %e, "failed to remove helper container");
    }

    result
}

async fn drive_helper(
    runtime: &Arc<dyn ContainerRuntime>,
    name: &str,
    timeout: Duration,
    hooks: HelperHooks,
) -> Result<()> {
    runtime.start_container(name).await?;

    if let Some(on_started) = hooks.on_started {
        on_started(name);
    }

    // Stream output concurrently with the wait; the task is dropped once
    // the helper settles.
    let log_task = match hooks.line_sink {
        Some(mut sink) => {
            let mut stream = runtime.attach_logs(name).await?;
            Some(tokio::spawn(async move {
                while let Some(Ok(chunk)) = stream.next().await {
                    sink(&chunk);
                }
            }))
        }
        None => None,
    };

    let waited = tokio::time::timeout(timeout, runtime.wait_container(name)).await;

    if let Some(task) = log_task {
        match &waited {
            // Deadline exceeded: the follow stream may never end on its own.
            Err(_) => task.abort(),
            // The container exited, which ends the follow stream; drain the
            // remaining output so no progress line is dropped.
            Ok(_) => {
                let _ = tokio::time::timeout(Duration::from_secs(2), task).await;
            }
        }
    }

    match waited {
        // Losing the race does not abort work the runtime itself hasn't
        // stopped; the removal below tears the helper down.
        Err(_) => Err(TransferError::Timeout {
            operation: format!("helper {name}"),
            seconds: timeout.as_secs(),
        }),
        Ok(Err(e)) => Err(e.into()),
        Ok(Ok(0)) => Ok(()),
        Ok(Ok(code)) => {
            let logs = runtime
                .container_logs(name, LOG_TAIL)
                .await
                .unwrap_or_default();
            Err(TransferError::helper_failed(code, tail(&logs, LOG_TAIL)))
        }
    }
}

/// Last `n` lines of a text block.
fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

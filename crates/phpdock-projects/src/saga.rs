//! Generic compensation stack for multi-step operations.
//!
//! As a pipeline progresses, each completed step pushes the action that
//! undoes it. On failure the stack unwinds in strict reverse order. A
//! compensation that itself fails is logged and skipped; it never masks
//! the error that triggered the unwind.

use futures::future::BoxFuture;
use std::future::Future;
use tracing::{info, warn};

type CompensationFn = Box<dyn FnOnce() -> BoxFuture<'static, std::result::Result<(), String>> + Send>;

struct Compensation {
    label: String,
    run: CompensationFn,
}

/// Stack of compensating actions, executed LIFO on unwind.
#[derive(Default)]
pub struct CompensationStack {
    actions: Vec<Compensation>,
}

impl CompensationStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the compensation for a step that just succeeded.
    pub fn push<F, Fut>(&mut self, label: impl Into<String>, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<(), String>> + Send + 'static,
    {
        self.actions.push(Compensation {
            label: label.into(),
            run: Box::new(move || Box::pin(action())),
        });
    }

    /// Number of registered compensations.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True when nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Drops all compensations without running them (the success path).
    pub fn discard(mut self) {
        self.actions.clear();
    }

    /// Runs all compensations in reverse registration order. Returns the
    /// number of compensations that failed.
    pub async fn unwind(self) -> usize {
        let total = self.actions.len();
        let mut failures = 0;

        for compensation in self.actions.into_iter().rev() {
            info!(step = %compensation.label, "rolling back");
            if let Err(e) = (compensation.run)().await {
                warn!(step = %compensation.label, error = %e, "compensation failed");
                failures += 1;
            }
        }

        if total > 0 {
            info!(total, failures, "rollback finished");
        }
        failures
    }
}

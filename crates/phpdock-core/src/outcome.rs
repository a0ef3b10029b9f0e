//! The uniform result envelope.
//!
//! Every orchestration entry point exposed to the UI layer returns an
//! [`Outcome`] instead of letting errors cross the IPC boundary. The UI
//! never needs to distinguish error types structurally, only by message.

use serde::Serialize;

/// `{success, data?, error?}` envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome<T> {
    /// Whether the operation succeeded.
    pub success: bool,

    /// Payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    /// Human-readable error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Outcome<T> {
    /// Successful outcome with a payload.
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    /// Failed outcome with a message.
    pub fn failure(error: impl ToString) -> Self {
        Self { success: false, data: None, error: Some(error.to_string()) }
    }

    /// Converts a `Result` into an envelope, stringifying the error.
    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failure(e),
        }
    }
}

impl Outcome<()> {
    /// Successful outcome with no payload.
    pub fn done() -> Self {
        Self { success: true, data: None, error: None }
    }
}

//! Bridge error type.

use kestrel_rti::RuntimeError;
use thiserror::Error;

/// A failure moving a message across the worker boundary.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message nesting exceeds {limit} levels")]
    TooDeep { limit: usize },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

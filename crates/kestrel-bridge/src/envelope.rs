//! The error envelope posted to the host when a request fails.
//!
//! ```text
//! {"$IsolateException": {"error": "Bad state: ...", "stack": "..."}}
//! ```

use crate::error::BridgeError;
use kestrel_rti::Thrown;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolateException {
    pub error: String,
    pub stack: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExceptionEnvelope {
    #[serde(rename = "$IsolateException")]
    pub exception: IsolateException,
}

impl ExceptionEnvelope {
    pub fn new(error: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            exception: IsolateException {
                error: error.into(),
                stack: stack.into(),
            },
        }
    }

    pub fn from_thrown(thrown: &Thrown) -> Self {
        Self::new(thrown.value.to_string(), thrown.stack.as_str())
    }

    /// An envelope for a failure that never became a runtime throw.
    pub fn from_bridge_error(err: &BridgeError) -> Self {
        Self::new(err.to_string(), "")
    }

    pub fn to_json(&self) -> Result<String, BridgeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Recognise an envelope in message text. Anything else yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

//! Worker Message Bridge
//!
//! Moves structural data between a kestrel worker and its host:
//!
//! - **Codec**: JSON ↔ runtime values, with opaque markers for values that
//!   have no structural form
//! - **Envelope**: the `$IsolateException` shape used to report failures
//! - **Worker**: decode, dispatch to the request handler, post the reply
pub mod codec;
pub mod envelope;
pub mod error;
pub mod worker;

pub use codec::{MessageCodec, OPAQUE_KEY};
pub use envelope::{ExceptionEnvelope, IsolateException};
pub use error::BridgeError;
pub use worker::{MessagePort, RequestHandler, WorkerBridge};

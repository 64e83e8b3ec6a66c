//! Request/reply bridge between a worker runtime and its host.
//!
//! The host posts JSON text in; the bridge decodes it, hands the value to
//! the worker's request handler and posts the encoded result back once it
//! is available. Handlers may answer with a future, in which case the reply
//! waits for it. Any failure along the way is posted as an
//! [`ExceptionEnvelope`] instead of a reply.

use crate::codec::MessageCodec;
use crate::envelope::ExceptionEnvelope;
use crate::error::BridgeError;
use kestrel_async::{Future, Runtime};
use kestrel_rti::{Thrown, TypeId, Value};
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, warn};

/// Outbound side of the channel to the host.
pub trait MessagePort {
    fn post_message(&self, text: String);
}

/// Worker-side request handler.
pub type RequestHandler = Rc<dyn Fn(Value) -> Result<Value, Thrown>>;

pub struct WorkerBridge {
    runtime: Runtime,
    codec: MessageCodec,
    port: Rc<dyn MessagePort>,
    handler: RequestHandler,
    received: Cell<u64>,
}

impl WorkerBridge {
    pub fn new(
        runtime: &Runtime,
        port: Rc<dyn MessagePort>,
        handler: impl Fn(Value) -> Result<Value, Thrown> + 'static,
    ) -> Self {
        Self {
            runtime: runtime.clone(),
            codec: MessageCodec::new(runtime.universe().clone()),
            port,
            handler: Rc::new(handler),
            received: Cell::new(0),
        }
    }

    pub fn codec(&self) -> &MessageCodec {
        &self.codec
    }

    /// Number of inbound messages seen so far, malformed ones included.
    pub fn received(&self) -> u64 {
        self.received.get()
    }

    /// Handle one inbound message.
    ///
    /// Returns a future that completes once the reply (or error envelope)
    /// has been posted. Malformed text is answered immediately.
    pub fn on_message(&self, text: &str) -> Future {
        self.received.set(self.received.get() + 1);
        let request = match self.codec.decode_str(text) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "rejecting inbound message");
                post_envelope(&*self.port, &ExceptionEnvelope::from_bridge_error(&err));
                return Future::value(&self.runtime, Value::Null);
            }
        };
        debug!(message = self.received.get(), "dispatching request");

        let handler = self.handler.clone();
        let pending = Future::sync(&self.runtime, move || handler(request));

        let codec = self.codec.clone();
        let reply_port = self.port.clone();
        let error_port = self.port.clone();
        pending.then_with(
            TypeId::DYNAMIC,
            move |result| {
                if let Err(err) = post_value(&codec, &*reply_port, &result) {
                    warn!(error = %err, "reply could not be encoded");
                    post_envelope(&*reply_port, &ExceptionEnvelope::from_bridge_error(&err));
                }
                Ok(Value::Null)
            },
            Some(move |thrown: Thrown| {
                post_envelope(&*error_port, &ExceptionEnvelope::from_thrown(&thrown));
                Ok(Value::Null)
            }),
        )
    }

    /// Post an unsolicited value to the host.
    pub fn post(&self, value: &Value) -> Result<(), BridgeError> {
        post_value(&self.codec, &*self.port, value)
    }

    /// Post an error envelope to the host.
    pub fn post_error(&self, thrown: &Thrown) {
        post_envelope(&*self.port, &ExceptionEnvelope::from_thrown(thrown));
    }
}

fn post_value(codec: &MessageCodec, port: &dyn MessagePort, value: &Value) -> Result<(), BridgeError> {
    let text = codec.encode_to_string(value)?;
    port.post_message(text);
    Ok(())
}

fn post_envelope(port: &dyn MessagePort, envelope: &ExceptionEnvelope) {
    match envelope.to_json() {
        Ok(text) => port.post_message(text),
        Err(err) => warn!(error = %err, "dropping error envelope"),
    }
}

#[cfg(test)]
#[path = "../tests/worker_tests.rs"]
mod tests;

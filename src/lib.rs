//! Kestrel
//!
//! An embeddable object-model runtime for code compiled from a language with
//! reified generics and cooperative asynchrony:
//!
//! - [`rti`]: type recipes, interning, subtype and instance checks, runtime
//!   values, closures and host-object interceptors
//! - [`async_rt`]: microtask scheduler, virtual timers, zones, futures and
//!   streams
//! - [`bridge`]: the structural message bridge between a worker and its host
//!
//! [`Isolate`] ties the layers together behind one [`RuntimeConfig`].

pub mod config;
pub mod isolate;
pub mod tracing_config;

pub use kestrel_async as async_rt;
pub use kestrel_bridge as bridge;
pub use kestrel_common as common;
pub use kestrel_rti as rti;

pub use config::{ConfigError, RuntimeConfig, load_config, parse_config};
pub use isolate::Isolate;
pub use kestrel_async::{Completer, Future, Runtime, Stream, StreamController, Zone, ZoneSpec};
pub use kestrel_bridge::{ExceptionEnvelope, MessageCodec, MessagePort, WorkerBridge};
pub use kestrel_rti::{RuntimeError, Thrown, TypeId, TypeUniverse, Value};
pub use tracing_config::init_tracing;

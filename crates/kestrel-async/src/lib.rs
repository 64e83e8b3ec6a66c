//! Cooperative single-threaded async runtime.
//!
//! - [`Scheduler`]: FIFO microtask queue drained to exhaustion, plus
//!   virtual-clock timers
//! - [`Zone`]: execution contexts with error handlers, captured when a
//!   callback is registered and restored around its invocation
//! - [`Future`] / [`Completer`]: single-assignment results with ordered,
//!   never-synchronous continuations and future-of-future chaining
//! - [`StreamController`] / [`Subscription`]: event sequences with pause
//!   buffering and idempotent cancellation
//!
//! Rust `async` blocks run on the same queue through
//! [`Runtime::spawn_async`], and runtime futures can be `.await`ed.
pub mod config;
pub mod future;
pub mod runtime;
pub mod scheduler;
pub mod stream;
pub mod zone;

pub use config::AsyncConfig;
pub use future::{Completer, Future, FutureAwait, Outcome};
pub use runtime::{HostHooks, Runtime, WeakRuntime};
pub use scheduler::{Scheduler, Task, TimerId};
pub use stream::{Handlers, Stream, StreamController, StreamEvent, Subscription};
pub use zone::{ErrorHandler, ScheduleHook, Zone, ZoneSpec};

//! One self-contained runtime instance.
//!
//! An [`Isolate`] owns the type universe and the scheduler built from a
//! [`RuntimeConfig`]. Nothing is shared between isolates; two of them can
//! live on the same thread without observing each other's types, queues or
//! uncaught errors.

use crate::config::{RuntimeConfig, load_config};
use kestrel_async::Runtime;
use kestrel_bridge::{MessagePort, WorkerBridge};
use kestrel_rti::{DecodeError, Thrown, TypeId, TypeUniverse, Value};
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

pub struct Isolate {
    config: RuntimeConfig,
    runtime: Runtime,
}

impl Isolate {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        debug!(?config, "creating isolate");
        let universe = Rc::new(TypeUniverse::with_limits(config.rti.limits()));
        let runtime = Runtime::with_config(universe, config.scheduler.async_config());
        Self { config, runtime }
    }

    pub fn from_config_file(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::with_config(load_config(path)?))
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn universe(&self) -> &Rc<TypeUniverse> {
        self.runtime.universe()
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Evaluate a type recipe against this isolate's universe.
    pub fn eval(&self, recipe: &str) -> Result<TypeId, DecodeError> {
        self.universe().eval(recipe)
    }

    /// A message bridge that answers host requests with `handler`.
    pub fn worker(
        &self,
        port: Rc<dyn MessagePort>,
        handler: impl Fn(Value) -> Result<Value, Thrown> + 'static,
    ) -> WorkerBridge {
        WorkerBridge::new(&self.runtime, port, handler)
    }

    /// Drain microtasks and fire every timer until nothing is left.
    pub fn run_until_idle(&self) {
        self.runtime.run_until_idle();
    }
}

impl Default for Isolate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "tests/isolate_tests.rs"]
mod tests;

//! Execution contexts.
//!
//! A [`Zone`] carries an uncaught-error handler, an optional microtask
//! scheduling hook and a set of zone-local values. Zones form a tree: a
//! child keeps its parent alive, a parent never refers to its children.
//!
//! The runtime tracks the *current* zone. Every scheduling entry point binds
//! the callback to the zone current at registration time, so continuations
//! run with the zone that was active when they were registered rather than
//! whatever happens to be current when the queue reaches them.

use crate::runtime::Runtime;
use crate::scheduler::Task;
use kestrel_rti::{Thrown, Value};
use rustc_hash::FxHashMap;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

/// Handles an error that escaped a callback running in the zone.
///
/// The handler runs in the zone's parent. Returning `Err` forwards the
/// (possibly replaced) error to the parent's handler.
pub type ErrorHandler = Rc<dyn Fn(Thrown) -> Result<(), Thrown>>;

/// Intercepts microtask scheduling for a zone.
///
/// The hook receives the task and a delegate that schedules through the
/// parent zone. It may wrap the task, delegate it any number of times, or
/// drop it.
pub type ScheduleHook = Rc<dyn Fn(Task, &dyn Fn(Task))>;

thread_local! {
    static NEXT_ZONE_ID: Cell<u64> = const { Cell::new(0) };
}

fn next_zone_id() -> u64 {
    NEXT_ZONE_ID.with(|next| {
        let id = next.get();
        next.set(id + 1);
        id
    })
}

/// Configuration for [`Zone::fork`].
#[derive(Default)]
pub struct ZoneSpec {
    name: Option<Rc<str>>,
    error_handler: Option<ErrorHandler>,
    schedule_hook: Option<ScheduleHook>,
    values: FxHashMap<Rc<str>, Value>,
}

impl ZoneSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(Rc::from(name));
        self
    }

    pub fn on_error(mut self, handler: impl Fn(Thrown) -> Result<(), Thrown> + 'static) -> Self {
        self.error_handler = Some(Rc::new(handler));
        self
    }

    pub fn on_schedule(mut self, hook: impl Fn(Task, &dyn Fn(Task)) + 'static) -> Self {
        self.schedule_hook = Some(Rc::new(hook));
        self
    }

    pub fn value(mut self, key: &str, value: Value) -> Self {
        self.values.insert(Rc::from(key), value);
        self
    }
}

struct ZoneInner {
    id: u64,
    name: Rc<str>,
    parent: Option<Zone>,
    error_handler: Option<ErrorHandler>,
    schedule_hook: Option<ScheduleHook>,
    values: FxHashMap<Rc<str>, Value>,
}

/// An immutable execution context. Cloning shares the zone.
#[derive(Clone)]
pub struct Zone(Rc<ZoneInner>);

impl Zone {
    pub(crate) fn root() -> Zone {
        Zone(Rc::new(ZoneInner {
            id: next_zone_id(),
            name: Rc::from("root"),
            parent: None,
            error_handler: None,
            schedule_hook: None,
            values: FxHashMap::default(),
        }))
    }

    /// Create a child zone.
    pub fn fork(&self, spec: ZoneSpec) -> Zone {
        let id = next_zone_id();
        let name = spec
            .name
            .unwrap_or_else(|| Rc::from(format!("zone#{id}").as_str()));
        debug!(zone = %name, parent = %self.0.name, "zone forked");
        Zone(Rc::new(ZoneInner {
            id,
            name,
            parent: Some(self.clone()),
            error_handler: spec.error_handler,
            schedule_hook: spec.schedule_hook,
            values: spec.values,
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn parent(&self) -> Option<&Zone> {
        self.0.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.0.parent.is_none()
    }

    /// Look up a zone-local value, walking towards the root.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut zone = Some(self);
        while let Some(current) = zone {
            if let Some(value) = current.0.values.get(key) {
                return Some(value.clone());
            }
            zone = current.parent();
        }
        None
    }

    /// Nearest zone, starting at `self`, that has an error handler.
    fn handler_zone(&self) -> Option<(&Zone, &ErrorHandler)> {
        let mut zone = Some(self);
        while let Some(current) = zone {
            if let Some(handler) = &current.0.error_handler {
                return Some((current, handler));
            }
            zone = current.parent();
        }
        None
    }
}

impl PartialEq for Zone {
    fn eq(&self, other: &Zone) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Zone {}

impl fmt::Debug for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Zone")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .finish()
    }
}

/// Restores the previously current zone when dropped.
struct ZoneRestore<'a> {
    runtime: &'a Runtime,
    previous: Option<Zone>,
}

impl Drop for ZoneRestore<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.runtime.set_current_zone(previous);
        }
    }
}

// =============================================================================
// Zone operations on the runtime
// =============================================================================

impl Runtime {
    /// Run `f` with `zone` as the current zone, restoring the previous zone
    /// afterwards even if `f` unwinds.
    pub fn run_in<R>(&self, zone: &Zone, f: impl FnOnce() -> R) -> R {
        let previous = self.set_current_zone(zone.clone());
        let _restore = ZoneRestore {
            runtime: self,
            previous: Some(previous),
        };
        f()
    }

    /// Run `f` in `zone`, forwarding an error it returns to the zone's
    /// uncaught-error handling.
    pub fn run_guarded(&self, zone: &Zone, f: impl FnOnce() -> Result<(), Thrown>) {
        if let Err(thrown) = self.run_in(zone, f) {
            self.handle_uncaught(zone, thrown);
        }
    }

    /// Capture the current zone and return a task that runs `f` guarded in
    /// it.
    pub fn bind_callback(&self, f: impl FnOnce() -> Result<(), Thrown> + 'static) -> Task {
        let zone = self.current_zone();
        let runtime = self.downgrade();
        Box::new(move || match runtime.upgrade() {
            Some(runtime) => runtime.run_guarded(&zone, f),
            None => {
                if let Err(thrown) = f() {
                    warn!(error = %thrown, "callback failed after its runtime was dropped");
                }
            }
        })
    }

    /// Capture the current zone for a one-argument callback. Errors go to
    /// the captured zone's handler.
    pub fn bind_unary<A: 'static>(
        &self,
        f: impl Fn(A) -> Result<(), Thrown> + 'static,
    ) -> Rc<dyn Fn(A)> {
        let zone = self.current_zone();
        let runtime = self.downgrade();
        Rc::new(move |arg: A| match runtime.upgrade() {
            Some(runtime) => runtime.run_guarded(&zone, || f(arg)),
            None => {
                if let Err(thrown) = f(arg) {
                    warn!(error = %thrown, "callback failed after its runtime was dropped");
                }
            }
        })
    }

    /// Deliver an error that escaped a callback running in `zone`.
    ///
    /// The nearest handler on the parent chain runs in its zone's parent. An
    /// error with no handler, or one a handler rethrows past the root, is
    /// surfaced to the host through a priority microtask.
    pub fn handle_uncaught(&self, zone: &Zone, thrown: Thrown) {
        let mut thrown = thrown;
        let mut from = Some(zone.clone());
        while let Some(start) = from.take() {
            let Some((handler_zone, handler)) = start.handler_zone() else {
                break;
            };
            let handler = handler.clone();
            let run_zone = handler_zone.parent().cloned().unwrap_or_else(|| self.root_zone());
            debug!(zone = handler_zone.name(), error = %thrown, "zone handler invoked");
            match self.run_in(&run_zone, || handler(thrown.clone())) {
                Ok(()) => return,
                Err(rethrown) => {
                    thrown = rethrown;
                    from = handler_zone.parent().cloned();
                }
            }
        }
        self.report_to_host(thrown);
    }

    fn report_to_host(&self, thrown: Thrown) {
        let runtime = self.downgrade();
        self.scheduler()
            .schedule_priority_microtask(Box::new(move || {
                let Some(runtime) = runtime.upgrade() else {
                    return;
                };
                warn!(error = %thrown, stack = %thrown.stack, "uncaught error");
                runtime.record_uncaught(thrown.clone());
                runtime.host().report_uncaught(&thrown);
            }));
        self.host().request_drain();
    }

    /// Schedule `task` through `zone`'s scheduling hooks.
    pub(crate) fn schedule_in_zone(&self, zone: &Zone, task: Task) {
        let mut current = Some(zone);
        while let Some(candidate) = current {
            if let Some(hook) = &candidate.0.schedule_hook {
                let runtime = self.downgrade();
                let parent = candidate.parent().cloned();
                let delegate = move |task: Task| {
                    let Some(runtime) = runtime.upgrade() else {
                        return;
                    };
                    match &parent {
                        Some(parent) => runtime.schedule_in_zone(parent, task),
                        None => runtime.enqueue(task),
                    }
                };
                hook(task, &delegate);
                return;
            }
            current = candidate.parent();
        }
        self.enqueue(task);
    }
}

#[cfg(test)]
#[path = "../tests/zone_tests.rs"]
mod tests;

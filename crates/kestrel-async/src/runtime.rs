//! The async runtime: scheduler, zones, host hooks and the `async` bridge.
//!
//! A [`Runtime`] is a cheap handle; clones share the same scheduler and
//! zone state. Runtime objects (futures, streams, bound callbacks) hold a
//! [`WeakRuntime`] so that queued work never keeps the runtime alive.

use crate::config::AsyncConfig;
use crate::future::{Completer, Future};
use crate::scheduler::{Scheduler, Task, TimerId};
use crate::zone::Zone;
use kestrel_rti::{Thrown, TypeId, TypeUniverse, Value};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::{Cell, RefCell};
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Wake, Waker};
use tracing::{debug, trace};

/// Callbacks into the embedding host.
pub trait HostHooks {
    /// Work was queued; the host should call [`Runtime::run_microtasks`]
    /// before yielding to its own event loop.
    fn request_drain(&self) {}

    /// An error escaped every zone handler.
    fn report_uncaught(&self, _thrown: &Thrown) {}
}

struct NoHost;

impl HostHooks for NoHost {}

type AsyncBody = Pin<Box<dyn std::future::Future<Output = Result<Value, Thrown>>>>;

struct AsyncTask {
    body: AsyncBody,
    completer: Completer,
    zone: Zone,
}

/// Wake list shared with `std::task::Waker`s, which must be `Send + Sync`.
type WakeList = Arc<Mutex<Vec<u64>>>;

struct TaskWaker {
    id: u64,
    wakes: WakeList,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.wakes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(self.id);
    }
}

pub(crate) struct RuntimeInner {
    universe: Rc<TypeUniverse>,
    scheduler: Scheduler,
    root_zone: Zone,
    current_zone: RefCell<Zone>,
    config: AsyncConfig,
    host: RefCell<Rc<dyn HostHooks>>,
    uncaught: RefCell<Vec<Thrown>>,
    tasks: RefCell<FxHashMap<u64, AsyncTask>>,
    next_task: Cell<u64>,
    wakes: WakeList,
}

/// Handle to a single-threaded cooperative runtime.
#[derive(Clone)]
pub struct Runtime(Rc<RuntimeInner>);

/// Non-owning runtime handle.
#[derive(Clone)]
pub struct WeakRuntime(Weak<RuntimeInner>);

impl WeakRuntime {
    pub fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(Runtime)
    }
}

impl Runtime {
    pub fn new(universe: Rc<TypeUniverse>) -> Self {
        Self::with_config(universe, AsyncConfig::default())
    }

    pub fn with_config(universe: Rc<TypeUniverse>, config: AsyncConfig) -> Self {
        let root_zone = Zone::root();
        debug!(?config, "runtime created");
        Runtime(Rc::new(RuntimeInner {
            universe,
            scheduler: Scheduler::new(),
            current_zone: RefCell::new(root_zone.clone()),
            root_zone,
            config,
            host: RefCell::new(Rc::new(NoHost)),
            uncaught: RefCell::new(Vec::new()),
            tasks: RefCell::new(FxHashMap::default()),
            next_task: Cell::new(0),
            wakes: Arc::new(Mutex::new(Vec::new())),
        }))
    }

    /// Install the host callbacks.
    pub fn set_host(&self, host: Rc<dyn HostHooks>) {
        *self.0.host.borrow_mut() = host;
    }

    pub(crate) fn host(&self) -> Rc<dyn HostHooks> {
        self.0.host.borrow().clone()
    }

    pub fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Rc::downgrade(&self.0))
    }

    pub fn universe(&self) -> &Rc<TypeUniverse> {
        &self.0.universe
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.0.scheduler
    }

    pub fn config(&self) -> &AsyncConfig {
        &self.0.config
    }

    // =========================================================================
    // Zones
    // =========================================================================

    pub fn root_zone(&self) -> Zone {
        self.0.root_zone.clone()
    }

    pub fn current_zone(&self) -> Zone {
        self.0.current_zone.borrow().clone()
    }

    /// Replace the current zone, returning the previous one.
    pub(crate) fn set_current_zone(&self, zone: Zone) -> Zone {
        self.0.current_zone.replace(zone)
    }

    pub(crate) fn record_uncaught(&self, thrown: Thrown) {
        self.0.uncaught.borrow_mut().push(thrown);
    }

    /// Errors that reached the host so far.
    pub fn uncaught_errors(&self) -> Vec<Thrown> {
        self.0.uncaught.borrow().clone()
    }

    pub fn take_uncaught_errors(&self) -> Vec<Thrown> {
        std::mem::take(&mut *self.0.uncaught.borrow_mut())
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Queue a task without zone binding. Used for work that is already
    /// bound, such as future listener delivery.
    pub(crate) fn enqueue(&self, task: Task) {
        let was_idle = self.0.scheduler.pending_microtasks() == 0;
        self.0.scheduler.schedule_microtask(task);
        if was_idle && !self.0.scheduler.is_draining() {
            self.host().request_drain();
        }
    }

    /// Schedule `f` to run after the current synchronous turn, in the zone
    /// that is current now. An error it returns goes to that zone's handler.
    pub fn schedule_microtask(&self, f: impl FnOnce() -> Result<(), Thrown> + 'static) {
        let zone = self.current_zone();
        let task = self.bind_callback(f);
        self.schedule_in_zone(&zone, task);
    }

    /// Schedule `f` to run once `delay_ms` of virtual time has passed.
    pub fn schedule_timer(
        &self,
        delay_ms: u64,
        f: impl FnOnce() -> Result<(), Thrown> + 'static,
    ) -> TimerId {
        let task = self.bind_callback(f);
        self.0.scheduler.schedule_timer(delay_ms, task)
    }

    pub fn cancel_timer(&self, id: TimerId) -> bool {
        self.0.scheduler.cancel_timer(id)
    }

    /// Drain the microtask queue, including `async` tasks woken while
    /// draining.
    pub fn run_microtasks(&self) -> usize {
        let mut total = 0;
        loop {
            let ran = self.0.scheduler.drain();
            total += ran;
            if ran == 0 && !self.process_wakes() {
                break;
            }
        }
        total
    }

    /// Advance the virtual clock by `ms`, firing due timers.
    pub fn advance(&self, ms: u64) {
        self.run_microtasks();
        self.0.scheduler.advance(ms);
        self.run_microtasks();
    }

    /// Run until no microtasks or timers remain.
    pub fn run_until_idle(&self) {
        loop {
            self.run_microtasks();
            if self.0.scheduler.pending_timers() == 0 {
                break;
            }
            self.0.scheduler.run_until_idle();
        }
    }

    // =========================================================================
    // Native async bridge
    // =========================================================================

    /// Drive a Rust `async` block on the microtask queue.
    ///
    /// The body is polled immediately, so it runs synchronously up to its
    /// first suspension. The returned future completes with its result.
    pub fn spawn_async<F>(&self, body: F) -> Future
    where
        F: std::future::Future<Output = Result<Value, Thrown>> + 'static,
    {
        self.spawn_async_typed(TypeId::DYNAMIC, body)
    }

    pub fn spawn_async_typed<F>(&self, value_type: TypeId, body: F) -> Future
    where
        F: std::future::Future<Output = Result<Value, Thrown>> + 'static,
    {
        let completer = Completer::new(self, value_type);
        let future = completer.future();
        let id = self.0.next_task.get();
        self.0.next_task.set(id + 1);
        self.0.tasks.borrow_mut().insert(
            id,
            AsyncTask {
                body: Box::pin(body),
                completer,
                zone: self.current_zone(),
            },
        );
        trace!(task = id, "async task spawned");
        self.poll_task(id);
        future
    }

    fn poll_task(&self, id: u64) {
        // Taken out of the table so the body can spawn or wake freely.
        let Some(mut task) = self.0.tasks.borrow_mut().remove(&id) else {
            return;
        };
        let waker = Waker::from(Arc::new(TaskWaker {
            id,
            wakes: self.0.wakes.clone(),
        }));
        let mut cx = Context::from_waker(&waker);
        let zone = task.zone.clone();
        let poll = self.run_in(&zone, || task.body.as_mut().poll(&mut cx));
        match poll {
            Poll::Ready(result) => {
                trace!(task = id, ok = result.is_ok(), "async task finished");
                let completed = match result {
                    Ok(value) => task.completer.complete(value),
                    Err(thrown) => task.completer.complete_error(thrown),
                };
                if let Err(err) = completed {
                    debug!(task = id, error = %err, "async task completed twice");
                }
            }
            Poll::Pending => {
                self.0.tasks.borrow_mut().insert(id, task);
            }
        }
    }

    /// Turn pending wake-ups into poll microtasks. Returns whether any were
    /// queued.
    pub(crate) fn process_wakes(&self) -> bool {
        let woken: Vec<u64> = std::mem::take(
            &mut *self
                .0
                .wakes
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        if woken.is_empty() {
            return false;
        }
        let mut seen = FxHashSet::default();
        for id in woken {
            if !seen.insert(id) {
                continue;
            }
            let runtime = self.downgrade();
            self.enqueue(Box::new(move || {
                if let Some(runtime) = runtime.upgrade() {
                    runtime.poll_task(id);
                }
            }));
        }
        true
    }

    /// Number of spawned `async` tasks that have not finished.
    pub fn pending_tasks(&self) -> usize {
        self.0.tasks.borrow().len()
    }
}

#[cfg(test)]
#[path = "../tests/runtime_tests.rs"]
mod tests;

//! Microtask queue and virtual-clock timers.
//!
//! The queue is drained to exhaustion: a microtask scheduled while draining
//! runs in the same drain, after everything queued before it. A drain
//! requested while one is already running is a no-op; the outer loop picks
//! the new work up.
//!
//! Priority microtasks are inserted after the last queued priority entry and
//! before every ordinary entry. The runtime uses them to surface uncaught
//! errors ahead of pending work.
//!
//! Timers run on a virtual clock measured in milliseconds. Time only moves
//! through [`Scheduler::advance`] and [`Scheduler::run_until_idle`]; timers
//! due at the same instant fire in scheduling order.

use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use tracing::trace;

/// A unit of scheduled work.
pub type Task = Box<dyn FnOnce()>;

/// Handle of a scheduled timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

#[derive(Default)]
pub struct Scheduler {
    microtasks: RefCell<VecDeque<Task>>,
    /// Number of priority entries at the front of `microtasks`.
    priority: Cell<usize>,
    draining: Cell<bool>,
    /// Pending timers keyed by (due time, id).
    timers: RefCell<BTreeMap<(u64, TimerId), Task>>,
    due_times: RefCell<FxHashMap<TimerId, u64>>,
    now: Cell<u64>,
    next_timer: Cell<u64>,
}

/// Clears the draining flag even if a task panics.
struct DrainGuard<'a>(&'a Cell<bool>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Microtasks
    // =========================================================================

    /// Append a microtask.
    pub fn schedule_microtask(&self, task: Task) {
        self.microtasks.borrow_mut().push_back(task);
        trace!(queued = self.pending_microtasks(), "microtask scheduled");
    }

    /// Insert a microtask ahead of all ordinary ones.
    pub fn schedule_priority_microtask(&self, task: Task) {
        let index = self.priority.get();
        self.microtasks.borrow_mut().insert(index, task);
        self.priority.set(index + 1);
        trace!(priority = index + 1, "priority microtask scheduled");
    }

    pub fn pending_microtasks(&self) -> usize {
        self.microtasks.borrow().len()
    }

    pub fn is_draining(&self) -> bool {
        self.draining.get()
    }

    fn pop_microtask(&self) -> Option<Task> {
        let task = self.microtasks.borrow_mut().pop_front()?;
        let priority = self.priority.get();
        if priority > 0 {
            self.priority.set(priority - 1);
        }
        Some(task)
    }

    /// Run microtasks until the queue is empty. Returns the number run, or
    /// zero when a drain is already in progress.
    pub fn drain(&self) -> usize {
        if self.draining.replace(true) {
            return 0;
        }
        let _guard = DrainGuard(&self.draining);
        let mut ran = 0;
        while let Some(task) = self.pop_microtask() {
            task();
            ran += 1;
        }
        if ran > 0 {
            trace!(ran, "microtask queue drained");
        }
        ran
    }

    // =========================================================================
    // Timers
    // =========================================================================

    /// Current virtual time in milliseconds.
    pub fn now(&self) -> u64 {
        self.now.get()
    }

    /// Run `task` once, no earlier than `delay_ms` from now.
    pub fn schedule_timer(&self, delay_ms: u64, task: Task) -> TimerId {
        let id = TimerId(self.next_timer.get());
        self.next_timer.set(id.0 + 1);
        let due = self.now.get().saturating_add(delay_ms);
        self.timers.borrow_mut().insert((due, id), task);
        self.due_times.borrow_mut().insert(id, due);
        trace!(timer = id.0, due, "timer scheduled");
        id
    }

    /// Cancel a pending timer. Returns `false` if it already fired or was
    /// cancelled.
    pub fn cancel_timer(&self, id: TimerId) -> bool {
        let Some(due) = self.due_times.borrow_mut().remove(&id) else {
            return false;
        };
        self.timers.borrow_mut().remove(&(due, id)).is_some()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Due time of the earliest pending timer.
    pub fn next_due(&self) -> Option<u64> {
        self.timers.borrow().keys().next().map(|&(due, _)| due)
    }

    /// Remove the earliest timer if it is due at or before `limit`.
    fn pop_due(&self, limit: u64) -> Option<(u64, TimerId, Task)> {
        let mut timers = self.timers.borrow_mut();
        let (&(due, id), _) = timers.iter().next()?;
        if due > limit {
            return None;
        }
        let task = timers.remove(&(due, id))?;
        drop(timers);
        self.due_times.borrow_mut().remove(&id);
        Some((due, id, task))
    }

    fn fire(&self, due: u64, id: TimerId, task: Task) {
        self.now.set(self.now.get().max(due));
        trace!(timer = id.0, now = self.now.get(), "timer fired");
        task();
        self.drain();
    }

    /// Move the clock forward by `ms`, firing due timers in order and
    /// draining microtasks after each one.
    pub fn advance(&self, ms: u64) {
        self.drain();
        let target = self.now.get().saturating_add(ms);
        while let Some((due, id, task)) = self.pop_due(target) {
            self.fire(due, id, task);
        }
        self.now.set(target);
    }

    /// Drain microtasks and fire timers, jumping the clock to each due time,
    /// until nothing is left.
    pub fn run_until_idle(&self) {
        self.drain();
        while let Some((due, id, task)) = self.pop_due(u64::MAX) {
            self.fire(due, id, task);
        }
    }
}

#[cfg(test)]
#[path = "../tests/scheduler_tests.rs"]
mod tests;

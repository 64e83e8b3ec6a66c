//! Single-assignment futures and completers.
//!
//! A [`Future`] moves from pending, optionally through *chained* (waiting
//! on another future), to complete with either a value or an error. Once
//! complete its state never changes again.
//!
//! Listeners fire in registration order, each in its own microtask. A
//! listener added to an already complete future is still scheduled, never
//! invoked synchronously, so the caller of `then` always regains control
//! before the callback runs. Callbacks run in the zone that was current
//! when they were registered, and their microtasks go through that zone's
//! scheduling hook; an error a callback returns becomes the error of the
//! future `then` returned.
//!
//! Unhandled error detection is best effort: a future that completes with
//! an error while nothing listens gets one microtask for a listener to turn
//! up before the error is reported to its zone.

use crate::runtime::{Runtime, WeakRuntime};
use crate::zone::Zone;
use kestrel_rti::{RuntimeError, RuntimeObject, Thrown, TypeId, TypeUniverse, Value};
use smallvec::SmallVec;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use tracing::{debug, trace};

/// How a future completed.
#[derive(Clone, Debug)]
pub enum Outcome {
    Value(Value),
    Error(Thrown),
}

impl Outcome {
    pub fn into_result(self) -> Result<Value, Thrown> {
        match self {
            Outcome::Value(value) => Ok(value),
            Outcome::Error(thrown) => Err(thrown),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }
}

type Callback = Box<dyn FnOnce(Outcome)>;

enum Listener {
    /// User continuation, delivered in a microtask scheduled through the
    /// zone that was current when it was registered.
    Callback { zone: Zone, callback: Callback },
    /// A future chained to this one; settled as soon as this one settles.
    Chain(Future),
}

type Listeners = SmallVec<[Listener; 2]>;

enum FutureState {
    Pending(Listeners),
    Chained {
        source: Future,
        listeners: Listeners,
    },
    Complete(Outcome),
}

pub(crate) struct FutureInner {
    runtime: WeakRuntime,
    universe: Rc<TypeUniverse>,
    value_type: TypeId,
    zone: Zone,
    state: RefCell<FutureState>,
    /// Set once anything listens to the result.
    handled: Cell<bool>,
    /// Listeners registered before completion run synchronously.
    sync: bool,
}

impl fmt::Debug for FutureInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.borrow() {
            FutureState::Pending(_) => "pending",
            FutureState::Chained { .. } => "chained",
            FutureState::Complete(Outcome::Value(_)) => "value",
            FutureState::Complete(Outcome::Error(_)) => "error",
        };
        f.debug_struct("Future")
            .field("value_type", &self.value_type)
            .field("state", &state)
            .finish()
    }
}

impl RuntimeObject for FutureInner {
    fn runtime_type(&self, universe: &TypeUniverse) -> TypeId {
        universe.future(self.value_type)
    }

    fn describe(&self) -> String {
        let ty = self.universe.future(self.value_type);
        format!("Instance of '{}'", self.universe.display(ty))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// A single-assignment asynchronous result.
#[derive(Clone)]
pub struct Future(Rc<FutureInner>);

impl PartialEq for Future {
    fn eq(&self, other: &Future) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Future {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Future {
    pub(crate) fn pending(runtime: &Runtime, value_type: TypeId, sync: bool) -> Future {
        Future(Rc::new(FutureInner {
            runtime: runtime.downgrade(),
            universe: runtime.universe().clone(),
            value_type,
            zone: runtime.current_zone(),
            state: RefCell::new(FutureState::Pending(SmallVec::new())),
            handled: Cell::new(false),
            sync,
        }))
    }

    /// A pending future sharing this one's runtime.
    fn sibling(&self, value_type: TypeId) -> Future {
        let zone = self
            .0
            .runtime
            .upgrade()
            .map_or_else(|| self.0.zone.clone(), |runtime| runtime.current_zone());
        Future(Rc::new(FutureInner {
            runtime: self.0.runtime.clone(),
            universe: self.0.universe.clone(),
            value_type,
            zone,
            state: RefCell::new(FutureState::Pending(SmallVec::new())),
            handled: Cell::new(false),
            sync: false,
        }))
    }

    // =========================================================================
    // Constructors
    // =========================================================================

    /// A future completed with `value`, or chained to it if it is a future.
    pub fn value(runtime: &Runtime, value: Value) -> Future {
        let future = Future::pending(runtime, TypeId::DYNAMIC, false);
        future.resolve(value);
        future
    }

    /// A future completed with `thrown`.
    pub fn error(runtime: &Runtime, thrown: Thrown) -> Future {
        let future = Future::pending(runtime, TypeId::DYNAMIC, false);
        future.settle(Outcome::Error(thrown));
        future
    }

    /// Run `f` now and capture its result.
    pub fn sync(runtime: &Runtime, f: impl FnOnce() -> Result<Value, Thrown>) -> Future {
        let future = Future::pending(runtime, TypeId::DYNAMIC, false);
        future.complete_with(f());
        future
    }

    /// Run `f` in a microtask and capture its result.
    pub fn microtask(
        runtime: &Runtime,
        f: impl FnOnce() -> Result<Value, Thrown> + 'static,
    ) -> Future {
        let future = Future::pending(runtime, TypeId::DYNAMIC, false);
        let target = future.clone();
        runtime.schedule_microtask(move || {
            target.complete_with(f());
            Ok(())
        });
        future
    }

    /// Run `f` once `delay_ms` of virtual time has passed.
    pub fn delayed(
        runtime: &Runtime,
        delay_ms: u64,
        f: impl FnOnce() -> Result<Value, Thrown> + 'static,
    ) -> Future {
        let future = Future::pending(runtime, TypeId::DYNAMIC, false);
        let target = future.clone();
        runtime.schedule_timer(delay_ms, move || {
            target.complete_with(f());
            Ok(())
        });
        future
    }

    /// Wait for every future. Completes with a `List<dynamic>` of the values
    /// in input order, or with the first error.
    pub fn wait(runtime: &Runtime, futures: &[Future]) -> Future {
        let list_type = runtime.universe().interface("List", &[TypeId::DYNAMIC]);
        let result = Future::pending(runtime, list_type, false);
        if futures.is_empty() {
            result.settle(Outcome::Value(Value::list(TypeId::DYNAMIC, Vec::new())));
            return result;
        }

        let values = Rc::new(RefCell::new(vec![Value::Null; futures.len()]));
        let remaining = Rc::new(Cell::new(futures.len()));
        let failed = Rc::new(Cell::new(false));
        for (index, future) in futures.iter().enumerate() {
            let values = values.clone();
            let remaining = remaining.clone();
            let failed = failed.clone();
            let result = result.clone();
            future.add_callback(move |outcome| match outcome {
                Outcome::Value(value) => {
                    values.borrow_mut()[index] = value;
                    remaining.set(remaining.get() - 1);
                    if remaining.get() == 0 && !failed.get() {
                        let items = std::mem::take(&mut *values.borrow_mut());
                        result.settle(Outcome::Value(Value::list(TypeId::DYNAMIC, items)));
                    }
                }
                Outcome::Error(thrown) => {
                    if !failed.replace(true) {
                        result.settle(Outcome::Error(thrown));
                    }
                }
            });
        }
        result
    }

    // =========================================================================
    // Values
    // =========================================================================

    /// The future as a runtime value.
    pub fn to_value(&self) -> Value {
        Value::opaque(self.0.clone())
    }

    /// The future carried by `value`, if it is one.
    pub fn from_value(value: &Value) -> Option<Future> {
        value.downcast_opaque::<FutureInner>().map(Future)
    }

    pub fn value_type(&self) -> TypeId {
        self.0.value_type
    }

    pub fn zone(&self) -> &Zone {
        &self.0.zone
    }

    pub fn is_complete(&self) -> bool {
        matches!(&*self.0.state.borrow(), FutureState::Complete(_))
    }

    pub fn is_chained(&self) -> bool {
        matches!(&*self.0.state.borrow(), FutureState::Chained { .. })
    }

    /// The outcome, once complete.
    pub fn result(&self) -> Option<Outcome> {
        match &*self.0.state.borrow() {
            FutureState::Complete(outcome) => Some(outcome.clone()),
            _ => None,
        }
    }

    // =========================================================================
    // Completion
    // =========================================================================

    fn complete_with(&self, result: Result<Value, Thrown>) {
        match result {
            Ok(value) => self.resolve(value),
            Err(thrown) => self.settle(Outcome::Error(thrown)),
        }
    }

    /// Complete with `value`, chaining instead when it is a future.
    pub(crate) fn resolve(&self, value: Value) {
        if let Some(source) = Future::from_value(&value) {
            self.chain(source);
            return;
        }
        match self.0.universe.cast(value, self.0.value_type) {
            Ok(value) => self.settle(Outcome::Value(value)),
            Err(err) => self.settle(Outcome::Error(Thrown::from(err))),
        }
    }

    /// The future at the end of `source`'s chain, or an error if that chain
    /// leads back to `self`.
    ///
    /// Every future passed on the way is pointed straight at the root, so
    /// later walks through them take one hop.
    fn chain_root(&self, source: &Future) -> Result<Future, RuntimeError> {
        let mut visited: Vec<Future> = Vec::new();
        let mut current = source.clone();
        loop {
            let next = match &*current.0.state.borrow() {
                FutureState::Chained { source, .. } => source.clone(),
                _ => break,
            };
            visited.push(std::mem::replace(&mut current, next));
        }
        // A pending `self` can only show up as the root.
        if current == *self {
            return Err(RuntimeError::argument("Cannot complete a future with itself"));
        }
        if visited.len() > 1 {
            for future in &visited {
                if let FutureState::Chained { source, .. } = &mut *future.0.state.borrow_mut() {
                    *source = current.clone();
                }
            }
        }
        Ok(current)
    }

    /// Wait on `source`, listening on the root of its chain.
    fn chain(&self, source: Future) {
        let root = match self.chain_root(&source) {
            Ok(root) => root,
            Err(err) => {
                self.settle(Outcome::Error(Thrown::from(err)));
                return;
            }
        };
        {
            let mut state = self.0.state.borrow_mut();
            let listeners = match &mut *state {
                FutureState::Pending(listeners) => std::mem::take(listeners),
                FutureState::Chained { .. } | FutureState::Complete(_) => {
                    debug!("chain ignored on a settled future");
                    return;
                }
            };
            *state = FutureState::Chained {
                source: root.clone(),
                listeners,
            };
        }
        trace!("future chained");
        root.add_listener(Listener::Chain(self.clone()));
    }

    /// A chained source's outcome as seen by this future: values are cast
    /// to its type.
    fn adopt(&self, outcome: Outcome) -> Outcome {
        match outcome {
            Outcome::Value(value) => match self.0.universe.cast(value, self.0.value_type) {
                Ok(value) => Outcome::Value(value),
                Err(err) => Outcome::Error(Thrown::from(err)),
            },
            error => error,
        }
    }

    /// Enter the complete state and deliver to listeners. A second
    /// completion is ignored.
    ///
    /// Chained futures settle in the same pass, depth first and in
    /// registration order, from an explicit stack.
    pub(crate) fn settle(&self, outcome: Outcome) {
        let Some(listeners) = self.enter_complete(&outcome) else {
            return;
        };
        let mut pending = vec![(self.clone(), outcome, listeners.into_iter())];
        while let Some((future, outcome, listeners)) = pending.last_mut() {
            let Some(listener) = listeners.next() else {
                pending.pop();
                continue;
            };
            match listener {
                Listener::Callback { zone, callback } => {
                    future.deliver(zone, callback, outcome.clone(), true);
                }
                Listener::Chain(target) => {
                    let outcome = target.adopt(outcome.clone());
                    if let Some(listeners) = target.enter_complete(&outcome) {
                        pending.push((target, outcome, listeners.into_iter()));
                    }
                }
            }
        }
    }

    /// Switch to complete and hand back the listeners to notify, or `None`
    /// if already complete.
    fn enter_complete(&self, outcome: &Outcome) -> Option<Listeners> {
        let listeners = {
            let mut state = self.0.state.borrow_mut();
            let listeners = match &mut *state {
                FutureState::Pending(listeners) => std::mem::take(listeners),
                FutureState::Chained { listeners, .. } => std::mem::take(listeners),
                FutureState::Complete(_) => {
                    debug!("completion ignored on a settled future");
                    return None;
                }
            };
            *state = FutureState::Complete(outcome.clone());
            listeners
        };
        trace!(error = outcome.is_error(), listeners = listeners.len(), "future settled");

        if let Outcome::Error(thrown) = outcome {
            if listeners.is_empty() && !self.0.handled.get() {
                self.schedule_unhandled_check(thrown.clone());
            }
        }
        Some(listeners)
    }

    fn deliver(&self, zone: Zone, callback: Callback, outcome: Outcome, settling: bool) {
        if settling && self.0.sync {
            callback(outcome);
            return;
        }
        if let Some(runtime) = self.0.runtime.upgrade() {
            runtime.schedule_in_zone(&zone, Box::new(move || callback(outcome)));
        }
    }

    fn schedule_unhandled_check(&self, thrown: Thrown) {
        let Some(runtime) = self.0.runtime.upgrade() else {
            return;
        };
        if !runtime.config().report_unhandled_errors {
            return;
        }
        let future = self.clone();
        let weak = runtime.downgrade();
        runtime.schedule_in_zone(
            &self.0.zone,
            Box::new(move || {
                if future.0.handled.get() {
                    return;
                }
                if let Some(runtime) = weak.upgrade() {
                    debug!(error = %thrown, "unhandled future error");
                    runtime.handle_uncaught(&future.0.zone, thrown);
                }
            }),
        );
    }

    fn add_listener(&self, listener: Listener) {
        self.0.handled.set(true);
        let outcome = {
            let mut state = self.0.state.borrow_mut();
            match &mut *state {
                FutureState::Pending(listeners) | FutureState::Chained { listeners, .. } => {
                    listeners.push(listener);
                    return;
                }
                FutureState::Complete(outcome) => outcome.clone(),
            }
        };
        match listener {
            Listener::Callback { zone, callback } => self.deliver(zone, callback, outcome, false),
            Listener::Chain(target) => target.settle(target.adopt(outcome)),
        }
    }

    /// Register `callback` bound to the current zone.
    fn add_callback(&self, callback: impl FnOnce(Outcome) + 'static) {
        let zone = self
            .0
            .runtime
            .upgrade()
            .map_or_else(|| self.0.zone.clone(), |runtime| runtime.current_zone());
        self.add_listener(Listener::Callback {
            zone,
            callback: Box::new(callback),
        });
    }

    // =========================================================================
    // Continuations
    // =========================================================================

    /// Register a value continuation. Errors pass through unchanged.
    pub fn then(&self, on_value: impl FnOnce(Value) -> Result<Value, Thrown> + 'static) -> Future {
        self.then_with(TypeId::DYNAMIC, on_value, None::<fn(Thrown) -> Result<Value, Thrown>>)
    }

    /// Register value and error continuations. The returned future has
    /// `result_type` and completes with whichever continuation ran, chaining
    /// if it produced a future.
    pub fn then_with<V, E>(&self, result_type: TypeId, on_value: V, on_error: Option<E>) -> Future
    where
        V: FnOnce(Value) -> Result<Value, Thrown> + 'static,
        E: FnOnce(Thrown) -> Result<Value, Thrown> + 'static,
    {
        let result = self.sibling(result_type);
        let target = result.clone();
        let zone = result.0.zone.clone();
        let runtime = self.0.runtime.clone();
        self.add_callback(move |outcome| {
            let run = move || match outcome {
                Outcome::Value(value) => on_value(value),
                Outcome::Error(thrown) => match on_error {
                    Some(on_error) => on_error(thrown),
                    None => Err(thrown),
                },
            };
            let produced = match runtime.upgrade() {
                Some(runtime) => runtime.run_in(&zone, run),
                None => run(),
            };
            target.complete_with(produced);
        });
        result
    }

    /// Handle any error. The result has this future's type.
    pub fn catch_error(
        &self,
        on_error: impl FnOnce(Thrown) -> Result<Value, Thrown> + 'static,
    ) -> Future {
        self.then_with(self.0.value_type, Ok::<Value, Thrown>, Some(on_error))
    }

    /// Handle errors for which `test` holds; others pass through.
    pub fn catch_error_where(
        &self,
        test: impl FnOnce(&Thrown) -> bool + 'static,
        on_error: impl FnOnce(Thrown) -> Result<Value, Thrown> + 'static,
    ) -> Future {
        self.then_with(
            self.0.value_type,
            Ok::<Value, Thrown>,
            Some(move |thrown: Thrown| {
                if test(&thrown) {
                    on_error(thrown)
                } else {
                    Err(thrown)
                }
            }),
        )
    }

    /// Run `action` however this future completes, then complete with the
    /// original outcome. If `action` returns a future it is awaited first;
    /// an error from `action` replaces the outcome.
    pub fn when_complete(
        &self,
        action: impl FnOnce() -> Result<Value, Thrown> + 'static,
    ) -> Future {
        let result = self.sibling(self.0.value_type);
        let target = result.clone();
        let zone = result.0.zone.clone();
        let runtime = self.0.runtime.clone();
        self.add_callback(move |outcome| {
            let produced = match runtime.upgrade() {
                Some(runtime) => runtime.run_in(&zone, action),
                None => action(),
            };
            match produced {
                Err(thrown) => target.settle(Outcome::Error(thrown)),
                Ok(value) => match Future::from_value(&value) {
                    Some(pending) => {
                        pending.add_callback(move |done| match done {
                            Outcome::Error(thrown) => target.settle(Outcome::Error(thrown)),
                            Outcome::Value(_) => target.settle(outcome),
                        });
                    }
                    None => target.settle(outcome),
                },
            }
        });
        result
    }

    /// Mark the future handled so an error is not reported as uncaught.
    pub fn ignore(&self) {
        self.0.handled.set(true);
    }
}

// =============================================================================
// Completer
// =============================================================================

/// Producer side of a [`Future`].
pub struct Completer {
    future: Future,
    completed: Cell<bool>,
}

impl Completer {
    /// A completer whose listeners run in microtasks.
    pub fn new(runtime: &Runtime, value_type: TypeId) -> Self {
        Self {
            future: Future::pending(runtime, value_type, false),
            completed: Cell::new(false),
        }
    }

    /// A completer whose already-registered listeners run during
    /// `complete`.
    pub fn sync(runtime: &Runtime, value_type: TypeId) -> Self {
        Self {
            future: Future::pending(runtime, value_type, true),
            completed: Cell::new(false),
        }
    }

    pub fn future(&self) -> Future {
        self.future.clone()
    }

    pub fn is_completed(&self) -> bool {
        self.completed.get()
    }

    fn claim(&self) -> Result<(), RuntimeError> {
        if self.completed.replace(true) {
            return Err(RuntimeError::state("Future already completed"));
        }
        Ok(())
    }

    /// Complete with a value, or chain to it if it is a future.
    pub fn complete(&self, value: Value) -> Result<(), RuntimeError> {
        self.claim()?;
        self.future.resolve(value);
        Ok(())
    }

    pub fn complete_error(&self, thrown: Thrown) -> Result<(), RuntimeError> {
        self.claim()?;
        self.future.settle(Outcome::Error(thrown));
        Ok(())
    }
}

// =============================================================================
// `.await` support
// =============================================================================

/// `std::future::Future` adapter returned by `Future::into_future`.
pub struct FutureAwait {
    future: Future,
    waker: Option<Rc<RefCell<Option<Waker>>>>,
}

impl std::future::IntoFuture for Future {
    type Output = Result<Value, Thrown>;
    type IntoFuture = FutureAwait;

    fn into_future(self) -> FutureAwait {
        FutureAwait {
            future: self,
            waker: None,
        }
    }
}

impl std::future::Future for FutureAwait {
    type Output = Result<Value, Thrown>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(outcome) = this.future.result() {
            this.future.ignore();
            return Poll::Ready(outcome.into_result());
        }
        match &this.waker {
            Some(slot) => {
                *slot.borrow_mut() = Some(cx.waker().clone());
            }
            None => {
                let slot = Rc::new(RefCell::new(Some(cx.waker().clone())));
                let runtime = this.future.0.runtime.clone();
                let listener_slot = slot.clone();
                this.future.add_callback(move |_| {
                    if let Some(waker) = listener_slot.borrow_mut().take() {
                        waker.wake();
                    }
                    if let Some(runtime) = runtime.upgrade() {
                        runtime.process_wakes();
                    }
                });
                this.waker = Some(slot);
            }
        }
        Poll::Pending
    }
}

#[cfg(test)]
#[path = "../tests/future_tests.rs"]
mod tests;

//! Stream controllers and subscriptions.
//!
//! A [`StreamController`] is the producer side; its [`Stream`] hands out
//! [`Subscription`]s. Single-subscription streams accept one listener and
//! buffer events added before it arrives. Broadcast streams fan each event
//! out to every current listener and drop events nobody listens to.
//!
//! Events reach an active subscription synchronously from `add`. While a
//! subscription is paused, or already inside one of its handlers, events
//! queue in its buffer and are flushed in order from microtasks, a bounded
//! batch at a time. Cancelling discards the buffer.

use crate::future::{Completer, Future};
use crate::runtime::{Runtime, WeakRuntime};
use crate::zone::Zone;
use bitflags::bitflags;
use kestrel_rti::{RuntimeError, RuntimeObject, Thrown, TypeId, TypeUniverse, Value};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct ControllerFlags: u8 {
        /// A listener has subscribed (single-subscription only).
        const LISTENED = 1 << 0;
        /// An event is being delivered to the listeners.
        const FIRING = 1 << 1;
        const CLOSED = 1 << 2;
        /// The single listener cancelled.
        const CANCELLED = 1 << 3;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct SubscriptionFlags: u8 {
        const CANCELLED = 1 << 0;
        const DONE = 1 << 1;
        /// One of the handlers is on the stack.
        const DELIVERING = 1 << 2;
        const FLUSH_SCHEDULED = 1 << 3;
        const CANCEL_ON_ERROR = 1 << 4;
    }
}

/// One stream event.
#[derive(Clone, Debug)]
pub enum StreamEvent {
    Data(Value),
    Error(Thrown),
    Done,
}

type DataHandler = Box<dyn FnMut(Value) -> Result<(), Thrown>>;
type ErrorHandler = Box<dyn FnMut(Thrown) -> Result<(), Thrown>>;
type DoneHandler = Box<dyn FnOnce() -> Result<(), Thrown>>;
type Hook = Box<dyn FnMut()>;

/// Callbacks passed to [`Stream::listen`].
#[derive(Default)]
pub struct Handlers {
    on_data: Option<DataHandler>,
    on_error: Option<ErrorHandler>,
    on_done: Option<DoneHandler>,
    cancel_on_error: bool,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_data(mut self, f: impl FnMut(Value) -> Result<(), Thrown> + 'static) -> Self {
        self.on_data = Some(Box::new(f));
        self
    }

    /// Without an error handler, error events go to the subscription zone's
    /// uncaught-error handling.
    pub fn on_error(mut self, f: impl FnMut(Thrown) -> Result<(), Thrown> + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn on_done(mut self, f: impl FnOnce() -> Result<(), Thrown> + 'static) -> Self {
        self.on_done = Some(Box::new(f));
        self
    }

    pub fn cancel_on_error(mut self, cancel: bool) -> Self {
        self.cancel_on_error = cancel;
        self
    }
}

// =============================================================================
// Controller
// =============================================================================

struct ControllerInner {
    runtime: WeakRuntime,
    universe: Rc<TypeUniverse>,
    element_type: TypeId,
    broadcast: bool,
    flags: Cell<ControllerFlags>,
    subscriptions: RefCell<Vec<Subscription>>,
    /// Events added before the single listener subscribed.
    pending: RefCell<VecDeque<StreamEvent>>,
    on_listen: RefCell<Option<Hook>>,
    on_cancel: RefCell<Option<Hook>>,
}

impl fmt::Debug for ControllerInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamController")
            .field("element_type", &self.element_type)
            .field("broadcast", &self.broadcast)
            .field("flags", &self.flags.get())
            .finish()
    }
}

impl RuntimeObject for ControllerInner {
    fn runtime_type(&self, universe: &TypeUniverse) -> TypeId {
        universe.interface("Stream", &[self.element_type])
    }

    fn describe(&self) -> String {
        let ty = self.universe.interface("Stream", &[self.element_type]);
        format!("Instance of '{}'", self.universe.display(ty))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

impl ControllerInner {
    fn has(&self, flag: ControllerFlags) -> bool {
        self.flags.get().contains(flag)
    }

    fn set(&self, flag: ControllerFlags, on: bool) {
        let mut flags = self.flags.get();
        flags.set(flag, on);
        self.flags.set(flags);
    }

    fn run_hook(hook: &RefCell<Option<Hook>>) {
        let taken = hook.borrow_mut().take();
        if let Some(mut f) = taken {
            f();
            let mut slot = hook.borrow_mut();
            if slot.is_none() {
                *slot = Some(f);
            }
        }
    }

    fn emit(&self, event: StreamEvent) -> Result<(), RuntimeError> {
        if self.broadcast {
            if self.has(ControllerFlags::FIRING) {
                return Err(RuntimeError::state(
                    "Cannot fire new event. Controller is already firing an event",
                ));
            }
            let listeners = self.subscriptions.borrow().clone();
            self.set(ControllerFlags::FIRING, true);
            for subscription in listeners {
                subscription.deliver(event.clone());
            }
            self.set(ControllerFlags::FIRING, false);
            return Ok(());
        }

        if !self.has(ControllerFlags::LISTENED) {
            self.pending.borrow_mut().push_back(event);
            return Ok(());
        }
        let listener = self.subscriptions.borrow().first().cloned();
        if let Some(subscription) = listener {
            subscription.deliver(event);
        }
        Ok(())
    }

    fn remove(&self, subscription: &Subscription) {
        self.subscriptions
            .borrow_mut()
            .retain(|candidate| !Rc::ptr_eq(&candidate.0, &subscription.0));
    }
}

/// Producer side of a stream.
pub struct StreamController(Rc<ControllerInner>);

impl StreamController {
    /// A single-subscription controller.
    pub fn new(runtime: &Runtime, element_type: TypeId) -> Self {
        Self::create(runtime, element_type, false)
    }

    pub fn broadcast(runtime: &Runtime, element_type: TypeId) -> Self {
        Self::create(runtime, element_type, true)
    }

    fn create(runtime: &Runtime, element_type: TypeId, broadcast: bool) -> Self {
        StreamController(Rc::new(ControllerInner {
            runtime: runtime.downgrade(),
            universe: runtime.universe().clone(),
            element_type,
            broadcast,
            flags: Cell::new(ControllerFlags::empty()),
            subscriptions: RefCell::new(Vec::new()),
            pending: RefCell::new(VecDeque::new()),
            on_listen: RefCell::new(None),
            on_cancel: RefCell::new(None),
        }))
    }

    /// Called when a listener subscribes (for broadcast streams: when the
    /// first one does).
    pub fn on_listen(&self, f: impl FnMut() + 'static) {
        *self.0.on_listen.borrow_mut() = Some(Box::new(f));
    }

    /// Called when the last listener cancels.
    pub fn on_cancel(&self, f: impl FnMut() + 'static) {
        *self.0.on_cancel.borrow_mut() = Some(Box::new(f));
    }

    pub fn stream(&self) -> Stream {
        Stream(self.0.clone())
    }

    pub fn is_broadcast(&self) -> bool {
        self.0.broadcast
    }

    pub fn is_closed(&self) -> bool {
        self.0.has(ControllerFlags::CLOSED)
    }

    pub fn has_listener(&self) -> bool {
        !self.0.subscriptions.borrow().is_empty()
    }

    /// Whether the single listener is paused.
    pub fn is_paused(&self) -> bool {
        self.0
            .subscriptions
            .borrow()
            .first()
            .is_some_and(Subscription::is_paused)
    }

    fn check_open(&self) -> Result<(), RuntimeError> {
        if self.0.has(ControllerFlags::CLOSED) {
            return Err(RuntimeError::state("Cannot add event after closing"));
        }
        Ok(())
    }

    /// Add a data event. The value must be an instance of the element type.
    pub fn add(&self, value: Value) -> Result<(), RuntimeError> {
        self.check_open()?;
        let value = self.0.universe.cast(value, self.0.element_type)?;
        if self.0.has(ControllerFlags::CANCELLED) {
            return Ok(());
        }
        self.0.emit(StreamEvent::Data(value))
    }

    pub fn add_error(&self, thrown: Thrown) -> Result<(), RuntimeError> {
        self.check_open()?;
        if self.0.has(ControllerFlags::CANCELLED) {
            return Ok(());
        }
        self.0.emit(StreamEvent::Error(thrown))
    }

    /// Send the done event. Closing twice is a no-op.
    pub fn close(&self) -> Result<(), RuntimeError> {
        if self.0.has(ControllerFlags::CLOSED) {
            return Ok(());
        }
        if self.0.broadcast && self.0.has(ControllerFlags::FIRING) {
            return Err(RuntimeError::state(
                "Cannot fire new event. Controller is already firing an event",
            ));
        }
        self.0.set(ControllerFlags::CLOSED, true);
        debug!(broadcast = self.0.broadcast, "stream controller closed");
        if self.0.has(ControllerFlags::CANCELLED) {
            return Ok(());
        }
        self.0.emit(StreamEvent::Done)
    }
}

// =============================================================================
// Stream
// =============================================================================

/// Consumer side of a controller.
#[derive(Clone)]
pub struct Stream(Rc<ControllerInner>);

impl Stream {
    pub fn is_broadcast(&self) -> bool {
        self.0.broadcast
    }

    pub fn element_type(&self) -> TypeId {
        self.0.element_type
    }

    pub fn to_value(&self) -> Value {
        Value::opaque(self.0.clone())
    }

    pub fn from_value(value: &Value) -> Option<Stream> {
        value.downcast_opaque::<ControllerInner>().map(Stream)
    }

    /// Subscribe. Handlers run in the zone current at this call.
    pub fn listen(&self, handlers: Handlers) -> Result<Subscription, RuntimeError> {
        let controller = &self.0;
        if !controller.broadcast && controller.has(ControllerFlags::LISTENED) {
            return Err(RuntimeError::state("Stream has already been listened to."));
        }
        let Some(runtime) = controller.runtime.upgrade() else {
            return Err(RuntimeError::state("Runtime has shut down"));
        };

        let mut flags = SubscriptionFlags::empty();
        flags.set(SubscriptionFlags::CANCEL_ON_ERROR, handlers.cancel_on_error);
        let subscription = Subscription(Rc::new(SubscriptionInner {
            runtime: runtime.downgrade(),
            controller: Rc::downgrade(controller),
            zone: runtime.current_zone(),
            flags: Cell::new(flags),
            pause_count: Cell::new(0),
            buffer: RefCell::new(VecDeque::new()),
            on_data: RefCell::new(handlers.on_data),
            on_error: RefCell::new(handlers.on_error),
            on_done: RefCell::new(handlers.on_done),
            batch: runtime.config().flush_batch(),
        }));

        let first = controller.subscriptions.borrow().is_empty();
        controller.subscriptions.borrow_mut().push(subscription.clone());
        trace!(broadcast = controller.broadcast, "stream listened");

        if controller.broadcast {
            if controller.has(ControllerFlags::CLOSED) {
                subscription.enqueue(StreamEvent::Done);
            }
        } else {
            controller.set(ControllerFlags::LISTENED, true);
            let pending: Vec<StreamEvent> = controller.pending.borrow_mut().drain(..).collect();
            for event in pending {
                subscription.enqueue(event);
            }
        }
        if first {
            ControllerInner::run_hook(&controller.on_listen);
        }
        Ok(subscription)
    }

    /// A stream of `f` applied to each data event. Errors from `f` become
    /// error events.
    pub fn map(
        &self,
        result_type: TypeId,
        f: impl FnMut(Value) -> Result<Value, Thrown> + 'static,
    ) -> Result<Stream, RuntimeError> {
        let Some(runtime) = self.0.runtime.upgrade() else {
            return Err(RuntimeError::state("Runtime has shut down"));
        };
        let output = if self.0.broadcast {
            StreamController::broadcast(&runtime, result_type)
        } else {
            StreamController::new(&runtime, result_type)
        };
        let downstream = output.stream();

        // The source subscription owns the output controller; the output
        // refers back to itself and to the source subscription weakly.
        let source = self.clone();
        let upstream: Rc<RefCell<Weak<SubscriptionInner>>> = Rc::new(RefCell::new(Weak::new()));
        let transform = Rc::new(RefCell::new(f));

        let listen_output = Rc::downgrade(&output.0);
        let listen_upstream = upstream.clone();
        output.on_listen(move || {
            let Some(inner) = listen_output.upgrade() else {
                return;
            };
            let data_output = StreamController(inner.clone());
            let error_output = StreamController(inner.clone());
            let done_output = StreamController(inner);
            let transform = transform.clone();
            let handlers = Handlers::new()
                .on_data(move |value| {
                    let mapped = {
                        let mut transform = transform.borrow_mut();
                        (*transform)(value)
                    };
                    let added = match mapped {
                        Ok(mapped) => data_output.add(mapped),
                        Err(thrown) => data_output.add_error(thrown),
                    };
                    added.map_err(Thrown::from)
                })
                .on_error(move |thrown| error_output.add_error(thrown).map_err(Thrown::from))
                .on_done(move || done_output.close().map_err(Thrown::from));
            match source.listen(handlers) {
                Ok(subscription) => {
                    *listen_upstream.borrow_mut() = Rc::downgrade(&subscription.0);
                }
                Err(err) => debug!(error = %err, "map could not listen to its source"),
            }
        });
        output.on_cancel(move || {
            if let Some(inner) = upstream.borrow().upgrade() {
                Subscription(inner).cancel();
            }
        });
        Ok(downstream)
    }

    /// Number of data events. Completes with the first error, if any.
    pub fn length(&self) -> Result<Future, RuntimeError> {
        let runtime = self.runtime()?;
        let completer = Rc::new(Completer::new(&runtime, TypeId::INT));
        let future = completer.future();
        let count = Rc::new(Cell::new(0i64));

        let counter = count.clone();
        let on_error = completer.clone();
        let handlers = Handlers::new()
            .on_data(move |_| {
                counter.set(counter.get() + 1);
                Ok(())
            })
            .on_error(move |thrown| on_error.complete_error(thrown).map_err(Thrown::from))
            .on_done(move || {
                completer
                    .complete(Value::Int(count.get()))
                    .map_err(Thrown::from)
            })
            .cancel_on_error(true);
        self.listen(handlers)?;
        Ok(future)
    }

    /// Collect data events into a `List` of the element type. Completes with
    /// the first error, if any.
    pub fn to_list(&self) -> Result<Future, RuntimeError> {
        let runtime = self.runtime()?;
        let element_type = self.0.element_type;
        let list_type = runtime.universe().interface("List", &[element_type]);
        let completer = Rc::new(Completer::new(&runtime, list_type));
        let future = completer.future();
        let items = Rc::new(RefCell::new(Vec::new()));

        let sink = items.clone();
        let on_error = completer.clone();
        let handlers = Handlers::new()
            .on_data(move |value| {
                sink.borrow_mut().push(value);
                Ok(())
            })
            .on_error(move |thrown| on_error.complete_error(thrown).map_err(Thrown::from))
            .on_done(move || {
                let items = std::mem::take(&mut *items.borrow_mut());
                completer
                    .complete(Value::list(element_type, items))
                    .map_err(Thrown::from)
            })
            .cancel_on_error(true);
        self.listen(handlers)?;
        Ok(future)
    }

    fn runtime(&self) -> Result<Runtime, RuntimeError> {
        self.0
            .runtime
            .upgrade()
            .ok_or_else(|| RuntimeError::state("Runtime has shut down"))
    }
}

// =============================================================================
// Subscription
// =============================================================================

struct SubscriptionInner {
    runtime: WeakRuntime,
    controller: Weak<ControllerInner>,
    zone: Zone,
    flags: Cell<SubscriptionFlags>,
    pause_count: Cell<u32>,
    buffer: RefCell<VecDeque<StreamEvent>>,
    on_data: RefCell<Option<DataHandler>>,
    on_error: RefCell<Option<ErrorHandler>>,
    on_done: RefCell<Option<DoneHandler>>,
    batch: usize,
}

/// A listener's handle on a stream.
#[derive(Clone)]
pub struct Subscription(Rc<SubscriptionInner>);

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("flags", &self.0.flags.get())
            .field("pause_count", &self.0.pause_count.get())
            .field("buffered", &self.0.buffer.borrow().len())
            .finish()
    }
}

impl Subscription {
    fn has(&self, flag: SubscriptionFlags) -> bool {
        self.0.flags.get().contains(flag)
    }

    fn set(&self, flag: SubscriptionFlags, on: bool) {
        let mut flags = self.0.flags.get();
        flags.set(flag, on);
        self.0.flags.set(flags);
    }

    pub fn is_paused(&self) -> bool {
        self.0.pause_count.get() > 0
    }

    pub fn is_cancelled(&self) -> bool {
        self.has(SubscriptionFlags::CANCELLED)
    }

    pub fn is_done(&self) -> bool {
        self.has(SubscriptionFlags::DONE)
    }

    /// Events waiting for delivery.
    pub fn buffered(&self) -> usize {
        self.0.buffer.borrow().len()
    }

    fn is_finished(&self) -> bool {
        self.0
            .flags
            .get()
            .intersects(SubscriptionFlags::CANCELLED | SubscriptionFlags::DONE)
    }

    /// Pause delivery. Pauses nest; each needs a matching `resume`.
    pub fn pause(&self) {
        if self.is_finished() {
            return;
        }
        self.0.pause_count.set(self.0.pause_count.get() + 1);
        trace!(pause_count = self.0.pause_count.get(), "subscription paused");
    }

    pub fn resume(&self) {
        let count = self.0.pause_count.get();
        if count == 0 || self.is_finished() {
            return;
        }
        self.0.pause_count.set(count - 1);
        if count == 1 && self.buffered() > 0 {
            self.schedule_flush();
        }
    }

    /// Stop delivery and drop buffered events. Idempotent.
    pub fn cancel(&self) {
        if self.is_finished() {
            return;
        }
        self.set(SubscriptionFlags::CANCELLED, true);
        let dropped = {
            let mut buffer = self.0.buffer.borrow_mut();
            let dropped = buffer.len();
            buffer.clear();
            dropped
        };
        debug!(dropped, "subscription cancelled");
        self.detach(true);
    }

    /// Leave the controller; run its cancel hook once nobody listens.
    fn detach(&self, cancelled: bool) {
        let Some(controller) = self.0.controller.upgrade() else {
            return;
        };
        controller.remove(self);
        if cancelled && !controller.broadcast {
            controller.set(ControllerFlags::CANCELLED, true);
        }
        if cancelled && controller.subscriptions.borrow().is_empty() {
            ControllerInner::run_hook(&controller.on_cancel);
        }
    }

    /// Entry point for controller events.
    fn deliver(&self, event: StreamEvent) {
        if self.is_finished() {
            return;
        }
        let must_queue = self.is_paused()
            || self.has(SubscriptionFlags::DELIVERING)
            || self.buffered() > 0;
        if must_queue {
            self.enqueue(event);
            return;
        }
        self.dispatch(event);
        // Events added from inside the handler were queued.
        if !self.is_paused() && !self.is_finished() && self.buffered() > 0 {
            self.schedule_flush();
        }
    }

    /// Buffer an event and make sure a flush is on its way.
    fn enqueue(&self, event: StreamEvent) {
        self.0.buffer.borrow_mut().push_back(event);
        if !self.is_paused() && !self.has(SubscriptionFlags::DELIVERING) {
            self.schedule_flush();
        }
    }

    fn schedule_flush(&self) {
        if self.has(SubscriptionFlags::FLUSH_SCHEDULED) {
            return;
        }
        let Some(runtime) = self.0.runtime.upgrade() else {
            return;
        };
        self.set(SubscriptionFlags::FLUSH_SCHEDULED, true);
        let subscription = self.clone();
        runtime.schedule_in_zone(&self.0.zone, Box::new(move || subscription.flush()));
    }

    fn flush(&self) {
        self.set(SubscriptionFlags::FLUSH_SCHEDULED, false);
        for _ in 0..self.0.batch {
            if self.is_paused() || self.is_finished() {
                return;
            }
            let next = self.0.buffer.borrow_mut().pop_front();
            match next {
                Some(event) => self.dispatch(event),
                None => return,
            }
        }
        if !self.is_paused() && !self.is_finished() && self.buffered() > 0 {
            self.schedule_flush();
        }
    }

    /// Run the handler for one event in the subscription's zone.
    fn dispatch(&self, event: StreamEvent) {
        let Some(runtime) = self.0.runtime.upgrade() else {
            return;
        };
        self.set(SubscriptionFlags::DELIVERING, true);
        let zone = self.0.zone.clone();
        match event {
            StreamEvent::Data(value) => {
                let handler = self.0.on_data.borrow_mut().take();
                if let Some(mut handler) = handler {
                    let result = runtime.run_in(&zone, || handler(value));
                    self.restore(&self.0.on_data, handler);
                    if let Err(thrown) = result {
                        runtime.handle_uncaught(&zone, thrown);
                    }
                }
            }
            StreamEvent::Error(thrown) => {
                let handler = self.0.on_error.borrow_mut().take();
                match handler {
                    Some(mut handler) => {
                        let result = runtime.run_in(&zone, || handler(thrown));
                        self.restore(&self.0.on_error, handler);
                        if let Err(thrown) = result {
                            runtime.handle_uncaught(&zone, thrown);
                        }
                    }
                    None => runtime.handle_uncaught(&zone, thrown),
                }
                if self.has(SubscriptionFlags::CANCEL_ON_ERROR) {
                    self.cancel();
                }
            }
            StreamEvent::Done => {
                self.set(SubscriptionFlags::DONE, true);
                self.0.buffer.borrow_mut().clear();
                self.detach(false);
                let handler = self.0.on_done.borrow_mut().take();
                if let Some(handler) = handler {
                    if let Err(thrown) = runtime.run_in(&zone, handler) {
                        runtime.handle_uncaught(&zone, thrown);
                    }
                }
            }
        }
        self.set(SubscriptionFlags::DELIVERING, false);
    }

    fn restore<H>(&self, slot: &RefCell<Option<H>>, handler: H) {
        if self.is_finished() {
            return;
        }
        let mut slot = slot.borrow_mut();
        if slot.is_none() {
            *slot = Some(handler);
        }
    }
}

#[cfg(test)]
#[path = "../tests/stream_tests.rs"]
mod tests;

//! End-to-end scenarios through the public `kestrel` API.

use kestrel::async_rt::{Handlers, Outcome};
use kestrel::rti::StackTrace;
use kestrel::{
    Completer, ExceptionEnvelope, Future, Isolate, MessagePort, RuntimeError, StreamController,
    Thrown, TypeId, Value, ZoneSpec,
};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default)]
struct Outbox(RefCell<Vec<String>>);

impl MessagePort for Outbox {
    fn post_message(&self, text: String) {
        self.0.borrow_mut().push(text);
    }
}

#[test]
fn worker_streams_results_back_to_the_host() {
    let isolate = Isolate::new();
    let runtime = isolate.runtime().clone();
    let outbox = Rc::new(Outbox::default());

    // Each request sums a stream of numbers produced on a timer.
    let worker = isolate.worker(outbox.clone(), move |request| {
        let count = request.as_int().unwrap_or(0);
        let controller = StreamController::new(&runtime, TypeId::INT);
        let total = controller
            .stream()
            .map(TypeId::INT, Ok)
            .map_err(Thrown::from)?
            .to_list()
            .map_err(Thrown::from)?;
        let producer = runtime.clone();
        producer.schedule_timer(10, move || {
            for n in 1..=count {
                controller.add(Value::Int(n)).map_err(Thrown::from)?;
            }
            controller.close().map_err(Thrown::from)
        });
        Ok(total.to_value())
    });

    worker.on_message("3");
    isolate.runtime().run_microtasks();
    assert!(outbox.0.borrow().is_empty());

    isolate.run_until_idle();
    assert_eq!(*outbox.0.borrow(), vec!["[1,2,3]".to_string()]);
}

#[test]
fn zone_handler_keeps_worker_errors_out_of_the_host() {
    let isolate = Isolate::new();
    let runtime = isolate.runtime();
    let caught = Rc::new(RefCell::new(Vec::new()));

    let sink = caught.clone();
    let zone = runtime.root_zone().fork(ZoneSpec::new().name("request").on_error(move |thrown| {
        sink.borrow_mut().push(thrown.to_string());
        Ok(())
    }));
    runtime.run_in(&zone, || {
        Future::microtask(runtime, || {
            Err(Thrown::from(RuntimeError::state("lost request")))
        });
    });
    isolate.run_until_idle();

    assert_eq!(*caught.borrow(), vec!["Bad state: lost request".to_string()]);
    assert!(runtime.uncaught_errors().is_empty());
}

#[test]
fn async_bodies_compose_with_completers() {
    let isolate = Isolate::new();
    let runtime = isolate.runtime();
    let completer = Completer::new(runtime, TypeId::STRING);
    let name = completer.future();

    let greeting = runtime.spawn_async(async move {
        let name = name.await?;
        Ok(Value::str(&format!("hello {name}")))
    });
    let controller = StreamController::broadcast(runtime, TypeId::STRING);
    let seen = Rc::new(RefCell::new(None));
    let sink = seen.clone();
    controller
        .stream()
        .listen(Handlers::new().on_data(move |value| {
            *sink.borrow_mut() = Some(value.to_string());
            Ok(())
        }))
        .expect("listen");
    greeting.then(move |value| {
        controller.add(value).map_err(Thrown::from)?;
        Ok(Value::Null)
    });

    completer.complete(Value::str("kestrel")).expect("first completion");
    isolate.run_until_idle();

    assert_eq!(seen.borrow().as_deref(), Some("hello kestrel"));
    assert!(matches!(greeting.result(), Some(Outcome::Value(_))));
}

#[test]
fn envelope_round_trips_through_json() {
    let thrown = Thrown::with_stack(
        Value::error(RuntimeError::argument("bad input")),
        StackTrace::new("#0 main"),
    );
    let text = ExceptionEnvelope::from_thrown(&thrown).to_json().expect("serializable");
    let parsed = ExceptionEnvelope::parse(&text).expect("an envelope");

    assert_eq!(parsed.exception.error, "Invalid argument(s): bad input");
    assert_eq!(parsed.exception.stack, "#0 main");
}

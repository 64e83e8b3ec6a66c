use super::*;
use crate::config::AsyncConfig;
use crate::future::Outcome;
use crate::zone::ZoneSpec;

fn runtime() -> Runtime {
    Runtime::new(Rc::new(TypeUniverse::new()))
}

type Log = Rc<RefCell<Vec<String>>>;

fn collecting(log: &Log) -> Handlers {
    let data = log.clone();
    let errors = log.clone();
    let done = log.clone();
    Handlers::new()
        .on_data(move |value| {
            data.borrow_mut().push(value.to_string());
            Ok(())
        })
        .on_error(move |thrown| {
            errors.borrow_mut().push(format!("error: {thrown}"));
            Ok(())
        })
        .on_done(move || {
            done.borrow_mut().push("done".to_string());
            Ok(())
        })
}

fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

#[test]
fn test_events_reach_an_active_listener_synchronously() {
    let rt = runtime();
    let controller = StreamController::new(&rt, TypeId::INT);
    let log: Log = Rc::default();

    controller.stream().listen(collecting(&log)).expect("listen");
    controller.add(Value::Int(1)).expect("add");
    controller.add(Value::Int(2)).expect("add");
    assert_eq!(entries(&log), vec!["1", "2"]);

    controller.close().expect("close");
    assert_eq!(entries(&log), vec!["1", "2", "done"]);
    assert!(!controller.has_listener());
}

#[test]
fn test_pause_buffers_and_resume_flushes_in_order() {
    let rt = runtime();
    let controller = StreamController::new(&rt, TypeId::INT);
    let log: Log = Rc::default();
    let subscription = controller.stream().listen(collecting(&log)).expect("listen");

    subscription.pause();
    assert!(controller.is_paused());
    for n in 1..=3 {
        controller.add(Value::Int(n)).expect("add");
    }
    rt.run_microtasks();
    assert!(entries(&log).is_empty());
    assert_eq!(subscription.buffered(), 3);

    subscription.resume();
    assert!(entries(&log).is_empty());
    rt.run_microtasks();
    assert_eq!(entries(&log), vec!["1", "2", "3"]);
}

#[test]
fn test_flush_yields_between_events() {
    let rt = runtime();
    let controller = StreamController::new(&rt, TypeId::INT);
    let log: Log = Rc::default();
    let subscription = controller.stream().listen(collecting(&log)).expect("listen");

    subscription.pause();
    controller.add(Value::Int(1)).expect("add");
    controller.add(Value::Int(2)).expect("add");
    subscription.resume();

    // Work queued after the resume runs between the two buffered events.
    let marker = log.clone();
    rt.schedule_microtask(move || {
        marker.borrow_mut().push("other work".to_string());
        Ok(())
    });
    rt.run_microtasks();

    assert_eq!(entries(&log), vec!["1", "other work", "2"]);
}

#[test]
fn test_flush_batch_is_configurable() {
    let config = AsyncConfig {
        stream_flush_batch: 8,
        ..Default::default()
    };
    let rt = Runtime::with_config(Rc::new(TypeUniverse::new()), config);
    let controller = StreamController::new(&rt, TypeId::INT);
    let log: Log = Rc::default();
    let subscription = controller.stream().listen(collecting(&log)).expect("listen");

    subscription.pause();
    controller.add(Value::Int(1)).expect("add");
    controller.add(Value::Int(2)).expect("add");
    subscription.resume();
    let marker = log.clone();
    rt.schedule_microtask(move || {
        marker.borrow_mut().push("other work".to_string());
        Ok(())
    });
    rt.run_microtasks();

    assert_eq!(entries(&log), vec!["1", "2", "other work"]);
}

#[test]
fn test_nested_pauses_need_matching_resumes() {
    let rt = runtime();
    let controller = StreamController::new(&rt, TypeId::INT);
    let log: Log = Rc::default();
    let subscription = controller.stream().listen(collecting(&log)).expect("listen");

    subscription.pause();
    subscription.pause();
    controller.add(Value::Int(1)).expect("add");
    subscription.resume();
    rt.run_microtasks();
    assert!(entries(&log).is_empty());

    subscription.resume();
    rt.run_microtasks();
    assert_eq!(entries(&log), vec!["1"]);
}

#[test]
fn test_cancel_drops_the_buffer() {
    let rt = runtime();
    let controller = StreamController::new(&rt, TypeId::INT);
    let log: Log = Rc::default();
    let cancelled = Rc::new(Cell::new(0));
    let counter = cancelled.clone();
    controller.on_cancel(move || counter.set(counter.get() + 1));

    let subscription = controller.stream().listen(collecting(&log)).expect("listen");
    subscription.pause();
    controller.add(Value::Int(1)).expect("add");
    controller.add(Value::Int(2)).expect("add");

    subscription.cancel();
    subscription.cancel();
    assert_eq!(subscription.buffered(), 0);
    subscription.resume();
    controller.add(Value::Int(3)).expect("add after cancel is ignored");
    rt.run_microtasks();

    assert!(entries(&log).is_empty());
    assert!(subscription.is_cancelled());
    assert_eq!(cancelled.get(), 1);
}

#[test]
fn test_events_before_listen_are_buffered() {
    let rt = runtime();
    let controller = StreamController::new(&rt, TypeId::STRING);
    let listened = Rc::new(Cell::new(false));
    let flag = listened.clone();
    controller.on_listen(move || flag.set(true));

    controller.add(Value::str("early")).expect("add");
    controller.close().expect("close");

    let log: Log = Rc::default();
    controller.stream().listen(collecting(&log)).expect("listen");
    assert!(listened.get());
    assert!(entries(&log).is_empty());

    rt.run_microtasks();
    assert_eq!(entries(&log), vec!["early", "done"]);
}

#[test]
fn test_single_subscription_rejects_second_listener() {
    let rt = runtime();
    let controller = StreamController::new(&rt, TypeId::INT);
    let stream = controller.stream();

    stream.listen(Handlers::new()).expect("first listen");
    let err = stream.listen(Handlers::new()).expect_err("second listen");
    assert_eq!(err, RuntimeError::state("Stream has already been listened to."));
}

#[test]
fn test_add_after_close_is_an_error() {
    let rt = runtime();
    let controller = StreamController::new(&rt, TypeId::INT);
    controller.close().expect("close");
    controller.close().expect("closing twice is fine");

    let err = controller.add(Value::Int(1)).expect_err("closed");
    assert_eq!(err, RuntimeError::state("Cannot add event after closing"));
    assert!(controller.add_error(Thrown::from(RuntimeError::state("x"))).is_err());
}

#[test]
fn test_element_type_is_checked() {
    let rt = runtime();
    let controller = StreamController::new(&rt, TypeId::INT);

    let err = controller.add(Value::str("x")).expect_err("wrong type");
    assert_eq!(err.class_name(), "TypeError");
    assert!(controller.add(Value::Int(1)).is_ok());
}

#[test]
fn test_broadcast_fans_out() {
    let rt = runtime();
    let controller = StreamController::broadcast(&rt, TypeId::INT);
    let first: Log = Rc::default();
    let second: Log = Rc::default();

    controller.add(Value::Int(0)).expect("no listeners, dropped");
    let stream = controller.stream();
    let a = stream.listen(collecting(&first)).expect("listen");
    stream.listen(collecting(&second)).expect("listen");
    controller.add(Value::Int(1)).expect("add");
    a.cancel();
    controller.add(Value::Int(2)).expect("add");
    controller.close().expect("close");

    assert_eq!(entries(&first), vec!["1"]);
    assert_eq!(entries(&second), vec!["1", "2", "done"]);
}

#[test]
fn test_broadcast_rejects_reentrant_add() {
    let rt = runtime();
    let controller = Rc::new(StreamController::broadcast(&rt, TypeId::INT));
    let failure = Rc::new(RefCell::new(None));

    let inner = controller.clone();
    let sink = failure.clone();
    controller
        .stream()
        .listen(Handlers::new().on_data(move |_| {
            *sink.borrow_mut() = inner.add(Value::Int(99)).err();
            Ok(())
        }))
        .expect("listen");
    controller.add(Value::Int(1)).expect("outer add");

    assert_eq!(
        *failure.borrow(),
        Some(RuntimeError::state(
            "Cannot fire new event. Controller is already firing an event"
        ))
    );
}

#[test]
fn test_single_subscription_reentrant_add_is_queued() {
    let rt = runtime();
    let controller = Rc::new(StreamController::new(&rt, TypeId::INT));
    let log: Log = Rc::default();

    let inner = controller.clone();
    let sink = log.clone();
    controller
        .stream()
        .listen(Handlers::new().on_data(move |value| {
            let n = value.as_int().unwrap_or_default();
            sink.borrow_mut().push(format!("start {n}"));
            if n == 1 {
                inner.add(Value::Int(2)).map_err(Thrown::from)?;
            }
            sink.borrow_mut().push(format!("end {n}"));
            Ok(())
        }))
        .expect("listen");
    controller.add(Value::Int(1)).expect("add");
    rt.run_microtasks();

    assert_eq!(entries(&log), vec!["start 1", "end 1", "start 2", "end 2"]);
}

#[test]
fn test_cancel_on_error() {
    let rt = runtime();
    let controller = StreamController::new(&rt, TypeId::INT);
    let log: Log = Rc::default();
    let subscription = controller
        .stream()
        .listen(collecting(&log).cancel_on_error(true))
        .expect("listen");

    controller.add(Value::Int(1)).expect("add");
    controller
        .add_error(Thrown::from(RuntimeError::state("bad")))
        .expect("add error");
    controller.add(Value::Int(2)).expect("ignored");

    assert_eq!(entries(&log), vec!["1", "error: Bad state: bad"]);
    assert!(subscription.is_cancelled());
}

#[test]
fn test_error_without_handler_goes_to_zone() {
    let rt = runtime();
    let caught: Log = Rc::default();
    let sink = caught.clone();
    let zone = rt.root_zone().fork(ZoneSpec::new().on_error(move |thrown| {
        sink.borrow_mut().push(thrown.to_string());
        Ok(())
    }));
    let controller = StreamController::new(&rt, TypeId::INT);

    rt.run_in(&zone, || controller.stream().listen(Handlers::new()))
        .expect("listen");
    controller
        .add_error(Thrown::from(RuntimeError::state("unhandled")))
        .expect("add error");

    assert_eq!(entries(&caught), vec!["Bad state: unhandled"]);
}

#[test]
fn test_handlers_run_in_listen_zone() {
    let rt = runtime();
    let zone = rt.root_zone().fork(ZoneSpec::new().name("listener"));
    let controller = StreamController::new(&rt, TypeId::INT);
    let seen: Log = Rc::default();

    let observer = rt.clone();
    let sink = seen.clone();
    rt.run_in(&zone, || {
        controller.stream().listen(Handlers::new().on_data(move |_| {
            sink.borrow_mut().push(observer.current_zone().name().to_string());
            Ok(())
        }))
    })
    .expect("listen");
    controller.add(Value::Int(1)).expect("add");

    assert_eq!(entries(&seen), vec!["listener"]);
}

#[test]
fn test_map_transforms_events() {
    let rt = runtime();
    let controller = StreamController::new(&rt, TypeId::INT);
    let doubled = controller
        .stream()
        .map(TypeId::INT, |value| {
            let n = value.as_int().unwrap_or_default();
            if n < 0 {
                return Err(Thrown::from(RuntimeError::argument("negative")));
            }
            Ok(Value::Int(n * 2))
        })
        .expect("map");
    let log: Log = Rc::default();
    doubled.listen(collecting(&log)).expect("listen");

    controller.add(Value::Int(1)).expect("add");
    controller.add(Value::Int(-1)).expect("add");
    controller.add(Value::Int(3)).expect("add");
    controller.close().expect("close");
    rt.run_microtasks();

    assert_eq!(
        entries(&log),
        vec!["2", "error: Invalid argument(s): negative", "6", "done"]
    );
}

#[test]
fn test_cancelling_mapped_stream_cancels_source() {
    let rt = runtime();
    let controller = StreamController::new(&rt, TypeId::INT);
    let source_cancelled = Rc::new(Cell::new(false));
    let flag = source_cancelled.clone();
    controller.on_cancel(move || flag.set(true));

    let mapped = controller.stream().map(TypeId::INT, Ok).expect("map");
    let subscription = mapped.listen(Handlers::new()).expect("listen");
    assert!(controller.has_listener());

    subscription.cancel();
    assert!(source_cancelled.get());
    assert!(!controller.has_listener());
}

#[test]
fn test_length_and_to_list() {
    let rt = runtime();
    let counted = StreamController::new(&rt, TypeId::INT);
    let collected = StreamController::new(&rt, TypeId::STRING);

    let length = counted.stream().length().expect("length");
    let list = collected.stream().to_list().expect("to_list");
    for n in 0..3 {
        counted.add(Value::Int(n)).expect("add");
    }
    collected.add(Value::str("a")).expect("add");
    collected.add(Value::str("b")).expect("add");
    counted.close().expect("close");
    collected.close().expect("close");
    rt.run_microtasks();

    assert!(matches!(length.result(), Some(Outcome::Value(Value::Int(3)))));
    match list.result() {
        Some(Outcome::Value(value)) => {
            assert_eq!(value.to_string(), "[a, b]");
            let universe = rt.universe();
            let list_string = universe.interface("List", &[TypeId::STRING]);
            assert!(universe.is_instance(&value, list_string));
        }
        other => panic!("expected a list, got {other:?}"),
    }
}

#[test]
fn test_length_completes_with_first_error() {
    let rt = runtime();
    let controller = StreamController::new(&rt, TypeId::INT);
    let length = controller.stream().length().expect("length");
    length.ignore();

    controller.add(Value::Int(1)).expect("add");
    controller
        .add_error(Thrown::from(RuntimeError::state("broken")))
        .expect("add error");
    rt.run_microtasks();

    match length.result() {
        Some(Outcome::Error(thrown)) => assert_eq!(thrown.to_string(), "Bad state: broken"),
        other => panic!("expected an error, got {other:?}"),
    }
}

#[test]
fn test_stream_is_a_runtime_value() {
    let rt = runtime();
    let controller = StreamController::new(&rt, TypeId::INT);
    let value = controller.stream().to_value();
    let universe = rt.universe();

    let stream_num = universe.interface("Stream", &[TypeId::NUM]);
    assert!(universe.is_instance(&value, stream_num));
    assert_eq!(value.to_string(), "Instance of 'Stream<int>'");
    assert!(Stream::from_value(&value).is_some_and(|stream| stream.element_type() == TypeId::INT));
}

#[test]
fn test_flush_goes_through_the_zone_schedule_hook() {
    let rt = runtime();
    let intercepted = Rc::new(Cell::new(0));
    let count = intercepted.clone();
    let zone = rt.root_zone().fork(ZoneSpec::new().on_schedule(move |task, delegate| {
        count.set(count.get() + 1);
        delegate(task);
    }));
    let controller = StreamController::new(&rt, TypeId::INT);
    let log: Log = Rc::default();

    let subscription = rt
        .run_in(&zone, || controller.stream().listen(collecting(&log)))
        .expect("listen");
    subscription.pause();
    controller.add(Value::Int(1)).expect("add");
    subscription.resume();
    rt.run_microtasks();

    assert_eq!(entries(&log), vec!["1"]);
    assert_eq!(intercepted.get(), 1);
}

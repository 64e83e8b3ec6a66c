use super::*;
use kestrel_async::{Completer, Runtime};
use serde_json::json;

fn codec() -> MessageCodec {
    MessageCodec::new(Rc::new(TypeUniverse::new()))
}

#[test]
fn test_primitives_pass_through() {
    let codec = codec();
    assert!(matches!(codec.decode(&json!(null)), Value::Null));
    assert!(matches!(codec.decode(&json!(true)), Value::Bool(true)));
    assert!(matches!(codec.decode(&json!(42)), Value::Int(42)));
    assert!(matches!(codec.decode(&json!(1.5)), Value::Double(d) if d == 1.5));
    assert_eq!(codec.decode(&json!("hi")).as_str(), Some("hi"));
}

#[test]
fn test_arrays_decode_to_dynamic_lists() {
    let codec = codec();
    let value = codec.decode_str("[1, \"two\", [3]]").expect("valid json");

    let universe = codec.universe();
    let list_dynamic = universe.interface("List", &[TypeId::DYNAMIC]);
    assert!(universe.is_instance(&value, list_dynamic));
    assert_eq!(value.to_string(), "[1, two, [3]]");
}

#[test]
fn test_objects_decode_to_immutable_maps_with_lazy_keys() {
    let codec = codec();
    let value = codec
        .decode_str(r#"{"name": "ada", "tags": ["x"]}"#)
        .expect("valid json");
    let Value::Map(map) = &value else {
        panic!("expected a map, got {value:?}");
    };

    assert!(map.is_immutable());
    assert_eq!(map.key_type, TypeId::STRING);
    assert_eq!(map.value_type, TypeId::DYNAMIC);
    assert!(!map.keys_computed());
    assert_eq!(map.keys().len(), 2);
    assert!(map.keys_computed());
    assert_eq!(
        map.get(&MapKey::from("name")).and_then(|v| v.as_str().map(String::from)),
        Some("ada".to_string())
    );
    assert!(map.insert(MapKey::from("extra"), Value::Null).is_err());
}

#[test]
fn test_malformed_text_is_a_json_error() {
    let err = codec().decode_str("{not json").expect_err("malformed");
    assert!(matches!(err, BridgeError::Json(_)));
}

#[test]
fn test_structural_values_encode_to_json() {
    let codec = codec();
    let mut entries = IndexMap::new();
    entries.insert(MapKey::from("count"), Value::Int(2));
    entries.insert(
        MapKey::from("items"),
        Value::list(TypeId::STRING, vec![Value::str("a"), Value::str("b")]),
    );
    let value = Value::Map(Rc::new(MapValue::from_host(entries)));

    let encoded = codec.encode(&value).expect("encodable");
    assert_eq!(encoded, json!({"count": 2, "items": ["a", "b"]}));
    assert_eq!(
        codec.encode_to_string(&value).expect("encodable"),
        r#"{"count":2,"items":["a","b"]}"#
    );
}

#[test]
fn test_non_structural_values_are_opaque() {
    let codec = codec();
    let runtime = Runtime::new(codec.universe().clone());
    let future = Completer::new(&runtime, TypeId::INT).future().to_value();

    assert_eq!(
        codec.encode(&future).expect("opaque"),
        json!({"$opaque": "Future<int>"})
    );
    assert_eq!(
        codec.encode(&Value::Double(f64::NAN)).expect("opaque"),
        json!({"$opaque": "double"})
    );

    let mut entries = IndexMap::new();
    entries.insert(MapKey::Int(1), Value::Null);
    let int_keyed = Value::Map(Rc::new(MapValue::from_host(entries)));
    assert!(codec.encode(&int_keyed).expect("opaque")[OPAQUE_KEY].is_string());
}

#[test]
fn test_self_containing_list_is_too_deep() {
    let codec = codec();
    let Value::List(list) = Value::list(TypeId::DYNAMIC, Vec::new()) else {
        unreachable!();
    };
    list.push(Value::List(list.clone()));

    let err = codec.encode(&Value::List(list.clone())).expect_err("cyclic");
    assert!(matches!(err, BridgeError::TooDeep { limit } if limit == MAX_MESSAGE_DEPTH));
    // Break the cycle so the test does not leak.
    list.clear();
}

#[test]
fn test_host_function_wraps_to_closure() {
    let codec = codec();
    let add = codec
        .host_function("add", 2, |args| {
            let sum: i64 = args.iter().filter_map(Json::as_i64).sum();
            Ok(json!({ "sum": sum }))
        })
        .expect("valid signature");
    let Value::Closure(closure) = &add else {
        panic!("expected a closure, got {add:?}");
    };

    let universe = codec.universe();
    assert_eq!(universe.display(closure.signature), "dynamic Function(dynamic, dynamic)");
    let result = closure
        .call(&Arguments::new(vec![Value::Int(2), Value::Int(3)]))
        .expect("host call");
    assert_eq!(codec.encode(&result).expect("structural"), json!({"sum": 5}));
}

#[test]
fn test_host_function_failure_is_thrown() {
    let codec = codec();
    let fail = codec
        .host_function("fail", 0, |_| Err("unavailable".to_string()))
        .expect("valid signature");
    let Value::Closure(closure) = &fail else {
        panic!("expected a closure");
    };

    let thrown = closure.call(&Arguments::default()).expect_err("host failure");
    assert_eq!(
        thrown.to_string(),
        "Bad state: host function 'fail' failed: unavailable"
    );
}

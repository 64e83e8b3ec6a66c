use super::*;
use crate::interceptor::{NativeCategory, NativeObject};
use crate::types::Variance;
use crate::value::{MapValue, RecordValue};

fn ty(universe: &TypeUniverse, recipe: &str) -> TypeId {
    match universe.eval(recipe) {
        Ok(id) => id,
        Err(err) => panic!("bad test recipe: {err}"),
    }
}

fn is(universe: &TypeUniverse, value: &Value, recipe: &str) -> bool {
    universe.is_instance(value, ty(universe, recipe))
}

#[test]
fn test_compile_check_forms() {
    let universe = TypeUniverse::new();
    let iterable = universe.intern_name("Iterable");

    let cases = [
        ("Object", InstanceCheck::NonNull),
        ("@", InstanceCheck::Always),
        ("Object?", InstanceCheck::Always),
        ("Object*", InstanceCheck::Always),
        ("0&", InstanceCheck::Never),
        ("int?", InstanceCheck::Nullable(TypeId::INT)),
        ("int/", InstanceCheck::FutureOr(TypeId::INT)),
        ("int", InstanceCheck::Primitive(Primitive::Int)),
        ("int*", InstanceCheck::Primitive(Primitive::Int)),
        ("num", InstanceCheck::Primitive(Primitive::Num)),
        ("Iterable", InstanceCheck::ClassTag(iterable)),
        ("Iterable<@>", InstanceCheck::ClassTag(iterable)),
        ("List", InstanceCheck::General),
        ("List<@>", InstanceCheck::General),
        ("List<int>", InstanceCheck::General),
        ("+a(int)", InstanceCheck::Record),
        ("int(int)", InstanceCheck::General),
    ];
    for (recipe, expected) in cases {
        assert_eq!(universe.compile_check(ty(&universe, recipe)), expected, "{recipe}");
    }
}

#[test]
fn test_compile_check_is_memoized() {
    let universe = TypeUniverse::new();
    let list_int = ty(&universe, "List<int>");

    assert!(universe.checks.borrow().get(&list_int).is_none());
    universe.compile_check(list_int);
    assert_eq!(
        universe.checks.borrow().get(&list_int),
        Some(&InstanceCheck::General)
    );
}

#[test]
fn test_primitive_instances() {
    let universe = TypeUniverse::new();
    let three = Value::Int(3);
    let half = Value::Double(0.5);
    let text = Value::str("hi");

    assert!(is(&universe, &three, "int"));
    assert!(is(&universe, &three, "num"));
    assert!(!is(&universe, &three, "double"));
    assert!(!is(&universe, &three, "String"));
    assert!(is(&universe, &half, "double"));
    assert!(is(&universe, &half, "num"));
    assert!(!is(&universe, &half, "int"));
    assert!(is(&universe, &text, "String"));
    assert!(is(&universe, &text, "Comparable<String>"));
    assert!(is(&universe, &Value::Bool(true), "bool"));
    assert!(is(&universe, &three, "Object"));
}

#[test]
fn test_null_instances() {
    let universe = TypeUniverse::new();

    assert!(is(&universe, &Value::Null, "int?"));
    assert!(is(&universe, &Value::Null, "Null"));
    assert!(is(&universe, &Value::Null, "Object?"));
    assert!(is(&universe, &Value::Null, "@"));
    assert!(!is(&universe, &Value::Null, "Object"));
    assert!(!is(&universe, &Value::Null, "int"));
    assert!(!is(&universe, &Value::Null, "List"));
    assert!(!is(&universe, &Value::Null, "List<int>"));
    assert!(is(&universe, &Value::Null, "List<int>?"));
}

#[test]
fn test_future_or_instances() {
    let universe = TypeUniverse::new();

    assert!(is(&universe, &Value::Int(1), "int/"));
    assert!(!is(&universe, &Value::str("x"), "int/"));
    assert!(is(&universe, &Value::Null, "int?/"));
}

#[test]
fn test_list_instances() {
    let universe = TypeUniverse::new();
    let list = Value::list(TypeId::INT, vec![Value::Int(1), Value::Int(2)]);

    assert!(is(&universe, &list, "List<int>"));
    assert!(!is(&universe, &list, "List"));
    assert!(!is(&universe, &list, "List<@>"));
    assert!(is(&universe, &list, "Iterable<num>"));
    assert!(is(&universe, &list, "Iterable"));
    assert!(!is(&universe, &list, "List<num>"));
    assert!(!is(&universe, &list, "Iterable<String>"));
    assert!(!is(&universe, &list, "Map"));
}

#[test]
fn test_instance_agrees_with_subtype_for_declared_variance() {
    let universe = TypeUniverse::new();
    universe
        .class("Sink")
        .param("T", Variance::CONTRAVARIANT)
        .register();
    universe
        .class("Pair")
        .param("A", Variance::INDEPENDENT)
        .param("B", Variance::COVARIANT)
        .register();

    let list = Value::list(TypeId::INT, vec![Value::Int(1)]);
    let sink = universe.new_instance("Sink", &[TypeId::INT]);
    let pair = universe.new_instance("Pair", &[TypeId::STRING, TypeId::INT]);
    let cases = [
        (&list, "List<@>"),
        (&list, "Iterable<@>"),
        (&sink, "Sink<@>"),
        (&sink, "Sink<Object>"),
        (&sink, "Sink"),
        (&pair, "Pair<int,@>"),
        (&pair, "Pair<@,@>"),
    ];
    for (value, recipe) in cases {
        let target = ty(&universe, recipe);
        let runtime_type = universe.runtime_type_of(value);
        assert_eq!(
            universe.is_instance(value, target),
            universe.is_subtype(runtime_type, target),
            "{recipe}"
        );
    }
    assert!(!is(&universe, &sink, "Sink<Object>"));
    assert!(is(&universe, &pair, "Pair<int,@>"));
    assert_eq!(
        universe.compile_check(ty(&universe, "Sink<@>")),
        InstanceCheck::General
    );
}

#[test]
fn test_map_instances() {
    let universe = TypeUniverse::new();
    let map = Value::Map(Rc::new(MapValue::new(TypeId::STRING, TypeId::INT)));

    assert!(is(&universe, &map, "Map<String,int>"));
    assert!(is(&universe, &map, "Map<Object,num>"));
    assert!(!is(&universe, &map, "Map<int,int>"));
}

#[test]
fn test_record_instances() {
    let universe = TypeUniverse::new();
    let record = Value::Record(Rc::new(RecordValue {
        shape: Rc::from("a"),
        fields: vec![Value::Int(1), Value::str("x")],
    }));

    assert!(is(&universe, &record, "+a(int,String)"));
    assert!(is(&universe, &record, "+a(num,Object)"));
    assert!(!is(&universe, &record, "+b(int,String)"));
    assert!(!is(&universe, &record, "+a(int)"));
    assert!(!is(&universe, &record, "+a(String,String)"));
    assert!(is(&universe, &record, "Record"));
    assert!(is(&universe, &Value::Null, "+a(int,String)?"));
}

#[test]
fn test_closure_instances() {
    let universe = TypeUniverse::new();
    let signature = ty(&universe, "int(Object)");
    let closure = universe.closure(signature, |_| Ok(Value::Int(0)));

    assert!(is(&universe, &closure, "num(int)"));
    assert!(is(&universe, &closure, "Function"));
    assert!(!is(&universe, &closure, "int(Object,Object)"));
    assert!(!is(&universe, &closure, "String(Object)"));
}

#[test]
fn test_error_instances() {
    let universe = TypeUniverse::new();
    let err = Value::error(RuntimeError::state("closed"));

    assert!(is(&universe, &err, "StateError"));
    assert!(is(&universe, &err, "Error"));
    assert!(!is(&universe, &err, "Exception"));
    assert_eq!(
        universe.runtime_type_of(&err),
        universe.interface("StateError", &[])
    );

    let range = Value::error(RuntimeError::range("bad"));
    assert!(is(&universe, &range, "ArgumentError"));
}

#[test]
fn test_native_instances() {
    let universe = TypeUniverse::new();
    let plain = Value::Native(Rc::new(NativeObject::new(NativeCategory::PlainObject)));
    let function = Value::Native(Rc::new(NativeObject::new(NativeCategory::Function)));

    assert!(is(&universe, &plain, "JavaScriptObject"));
    assert!(is(&universe, &plain, "LegacyJavaScriptObject"));
    assert!(!is(&universe, &plain, "Function"));
    assert!(is(&universe, &function, "Function"));
    assert!(is(&universe, &function, "int(String)"));
}

#[test]
fn test_cast() {
    let universe = TypeUniverse::new();

    assert!(universe.cast(Value::Int(1), TypeId::NUM).is_ok());
    assert!(universe.cast(Value::Null, universe.nullable(TypeId::INT)).is_ok());
    assert!(universe.cast(Value::str("x"), TypeId::DYNAMIC).is_ok());

    let err = universe
        .cast(Value::Int(1), TypeId::STRING)
        .expect_err("int is not a String");
    assert_eq!(err.class_name(), "TypeError");
    assert_eq!(
        err.to_string(),
        "1: type 'int' is not a subtype of type 'String'"
    );

    let err = universe
        .cast(Value::Null, TypeId::INT)
        .expect_err("null is not an int");
    assert_eq!(
        err.to_string(),
        "null: type 'Null' is not a subtype of type 'int'"
    );
}

#[test]
fn test_null_check() {
    let universe = TypeUniverse::new();

    assert!(universe.null_check(Value::Int(1)).is_ok());
    assert_eq!(universe.null_check(Value::Null).err(), Some(RuntimeError::NullCheck));
}

#[test]
fn test_expect_helpers() {
    let universe = TypeUniverse::new();

    assert_eq!(universe.expect_int(&Value::Int(4)), Ok(4));
    assert!(universe.expect_int(&Value::Double(4.0)).is_err());
    assert_eq!(universe.expect_nullable_int(&Value::Null), Ok(None));
    assert_eq!(universe.expect_double(&Value::Double(1.5)), Ok(1.5));
    assert!(universe.expect_double(&Value::Int(1)).is_err());
    assert_eq!(universe.expect_num(&Value::Int(2)), Ok(2.0));
    assert_eq!(universe.expect_nullable_num(&Value::Null), Ok(None));
    assert_eq!(
        universe.expect_string(&Value::str("a")).map(|s| s.to_string()),
        Ok("a".to_string())
    );
    assert_eq!(universe.expect_nullable_string(&Value::Null), Ok(None));
    assert_eq!(universe.expect_bool(&Value::Bool(true)), Ok(true));
    assert_eq!(universe.expect_nullable_bool(&Value::Bool(false)), Ok(Some(false)));

    let err = universe
        .expect_nullable_bool(&Value::Int(1))
        .expect_err("int is not a bool?");
    assert!(err.to_string().ends_with("'bool?'"), "{err}");
}

#[test]
fn test_class_of() {
    let universe = TypeUniverse::new();
    let closure = universe.closure(ty(&universe, "~()"), |_| Ok(Value::Null));

    assert_eq!(universe.class_of(&Value::Int(1)), universe.find_name("int"));
    assert_eq!(universe.class_of(&closure), universe.find_name("Function"));
    assert_eq!(universe.class_of(&Value::Null), universe.find_name("Null"));
}

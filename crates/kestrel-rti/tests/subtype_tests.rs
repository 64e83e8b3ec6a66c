use super::*;
use crate::types::Variance;

fn ty(universe: &TypeUniverse, recipe: &str) -> TypeId {
    match universe.eval(recipe) {
        Ok(id) => id,
        Err(err) => panic!("bad test recipe: {err}"),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("kestrel_rti=debug")
        .with_test_writer()
        .try_init();
}

fn sub(universe: &TypeUniverse, s: &str, t: &str) -> bool {
    let s = ty(universe, s);
    let t = ty(universe, t);
    universe.is_subtype(s, t)
}

#[test]
fn test_reflexivity() {
    let universe = TypeUniverse::new();
    for recipe in [
        "int",
        "List<int>",
        "int?",
        "int/",
        "int(String,[bool])",
        "~({a!int})",
        "0^(0^)<num>",
        "+a(int,String)",
        "0&",
        "@",
    ] {
        let t = ty(&universe, recipe);
        assert!(universe.is_subtype(t, t), "{recipe} <: {recipe}");
    }
}

#[test]
fn test_top_and_bottom() {
    let universe = TypeUniverse::new();
    for recipe in ["int", "List<String>?", "int(Object)", "Null", "~"] {
        let t = ty(&universe, recipe);
        assert!(universe.is_subtype(TypeId::NEVER, t), "Never <: {recipe}");
        assert!(universe.is_subtype(t, TypeId::DYNAMIC), "{recipe} <: dynamic");
        assert!(universe.is_subtype(t, TypeId::NULLABLE_OBJECT), "{recipe} <: Object?");
    }
    // `any` is a subtype of everything; the other top types are not.
    assert!(universe.is_subtype(TypeId::ANY, TypeId::INT));
    assert!(!universe.is_subtype(TypeId::DYNAMIC, TypeId::INT));
    assert!(!universe.is_subtype(TypeId::VOID, TypeId::OBJECT));
}

#[test]
fn test_future_or_distribution() {
    let universe = TypeUniverse::new();

    assert!(sub(&universe, "int", "int/"));
    assert!(sub(&universe, "Future<int>", "int/"));
    assert!(sub(&universe, "int/", "Object"));
    assert!(sub(&universe, "int/", "num/"));
    assert!(!sub(&universe, "int/", "int"));
    assert!(!sub(&universe, "String", "int/"));
    // Null <: FutureOr<int?> through the inner type.
    assert!(sub(&universe, "Null", "int?/"));
    assert!(!sub(&universe, "Null", "int/"));
}

#[test]
fn test_nullability() {
    let universe = TypeUniverse::new();

    assert!(sub(&universe, "int", "int?"));
    assert!(!sub(&universe, "int?", "int"));
    assert!(sub(&universe, "Null", "int?"));
    assert!(!sub(&universe, "Null", "int"));
    assert!(sub(&universe, "Null", "Null"));
    assert!(sub(&universe, "int?", "num?"));
    assert!(!sub(&universe, "int?", "Object"));
    assert!(sub(&universe, "int", "Object"));
}

#[test]
fn test_legacy_types() {
    let universe = TypeUniverse::new();

    assert!(sub(&universe, "int*", "int"));
    assert!(sub(&universe, "int?", "int*"));
    assert!(sub(&universe, "Null", "int*"));
    assert!(sub(&universe, "int*", "Object"));
    assert!(sub(&universe, "int?", "Object*"));
}

#[test]
fn test_function_variance() {
    let universe = TypeUniverse::new();

    // (Object) -> int  <:  (int) -> num
    assert!(sub(&universe, "int(Object)", "num(int)"));
    assert!(!sub(&universe, "num(int)", "int(Object)"));
    assert!(sub(&universe, "int(Object)", "Function"));
    assert!(!sub(&universe, "Function", "int(Object)"));
}

#[test]
fn test_function_positional_partition() {
    let universe = TypeUniverse::new();

    // Fewer required parameters is fine as long as optionals cover the rest.
    assert!(sub(&universe, "~([int])", "~(int)"));
    assert!(!sub(&universe, "~(int)", "~([int])"));
    assert!(sub(&universe, "~(int,[int,int])", "~(int,[int])"));
    assert!(!sub(&universe, "~(int,[int])", "~(int,[int,int])"));
    assert!(sub(&universe, "~()", "~()"));
    assert!(!sub(&universe, "~(String)", "~(int)"));
}

#[test]
fn test_function_named_parameters() {
    let universe = TypeUniverse::new();

    assert!(sub(&universe, "~({a:int,b:int})", "~({a:int})"));
    assert!(sub(&universe, "~({a:int})", "~({a!int})"));
    assert!(!sub(&universe, "~({a!int})", "~({a:int})"));
    assert!(!sub(&universe, "~({b!int})", "~()"));
    assert!(!sub(&universe, "~({a:int})", "~({b:int})"));
    assert!(sub(&universe, "~({a:num})", "~({a:int})"));
    assert!(!sub(&universe, "~({a:int})", "~({a:num})"));
    // Skipped optional source parameters are allowed before a match.
    assert!(sub(&universe, "~({a:int,c:int})", "~({c:int})"));
}

#[test]
fn test_generic_functions() {
    let universe = TypeUniverse::new();

    // <T extends num>(Object) -> T  <:  <T extends num>(T) -> Object
    assert!(sub(&universe, "0^(Object)<num>", "Object(0^)<num>"));
    // Bounds must agree.
    assert!(!sub(&universe, "0^(0^)<num>", "0^(0^)<Object>"));
    // Arity must agree.
    assert!(!sub(&universe, "~(0^,1^)<num,num>", "~(0^)<num>"));
    // A generic function is not a plain function type.
    assert!(!sub(&universe, "0^(0^)<num>", "num(num)"));
    // The bound of a parameter stands in for it on the left.
    assert!(sub(&universe, "0^()<num>", "num()<num>"));
}

#[test]
fn test_interface_variance() {
    let universe = TypeUniverse::new();

    // List is declared invariant.
    assert!(!sub(&universe, "List<int>", "List<num>"));
    assert!(sub(&universe, "List<int>", "List<int>"));
    // Iterable is covariant; List<E> implements Iterable<E>.
    assert!(sub(&universe, "List<int>", "Iterable<num>"));
    assert!(!sub(&universe, "List<num>", "Iterable<int>"));
    assert!(sub(&universe, "Future<int>", "Future<num>"));
    assert!(sub(&universe, "int", "Comparable<num>"));
    assert!(!sub(&universe, "int", "Comparable<int>"));
    assert!(!sub(&universe, "int", "String"));
    // Raw types read their missing arguments as dynamic.
    assert!(sub(&universe, "List<int>", "Iterable"));
    assert!(!sub(&universe, "List<int>", "List"));
}

#[test]
fn test_declared_contravariance() {
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

    assert!(sub(&universe, "Sink<num>", "Sink<int>"));
    assert!(!sub(&universe, "Sink<int>", "Sink<num>"));
    assert!(sub(&universe, "Pair<String,int>", "Pair<bool,num>"));
    assert!(!sub(&universe, "Pair<String,num>", "Pair<String,int>"));
}

#[test]
fn test_records() {
    let universe = TypeUniverse::new();

    assert!(sub(&universe, "+a(int,String)", "+a(num,Object)"));
    assert!(!sub(&universe, "+a(int,String)", "+b(int,String)"));
    assert!(!sub(&universe, "+(int)", "+(int,int)"));
    assert!(sub(&universe, "+(int,int)", "Record"));
    assert!(!sub(&universe, "+(int)", "Function"));
}

#[test]
fn test_host_function_interceptor() {
    let universe = TypeUniverse::new();

    assert!(sub(&universe, "JavaScriptFunction", "int(String)"));
    assert!(sub(&universe, "JavaScriptFunction", "0^(0^)<num>"));
    assert!(sub(&universe, "JavaScriptFunction", "Function"));
    assert!(!sub(&universe, "PlainJavaScriptObject", "int(String)"));
}

#[test]
fn test_depth_budget_overflow() {
    init_tracing();
    let universe = TypeUniverse::new();
    let s = ty(&universe, "Iterable<Iterable<Iterable<Iterable<int>>>>");
    let t = ty(&universe, "Iterable<Iterable<Iterable<Iterable<num>>>>");

    universe.set_limits(SubtypeLimits {
        max_depth: 3,
        max_iterations: 1_000,
    });
    assert!(!universe.is_subtype(s, t));
    assert_eq!(universe.overflow_count(), 1);
    assert!(universe.subtype_cache.borrow().get(&(s, t)).is_none());

    universe.set_limits(SubtypeLimits::default());
    assert!(universe.is_subtype(s, t));
    assert_eq!(universe.subtype_cache.borrow().get(&(s, t)), Some(&true));
}

#[test]
fn test_checker_reports_overflow() {
    let universe = TypeUniverse::with_limits(SubtypeLimits {
        max_depth: 100,
        max_iterations: 2,
    });
    let s = ty(&universe, "List<List<int>>");
    let t = ty(&universe, "Iterable<Iterable<num>>");

    let mut checker = SubtypeChecker::new(&universe);
    assert!(!checker.is_subtype(s, t));
    assert!(checker.overflowed());
}

#[test]
fn test_implementation_distance() {
    let universe = TypeUniverse::new();
    let comparable = ty(&universe, "Comparable<num>");

    assert_eq!(universe.implementation_distance(TypeId::INT, comparable), Some(2));
    assert_eq!(universe.implementation_distance(TypeId::INT, TypeId::INT), Some(0));
    assert_eq!(universe.implementation_distance(TypeId::INT, TypeId::STRING), None);
}

#[test]
fn test_mutual_subtype() {
    let universe = TypeUniverse::new();
    let a = ty(&universe, "int(num)");
    let b = ty(&universe, "int(num)?");

    assert!(universe.is_mutual_subtype(a, a));
    assert!(!universe.is_mutual_subtype(a, b));
    assert!(universe.is_mutual_subtype(TypeId::DYNAMIC, TypeId::NULLABLE_OBJECT));
}

use super::*;

fn ty(universe: &TypeUniverse, recipe: &str) -> TypeId {
    match universe.eval(recipe) {
        Ok(id) => id,
        Err(err) => panic!("bad test recipe: {err}"),
    }
}

#[test]
fn test_substitute_free_parameter() {
    let universe = TypeUniverse::new();
    let list_t = ty(&universe, "List<0^>");

    assert_eq!(
        universe.substitute(list_t, &[TypeId::INT]),
        ty(&universe, "List<int>")
    );
    assert_eq!(universe.substitute(list_t, &[]), list_t);
}

#[test]
fn test_substitute_keeps_bound_parameters() {
    let universe = TypeUniverse::new();
    // <T extends num>(U) -> T, with U free.
    let generic = ty(&universe, "0^(1^)<num>");

    let substituted = universe.substitute(generic, &[TypeId::STRING]);
    assert_eq!(substituted, ty(&universe, "0^(String)<num>"));
}

#[test]
fn test_substitute_bounds_see_their_own_binder() {
    let universe = TypeUniverse::new();
    // <T extends List<U>>() -> T, with U free.
    let generic = ty(&universe, "0^()<List<1^>>");

    let substituted = universe.substitute(generic, &[TypeId::INT]);
    assert_eq!(substituted, ty(&universe, "0^()<List<int>>"));
}

#[test]
fn test_substitute_renormalises_wrappers() {
    let universe = TypeUniverse::new();

    let nullable = ty(&universe, "0^?");
    assert_eq!(
        universe.substitute(nullable, &[TypeId::INT]),
        universe.nullable(TypeId::INT)
    );
    assert_eq!(universe.substitute(nullable, &[TypeId::NULL]), TypeId::NULL);
    assert_eq!(universe.substitute(nullable, &[TypeId::DYNAMIC]), TypeId::DYNAMIC);

    let future_or = ty(&universe, "0^/");
    assert_eq!(universe.substitute(future_or, &[TypeId::OBJECT]), TypeId::OBJECT);
}

#[test]
fn test_substitute_function_parts() {
    let universe = TypeUniverse::new();
    let positional = ty(&universe, "0^(0^,[List<0^>])");
    assert_eq!(
        universe.substitute(positional, &[TypeId::STRING]),
        ty(&universe, "String(String,[List<String>])")
    );

    let named = ty(&universe, "~({a!0^?,b:int})");
    assert_eq!(
        universe.substitute(named, &[TypeId::STRING]),
        ty(&universe, "~({a!String?,b:int})")
    );
}

#[test]
fn test_substitute_record_fields() {
    let universe = TypeUniverse::new();
    let record = ty(&universe, "+a(0^,int)");

    assert_eq!(
        universe.substitute(record, &[TypeId::BOOL]),
        ty(&universe, "+a(bool,int)")
    );
}

#[test]
fn test_instantiate_generic_function() {
    let universe = TypeUniverse::new();
    let identity = ty(&universe, "0^(0^)<Object?>");

    let instantiated = universe
        .instantiate_generic_function(identity, &[TypeId::INT])
        .expect("one type argument");
    assert_eq!(instantiated, ty(&universe, "int(int)"));
    assert_eq!(universe.display(instantiated), "int Function(int)");
}

#[test]
fn test_instantiate_arity_mismatch() {
    let universe = TypeUniverse::new();
    let identity = ty(&universe, "0^(0^)<num>");

    let err = universe
        .instantiate_generic_function(identity, &[TypeId::INT, TypeId::STRING])
        .expect_err("arity mismatch");
    assert_eq!(err.class_name(), "ArgumentError");
    assert!(err.to_string().contains("expects 1 type arguments, got 2"), "{err}");
}

#[test]
fn test_instantiate_non_generic() {
    let universe = TypeUniverse::new();
    let function = ty(&universe, "int(int)");

    assert_eq!(universe.instantiate_generic_function(function, &[]), Ok(function));
    let err = universe
        .instantiate_generic_function(function, &[TypeId::INT])
        .expect_err("not generic");
    assert!(err.to_string().contains("is not a generic function type"), "{err}");
}

#[test]
fn test_instantiated_type_is_subtype_checked() {
    let universe = TypeUniverse::new();
    let generic = ty(&universe, "0^(0^)<num>");

    let instantiated = universe
        .instantiate_generic_function(generic, &[TypeId::INT])
        .expect("instantiate");
    assert!(universe.is_subtype(instantiated, ty(&universe, "int(int)")));
    assert!(!universe.is_subtype(instantiated, ty(&universe, "int(num)")));
    assert!(!universe.is_subtype(instantiated, generic));
}

#[test]
fn test_substitution_past_ceiling_is_reported() {
    let universe = TypeUniverse::new();
    let mut nested = universe.generic_param(0);
    for _ in 0..(kestrel_common::limits::MAX_INSTANTIATION_DEPTH + 10) {
        nested = universe.interface("List", &[nested]);
    }
    let generic = universe.generic_function(nested, &[TypeId::OBJECT]);
    let before = universe.overflow_count();

    assert_eq!(
        universe.instantiate_generic_function(generic, &[TypeId::INT]),
        Err(RuntimeError::StackOverflow)
    );
    assert_eq!(universe.overflow_count(), before + 1);

    // A shallow instantiation is unaffected.
    let shallow = ty(&universe, "0^()<Object>");
    assert!(universe.instantiate_generic_function(shallow, &[TypeId::INT]).is_ok());
    assert_eq!(universe.overflow_count(), before + 1);
}

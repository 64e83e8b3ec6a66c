use super::*;

fn interface(universe: &TypeUniverse, recipe: &str) -> TypeId {
    match universe.eval(recipe) {
        Ok(id) => id,
        Err(err) => panic!("bad test recipe: {err}"),
    }
}

#[test]
fn test_path_to_self_is_empty() {
    let universe = TypeUniverse::new();
    let int = universe.intern_name("int");

    let path = universe.supertype_path(int, int).expect("path to self");
    assert!(path.is_empty());
}

#[test]
fn test_path_is_shortest() {
    let universe = TypeUniverse::new();
    let int = universe.intern_name("int");
    let comparable = universe.intern_name("Comparable");
    let num = universe.intern_name("num");

    let path = universe
        .supertype_path(int, comparable)
        .expect("int implements Comparable");
    assert_eq!(path.len(), 2);
    assert_eq!(path[0].to, num);
    assert_eq!(path[1].to, comparable);
    assert_eq!(path[1].args.as_ref(), &[Rc::<str>::from("num")]);

    let string = universe.intern_name("String");
    assert!(universe.supertype_path(int, string).is_none());
}

#[test]
fn test_supertype_args_follow_the_path() {
    let universe = TypeUniverse::new();
    let iterable = universe.intern_name("Iterable");
    let comparable = universe.intern_name("Comparable");

    let list_int = interface(&universe, "List<int>");
    let args = universe.supertype_args(list_int, iterable).expect("List is Iterable");
    assert_eq!(args.as_ref(), &[TypeId::INT]);

    let string_args = universe
        .supertype_args(TypeId::STRING, comparable)
        .expect("String is Comparable");
    assert_eq!(string_args.as_ref(), &[TypeId::STRING]);

    // A raw type carries dynamic arguments up the path.
    let raw_list = interface(&universe, "List");
    let raw_args = universe.supertype_args(raw_list, iterable).expect("raw List");
    assert_eq!(raw_args.as_ref(), &[TypeId::DYNAMIC]);
}

#[test]
fn test_supertype_args_with_nested_recipes() {
    let universe = TypeUniverse::new();
    universe
        .class("Box")
        .param("T", Variance::COVARIANT)
        .supertype("Iterable", &["List<1>"])
        .register();
    universe
        .class("IntBox")
        .supertype("Box", &["int"])
        .register();

    let iterable = universe.intern_name("Iterable");
    let args = universe
        .supertype_args(interface(&universe, "IntBox"), iterable)
        .expect("IntBox is Iterable");
    assert_eq!(args.as_ref(), &[interface(&universe, "List<int>")]);
    assert!(universe.is_subtype(
        interface(&universe, "IntBox"),
        interface(&universe, "Iterable<List<int>>")
    ));
    assert!(!universe.is_subtype(
        interface(&universe, "IntBox"),
        interface(&universe, "Iterable<List<num>>")
    ));
}

#[test]
fn test_is_subclass() {
    let universe = TypeUniverse::new();
    let int = universe.intern_name("int");
    let num = universe.intern_name("num");
    let object = universe.intern_name("Object");
    let string = universe.intern_name("String");
    let range_error = universe.intern_name("RangeError");
    let error = universe.intern_name("Error");

    assert!(universe.is_subclass(int, num));
    assert!(universe.is_subclass(int, int));
    assert!(universe.is_subclass(string, object));
    assert!(universe.is_subclass(range_error, error));
    assert!(!universe.is_subclass(num, int));
    assert!(!universe.is_subclass(string, num));
}

#[test]
fn test_class_variances() {
    let universe = TypeUniverse::new();

    let list = universe.intern_name("List");
    let map = universe.intern_name("Map");
    let bool_class = universe.intern_name("bool");
    assert_eq!(universe.class_variances(list).as_slice(), &[Variance::INVARIANT]);
    assert_eq!(
        universe.class_variances(map).as_slice(),
        &[Variance::COVARIANT, Variance::COVARIANT]
    );
    assert!(universe.class_variances(bool_class).is_empty());
}

#[test]
fn test_find_method_walks_ancestors() {
    let universe = TypeUniverse::new();
    universe
        .class("Animal")
        .method("speak", "String()", |_, _| Ok(Value::str("...")))
        .register();
    universe
        .class("Dog")
        .supertype("Animal", &[])
        .register();

    let dog = universe.intern_name("Dog");
    let animal = universe.intern_name("Animal");
    let speak = universe.intern_name("speak");
    let (declaring, method) = universe.find_method(dog, speak).expect("inherited");
    assert_eq!(declaring, animal);
    assert_eq!(method.signature.as_ref(), "String()");

    let missing = universe.intern_name("fly");
    assert!(universe.find_method(dog, missing).is_none());
}

#[test]
fn test_find_method_falls_back_to_object() {
    let universe = TypeUniverse::new();
    universe.class("Plain").register();

    let plain = universe.intern_name("Plain");
    let to_string = universe.intern_name("toString");
    let object = universe.intern_name("Object");
    let (declaring, _) = universe.find_method(plain, to_string).expect("Object.toString");
    assert_eq!(declaring, object);
}

#[test]
fn test_register_class_clears_caches() {
    let universe = TypeUniverse::new();
    universe.class("A").register();
    universe.class("B").register();
    let a = interface(&universe, "A");
    let b = interface(&universe, "B");

    assert!(!universe.is_subtype(a, b));
    assert!(!universe.subtype_cache.borrow().is_empty());

    universe.class("A").supertype("B", &[]).register();
    assert!(universe.subtype_cache.borrow().is_empty());
    assert!(universe.is_subtype(a, b));
}

#[test]
fn test_new_instance() {
    let universe = TypeUniverse::new();
    universe
        .class("Box")
        .param("T", Variance::COVARIANT)
        .register();

    let value = universe.new_instance("Box", &[TypeId::INT]);
    let Value::Instance(instance) = &value else {
        panic!("expected an instance, got {value:?}");
    };
    assert_eq!(instance.runtime_type, interface(&universe, "Box<int>"));
    assert!(universe.is_instance(&value, interface(&universe, "Box<num>")));
    assert!(!universe.is_instance(&value, interface(&universe, "Box<String>")));
}

#[test]
fn test_hierarchy_table() {
    let universe = TypeUniverse::new();
    let hierarchy = universe.hierarchy.borrow();

    assert!(!hierarchy.is_empty());
    assert!(hierarchy.contains(universe.intern_name("List")));
    assert!(!hierarchy.contains(universe.intern_name("Unregistered")));
    assert!(hierarchy.get(universe.intern_name("Future")).is_some());
}

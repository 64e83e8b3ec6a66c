use super::*;

struct PrefixResolver;

impl InterceptorResolver for PrefixResolver {
    fn resolve(&self, object: &NativeObject) -> Option<Rc<str>> {
        let name = object.constructor_name.as_deref()?;
        name.starts_with("Audio").then(|| Rc::from("AudioNode"))
    }
}

fn class_name(universe: &TypeUniverse, object: &NativeObject) -> String {
    universe.name(universe.interceptor_class(object)).to_string()
}

#[test]
fn test_category_defaults() {
    let universe = TypeUniverse::new();

    let cases = [
        (NativeCategory::PlainObject, "PlainJavaScriptObject"),
        (NativeCategory::Function, "JavaScriptFunction"),
        (NativeCategory::Array, "JavaScriptArray"),
        (NativeCategory::Other, "UnknownJavaScriptObject"),
    ];
    for (category, expected) in cases {
        assert_eq!(class_name(&universe, &NativeObject::new(category)), expected);
    }
}

#[test]
fn test_dispatch_tag_registration() {
    let universe = TypeUniverse::new();
    universe.class("Blob").supertype("JavaScriptObject", &[]).register();
    universe.register_dispatch_tag("Blob", "Blob");

    let blob = NativeObject::new(NativeCategory::Other).with_tag("Blob");
    assert_eq!(class_name(&universe, &blob), "Blob");

    let other = NativeObject::new(NativeCategory::Other).with_tag("File");
    assert_eq!(class_name(&universe, &other), "UnknownJavaScriptObject");
}

#[test]
fn test_html_element_fallback() {
    let universe = TypeUniverse::new();
    universe.register_dispatch_tag("HTMLElement", "HtmlElement");
    universe.register_dispatch_tag("HTMLInputElement", "InputElement");

    let div = NativeObject::new(NativeCategory::Other).with_tag("HTMLDivElement");
    let input = NativeObject::new(NativeCategory::Other).with_tag("HTMLInputElement");
    let not_element = NativeObject::new(NativeCategory::Other).with_tag("HTMLCollection");
    assert_eq!(class_name(&universe, &div), "HtmlElement");
    assert_eq!(class_name(&universe, &input), "InputElement");
    assert_eq!(class_name(&universe, &not_element), "UnknownJavaScriptObject");
}

#[test]
fn test_html_element_tag_shape() {
    assert!(is_html_element_tag("HTMLDivElement"));
    assert!(is_html_element_tag("HTMLAnchorElement"));
    assert!(!is_html_element_tag("HTMLElement"));
    assert!(!is_html_element_tag("HTMLdivElement"));
    assert!(!is_html_element_tag("SVGElement"));
}

#[test]
fn test_constructor_registration() {
    let universe = TypeUniverse::new();
    universe.register_native_constructor("Map", "JsMap");
    universe.register_dispatch_tag("Tagged", "ByTag");

    let map = NativeObject::new(NativeCategory::Other).with_constructor("Map");
    assert_eq!(class_name(&universe, &map), "JsMap");

    // The tag table wins over the constructor table.
    let both = NativeObject::new(NativeCategory::Other)
        .with_tag("Tagged")
        .with_constructor("Map");
    assert_eq!(class_name(&universe, &both), "ByTag");
}

#[test]
fn test_resolvers_run_after_tables() {
    let universe = TypeUniverse::new();
    universe.add_interceptor_resolver(Rc::new(PrefixResolver));
    universe.register_native_constructor("AudioContext", "AudioContext");

    let gain = NativeObject::new(NativeCategory::Other).with_constructor("AudioGain");
    let context = NativeObject::new(NativeCategory::Other).with_constructor("AudioContext");
    let plain = NativeObject::new(NativeCategory::PlainObject).with_constructor("Object");
    assert_eq!(class_name(&universe, &gain), "AudioNode");
    assert_eq!(class_name(&universe, &context), "AudioContext");
    assert_eq!(class_name(&universe, &plain), "PlainJavaScriptObject");
}

#[test]
fn test_native_runtime_type_erases_arguments() {
    let universe = TypeUniverse::new();

    let array = NativeObject::new(NativeCategory::Array);
    let runtime = universe.native_runtime_type(&array);
    assert_eq!(
        runtime,
        universe.interface("JavaScriptArray", &[TypeId::ERASED])
    );
    let raw_list = universe.interface("List", &[]);
    let list_int = universe.interface("List", &[TypeId::INT]);
    assert!(universe.is_subtype(runtime, raw_list));
    assert!(!universe.is_subtype(runtime, list_int));
    assert!(!universe.is_subtype(runtime, universe.interface("Iterable", &[TypeId::INT])));

    let plain = NativeObject::new(NativeCategory::PlainObject);
    assert_eq!(
        universe.native_runtime_type(&plain),
        universe.interface("PlainJavaScriptObject", &[])
    );
}

#[test]
fn test_native_properties_and_display() {
    let object = NativeObject::new(NativeCategory::PlainObject);
    assert_eq!(object.display_name(), "Object");
    assert!(object.get("x").is_none());

    object.set("x", Value::Int(1));
    assert!(matches!(object.get("x"), Some(Value::Int(1))));

    let tagged = NativeObject::new(NativeCategory::Other)
        .with_constructor("Thing")
        .with_tag("Widget");
    assert_eq!(tagged.display_name(), "Widget");
    assert_eq!(
        NativeObject::new(NativeCategory::Other)
            .with_constructor("Thing")
            .display_name(),
        "Thing"
    );
}

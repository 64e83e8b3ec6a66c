//! Core class library installed into every universe.
//!
//! Supertype argument recipes are relative to the declaring class, so
//! `List<E>` implementing `Iterable<E>` is written `supertype("Iterable", &["1"])`.

use crate::error::Thrown;
use crate::intern::TypeUniverse;
use crate::types::Variance;
use crate::value::Value;

pub(crate) fn install(universe: &TypeUniverse) {
    universe
        .class("Object")
        .method("toString", "String()", |receiver, _| {
            Ok::<_, Thrown>(Value::str(&receiver.to_string()))
        })
        .register();
    universe.class("Null").register();
    universe.class("Function").register();
    universe.class("Record").register();

    universe
        .class("Comparable")
        .param("T", Variance::COVARIANT)
        .register();
    universe.class("Pattern").register();
    universe
        .class("num")
        .supertype("Comparable", &["num"])
        .register();
    universe.class("int").supertype("num", &[]).register();
    universe.class("double").supertype("num", &[]).register();
    universe
        .class("String")
        .supertype("Comparable", &["String"])
        .supertype("Pattern", &[])
        .register();
    universe.class("bool").register();

    universe
        .class("Iterable")
        .param("E", Variance::COVARIANT)
        .register();
    // Element types are invariant: List<int> is not a List<num>.
    universe
        .class("List")
        .param("E", Variance::INVARIANT)
        .supertype("Iterable", &["1"])
        .register();
    universe
        .class("Map")
        .param("K", Variance::COVARIANT)
        .param("V", Variance::COVARIANT)
        .register();
    universe
        .class("Future")
        .param("T", Variance::COVARIANT)
        .register();
    universe
        .class("Stream")
        .param("T", Variance::COVARIANT)
        .register();
    universe.class("StackTrace").register();

    install_errors(universe);
    install_interceptor_classes(universe);
}

fn install_errors(universe: &TypeUniverse) {
    universe.class("Error").register();
    universe.class("Exception").register();
    for name in [
        "TypeError",
        "ArgumentError",
        "StateError",
        "UnsupportedError",
        "NoSuchMethodError",
        "StackOverflowError",
    ] {
        universe.class(name).supertype("Error", &[]).register();
    }
    universe
        .class("RangeError")
        .supertype("ArgumentError", &[])
        .register();
}

fn install_interceptor_classes(universe: &TypeUniverse) {
    universe.class("JavaScriptObject").register();
    universe
        .class("LegacyJavaScriptObject")
        .supertype("JavaScriptObject", &[])
        .register();
    for name in ["PlainJavaScriptObject", "UnknownJavaScriptObject"] {
        universe
            .class(name)
            .supertype("LegacyJavaScriptObject", &[])
            .register();
    }
    universe
        .class("JavaScriptFunction")
        .supertype("LegacyJavaScriptObject", &[])
        .supertype("Function", &[])
        .register();
    universe
        .class("JavaScriptArray")
        .param("E", Variance::INVARIANT)
        .supertype("List", &["1"])
        .supertype("JavaScriptObject", &[])
        .register();
}

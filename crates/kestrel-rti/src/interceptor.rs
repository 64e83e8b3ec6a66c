//! Interceptor table for host-native objects.
//!
//! A host object is described by its [`NativeCategory`] plus the optional
//! dispatch tag and constructor name the host reports for it. Resolution to
//! an interceptor class goes:
//!
//! 1. explicit dispatch-tag registrations (`HTMLFooElement` falls back to
//!    `HTMLElement` when only the latter is registered)
//! 2. constructor-name registrations
//! 3. embedder [`InterceptorResolver`]s, in registration order
//! 4. the category default
//!
//! The resolved class is consumed by instance checks and the subtype
//! checker only as an interface name.

use crate::intern::TypeUniverse;
use crate::types::TypeId;
use crate::value::Value;
use indexmap::IndexMap;
use kestrel_common::interner::Atom;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Closed set of host object categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NativeCategory {
    /// An object whose prototype is the host's plain object prototype.
    PlainObject,
    /// A callable host object.
    Function,
    /// A host array that was not converted structurally.
    Array,
    /// Any other host object.
    Other,
}

impl NativeCategory {
    /// Interceptor class used when nothing more specific matches.
    pub fn default_class(self) -> &'static str {
        match self {
            NativeCategory::PlainObject => "PlainJavaScriptObject",
            NativeCategory::Function => "JavaScriptFunction",
            NativeCategory::Array => "JavaScriptArray",
            NativeCategory::Other => "UnknownJavaScriptObject",
        }
    }
}

/// A host-native object.
pub struct NativeObject {
    pub category: NativeCategory,
    /// The host's type tag (`Object.prototype.toString`-style), if known.
    pub dispatch_tag: Option<Rc<str>>,
    pub constructor_name: Option<Rc<str>>,
    pub properties: RefCell<IndexMap<Rc<str>, Value>>,
}

impl NativeObject {
    pub fn new(category: NativeCategory) -> Self {
        Self {
            category,
            dispatch_tag: None,
            constructor_name: None,
            properties: RefCell::new(IndexMap::new()),
        }
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.dispatch_tag = Some(Rc::from(tag));
        self
    }

    pub fn with_constructor(mut self, name: &str) -> Self {
        self.constructor_name = Some(Rc::from(name));
        self
    }

    pub fn get(&self, property: &str) -> Option<Value> {
        self.properties.borrow().get(property).cloned()
    }

    pub fn set(&self, property: &str, value: Value) {
        self.properties.borrow_mut().insert(Rc::from(property), value);
    }

    /// Name shown in `[object X]` renderings.
    pub fn display_name(&self) -> &str {
        self.dispatch_tag
            .as_deref()
            .or(self.constructor_name.as_deref())
            .unwrap_or("Object")
    }
}

impl fmt::Debug for NativeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeObject")
            .field("category", &self.category)
            .field("dispatch_tag", &self.dispatch_tag)
            .field("constructor_name", &self.constructor_name)
            .finish_non_exhaustive()
    }
}

/// Embedder extension point for objects the tables do not cover.
pub trait InterceptorResolver {
    /// Interceptor class name for `object`, or `None` to defer.
    fn resolve(&self, object: &NativeObject) -> Option<Rc<str>>;
}

#[derive(Default)]
pub struct InterceptorTable {
    by_tag: FxHashMap<Rc<str>, Rc<str>>,
    by_constructor: FxHashMap<Rc<str>, Rc<str>>,
    resolvers: Vec<Rc<dyn InterceptorResolver>>,
}

impl InterceptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_tag(&mut self, tag: &str, class: &str) {
        self.by_tag.insert(Rc::from(tag), Rc::from(class));
    }

    pub fn register_constructor(&mut self, constructor: &str, class: &str) {
        self.by_constructor.insert(Rc::from(constructor), Rc::from(class));
    }

    pub fn add_resolver(&mut self, resolver: Rc<dyn InterceptorResolver>) {
        self.resolvers.push(resolver);
    }

    fn lookup_tables(&self, object: &NativeObject) -> Option<Rc<str>> {
        if let Some(tag) = object.dispatch_tag.as_deref() {
            if let Some(class) = self.by_tag.get(tag) {
                return Some(class.clone());
            }
            if is_html_element_tag(tag) {
                if let Some(class) = self.by_tag.get("HTMLElement") {
                    return Some(class.clone());
                }
            }
        }
        let constructor = object.constructor_name.as_deref()?;
        self.by_constructor.get(constructor).cloned()
    }
}

/// `HTML[A-Z]*Element`
fn is_html_element_tag(tag: &str) -> bool {
    let Some(rest) = tag.strip_prefix("HTML") else {
        return false;
    };
    rest.len() > "Element".len()
        && rest.ends_with("Element")
        && rest.starts_with(|c: char| c.is_ascii_uppercase())
}

impl TypeUniverse {
    /// Map a host dispatch tag to an interceptor class.
    pub fn register_dispatch_tag(&self, tag: &str, class: &str) {
        self.interceptors.borrow_mut().register_tag(tag, class);
    }

    /// Map a host constructor name to an interceptor class.
    pub fn register_native_constructor(&self, constructor: &str, class: &str) {
        self.interceptors
            .borrow_mut()
            .register_constructor(constructor, class);
    }

    pub fn add_interceptor_resolver(&self, resolver: Rc<dyn InterceptorResolver>) {
        self.interceptors.borrow_mut().add_resolver(resolver);
    }

    /// Interceptor class of a host object.
    pub fn interceptor_class(&self, object: &NativeObject) -> Atom {
        let table = self.interceptors.borrow();
        let resolved = table.lookup_tables(object).or_else(|| {
            table
                .resolvers
                .iter()
                .find_map(|resolver| resolver.resolve(object))
        });
        let class = match resolved {
            Some(class) => self.intern_name(&class),
            None => self.intern_name(object.category.default_class()),
        };
        trace!(object = object.display_name(), class = %self.name(class), "interceptor");
        class
    }

    /// Runtime type of a host object: its interceptor class with erased
    /// type arguments.
    pub fn native_runtime_type(&self, object: &NativeObject) -> TypeId {
        let class = self.interceptor_class(object);
        let arity = self.class_decl(class).map_or(0, |decl| decl.params.len());
        let args = vec![TypeId::ERASED; arity];
        self.interface_atom(class, &args)
    }
}

#[cfg(test)]
#[path = "../tests/interceptor_tests.rs"]
mod tests;

//! Runtime values.
//!
//! [`Value`] is the dynamically typed value the instance-check compiler,
//! the future layer and the message bridge operate on. Reference kinds are
//! `Rc`-shared; identity is pointer identity.

use crate::closure::Closure;
use crate::error::RuntimeError;
use crate::interceptor::NativeObject;
use crate::intern::TypeUniverse;
use crate::types::TypeId;
use indexmap::IndexMap;
use once_cell::unsync::OnceCell;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Extension point for embedder- and runtime-defined objects (futures,
/// streams, host handles).
pub trait RuntimeObject: fmt::Debug {
    /// The reified type of this object.
    fn runtime_type(&self, universe: &TypeUniverse) -> TypeId;

    /// Text used by `toString`-style displays.
    fn describe(&self) -> String;

    fn as_any(&self) -> &dyn Any;

    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

/// A dynamically typed runtime value.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(Rc<str>),
    List(Rc<ListValue>),
    Map(Rc<MapValue>),
    Record(Rc<RecordValue>),
    Instance(Rc<InstanceValue>),
    Closure(Rc<Closure>),
    Native(Rc<NativeObject>),
    Error(Rc<RuntimeError>),
    Opaque(Rc<dyn RuntimeObject>),
}

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn list(element_type: TypeId, items: Vec<Value>) -> Value {
        Value::List(Rc::new(ListValue::new(element_type, items)))
    }

    pub fn error(err: RuntimeError) -> Value {
        Value::Error(Rc::new(err))
    }

    pub fn opaque<T: RuntimeObject + 'static>(object: Rc<T>) -> Value {
        Value::Opaque(object)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of an `int` or `double`.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Downcast an opaque value to a concrete runtime object.
    pub fn downcast_opaque<T: 'static>(&self) -> Option<Rc<T>> {
        match self {
            Value::Opaque(object) => object.clone().into_any_rc().downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Identity comparison: primitives by value, references by pointer.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Record(a), Value::Record(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
            (Value::Opaque(a), Value::Opaque(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            _ => false,
        }
    }

    /// Short, JSON-like rendering used in error messages.
    ///
    /// Strings are quoted; other values use their display form.
    pub fn safe_to_string(&self) -> String {
        match self {
            Value::Str(s) => format!("{s:?}"),
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Double(_) => self.to_string(),
            Value::Instance(instance) => format!("Instance of '{}'", instance.class_name),
            Value::Closure(closure) => format!("Closure '{}'", closure.name()),
            _ => self.to_string(),
        }
    }
}

/// Render a double the way the runtime prints numbers.
pub fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        let text = if d > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if d.fract() == 0.0 && d.abs() < 1e21 {
        format!("{d:.1}")
    } else {
        d.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Double(d) => f.write_str(&format_double(*d)),
            Value::Str(s) => f.write_str(s),
            Value::List(list) => {
                f.write_str("[")?;
                for (i, item) in list.items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.entries.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {value}", key.to_value())?;
                }
                f.write_str("}")
            }
            Value::Record(record) => {
                f.write_str("(")?;
                for (i, field) in record.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{field}")?;
                }
                f.write_str(")")
            }
            Value::Instance(instance) => write!(f, "Instance of '{}'", instance.class_name),
            Value::Closure(closure) => write!(f, "Closure '{}'", closure.name()),
            Value::Native(native) => write!(f, "[object {}]", native.display_name()),
            Value::Error(err) => write!(f, "{err}"),
            Value::Opaque(object) => f.write_str(&object.describe()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<RuntimeError> for Value {
    fn from(err: RuntimeError) -> Self {
        Value::error(err)
    }
}

// =============================================================================
// Lists
// =============================================================================

/// A growable list carrying its reified element type.
#[derive(Debug)]
pub struct ListValue {
    pub element_type: TypeId,
    items: RefCell<Vec<Value>>,
}

impl ListValue {
    pub fn new(element_type: TypeId, items: Vec<Value>) -> Self {
        Self {
            element_type,
            items: RefCell::new(items),
        }
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn get(&self, index: i64) -> Result<Value, RuntimeError> {
        let items = self.items.borrow();
        usize::try_from(index)
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .ok_or_else(|| RuntimeError::index_out_of_range(index, items.len()))
    }

    pub fn push(&self, value: Value) {
        self.items.borrow_mut().push(value);
    }

    pub fn clear(&self) {
        self.items.borrow_mut().clear();
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.items.borrow().clone()
    }
}

// =============================================================================
// Maps
// =============================================================================

/// Hashable map key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MapKey {
    Null,
    Bool(bool),
    Int(i64),
    Str(Rc<str>),
}

impl MapKey {
    pub fn from_value(value: &Value) -> Result<MapKey, RuntimeError> {
        match value {
            Value::Null => Ok(MapKey::Null),
            Value::Bool(b) => Ok(MapKey::Bool(*b)),
            Value::Int(i) => Ok(MapKey::Int(*i)),
            Value::Str(s) => Ok(MapKey::Str(s.clone())),
            other => Err(RuntimeError::argument(format!(
                "unsupported map key {}",
                other.safe_to_string()
            ))),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Null => Value::Null,
            MapKey::Bool(b) => Value::Bool(*b),
            MapKey::Int(i) => Value::Int(*i),
            MapKey::Str(s) => Value::Str(s.clone()),
        }
    }
}

impl From<&str> for MapKey {
    fn from(s: &str) -> Self {
        MapKey::Str(Rc::from(s))
    }
}

/// An insertion-ordered map with reified key and value types.
///
/// Maps built from host objects are immutable; their key list is computed on
/// first use and then shared.
#[derive(Debug)]
pub struct MapValue {
    pub key_type: TypeId,
    pub value_type: TypeId,
    entries: RefCell<IndexMap<MapKey, Value>>,
    immutable: bool,
    keys: OnceCell<Rc<[Value]>>,
}

impl MapValue {
    pub fn new(key_type: TypeId, value_type: TypeId) -> Self {
        Self {
            key_type,
            value_type,
            entries: RefCell::new(IndexMap::new()),
            immutable: false,
            keys: OnceCell::new(),
        }
    }

    /// An immutable `Map<String, dynamic>` view of a host object.
    pub fn from_host(entries: IndexMap<MapKey, Value>) -> Self {
        Self {
            key_type: TypeId::STRING,
            value_type: TypeId::DYNAMIC,
            entries: RefCell::new(entries),
            immutable: true,
            keys: OnceCell::new(),
        }
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn get(&self, key: &MapKey) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn insert(&self, key: MapKey, value: Value) -> Result<(), RuntimeError> {
        if self.immutable {
            return Err(RuntimeError::unsupported("Cannot modify unmodifiable map"));
        }
        self.entries.borrow_mut().insert(key, value);
        Ok(())
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Rc<[Value]> {
        let compute = || {
            self.entries
                .borrow()
                .keys()
                .map(MapKey::to_value)
                .collect::<Rc<[Value]>>()
        };
        if self.immutable {
            self.keys.get_or_init(compute).clone()
        } else {
            compute()
        }
    }

    /// Whether the lazy key list has been materialised.
    pub fn keys_computed(&self) -> bool {
        self.keys.get().is_some()
    }

    pub fn entries(&self) -> Vec<(MapKey, Value)> {
        self.entries
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

// =============================================================================
// Records and class instances
// =============================================================================

/// A record value. `shape` is the same tag used by record types.
#[derive(Debug)]
pub struct RecordValue {
    pub shape: Rc<str>,
    pub fields: Vec<Value>,
}

/// An instance of a registered class.
#[derive(Debug)]
pub struct InstanceValue {
    pub class_name: Rc<str>,
    pub runtime_type: TypeId,
    fields: RefCell<IndexMap<Rc<str>, Value>>,
}

impl InstanceValue {
    pub fn new(class_name: Rc<str>, runtime_type: TypeId) -> Self {
        Self {
            class_name,
            runtime_type,
            fields: RefCell::new(IndexMap::new()),
        }
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(Rc::from(name), value);
    }
}

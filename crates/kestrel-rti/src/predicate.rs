//! Instance checks and casts.
//!
//! `value is T` is compiled once per type into an [`InstanceCheck`] and
//! memoized. Cheap forms (top, `Object`, primitives, class-tag tests for
//! interfaces whose arguments are top in covariant positions) avoid the
//! general path, which computes the value's runtime type and runs the
//! subtype checker.
//!
//! A `null` value is an instance of `T` exactly when `T` is nullable, except
//! for the primitive forms, which never accept `null`.

use crate::error::RuntimeError;
use crate::intern::TypeUniverse;
use crate::types::{TypeData, TypeId, TypeListId, Variance};
use crate::value::Value;
use kestrel_common::interner::Atom;
use std::rc::Rc;
use tracing::trace;

/// A primitive representation test.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int,
    Double,
    Num,
    String,
    Bool,
}

/// Compiled form of `value is T`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstanceCheck {
    /// Top types and `Object*`.
    Always,
    /// `Never`.
    Never,
    /// `Object`: anything but `null`.
    NonNull,
    /// `T?`: `null` or an instance of the wrapped type.
    Nullable(TypeId),
    /// `FutureOr<T>`: an instance of `T` or of `Future<T>`.
    FutureOr(TypeId),
    Primitive(Primitive),
    /// Interface whose arguments cannot narrow the answer (all top, each
    /// in a covariant or independent position): the value's class must be
    /// the tagged class or a subclass.
    ClassTag(Atom),
    /// Record: same shape and arity, each field an instance of its type.
    Record,
    /// Runtime type of the value, then a subtype check.
    General,
}

impl TypeUniverse {
    /// Compile (or fetch the memoized) check for `ty`.
    pub fn compile_check(&self, ty: TypeId) -> InstanceCheck {
        if let Some(&check) = self.checks.borrow().get(&ty) {
            return check;
        }
        let check = self.build_check(ty);
        trace!(ty = %self.display(ty), ?check, "compiled instance check");
        self.checks.borrow_mut().insert(ty, check);
        check
    }

    fn build_check(&self, ty: TypeId) -> InstanceCheck {
        if ty == TypeId::OBJECT {
            return InstanceCheck::NonNull;
        }
        if self.is_top(ty) || self.is_legacy_object(ty) {
            return InstanceCheck::Always;
        }
        let data = self.data(ty);
        match data {
            TypeData::Nullable(inner) => return InstanceCheck::Nullable(inner),
            TypeData::Never => return InstanceCheck::Never,
            _ => {}
        }
        // Legacy types check like their wrapped type; only `null` handling
        // looks at the outer type.
        let (unwrapped, unwrapped_data) = match data {
            TypeData::Star(inner) => (inner, self.data(inner)),
            _ => (ty, data),
        };
        if let TypeData::FutureOr(inner) = unwrapped_data {
            return InstanceCheck::FutureOr(inner);
        }
        let primitive = match unwrapped {
            TypeId::INT => Some(Primitive::Int),
            TypeId::DOUBLE => Some(Primitive::Double),
            TypeId::NUM => Some(Primitive::Num),
            TypeId::STRING => Some(Primitive::String),
            TypeId::BOOL => Some(Primitive::Bool),
            _ => None,
        };
        if let Some(primitive) = primitive {
            return InstanceCheck::Primitive(primitive);
        }
        match unwrapped_data {
            TypeData::Interface { name, args } => {
                if self.tag_decides(name, args) {
                    InstanceCheck::ClassTag(name)
                } else {
                    InstanceCheck::General
                }
            }
            TypeData::Record { .. } => InstanceCheck::Record,
            _ => InstanceCheck::General,
        }
    }

    /// Whether the class tag alone decides `value is name<args>`.
    ///
    /// Missing arguments count as `dynamic`. A top argument is only free
    /// for a covariant or independent parameter: an invariant `List<dynamic>`
    /// rejects a `List<int>`, and a contravariant parameter rejects any
    /// narrower argument.
    fn tag_decides(&self, name: Atom, args: TypeListId) -> bool {
        let args = self.type_list(args);
        let variances = self.class_variances(name);
        let count = variances.len().max(args.len());
        (0..count).all(|i| {
            let variance = variances.get(i).copied().unwrap_or(Variance::COVARIANT);
            if variance == Variance::INDEPENDENT {
                return true;
            }
            let arg = args.get(i).copied().unwrap_or(TypeId::DYNAMIC);
            variance == Variance::COVARIANT && (self.is_top(arg) || self.is_legacy_object(arg))
        })
    }

    /// `value is ty`.
    pub fn is_instance(&self, value: &Value, ty: TypeId) -> bool {
        match self.compile_check(ty) {
            InstanceCheck::Always => true,
            InstanceCheck::Never => false,
            InstanceCheck::NonNull => !value.is_null(),
            InstanceCheck::Nullable(inner) => value.is_null() || self.is_instance(value, inner),
            InstanceCheck::FutureOr(inner) => {
                self.is_instance(value, inner) || self.is_instance(value, self.future(inner))
            }
            InstanceCheck::Primitive(primitive) => matches!(
                (primitive, value),
                (Primitive::Int, Value::Int(_))
                    | (Primitive::Double, Value::Double(_))
                    | (Primitive::Num, Value::Int(_) | Value::Double(_))
                    | (Primitive::String, Value::Str(_))
                    | (Primitive::Bool, Value::Bool(_))
            ),
            InstanceCheck::ClassTag(tag) => {
                if value.is_null() {
                    return self.is_nullable(ty);
                }
                match self.class_of(value) {
                    Some(class) => self.is_subclass(class, tag),
                    None => false,
                }
            }
            InstanceCheck::Record => {
                let Value::Record(record) = value else {
                    return value.is_null() && self.is_nullable(ty);
                };
                self.record_matches(record.shape.as_ref(), &record.fields, ty)
            }
            InstanceCheck::General => {
                if value.is_null() {
                    return self.is_nullable(ty);
                }
                let runtime = self.runtime_type_of(value);
                self.is_subtype(runtime, ty)
            }
        }
    }

    fn record_matches(&self, shape: &str, fields: &[Value], ty: TypeId) -> bool {
        let target = match self.data(ty) {
            TypeData::Star(inner) => self.data(inner),
            data => data,
        };
        let TypeData::Record {
            shape: target_shape,
            fields: target_fields,
        } = target
        else {
            return false;
        };
        let target_fields = self.type_list(target_fields);
        self.name(target_shape).as_ref() == shape
            && target_fields.len() == fields.len()
            && fields
                .iter()
                .zip(target_fields.iter())
                .all(|(field, &field_type)| self.is_instance(field, field_type))
    }

    /// `value as ty`.
    pub fn cast(&self, value: Value, ty: TypeId) -> Result<Value, RuntimeError> {
        if self.is_top(ty) || self.is_legacy_object(ty) {
            return Ok(value);
        }
        if value.is_null() && self.is_nullable(ty) {
            return Ok(value);
        }
        if self.is_instance(&value, ty) {
            return Ok(value);
        }
        Err(self.type_error(&value, ty))
    }

    /// The error raised when `value` fails a check against `ty`.
    pub fn type_error(&self, value: &Value, ty: TypeId) -> RuntimeError {
        let actual = self.runtime_type_of(value);
        RuntimeError::Type {
            value: value.safe_to_string(),
            actual: self.display(actual),
            expected: self.display(ty),
        }
    }

    /// `value!`
    pub fn null_check(&self, value: Value) -> Result<Value, RuntimeError> {
        if value.is_null() {
            Err(RuntimeError::NullCheck)
        } else {
            Ok(value)
        }
    }

    pub fn expect_int(&self, value: &Value) -> Result<i64, RuntimeError> {
        match value {
            Value::Int(i) => Ok(*i),
            other => Err(self.type_error(other, TypeId::INT)),
        }
    }

    pub fn expect_nullable_int(&self, value: &Value) -> Result<Option<i64>, RuntimeError> {
        match value {
            Value::Null => Ok(None),
            Value::Int(i) => Ok(Some(*i)),
            other => Err(self.type_error(other, self.nullable(TypeId::INT))),
        }
    }

    pub fn expect_double(&self, value: &Value) -> Result<f64, RuntimeError> {
        match value {
            Value::Double(d) => Ok(*d),
            other => Err(self.type_error(other, TypeId::DOUBLE)),
        }
    }

    pub fn expect_num(&self, value: &Value) -> Result<f64, RuntimeError> {
        value
            .as_num()
            .ok_or_else(|| self.type_error(value, TypeId::NUM))
    }

    pub fn expect_nullable_num(&self, value: &Value) -> Result<Option<f64>, RuntimeError> {
        if value.is_null() {
            return Ok(None);
        }
        value
            .as_num()
            .map(Some)
            .ok_or_else(|| self.type_error(value, self.nullable(TypeId::NUM)))
    }

    pub fn expect_string(&self, value: &Value) -> Result<Rc<str>, RuntimeError> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            other => Err(self.type_error(other, TypeId::STRING)),
        }
    }

    pub fn expect_nullable_string(&self, value: &Value) -> Result<Option<Rc<str>>, RuntimeError> {
        match value {
            Value::Null => Ok(None),
            Value::Str(s) => Ok(Some(s.clone())),
            other => Err(self.type_error(other, self.nullable(TypeId::STRING))),
        }
    }

    pub fn expect_bool(&self, value: &Value) -> Result<bool, RuntimeError> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(self.type_error(other, TypeId::BOOL)),
        }
    }

    pub fn expect_nullable_bool(&self, value: &Value) -> Result<Option<bool>, RuntimeError> {
        match value {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(*b)),
            other => Err(self.type_error(other, self.nullable(TypeId::BOOL))),
        }
    }

    /// The reified type of a value.
    pub fn runtime_type_of(&self, value: &Value) -> TypeId {
        match value {
            Value::Null => TypeId::NULL,
            Value::Bool(_) => TypeId::BOOL,
            Value::Int(_) => TypeId::INT,
            Value::Double(_) => TypeId::DOUBLE,
            Value::Str(_) => TypeId::STRING,
            Value::List(list) => self.interface("List", &[list.element_type]),
            Value::Map(map) => self.interface("Map", &[map.key_type, map.value_type]),
            Value::Record(record) => {
                let fields: Vec<TypeId> = record
                    .fields
                    .iter()
                    .map(|field| self.runtime_type_of(field))
                    .collect();
                self.record(&record.shape, &fields)
            }
            Value::Instance(instance) => instance.runtime_type,
            Value::Closure(closure) => closure.signature,
            Value::Native(native) => self.native_runtime_type(native),
            Value::Error(err) => self.interface(err.class_name(), &[]),
            Value::Opaque(object) => object.runtime_type(self),
        }
    }

    /// Class of a non-null value, for class-tag checks.
    pub fn class_of(&self, value: &Value) -> Option<Atom> {
        let runtime = self.runtime_type_of(value);
        match self.data(runtime) {
            TypeData::Interface { name, .. } => Some(name),
            TypeData::Function(_) | TypeData::GenericFunction { .. } => self.find_name("Function"),
            TypeData::Record { .. } => self.find_name("Record"),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "../tests/predicate_tests.rs"]
mod tests;

//! Closures and tear-offs.
//!
//! A closure is a callable value with a reified signature. Bound-method
//! tear-offs capture their receiver; their signature is the method's
//! signature recipe evaluated in the receiver's type environment as seen
//! from the declaring class, so `Box<int>().get` has type `int Function()`
//! even when `get` is inherited from a generic superclass.

use crate::error::{RuntimeError, Thrown};
use crate::intern::TypeUniverse;
use crate::types::{TypeData, TypeId};
use crate::value::Value;
use kestrel_common::interner::Atom;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Body of a closure.
pub type ClosureBody = Rc<dyn Fn(&Arguments) -> Result<Value, Thrown>>;

/// Arguments of a call.
#[derive(Clone, Debug, Default)]
pub struct Arguments {
    pub positional: Vec<Value>,
    pub named: Vec<(Atom, Value)>,
    pub type_args: Vec<TypeId>,
}

impl Arguments {
    pub fn new(positional: Vec<Value>) -> Self {
        Self {
            positional,
            ..Self::default()
        }
    }

    pub fn with_named(mut self, name: Atom, value: Value) -> Self {
        self.named.push((name, value));
        self
    }

    pub fn with_type_args(mut self, type_args: Vec<TypeId>) -> Self {
        self.type_args = type_args;
        self
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn named(&self, name: Atom) -> Option<&Value> {
        self.named
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, value)| value)
    }
}

/// How a closure came to be.
#[derive(Clone, Debug)]
pub enum ClosureKind {
    /// Top-level or static function.
    Static { name: Rc<str> },
    /// Instance method bound to a receiver.
    Bound {
        receiver: Value,
        class: Atom,
        member: Atom,
    },
    /// Generic function with its type arguments supplied.
    Instantiation {
        target: Rc<Closure>,
        type_args: Rc<[TypeId]>,
    },
    Anonymous,
}

/// Accepted argument shapes, derived from the signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Arity {
    pub required: usize,
    pub optional: usize,
    /// Named parameters: name, name text, required flag.
    pub named: Vec<(Atom, Rc<str>, bool)>,
    pub type_params: usize,
}

impl Arity {
    fn of(universe: &TypeUniverse, signature: TypeId) -> Option<Arity> {
        let (shape_type, type_params) = match universe.data(signature) {
            TypeData::GenericFunction { base, bounds } => (base, universe.type_list(bounds).len()),
            _ => (signature, 0),
        };
        let TypeData::Function(shape_id) = universe.data(shape_type) else {
            return None;
        };
        let shape = universe.function_shape(shape_id);
        Some(Arity {
            required: shape.required.len(),
            optional: shape.optional.len(),
            named: shape
                .named
                .iter()
                .map(|p| (p.name, universe.name(p.name), p.required))
                .collect(),
            type_params,
        })
    }

    fn validate(&self, args: &Arguments) -> Result<(), String> {
        let count = args.positional.len();
        let max = self.required + self.optional;
        if count < self.required || count > max {
            return Err(if self.optional == 0 {
                format!("expected {} positional arguments, got {count}", self.required)
            } else {
                format!(
                    "expected {} to {max} positional arguments, got {count}",
                    self.required
                )
            });
        }
        let unexpected = args
            .named
            .iter()
            .filter(|(name, _)| !self.named.iter().any(|(declared, _, _)| declared == name))
            .count();
        if unexpected > 0 {
            return Err(format!("{unexpected} unexpected named arguments"));
        }
        for (name, text, required) in &self.named {
            if *required && args.named(*name).is_none() {
                return Err(format!("missing required named argument '{text}'"));
            }
        }
        if !args.type_args.is_empty() && args.type_args.len() != self.type_params {
            return Err(format!(
                "expected {} type arguments, got {}",
                self.type_params,
                args.type_args.len()
            ));
        }
        Ok(())
    }
}

/// A callable runtime value.
pub struct Closure {
    pub kind: ClosureKind,
    pub signature: TypeId,
    /// `None` when the signature is not a function type (calls are unchecked).
    pub arity: Option<Arity>,
    name: Rc<str>,
    body: ClosureBody,
}

impl Closure {
    pub fn new(
        universe: &TypeUniverse,
        kind: ClosureKind,
        signature: TypeId,
        body: ClosureBody,
    ) -> Self {
        let name: Rc<str> = match &kind {
            ClosureKind::Static { name } => name.clone(),
            ClosureKind::Bound { class, member, .. } => {
                Rc::from(format!("{}.{}", universe.name(*class), universe.name(*member)))
            }
            ClosureKind::Instantiation { target, .. } => target.name.clone(),
            ClosureKind::Anonymous => Rc::from("<anonymous closure>"),
        };
        Self {
            arity: Arity::of(universe, signature),
            kind,
            signature,
            name,
            body,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the closure after checking the argument shape.
    pub fn call(&self, args: &Arguments) -> Result<Value, Thrown> {
        if let Some(arity) = &self.arity {
            if let Err(message) = arity.validate(args) {
                return Err(RuntimeError::argument(format!("Closure '{}': {message}", self.name)).into());
            }
        }
        if let ClosureKind::Instantiation { type_args, .. } = &self.kind {
            let mut forwarded = args.clone();
            forwarded.type_args = type_args.to_vec();
            return (self.body)(&forwarded);
        }
        (self.body)(args)
    }

    /// Tear-off equality: bound tear-offs of the same member on the same
    /// receiver are equal, as are static tear-offs of the same function.
    /// Anonymous closures are equal only to themselves.
    pub fn equals(&self, other: &Closure) -> bool {
        match (&self.kind, &other.kind) {
            (
                ClosureKind::Bound {
                    receiver: a,
                    member: m1,
                    ..
                },
                ClosureKind::Bound {
                    receiver: b,
                    member: m2,
                    ..
                },
            ) => m1 == m2 && a.identical(b),
            (ClosureKind::Static { name: a }, ClosureKind::Static { name: b }) => a == b,
            (
                ClosureKind::Instantiation {
                    target: t1,
                    type_args: a1,
                },
                ClosureKind::Instantiation {
                    target: t2,
                    type_args: a2,
                },
            ) => a1 == a2 && t1.equals(t2),
            _ => std::ptr::eq(self, other),
        }
    }
}

impl PartialEq for Closure {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

impl TypeUniverse {
    /// Bind `member` of `receiver` into a closure.
    pub fn tear_off(&self, receiver: &Value, member: &str) -> Result<Value, RuntimeError> {
        let missing = || RuntimeError::no_such_method(receiver.safe_to_string(), member);
        let class = self.class_of(receiver).ok_or_else(missing)?;
        let member_atom = self.find_name(member).ok_or_else(missing)?;
        let (declaring, method) = self.find_method(class, member_atom).ok_or_else(missing)?;

        let receiver_type = self.runtime_type_of(receiver);
        let environment = if declaring == class {
            self.complete_interface(receiver_type)
        } else {
            match self.supertype_args(receiver_type, declaring) {
                Some(args) => self.interface_atom(declaring, &args),
                None => self.complete_interface(self.interface_atom(declaring, &[])),
            }
        };
        let signature = self.eval_in_environment(environment, &method.signature)?;
        debug!(
            member,
            declaring = %self.name(declaring),
            signature = %self.display(signature),
            "tear-off"
        );

        let bound_receiver = receiver.clone();
        let method_body = method.body.clone();
        let body: ClosureBody = Rc::new(move |args| method_body(&bound_receiver, args));
        let kind = ClosureKind::Bound {
            receiver: receiver.clone(),
            class: declaring,
            member: member_atom,
        };
        Ok(Value::Closure(Rc::new(Closure::new(self, kind, signature, body))))
    }

    /// Closure over a static function with the given signature recipe.
    pub fn static_tear_off(
        &self,
        name: &str,
        signature: &str,
        body: impl Fn(&Arguments) -> Result<Value, Thrown> + 'static,
    ) -> Result<Value, RuntimeError> {
        let signature = self.eval(signature)?;
        let kind = ClosureKind::Static {
            name: Rc::from(name),
        };
        Ok(Value::Closure(Rc::new(Closure::new(
            self,
            kind,
            signature,
            Rc::new(body),
        ))))
    }

    /// Anonymous closure with an already-built signature.
    pub fn closure(
        &self,
        signature: TypeId,
        body: impl Fn(&Arguments) -> Result<Value, Thrown> + 'static,
    ) -> Value {
        Value::Closure(Rc::new(Closure::new(
            self,
            ClosureKind::Anonymous,
            signature,
            Rc::new(body),
        )))
    }

    /// Instantiate a generic closure with explicit type arguments.
    pub fn instantiate_tear_off(
        &self,
        target: &Rc<Closure>,
        type_args: &[TypeId],
    ) -> Result<Value, RuntimeError> {
        let signature = self.instantiate_generic_function(target.signature, type_args)?;
        let kind = ClosureKind::Instantiation {
            target: target.clone(),
            type_args: Rc::from(type_args),
        };
        Ok(Value::Closure(Rc::new(Closure::new(
            self,
            kind,
            signature,
            target.body.clone(),
        ))))
    }
}

#[cfg(test)]
#[path = "../tests/closure_tests.rs"]
mod tests;

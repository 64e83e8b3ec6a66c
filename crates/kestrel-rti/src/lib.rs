//! Reified Generic Type Engine
//!
//! This crate implements the runtime type information layer:
//!
//! - **Interning**: structurally equal types share one `TypeId`, keyed by
//!   their canonical recipe
//! - **Recipes**: a compact postfix encoding decoded with an operand stack
//! - **Subtyping**: nullability, `FutureOr`, declared variance, function
//!   contravariance and bounded generic functions, with an explicit cycle
//!   and budget guard
//! - **Instance checks**: per-type compiled predicates over runtime values
//!
//! Everything hangs off a [`TypeUniverse`], an explicit context object
//! owned by the runtime.
pub mod closure;
mod decode;
pub mod error;
mod format;
pub mod hierarchy;
mod instantiate;
pub mod interceptor;
mod intern;
pub mod predicate;
mod prelude;
pub mod recursion;
pub mod subtype;
mod subtype_rules;
pub mod types;
pub mod value;

pub use closure::{Arguments, Closure, ClosureBody, ClosureKind};
pub use error::{
    DecodeError, DecodeErrorKind, HostError, HostErrorKind, RuntimeError, StackTrace, Thrown,
};
pub use hierarchy::{ClassBuilder, ClassDecl, MethodBody, MethodDecl};
pub use interceptor::{InterceptorResolver, NativeCategory, NativeObject};
pub use intern::TypeUniverse;
pub use kestrel_common::interner::Atom;
pub use predicate::{InstanceCheck, Primitive};
pub use subtype::{SubtypeChecker, SubtypeLimits};
pub use types::{FunctionShape, NamedParam, TypeData, TypeId, TypeListId, Variance};
pub use value::{
    InstanceValue, ListValue, MapKey, MapValue, RecordValue, RuntimeObject, Value,
};

//! Type graph representation.
//!
//! Types are addressed by [`TypeId`] handles into a [`TypeUniverse`](crate::TypeUniverse).
//! Two structurally equal types always share one handle, so identity checks
//! are integer comparisons.

use bitflags::bitflags;
use kestrel_common::interner::Atom;

/// Handle to an interned type node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    // Pre-registered types. `TypeUniverse::new` interns them in this order.
    pub const NEVER: TypeId = TypeId(0);
    pub const DYNAMIC: TypeId = TypeId(1);
    pub const VOID: TypeId = TypeId(2);
    pub const ANY: TypeId = TypeId(3);
    pub const ERASED: TypeId = TypeId(4);
    pub const OBJECT: TypeId = TypeId(5);
    pub const NULL: TypeId = TypeId(6);
    pub const NULLABLE_OBJECT: TypeId = TypeId(7);
    pub const FUNCTION: TypeId = TypeId(8);
    pub const RECORD: TypeId = TypeId(9);
    pub const INT: TypeId = TypeId(10);
    pub const DOUBLE: TypeId = TypeId(11);
    pub const NUM: TypeId = TypeId(12);
    pub const STRING: TypeId = TypeId(13);
    pub const BOOL: TypeId = TypeId(14);

    /// First id handed out for types that are not pre-registered.
    pub const FIRST_USER: u32 = 15;

    /// Returns `true` for one of the fixed, pre-registered ids.
    #[inline]
    pub const fn is_intrinsic(self) -> bool {
        self.0 < Self::FIRST_USER
    }
}

/// Handle to an interned, ordered list of types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeListId(pub u32);

impl TypeListId {
    /// The empty list; always present.
    pub const EMPTY: TypeListId = TypeListId(0);

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Handle to an interned function shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionShapeId(pub u32);

/// A named function parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NamedParam {
    pub name: Atom,
    pub required: bool,
    pub ty: TypeId,
}

/// Signature of a function type.
///
/// Named parameters are kept sorted by their name text; the universe sorts
/// them when the shape is interned.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionShape {
    pub return_type: TypeId,
    pub required: Vec<TypeId>,
    pub optional: Vec<TypeId>,
    pub named: Vec<NamedParam>,
}

impl FunctionShape {
    /// A function with only required positional parameters.
    pub fn positional(return_type: TypeId, required: Vec<TypeId>) -> Self {
        Self {
            return_type,
            required,
            optional: Vec::new(),
            named: Vec::new(),
        }
    }

    pub fn with_optional(mut self, optional: Vec<TypeId>) -> Self {
        self.optional = optional;
        self
    }

    pub fn with_named(mut self, named: Vec<NamedParam>) -> Self {
        self.named = named;
        self
    }

    /// Total number of positional parameters.
    pub fn positional_count(&self) -> usize {
        self.required.len() + self.optional.len()
    }
}

/// Payload of a type node.
///
/// Kinds mirror the runtime type representation: top and bottom types,
/// wrappers, interface applications, environment bindings, records,
/// functions, generic functions and generic-function parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeData {
    Never,
    Dynamic,
    Void,
    Any,
    Erased,
    /// Legacy (unsound null safety) type `T*`.
    Star(TypeId),
    /// `T?`
    Nullable(TypeId),
    /// `FutureOr<T>`
    FutureOr(TypeId),
    /// `Name<args>`
    Interface { name: Atom, args: TypeListId },
    /// Environment formed by appending `args` to `base`.
    Binding { base: TypeId, args: TypeListId },
    /// Record type; `shape` is the shape tag (named-field layout).
    Record { shape: Atom, fields: TypeListId },
    Function(FunctionShapeId),
    /// `base<bounds>`: a function type generic over `bounds.len()` parameters.
    GenericFunction { base: TypeId, bounds: TypeListId },
    /// De Bruijn index into the enclosing generic-function parameters.
    GenericParam(u32),
}

impl TypeData {
    /// The wrapped type for `Star`, `Nullable` and `FutureOr`.
    #[inline]
    pub fn wrapped(self) -> Option<TypeId> {
        match self {
            TypeData::Star(inner) | TypeData::Nullable(inner) | TypeData::FutureOr(inner) => {
                Some(inner)
            }
            _ => None,
        }
    }

    /// Short name of the kind, used in diagnostics.
    pub fn kind_name(self) -> &'static str {
        match self {
            TypeData::Never => "never",
            TypeData::Dynamic => "dynamic",
            TypeData::Void => "void",
            TypeData::Any => "any",
            TypeData::Erased => "erased",
            TypeData::Star(_) => "star",
            TypeData::Nullable(_) => "nullable",
            TypeData::FutureOr(_) => "future-or",
            TypeData::Interface { .. } => "interface",
            TypeData::Binding { .. } => "binding",
            TypeData::Record { .. } => "record",
            TypeData::Function(_) => "function",
            TypeData::GenericFunction { .. } => "generic-function",
            TypeData::GenericParam(_) => "generic-parameter",
        }
    }
}

bitflags! {
    /// Declared variance of a class type parameter.
    ///
    /// The empty set means the parameter is independent: its argument never
    /// affects subtyping.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Variance: u8 {
        const COVARIANT = 1 << 0;
        const CONTRAVARIANT = 1 << 1;
        const INVARIANT = Self::COVARIANT.bits() | Self::CONTRAVARIANT.bits();
    }
}

impl Variance {
    /// The parameter is independent of its argument.
    pub const INDEPENDENT: Variance = Variance::empty();

    #[inline]
    pub fn is_covariant(self) -> bool {
        self.contains(Variance::COVARIANT)
    }

    #[inline]
    pub fn is_contravariant(self) -> bool {
        self.contains(Variance::CONTRAVARIANT)
    }

    #[inline]
    pub fn is_invariant(self) -> bool {
        self.contains(Variance::INVARIANT)
    }

    #[inline]
    pub fn is_independent(self) -> bool {
        self.is_empty()
    }
}

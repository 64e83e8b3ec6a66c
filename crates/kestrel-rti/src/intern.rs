//! Type interning for structural deduplication.
//!
//! [`TypeUniverse`] converts [`TypeData`] payloads into lightweight
//! [`TypeId`] handles. The interning key of every node is its canonical
//! recipe, produced by the same serializer for decoder output and for types
//! the checker builds, so both converge on one graph.
//!
//! Constructors normalise before interning:
//! - `T??` is `T?`, `dynamic?` is `dynamic`, `Never?` is `Null`
//! - `FutureOr<Object>` is `Object`, `FutureOr<top>` is the top type
//! - `FutureOr<Never>` is `Future<Never>`, `FutureOr<Null>` is `Future<Null>?`
//! - `T*` on a nullable or top type is `T`
//!
//! The universe is single-threaded; all tables use interior mutability so it
//! can be shared by reference through the checker and the scheduler.

use crate::format;
use crate::hierarchy::ClassHierarchy;
use crate::interceptor::InterceptorTable;
use crate::predicate::InstanceCheck;
use crate::prelude;
use crate::subtype::SubtypeLimits;
use crate::types::*;
use kestrel_common::interner::{Atom, Interner};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::hash::Hash;
use std::rc::Rc;
use tracing::trace;

const TYPE_LIST_INLINE: usize = 8;

pub(crate) type TypeListBuffer = SmallVec<[TypeId; TYPE_LIST_INLINE]>;

struct SliceInterner<T> {
    items: Vec<Rc<[T]>>,
    map: FxHashMap<Rc<[T]>, u32>,
}

impl<T> SliceInterner<T>
where
    T: Eq + Hash + Clone,
{
    fn new() -> Self {
        let empty: Rc<[T]> = Rc::from(Vec::new());
        let mut map = FxHashMap::default();
        map.insert(empty.clone(), 0);
        SliceInterner {
            items: vec![empty],
            map,
        }
    }

    fn intern(&mut self, items: &[T]) -> u32 {
        if items.is_empty() {
            return 0;
        }
        if let Some(&id) = self.map.get(items) {
            return id;
        }
        let rc: Rc<[T]> = Rc::from(items);
        let id = self.items.len() as u32;
        self.items.push(rc.clone());
        self.map.insert(rc, id);
        id
    }

    fn get(&self, id: u32) -> Rc<[T]> {
        self.items
            .get(id as usize)
            .unwrap_or(&self.items[0])
            .clone()
    }
}

struct ValueInterner<T> {
    items: Vec<Rc<T>>,
    map: FxHashMap<Rc<T>, u32>,
}

impl<T> ValueInterner<T>
where
    T: Eq + Hash,
{
    fn new() -> Self {
        ValueInterner {
            items: Vec::new(),
            map: FxHashMap::default(),
        }
    }

    fn intern(&mut self, value: T) -> u32 {
        if let Some(&id) = self.map.get(&value) {
            return id;
        }
        let rc = Rc::new(value);
        let id = self.items.len() as u32;
        self.items.push(rc.clone());
        self.map.insert(rc, id);
        id
    }

    fn get(&self, id: u32) -> Option<Rc<T>> {
        self.items.get(id as usize).cloned()
    }
}

/// Node storage: payloads and canonical keys indexed by `TypeId`.
struct TypeStore {
    nodes: Vec<TypeData>,
    keys: Vec<Rc<str>>,
    by_key: FxHashMap<Rc<str>, TypeId>,
    lists: SliceInterner<TypeId>,
    shapes: ValueInterner<FunctionShape>,
}

/// The type universe: interner, recipe caches, class hierarchy and the
/// interceptor table of one runtime.
pub struct TypeUniverse {
    names: RefCell<Interner>,
    store: RefCell<TypeStore>,
    pub(crate) recipe_cache: RefCell<FxHashMap<Rc<str>, TypeId>>,
    pub(crate) env_recipe_cache: RefCell<FxHashMap<(TypeId, Rc<str>), TypeId>>,
    pub(crate) subtype_cache: RefCell<FxHashMap<(TypeId, TypeId), bool>>,
    pub(crate) checks: RefCell<FxHashMap<TypeId, InstanceCheck>>,
    pub(crate) hierarchy: RefCell<ClassHierarchy>,
    pub(crate) interceptors: RefCell<InterceptorTable>,
    limits: Cell<SubtypeLimits>,
    overflows: Cell<u32>,
}

impl TypeUniverse {
    /// Create a universe with the intrinsic types and the core class library.
    pub fn new() -> Self {
        Self::with_limits(SubtypeLimits::default())
    }

    pub fn with_limits(limits: SubtypeLimits) -> Self {
        let names = Interner::with_core_names();
        let universe = TypeUniverse {
            names: RefCell::new(names),
            store: RefCell::new(TypeStore {
                nodes: Vec::with_capacity(256),
                keys: Vec::with_capacity(256),
                by_key: FxHashMap::default(),
                lists: SliceInterner::new(),
                shapes: ValueInterner::new(),
            }),
            recipe_cache: RefCell::new(FxHashMap::default()),
            env_recipe_cache: RefCell::new(FxHashMap::default()),
            subtype_cache: RefCell::new(FxHashMap::default()),
            checks: RefCell::new(FxHashMap::default()),
            hierarchy: RefCell::new(ClassHierarchy::new()),
            interceptors: RefCell::new(InterceptorTable::new()),
            limits: Cell::new(limits),
            overflows: Cell::new(0),
        };
        universe.register_intrinsics();
        prelude::install(&universe);
        universe
    }

    fn register_intrinsics(&self) {
        let intrinsics = [
            (TypeId::NEVER, TypeData::Never),
            (TypeId::DYNAMIC, TypeData::Dynamic),
            (TypeId::VOID, TypeData::Void),
            (TypeId::ANY, TypeData::Any),
            (TypeId::ERASED, TypeData::Erased),
        ];
        for (expected, data) in intrinsics {
            let id = self.intern_node(data);
            debug_assert_eq!(id, expected);
        }
        let interfaces = [
            (TypeId::OBJECT, "Object"),
            (TypeId::NULL, "Null"),
        ];
        for (expected, name) in interfaces {
            let id = self.interface(name, &[]);
            debug_assert_eq!(id, expected);
        }
        let nullable_object = self.intern_node(TypeData::Nullable(TypeId::OBJECT));
        debug_assert_eq!(nullable_object, TypeId::NULLABLE_OBJECT);
        let interfaces = [
            (TypeId::FUNCTION, "Function"),
            (TypeId::RECORD, "Record"),
            (TypeId::INT, "int"),
            (TypeId::DOUBLE, "double"),
            (TypeId::NUM, "num"),
            (TypeId::STRING, "String"),
            (TypeId::BOOL, "bool"),
        ];
        for (expected, name) in interfaces {
            let id = self.interface(name, &[]);
            debug_assert_eq!(id, expected);
        }
    }

    // =========================================================================
    // Names
    // =========================================================================

    pub fn intern_name(&self, name: &str) -> Atom {
        self.names.borrow_mut().intern(name)
    }

    /// Look up a name without interning it.
    pub fn find_name(&self, name: &str) -> Option<Atom> {
        self.names.borrow().lookup(name)
    }

    pub fn name(&self, atom: Atom) -> Rc<str> {
        self.names.borrow().shared(atom)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Payload of a type node.
    ///
    /// Ids not produced by this universe read as `erased`.
    pub fn data(&self, id: TypeId) -> TypeData {
        let store = self.store.borrow();
        let data = store.nodes.get(id.0 as usize).copied();
        debug_assert!(data.is_some(), "TypeId {id:?} not in this universe");
        data.unwrap_or(TypeData::Erased)
    }

    /// Canonical recipe of a type node.
    pub fn recipe(&self, id: TypeId) -> Rc<str> {
        self.store
            .borrow()
            .keys
            .get(id.0 as usize)
            .cloned()
            .unwrap_or_else(|| Rc::from("#"))
    }

    /// Look up an already interned node by its canonical recipe.
    pub fn lookup_recipe(&self, recipe: &str) -> Option<TypeId> {
        self.store.borrow().by_key.get(recipe).copied()
    }

    pub fn type_list(&self, id: TypeListId) -> Rc<[TypeId]> {
        self.store.borrow().lists.get(id.0)
    }

    pub fn intern_list(&self, items: &[TypeId]) -> TypeListId {
        TypeListId(self.store.borrow_mut().lists.intern(items))
    }

    pub fn function_shape(&self, id: FunctionShapeId) -> Rc<FunctionShape> {
        self.store
            .borrow()
            .shapes
            .get(id.0)
            .unwrap_or_else(|| Rc::new(FunctionShape::positional(TypeId::DYNAMIC, Vec::new())))
    }

    /// Number of interned type nodes.
    pub fn len(&self) -> usize {
        self.store.borrow().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Interface arguments, or the empty list for any other kind.
    pub fn interface_args(&self, id: TypeId) -> Rc<[TypeId]> {
        match self.data(id) {
            TypeData::Interface { args, .. } => self.type_list(args),
            _ => self.type_list(TypeListId::EMPTY),
        }
    }

    /// Interface class name, if `id` is an interface type.
    pub fn interface_name(&self, id: TypeId) -> Option<Atom> {
        match self.data(id) {
            TypeData::Interface { name, .. } => Some(name),
            _ => None,
        }
    }

    // =========================================================================
    // Limits and diagnostics
    // =========================================================================

    pub fn limits(&self) -> SubtypeLimits {
        self.limits.get()
    }

    /// Replace the subtype limits. Clears the subtype cache, since answers
    /// that overflowed under the old limits may differ.
    pub fn set_limits(&self, limits: SubtypeLimits) {
        self.limits.set(limits);
        self.subtype_cache.borrow_mut().clear();
    }

    /// Number of subtype queries that hit a cycle or exhausted their budget.
    pub fn overflow_count(&self) -> u32 {
        self.overflows.get()
    }

    pub(crate) fn record_overflow(&self) {
        self.overflows.set(self.overflows.get().saturating_add(1));
    }

    // =========================================================================
    // Interning
    // =========================================================================

    fn intern_node(&self, data: TypeData) -> TypeId {
        let key = format::canonical_recipe(self, &data);
        if let Some(&id) = self.store.borrow().by_key.get(key.as_str()) {
            return id;
        }
        let key: Rc<str> = Rc::from(key);
        let mut store = self.store.borrow_mut();
        let id = TypeId(store.nodes.len() as u32);
        trace!(id = id.0, recipe = %key, kind = data.kind_name(), "intern type");
        store.nodes.push(data);
        store.keys.push(key.clone());
        store.by_key.insert(key, id);
        id
    }

    // =========================================================================
    // Constructors
    // =========================================================================

    /// Returns `true` for `dynamic`, `void`, `any`, erased and `Object?`.
    pub fn is_top(&self, id: TypeId) -> bool {
        matches!(
            self.data(id),
            TypeData::Dynamic | TypeData::Void | TypeData::Any | TypeData::Erased
        ) || id == TypeId::NULLABLE_OBJECT
    }

    /// Returns `true` for the legacy `Object*` type.
    pub fn is_legacy_object(&self, id: TypeId) -> bool {
        matches!(self.data(id), TypeData::Star(inner) if inner == TypeId::OBJECT)
    }

    /// Returns `true` for `Null` and the legacy `Null*`.
    pub fn is_null_type(&self, id: TypeId) -> bool {
        id == TypeId::NULL || matches!(self.data(id), TypeData::Star(inner) if inner == TypeId::NULL)
    }

    /// Returns `true` when `null` is a member of `id`.
    pub fn is_nullable(&self, id: TypeId) -> bool {
        if self.is_null_type(id) || self.is_top(id) {
            return true;
        }
        match self.data(id) {
            TypeData::Nullable(_) => true,
            TypeData::Star(inner) | TypeData::FutureOr(inner) => self.is_nullable(inner),
            _ => false,
        }
    }

    /// `inner*`
    pub fn star(&self, inner: TypeId) -> TypeId {
        if self.is_top(inner)
            || self.is_null_type(inner)
            || matches!(self.data(inner), TypeData::Nullable(_) | TypeData::Star(_))
        {
            return inner;
        }
        self.intern_node(TypeData::Star(inner))
    }

    /// `inner?`
    pub fn nullable(&self, inner: TypeId) -> TypeId {
        let data = self.data(inner);
        if self.is_top(inner) || self.is_null_type(inner) || matches!(data, TypeData::Nullable(_))
        {
            return inner;
        }
        match data {
            TypeData::FutureOr(wrapped) if self.is_nullable(wrapped) => return inner,
            TypeData::Never => return TypeId::NULL,
            TypeData::Star(wrapped) => {
                if wrapped == TypeId::NEVER {
                    return TypeId::NULL;
                }
                match self.data(wrapped) {
                    TypeData::FutureOr(w) if self.is_nullable(w) => return wrapped,
                    _ => return self.nullable(wrapped),
                }
            }
            _ => {}
        }
        self.intern_node(TypeData::Nullable(inner))
    }

    /// `FutureOr<inner>`
    pub fn future_or(&self, inner: TypeId) -> TypeId {
        if self.is_top(inner) || self.is_legacy_object(inner) || inner == TypeId::OBJECT {
            return inner;
        }
        if inner == TypeId::NEVER {
            return self.future(TypeId::NEVER);
        }
        if self.is_null_type(inner) {
            let future_null = self.future(TypeId::NULL);
            return self.nullable(future_null);
        }
        self.intern_node(TypeData::FutureOr(inner))
    }

    /// `Future<inner>`
    pub fn future(&self, inner: TypeId) -> TypeId {
        self.interface("Future", &[inner])
    }

    /// `name<args>`
    pub fn interface(&self, name: &str, args: &[TypeId]) -> TypeId {
        let name = self.intern_name(name);
        self.interface_atom(name, args)
    }

    pub fn interface_atom(&self, name: Atom, args: &[TypeId]) -> TypeId {
        let args = self.intern_list(args);
        self.intern_node(TypeData::Interface { name, args })
    }

    /// Environment formed by appending `args` to `base`.
    ///
    /// Binding a binding flattens into a single binding on the original base.
    pub fn binding(&self, base: TypeId, args: &[TypeId]) -> TypeId {
        if args.is_empty() {
            return base;
        }
        let (base, all_args) = match self.data(base) {
            TypeData::Binding {
                base: inner,
                args: existing,
            } => {
                let mut all: TypeListBuffer = self.type_list(existing).iter().copied().collect();
                all.extend_from_slice(args);
                (inner, all)
            }
            _ => (base, args.iter().copied().collect()),
        };
        let args = self.intern_list(&all_args);
        self.intern_node(TypeData::Binding { base, args })
    }

    /// Function type. Named parameters are sorted by name.
    pub fn function(&self, mut shape: FunctionShape) -> TypeId {
        if shape.named.len() > 1 {
            let names = self.names.borrow();
            shape
                .named
                .sort_by(|a, b| names.text(a.name).cmp(names.text(b.name)));
        }
        let shape_id = FunctionShapeId(self.store.borrow_mut().shapes.intern(shape));
        self.intern_node(TypeData::Function(shape_id))
    }

    /// Generic function type over `bounds.len()` parameters.
    pub fn generic_function(&self, base: TypeId, bounds: &[TypeId]) -> TypeId {
        if bounds.is_empty() {
            return base;
        }
        let bounds = self.intern_list(bounds);
        self.intern_node(TypeData::GenericFunction { base, bounds })
    }

    /// Generic-function type parameter with de Bruijn index `index`.
    pub fn generic_param(&self, index: u32) -> TypeId {
        self.intern_node(TypeData::GenericParam(index))
    }

    /// Record type with the given shape tag.
    pub fn record(&self, shape: &str, fields: &[TypeId]) -> TypeId {
        let shape = self.intern_name(shape);
        let fields = self.intern_list(fields);
        self.intern_node(TypeData::Record { shape, fields })
    }
}

impl Default for TypeUniverse {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "../tests/intern_tests.rs"]
mod tests;

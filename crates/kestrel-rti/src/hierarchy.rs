//! Class hierarchy.
//!
//! Classes are registered with their type parameters (and declared
//! variance), their direct supertypes and their methods. Supertype argument
//! recipes are written relative to the declaring class: `1` is the class's
//! first type parameter. The path from a class to one of its ancestors is
//! computed once per class pair and memoized as a list of hops.
//!
//! This module assumes the supertype graph is acyclic; a cyclic declaration
//! simply never yields a path through the cycle.

use crate::closure::Arguments;
use crate::error::Thrown;
use crate::intern::TypeUniverse;
use crate::types::{TypeData, TypeId, Variance};
use crate::value::{InstanceValue, Value};
use indexmap::IndexMap;
use kestrel_common::interner::Atom;
use kestrel_common::limits::MAX_SUPERTYPE_PATH_DEPTH;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, error};

/// Body of a method: receives the receiver and the call arguments.
pub type MethodBody = Rc<dyn Fn(&Value, &Arguments) -> Result<Value, Thrown>>;

/// A declared type parameter.
#[derive(Clone, Debug)]
pub struct TypeParamDecl {
    pub name: Atom,
    pub variance: Variance,
}

/// A direct supertype: class name plus argument recipes relative to the
/// declaring class.
#[derive(Clone, Debug)]
pub struct SupertypeDecl {
    pub class: Atom,
    pub args: Vec<Rc<str>>,
}

/// A method: its signature recipe (relative to the declaring class) and body.
#[derive(Clone)]
pub struct MethodDecl {
    pub name: Atom,
    pub signature: Rc<str>,
    pub body: MethodBody,
}

impl fmt::Debug for MethodDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDecl")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// A registered class.
#[derive(Clone, Debug)]
pub struct ClassDecl {
    pub name: Atom,
    pub params: Vec<TypeParamDecl>,
    pub supertypes: Vec<SupertypeDecl>,
    pub methods: IndexMap<Atom, MethodDecl>,
}

/// One step along a supertype path.
#[derive(Clone, Debug)]
pub struct PathHop {
    pub from: Atom,
    pub to: Atom,
    pub args: Rc<[Rc<str>]>,
}

/// Registered classes plus the memoized supertype path table.
#[derive(Default)]
pub struct ClassHierarchy {
    classes: FxHashMap<Atom, Rc<ClassDecl>>,
    paths: FxHashMap<(Atom, Atom), Option<Rc<[PathHop]>>>,
}

impl ClassHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, decl: ClassDecl) {
        self.classes.insert(decl.name, Rc::new(decl));
        self.paths.clear();
    }

    pub fn get(&self, name: Atom) -> Option<Rc<ClassDecl>> {
        self.classes.get(&name).cloned()
    }

    pub fn contains(&self, name: Atom) -> bool {
        self.classes.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Shortest path of supertype hops from `sub` to `sup`.
    ///
    /// Returns an empty path when `sub == sup` and `None` when `sup` is not
    /// an ancestor.
    pub fn path(&mut self, sub: Atom, sup: Atom) -> Option<Rc<[PathHop]>> {
        if let Some(cached) = self.paths.get(&(sub, sup)) {
            return cached.clone();
        }
        let path = self.search_path(sub, sup);
        self.paths.insert((sub, sup), path.clone());
        path
    }

    fn search_path(&self, sub: Atom, sup: Atom) -> Option<Rc<[PathHop]>> {
        if sub == sup {
            return Some(Rc::from(Vec::new()));
        }
        // Breadth-first so the recorded path is the shortest one.
        let mut queue: VecDeque<(Atom, Vec<PathHop>)> = VecDeque::new();
        let mut seen: SmallVec<[Atom; 16]> = SmallVec::new();
        queue.push_back((sub, Vec::new()));
        seen.push(sub);
        while let Some((class, hops)) = queue.pop_front() {
            if hops.len() >= MAX_SUPERTYPE_PATH_DEPTH {
                continue;
            }
            let Some(decl) = self.classes.get(&class) else {
                continue;
            };
            for supertype in &decl.supertypes {
                let mut next = hops.clone();
                next.push(PathHop {
                    from: class,
                    to: supertype.class,
                    args: Rc::from(supertype.args.clone()),
                });
                if supertype.class == sup {
                    return Some(Rc::from(next));
                }
                if !seen.contains(&supertype.class) {
                    seen.push(supertype.class);
                    queue.push_back((supertype.class, next));
                }
            }
        }
        None
    }
}

/// Fluent class registration.
///
/// ```ignore
/// universe
///     .class("Box")
///     .param("T", Variance::COVARIANT)
///     .supertype("Comparable", &["Box<1>"])
///     .register();
/// ```
pub struct ClassBuilder<'u> {
    universe: &'u TypeUniverse,
    decl: ClassDecl,
}

impl<'u> ClassBuilder<'u> {
    pub fn param(mut self, name: &str, variance: Variance) -> Self {
        self.decl.params.push(TypeParamDecl {
            name: self.universe.intern_name(name),
            variance,
        });
        self
    }

    pub fn supertype(mut self, class: &str, args: &[&str]) -> Self {
        self.decl.supertypes.push(SupertypeDecl {
            class: self.universe.intern_name(class),
            args: args.iter().map(|a| Rc::from(*a)).collect(),
        });
        self
    }

    pub fn method(
        mut self,
        name: &str,
        signature: &str,
        body: impl Fn(&Value, &Arguments) -> Result<Value, Thrown> + 'static,
    ) -> Self {
        let name = self.universe.intern_name(name);
        self.decl.methods.insert(
            name,
            MethodDecl {
                name,
                signature: Rc::from(signature),
                body: Rc::new(body),
            },
        );
        self
    }

    /// Register the class, replacing any previous class of the same name.
    pub fn register(self) -> Atom {
        let name = self.decl.name;
        self.universe.register_class(self.decl);
        name
    }
}

impl TypeUniverse {
    /// Start declaring a class.
    pub fn class(&self, name: &str) -> ClassBuilder<'_> {
        ClassBuilder {
            universe: self,
            decl: ClassDecl {
                name: self.intern_name(name),
                params: Vec::new(),
                supertypes: Vec::new(),
                methods: IndexMap::new(),
            },
        }
    }

    pub fn register_class(&self, decl: ClassDecl) {
        debug!(class = %self.name(decl.name), params = decl.params.len(), "register class");
        self.hierarchy.borrow_mut().register(decl);
        // Answers involving the class may change.
        self.subtype_cache.borrow_mut().clear();
        self.checks.borrow_mut().clear();
    }

    pub fn class_decl(&self, name: Atom) -> Option<Rc<ClassDecl>> {
        self.hierarchy.borrow().get(name)
    }

    pub fn supertype_path(&self, sub: Atom, sup: Atom) -> Option<Rc<[PathHop]>> {
        self.hierarchy.borrow_mut().path(sub, sup)
    }

    /// Whether class `sub` is `sup` or one of its subclasses.
    pub fn is_subclass(&self, sub: Atom, sup: Atom) -> bool {
        sub == sup || self.name(sup).as_ref() == "Object" || self.supertype_path(sub, sup).is_some()
    }

    /// Number of supertype hops from interface `sub` to interface `sup`.
    pub fn implementation_distance(&self, sub: TypeId, sup: TypeId) -> Option<usize> {
        let sub_name = self.interface_name(sub)?;
        let sup_name = self.interface_name(sup)?;
        self.supertype_path(sub_name, sup_name).map(|path| path.len())
    }

    /// Declared variances of a class's type parameters.
    pub fn class_variances(&self, name: Atom) -> SmallVec<[Variance; 4]> {
        self.class_decl(name)
            .map(|decl| decl.params.iter().map(|p| p.variance).collect())
            .unwrap_or_default()
    }

    /// `ty` as an environment: interface arguments padded with `dynamic` up
    /// to the declared parameter count.
    pub(crate) fn complete_interface(&self, ty: TypeId) -> TypeId {
        let TypeData::Interface { name, args } = self.data(ty) else {
            return ty;
        };
        let declared = self.class_decl(name).map_or(0, |decl| decl.params.len());
        let args = self.type_list(args);
        if args.len() >= declared {
            return ty;
        }
        let mut padded: Vec<TypeId> = args.to_vec();
        padded.resize(declared, TypeId::DYNAMIC);
        self.interface_atom(name, &padded)
    }

    /// Arguments of `sub` (an interface type) as seen from ancestor class `sup`.
    ///
    /// Returns `None` if `sup` is not an ancestor of `sub`'s class.
    pub fn supertype_args(&self, sub: TypeId, sup: Atom) -> Option<Rc<[TypeId]>> {
        let sub_name = self.interface_name(sub)?;
        let path = self.supertype_path(sub_name, sup)?;
        let mut env = self.complete_interface(sub);
        for hop in path.iter() {
            let mut args = Vec::with_capacity(hop.args.len());
            for recipe in hop.args.iter() {
                match self.eval_in_environment(env, recipe) {
                    Ok(arg) => args.push(arg),
                    Err(err) => {
                        error!(
                            from = %self.name(hop.from),
                            to = %self.name(hop.to),
                            %err,
                            "malformed supertype recipe"
                        );
                        return None;
                    }
                }
            }
            env = self.interface_atom(hop.to, &args);
        }
        Some(self.interface_args(self.complete_interface(env)))
    }

    /// Find a method on `class` or, failing that, on its nearest ancestor.
    ///
    /// Returns the declaring class with the method.
    pub fn find_method(&self, class: Atom, member: Atom) -> Option<(Atom, MethodDecl)> {
        let mut queue: VecDeque<Atom> = VecDeque::new();
        let mut seen: SmallVec<[Atom; 16]> = SmallVec::new();
        queue.push_back(class);
        while let Some(current) = queue.pop_front() {
            if seen.contains(&current) {
                continue;
            }
            seen.push(current);
            let Some(decl) = self.class_decl(current) else {
                continue;
            };
            if let Some(method) = decl.methods.get(&member) {
                return Some((current, method.clone()));
            }
            queue.extend(decl.supertypes.iter().map(|s| s.class));
        }
        let object = self.find_name("Object")?;
        if seen.contains(&object) {
            return None;
        }
        let decl = self.class_decl(object)?;
        decl.methods.get(&member).map(|method| (object, method.clone()))
    }

    /// Create an instance of a registered class with the given type arguments.
    pub fn new_instance(&self, class: &str, args: &[TypeId]) -> Value {
        let runtime_type = self.interface(class, args);
        Value::Instance(Rc::new(InstanceValue::new(Rc::from(class), runtime_type)))
    }
}

#[cfg(test)]
#[path = "../tests/hierarchy_tests.rs"]
mod tests;

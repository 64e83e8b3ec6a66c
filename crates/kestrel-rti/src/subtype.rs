//! Subtype checking.
//!
//! [`SubtypeChecker`] decides `S <: T` over the interned type graph. Both
//! sides carry a generic environment: the bounds of the generic-function
//! parameters in scope, innermost binder first, stored as an interned type
//! list (`TypeListId::EMPTY` when nothing is in scope).
//!
//! Rules are tried in a fixed order; the first one that applies decides:
//!
//! 1. identical types
//! 2. `T` is a top type or `Object*`
//! 3. `S` is `any` (true) or another top type (false)
//! 4. `S` is `Never`
//! 5. `S` is a generic parameter whose bound is a subtype of `T`
//! 6. `S` is `Null`
//! 7. `T` is `Object`
//! 8. `S*` unwraps, `T*` becomes `T?`
//! 9. `FutureOr` and `?` on either side
//! 10. `S` is a generic parameter (false)
//! 11. functions against `Function`, records against `Record`
//! 12. generic functions, functions, interfaces, records
//!
//! The structural rules live in `subtype_rules`.

use crate::intern::TypeUniverse;
use crate::recursion::{Admission, PairGuard};
use crate::types::{TypeData, TypeId, TypeListId};
use kestrel_common::limits;
use tracing::{debug, trace};

/// Budget for a single top-level subtype query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubtypeLimits {
    pub max_depth: u32,
    pub max_iterations: u32,
}

impl Default for SubtypeLimits {
    fn default() -> Self {
        Self {
            max_depth: limits::MAX_SUBTYPE_DEPTH,
            max_iterations: limits::MAX_SUBTYPE_ITERATIONS,
        }
    }
}

/// Key of an in-progress comparison: `(S, S env, T, T env)`.
type PairKey = (TypeId, TypeListId, TypeId, TypeListId);

/// One subtype query in progress.
pub struct SubtypeChecker<'a> {
    pub(crate) universe: &'a TypeUniverse,
    guard: PairGuard<PairKey>,
}

impl<'a> SubtypeChecker<'a> {
    pub fn new(universe: &'a TypeUniverse) -> Self {
        Self {
            universe,
            guard: PairGuard::new(universe.limits()),
        }
    }

    /// `s <: t` with no generic parameters in scope.
    pub fn is_subtype(&mut self, s: TypeId, t: TypeId) -> bool {
        self.check(s, TypeListId::EMPTY, t, TypeListId::EMPTY)
    }

    /// `true` once any comparison hit a cycle or exhausted the budget.
    pub fn overflowed(&self) -> bool {
        self.guard.tripped()
    }

    pub(crate) fn check(&mut self, s: TypeId, s_env: TypeListId, t: TypeId, t_env: TypeListId) -> bool {
        if s == t {
            return true;
        }
        let universe = self.universe;
        if universe.is_top(t) || universe.is_legacy_object(t) {
            return true;
        }

        let key = (s, s_env, t, t_env);
        match self.guard.admit(key) {
            Admission::Admitted => {
                let result = self.check_inner(s, s_env, t, t_env);
                self.guard.release(key);
                result
            }
            Admission::Assumed => {
                trace!(s = s.0, t = t.0, "subtype cycle");
                false
            }
            Admission::Refused(reason) => {
                trace!(s = s.0, t = t.0, ?reason, "subtype budget refused");
                false
            }
        }
    }

    fn check_inner(&mut self, s: TypeId, s_env: TypeListId, t: TypeId, t_env: TypeListId) -> bool {
        let universe = self.universe;
        let s_data = universe.data(s);
        let t_data = universe.data(t);

        if s_data == TypeData::Any {
            return true;
        }
        if universe.is_top(s) {
            return false;
        }
        if s_data == TypeData::Never {
            return true;
        }

        if let TypeData::GenericParam(index) = s_data {
            if let Some(bound) = self.bound(s_env, index) {
                if self.check(bound, s_env, t, t_env) {
                    return true;
                }
            }
        }

        if let Some(result) = self.check_nullability(s, s_data, s_env, t, t_data, t_env) {
            return result;
        }

        if matches!(s_data, TypeData::GenericParam(_)) {
            return false;
        }

        let s_is_function = matches!(
            s_data,
            TypeData::Function(_) | TypeData::GenericFunction { .. }
        );
        if s_is_function && t == TypeId::FUNCTION {
            return true;
        }
        if matches!(s_data, TypeData::Record { .. }) && t == TypeId::RECORD {
            return true;
        }

        match (s_data, t_data) {
            (_, TypeData::GenericFunction { .. }) | (_, TypeData::Function(_))
                if self.is_host_function(s) =>
            {
                true
            }
            (
                TypeData::GenericFunction {
                    base: s_base,
                    bounds: s_bounds,
                },
                TypeData::GenericFunction {
                    base: t_base,
                    bounds: t_bounds,
                },
            ) => self.check_generic_function(s_base, s_bounds, s_env, t_base, t_bounds, t_env),
            (TypeData::Function(s_shape), TypeData::Function(t_shape)) => {
                self.check_function(s_shape, s_env, t_shape, t_env)
            }
            (TypeData::Interface { .. }, TypeData::Interface { .. }) => {
                self.check_interface(s, s_env, t, t_env)
            }
            (
                TypeData::Record {
                    shape: s_shape,
                    fields: s_fields,
                },
                TypeData::Record {
                    shape: t_shape,
                    fields: t_fields,
                },
            ) => self.check_record(s_shape, s_fields, s_env, t_shape, t_fields, t_env),
            _ => false,
        }
    }

    /// Bound of generic parameter `index` in `env`.
    pub(crate) fn bound(&self, env: TypeListId, index: u32) -> Option<TypeId> {
        self.universe.type_list(env).get(index as usize).copied()
    }

    /// The host function interceptor class is a subtype of every function type.
    fn is_host_function(&self, s: TypeId) -> bool {
        let universe = self.universe;
        match universe.interface_name(s) {
            Some(name) => universe.name(name).as_ref() == "JavaScriptFunction",
            None => false,
        }
    }
}

impl TypeUniverse {
    /// `s <: t`.
    ///
    /// Answers are memoized per pair. A query that hits a cycle or exhausts
    /// its budget answers `false` for the affected branch, is counted in
    /// [`overflow_count`](Self::overflow_count) and is not cached.
    pub fn is_subtype(&self, s: TypeId, t: TypeId) -> bool {
        if s == t {
            return true;
        }
        if let Some(&cached) = self.subtype_cache.borrow().get(&(s, t)) {
            return cached;
        }
        let mut checker = SubtypeChecker::new(self);
        let result = checker.is_subtype(s, t);
        if checker.overflowed() {
            self.record_overflow();
            debug!(
                s = %self.display(s),
                t = %self.display(t),
                result,
                "subtype query overflowed"
            );
            return result;
        }
        self.subtype_cache.borrow_mut().insert((s, t), result);
        result
    }

    /// `s <: t` and `t <: s`.
    pub fn is_mutual_subtype(&self, s: TypeId, t: TypeId) -> bool {
        self.is_subtype(s, t) && self.is_subtype(t, s)
    }
}

#[cfg(test)]
#[path = "../tests/subtype_tests.rs"]
mod tests;

//! Nullability and `FutureOr` rules.
//!
//! These apply before any structural comparison:
//! - `Null <: T` iff `T` is `Null`, nullable, legacy, or a `FutureOr` of a
//!   type `Null` is a subtype of
//! - `S <: Object` iff `S` is not nullable (wrappers are looked through)
//! - `S* <: T` iff `S <: T`; `S <: T*` iff `S <: T?`
//! - `FutureOr<S> <: T` iff `S <: T` and `Future<S> <: T`
//! - `S? <: T` iff `Null <: T` and `S <: T`
//! - `S <: FutureOr<T>` iff `S <: T` or `S <: Future<T>`
//! - `S <: T?` iff `S <: Null` or `S <: T`

use crate::subtype::SubtypeChecker;
use crate::types::{TypeData, TypeId, TypeListId};

impl SubtypeChecker<'_> {
    /// Apply the nullability rules. `None` when none of them decides.
    pub(crate) fn check_nullability(
        &mut self,
        s: TypeId,
        s_data: TypeData,
        s_env: TypeListId,
        t: TypeId,
        t_data: TypeData,
        t_env: TypeListId,
    ) -> Option<bool> {
        let universe = self.universe;

        if universe.is_null_type(s) {
            if let TypeData::FutureOr(inner) = t_data {
                return Some(self.check(s, s_env, inner, t_env));
            }
            return Some(
                universe.is_null_type(t)
                    || matches!(t_data, TypeData::Nullable(_) | TypeData::Star(_)),
            );
        }

        if t == TypeId::OBJECT {
            return Some(match s_data {
                TypeData::FutureOr(inner) | TypeData::Star(inner) => {
                    self.check(inner, s_env, t, t_env)
                }
                other => !matches!(other, TypeData::Nullable(_)),
            });
        }

        if let TypeData::Star(inner) = s_data {
            return Some(self.check(inner, s_env, t, t_env));
        }
        if let TypeData::Star(inner) = t_data {
            let nullable = universe.nullable(inner);
            return Some(self.check(s, s_env, nullable, t_env));
        }

        match s_data {
            TypeData::FutureOr(inner) => {
                if !self.check(inner, s_env, t, t_env) {
                    return Some(false);
                }
                let future = universe.future(inner);
                return Some(self.check(future, s_env, t, t_env));
            }
            TypeData::Nullable(inner) => {
                return Some(
                    self.check(TypeId::NULL, s_env, t, t_env) && self.check(inner, s_env, t, t_env),
                );
            }
            _ => {}
        }

        match t_data {
            TypeData::FutureOr(inner) => {
                if self.check(s, s_env, inner, t_env) {
                    return Some(true);
                }
                let future = universe.future(inner);
                Some(self.check(s, s_env, future, t_env))
            }
            TypeData::Nullable(inner) => Some(
                self.check(s, s_env, TypeId::NULL, t_env) || self.check(s, s_env, inner, t_env),
            ),
            _ => None,
        }
    }
}

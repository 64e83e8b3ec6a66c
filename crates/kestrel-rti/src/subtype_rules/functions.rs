//! Function and generic-function subtyping.
//!
//! `S <: T` for function types when:
//! - the return type is covariant
//! - `S` requires no more positional arguments than `T` and accepts at
//!   least as many in total
//! - every positional parameter of `T` is a subtype of the `S` parameter at
//!   the same position (contravariance)
//! - every named parameter of `T` exists in `S`, is required in `T` if it is
//!   required in `S`, and has a type that is a subtype of the `S` one
//! - `S` has no required named parameters that `T` lacks
//!
//! Generic functions must have the same number of type parameters with
//! mutually subtype bounds; the bodies are then compared with each side's
//! bounds pushed onto its environment.

use crate::subtype::SubtypeChecker;
use crate::types::{FunctionShapeId, TypeData, TypeId, TypeListId};
use std::cmp::Ordering;

impl SubtypeChecker<'_> {
    pub(crate) fn check_generic_function(
        &mut self,
        s_base: TypeId,
        s_bounds: TypeListId,
        s_env: TypeListId,
        t_base: TypeId,
        t_bounds: TypeListId,
        t_env: TypeListId,
    ) -> bool {
        let universe = self.universe;
        let s_list = universe.type_list(s_bounds);
        let t_list = universe.type_list(t_bounds);
        if s_list.len() != t_list.len() {
            return false;
        }

        let s_inner = self.push_bounds(&s_list, s_env);
        let t_inner = self.push_bounds(&t_list, t_env);
        for (&s_bound, &t_bound) in s_list.iter().zip(t_list.iter()) {
            if !self.check(s_bound, s_inner, t_bound, t_inner)
                || !self.check(t_bound, t_inner, s_bound, s_inner)
            {
                return false;
            }
        }

        let (Some(s_shape), Some(t_shape)) =
            (self.function_shape_id(s_base), self.function_shape_id(t_base))
        else {
            return self.check(s_base, s_inner, t_base, t_inner);
        };
        self.check_function(s_shape, s_inner, t_shape, t_inner)
    }

    pub(crate) fn check_function(
        &mut self,
        s_shape: FunctionShapeId,
        s_env: TypeListId,
        t_shape: FunctionShapeId,
        t_env: TypeListId,
    ) -> bool {
        let universe = self.universe;
        let source = universe.function_shape(s_shape);
        let target = universe.function_shape(t_shape);

        if !self.check(source.return_type, s_env, target.return_type, t_env) {
            return false;
        }

        let s_required = source.required.len();
        let t_required = target.required.len();
        if s_required > t_required {
            return false;
        }
        let spill = t_required - s_required;
        if s_required + source.optional.len() < t_required + target.optional.len() {
            return false;
        }

        for (&t_param, &s_param) in target.required.iter().zip(&source.required) {
            if !self.check(t_param, t_env, s_param, s_env) {
                return false;
            }
        }
        // Target required parameters beyond the source's land on source optionals.
        for (&t_param, &s_param) in target.required[s_required..]
            .iter()
            .zip(&source.optional)
        {
            if !self.check(t_param, t_env, s_param, s_env) {
                return false;
            }
        }
        for (&t_param, &s_param) in target.optional.iter().zip(&source.optional[spill..]) {
            if !self.check(t_param, t_env, s_param, s_env) {
                return false;
            }
        }

        // Named parameters: merge-walk both name-sorted lists.
        let mut source_named = source.named.iter();
        for t_param in &target.named {
            let t_name = universe.name(t_param.name);
            loop {
                let Some(s_param) = source_named.next() else {
                    return false;
                };
                let s_name = universe.name(s_param.name);
                match t_name.as_ref().cmp(s_name.as_ref()) {
                    Ordering::Less => return false,
                    Ordering::Greater => {
                        if s_param.required {
                            return false;
                        }
                    }
                    Ordering::Equal => {
                        if s_param.required && !t_param.required {
                            return false;
                        }
                        if !self.check(t_param.ty, t_env, s_param.ty, s_env) {
                            return false;
                        }
                        break;
                    }
                }
            }
        }
        source_named.all(|param| !param.required)
    }

    fn push_bounds(&self, bounds: &[TypeId], env: TypeListId) -> TypeListId {
        let universe = self.universe;
        let outer = universe.type_list(env);
        let mut extended = Vec::with_capacity(bounds.len() + outer.len());
        extended.extend_from_slice(bounds);
        extended.extend_from_slice(&outer);
        universe.intern_list(&extended)
    }

    fn function_shape_id(&self, ty: TypeId) -> Option<FunctionShapeId> {
        match self.universe.data(ty) {
            TypeData::Function(shape) => Some(shape),
            _ => None,
        }
    }
}

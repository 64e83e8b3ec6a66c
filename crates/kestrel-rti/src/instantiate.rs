//! Generic substitution.
//!
//! Generic-function parameters use de Bruijn indices, innermost binder
//! first. Substituting under `depth` enclosing binders leaves indices below
//! `depth` alone (they are bound inside the type being rewritten) and
//! replaces index `i >= depth` with `args[i - depth]`.

use crate::error::RuntimeError;
use crate::intern::{TypeListBuffer, TypeUniverse};
use crate::recursion::NestingCounter;
use crate::types::{FunctionShape, NamedParam, TypeData, TypeId, TypeListId};
use tracing::warn;

impl TypeUniverse {
    /// Replace the free generic-function parameters of `ty` with `args`.
    ///
    /// A type nested past the substitution ceiling is left unrewritten below
    /// that point and counted in [`overflow_count`](Self::overflow_count).
    pub fn substitute(&self, ty: TypeId, args: &[TypeId]) -> TypeId {
        match self.substitute_bounded(ty, args) {
            Ok(result) => result,
            Err(partial) => partial,
        }
    }

    /// Instantiate a generic function type with explicit type arguments.
    pub fn instantiate_generic_function(
        &self,
        ty: TypeId,
        args: &[TypeId],
    ) -> Result<TypeId, RuntimeError> {
        match self.data(ty) {
            TypeData::GenericFunction { base, bounds } => {
                let expected = self.type_list(bounds).len();
                if expected != args.len() {
                    return Err(RuntimeError::argument(format!(
                        "'{}' expects {expected} type arguments, got {}",
                        self.display(ty),
                        args.len()
                    )));
                }
                self.substitute_bounded(base, args)
                    .map_err(|_| RuntimeError::StackOverflow)
            }
            _ if args.is_empty() => Ok(ty),
            _ => Err(RuntimeError::argument(format!(
                "'{}' is not a generic function type",
                self.display(ty)
            ))),
        }
    }

    /// `Err` carries the partially rewritten type when the ceiling was hit.
    fn substitute_bounded(&self, ty: TypeId, args: &[TypeId]) -> Result<TypeId, TypeId> {
        if args.is_empty() {
            return Ok(ty);
        }
        let mut substitutor = Substitutor {
            universe: self,
            args,
            nesting: NestingCounter::for_substitution(),
            overflowed: false,
        };
        let result = substitutor.apply(ty, 0);
        if substitutor.overflowed {
            warn!(ty = ty.0, "substitution depth exceeded");
            self.record_overflow();
            return Err(result);
        }
        Ok(result)
    }
}

struct Substitutor<'a> {
    universe: &'a TypeUniverse,
    args: &'a [TypeId],
    nesting: NestingCounter,
    overflowed: bool,
}

impl Substitutor<'_> {
    fn apply(&mut self, ty: TypeId, depth: u32) -> TypeId {
        if !self.nesting.descend() {
            self.overflowed = true;
            return ty;
        }
        let result = self.apply_inner(ty, depth);
        self.nesting.ascend();
        result
    }

    fn apply_inner(&mut self, ty: TypeId, depth: u32) -> TypeId {
        let universe = self.universe;
        match universe.data(ty) {
            TypeData::Never
            | TypeData::Dynamic
            | TypeData::Void
            | TypeData::Any
            | TypeData::Erased => ty,
            TypeData::Star(inner) => {
                let inner = self.apply(inner, depth);
                universe.star(inner)
            }
            TypeData::Nullable(inner) => {
                let inner = self.apply(inner, depth);
                universe.nullable(inner)
            }
            TypeData::FutureOr(inner) => {
                let inner = self.apply(inner, depth);
                universe.future_or(inner)
            }
            TypeData::Interface { name, args } => {
                if args.is_empty() {
                    return ty;
                }
                let args = self.apply_list(args, depth);
                universe.interface_atom(name, &args)
            }
            TypeData::Binding { base, args } => {
                let base = self.apply(base, depth);
                let args = self.apply_list(args, depth);
                universe.binding(base, &args)
            }
            TypeData::Record { shape, fields } => {
                let fields = self.apply_list(fields, depth);
                universe.record(&universe.name(shape), &fields)
            }
            TypeData::Function(shape_id) => {
                let shape = universe.function_shape(shape_id);
                let substituted = FunctionShape {
                    return_type: self.apply(shape.return_type, depth),
                    required: shape.required.iter().map(|&p| self.apply(p, depth)).collect(),
                    optional: shape.optional.iter().map(|&p| self.apply(p, depth)).collect(),
                    named: shape
                        .named
                        .iter()
                        .map(|param| NamedParam {
                            ty: self.apply(param.ty, depth),
                            ..*param
                        })
                        .collect(),
                };
                universe.function(substituted)
            }
            TypeData::GenericFunction { base, bounds } => {
                let depth = depth + universe.type_list(bounds).len() as u32;
                let base = self.apply(base, depth);
                let bounds = self.apply_list(bounds, depth);
                universe.generic_function(base, &bounds)
            }
            TypeData::GenericParam(index) => {
                if index < depth {
                    return ty;
                }
                match self.args.get((index - depth) as usize) {
                    Some(&arg) => arg,
                    None => ty,
                }
            }
        }
    }

    fn apply_list(&mut self, list: TypeListId, depth: u32) -> TypeListBuffer {
        let items = self.universe.type_list(list);
        items.iter().map(|&item| self.apply(item, depth)).collect()
    }
}

#[cfg(test)]
#[path = "../tests/instantiate_tests.rs"]
mod tests;

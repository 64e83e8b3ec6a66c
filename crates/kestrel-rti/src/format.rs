//! Type rendering.
//!
//! Two forms are produced:
//! - the canonical recipe, which is the interning key of a node and decodes
//!   back to the same node;
//! - the display form used in error messages (`int Function(Object)`,
//!   `FutureOr<int>`, `List<String>?`).

use crate::intern::TypeUniverse;
use crate::types::{FunctionShape, TypeData, TypeId};
use std::fmt::Write;

/// Canonical recipe of a (not yet interned) payload.
pub(crate) fn canonical_recipe(universe: &TypeUniverse, data: &TypeData) -> String {
    let mut out = String::new();
    match *data {
        TypeData::Never => out.push_str("0&"),
        TypeData::Dynamic => out.push('@'),
        TypeData::Void => out.push('~'),
        TypeData::Any => out.push_str("1&"),
        TypeData::Erased => out.push('#'),
        TypeData::Star(inner) => {
            out.push_str(&universe.recipe(inner));
            out.push('*');
        }
        TypeData::Nullable(inner) => {
            out.push_str(&universe.recipe(inner));
            out.push('?');
        }
        TypeData::FutureOr(inner) => {
            out.push_str(&universe.recipe(inner));
            out.push('/');
        }
        TypeData::Interface { name, args } => {
            out.push_str(&universe.name(name));
            let args = universe.type_list(args);
            if !args.is_empty() {
                out.push('<');
                push_recipe_list(universe, &mut out, &args);
                out.push('>');
            }
        }
        TypeData::Binding { base, args } => {
            out.push_str(&universe.recipe(base));
            out.push_str(";<");
            push_recipe_list(universe, &mut out, &universe.type_list(args));
            out.push('>');
        }
        TypeData::Record { shape, fields } => {
            out.push('+');
            out.push_str(&universe.name(shape));
            out.push('(');
            push_recipe_list(universe, &mut out, &universe.type_list(fields));
            out.push(')');
        }
        TypeData::Function(shape_id) => {
            let shape = universe.function_shape(shape_id);
            out.push_str(&universe.recipe(shape.return_type));
            push_parameter_recipe(universe, &mut out, &shape);
        }
        TypeData::GenericFunction { base, bounds } => {
            out.push_str(&universe.recipe(base));
            out.push('<');
            push_recipe_list(universe, &mut out, &universe.type_list(bounds));
            out.push('>');
        }
        TypeData::GenericParam(index) => {
            let _ = write!(out, "{index}^");
        }
    }
    out
}

fn push_recipe_list(universe: &TypeUniverse, out: &mut String, items: &[TypeId]) {
    for (i, &item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&universe.recipe(item));
    }
}

fn push_parameter_recipe(universe: &TypeUniverse, out: &mut String, shape: &FunctionShape) {
    out.push('(');
    push_recipe_list(universe, out, &shape.required);
    let sep = if shape.required.is_empty() { "" } else { "," };
    if !shape.optional.is_empty() {
        out.push_str(sep);
        out.push('[');
        push_recipe_list(universe, out, &shape.optional);
        out.push(']');
    }
    if !shape.named.is_empty() {
        out.push_str(sep);
        out.push('{');
        for (i, param) in shape.named.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&universe.name(param.name));
            out.push(if param.required { '!' } else { ':' });
            out.push_str(&universe.recipe(param.ty));
        }
        out.push('}');
    }
    out.push(')');
}

impl TypeUniverse {
    /// Human-readable form of a type.
    pub fn display(&self, id: TypeId) -> String {
        let mut printer = Printer {
            universe: self,
            generic_names: Vec::new(),
            next_generic: 0,
        };
        let mut out = String::new();
        printer.write_type(&mut out, id);
        out
    }
}

struct Printer<'a> {
    universe: &'a TypeUniverse,
    /// Names of in-scope generic parameters, innermost binder first.
    generic_names: Vec<String>,
    next_generic: usize,
}

impl Printer<'_> {
    fn write_type(&mut self, out: &mut String, id: TypeId) {
        match self.universe.data(id) {
            TypeData::Never => out.push_str("Never"),
            TypeData::Dynamic => out.push_str("dynamic"),
            TypeData::Void => out.push_str("void"),
            TypeData::Any => out.push_str("any"),
            TypeData::Erased => out.push_str("erased"),
            TypeData::Star(inner) => {
                self.write_wrapped(out, inner);
                out.push('*');
            }
            TypeData::Nullable(inner) => {
                self.write_wrapped(out, inner);
                out.push('?');
            }
            TypeData::FutureOr(inner) => {
                out.push_str("FutureOr<");
                self.write_type(out, inner);
                out.push('>');
            }
            TypeData::Interface { name, args } => {
                out.push_str(&self.universe.name(name));
                let args = self.universe.type_list(args);
                if !args.is_empty() {
                    out.push('<');
                    self.write_list(out, &args);
                    out.push('>');
                }
            }
            TypeData::Binding { base, args } => {
                let args = self.universe.type_list(args);
                self.write_type(out, base);
                out.push_str(";<");
                self.write_list(out, &args);
                out.push('>');
            }
            TypeData::Record { shape, fields } => {
                let shape = self.universe.name(shape);
                let names: Vec<&str> = shape.split(',').filter(|n| !n.is_empty()).collect();
                let fields = self.universe.type_list(fields);
                let positional = fields.len().saturating_sub(names.len());
                out.push('(');
                self.write_list(out, &fields[..positional]);
                if !names.is_empty() {
                    if positional > 0 {
                        out.push_str(", ");
                    }
                    out.push('{');
                    for (i, (name, &field)) in names.iter().zip(&fields[positional..]).enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        self.write_type(out, field);
                        out.push(' ');
                        out.push_str(name);
                    }
                    out.push('}');
                }
                out.push(')');
            }
            TypeData::Function(shape_id) => {
                let shape = self.universe.function_shape(shape_id);
                self.write_function(out, &shape, None);
            }
            TypeData::GenericFunction { base, bounds } => {
                let bounds = self.universe.type_list(bounds);
                let first = self.next_generic;
                self.next_generic += bounds.len();
                let names: Vec<String> = (first..first + bounds.len()).map(|i| format!("T{i}")).collect();
                let saved = self.generic_names.clone();
                let mut scoped = names.clone();
                scoped.extend(saved.iter().cloned());
                self.generic_names = scoped;

                let mut params = String::from("<");
                for (i, (&bound, name)) in bounds.iter().zip(&names).enumerate() {
                    if i > 0 {
                        params.push_str(", ");
                    }
                    params.push_str(name);
                    if !self.universe.is_top(bound) {
                        params.push_str(" extends ");
                        self.write_type(&mut params, bound);
                    }
                }
                params.push('>');

                match self.universe.data(base) {
                    TypeData::Function(shape_id) => {
                        let shape = self.universe.function_shape(shape_id);
                        self.write_function(out, &shape, Some(&params));
                    }
                    _ => {
                        self.write_type(out, base);
                        out.push_str(&params);
                    }
                }
                self.generic_names = saved;
                self.next_generic = first;
            }
            TypeData::GenericParam(index) => match self.generic_names.get(index as usize) {
                Some(name) => out.push_str(name),
                None => {
                    let _ = write!(out, "T{index}");
                }
            },
        }
    }

    fn write_wrapped(&mut self, out: &mut String, inner: TypeId) {
        let needs_parens = matches!(
            self.universe.data(inner),
            TypeData::Function(_) | TypeData::GenericFunction { .. }
        );
        if needs_parens {
            out.push('(');
        }
        self.write_type(out, inner);
        if needs_parens {
            out.push(')');
        }
    }

    fn write_list(&mut self, out: &mut String, items: &[TypeId]) {
        for (i, &item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_type(out, item);
        }
    }

    fn write_function(&mut self, out: &mut String, shape: &FunctionShape, type_params: Option<&str>) {
        self.write_type(out, shape.return_type);
        out.push_str(" Function");
        if let Some(params) = type_params {
            out.push_str(params);
        }
        out.push('(');
        self.write_list(out, &shape.required);
        let mut sep = if shape.required.is_empty() { "" } else { ", " };
        if !shape.optional.is_empty() {
            out.push_str(sep);
            out.push('[');
            self.write_list(out, &shape.optional);
            out.push(']');
            sep = ", ";
        }
        if !shape.named.is_empty() {
            out.push_str(sep);
            out.push('{');
            for (i, param) in shape.named.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                if param.required {
                    out.push_str("required ");
                }
                self.write_type(out, param.ty);
                out.push(' ');
                out.push_str(&self.universe.name(param.name));
            }
            out.push('}');
        }
        out.push(')');
    }
}

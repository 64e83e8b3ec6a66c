//! Recipe decoder.
//!
//! A recipe is a postfix encoding of a type. The decoder scans it once, left
//! to right, keeping an operand stack and a stack of frame markers for the
//! bracketed constructs:
//!
//! | Token | Meaning |
//! |-------|---------|
//! | identifier | class name |
//! | digits | index (environment reference or operand of `^` / `&`) |
//! | `,` | separator |
//! | `;` | force the top of stack to a type |
//! | `@` `~` `#` | dynamic, void, erased |
//! | `0&` `1&` | Never, any |
//! | `n^` | generic-function parameter `n` |
//! | `*` `?` `/` | star, nullable, `FutureOr` of the top of stack |
//! | `<` ... `>` | interface arguments, generic-function bounds or binding |
//! | `(` ... `)` | function parameters (return type precedes `(`) |
//! | `[` ... `]` | optional positional parameters |
//! | `{` ... `}` | named parameters, `name:T` optional and `name!T` required |
//! | `+shape(` ... `)` | record with the given shape tag |
//!
//! Indices that reach a type position resolve against the environment:
//! interface environments are 1-based over their arguments (`0` is the
//! environment itself); binding environments consult their own arguments
//! before their base.

use crate::error::{DecodeError, DecodeErrorKind};
use crate::intern::TypeUniverse;
use crate::types::{FunctionShape, NamedParam, TypeData, TypeId};
use smallvec::SmallVec;
use std::rc::Rc;
use tracing::trace;

impl TypeUniverse {
    /// Decode a recipe that does not refer to an environment.
    ///
    /// Results are memoized per recipe.
    pub fn eval(&self, recipe: &str) -> Result<TypeId, DecodeError> {
        if let Some(&id) = self.recipe_cache.borrow().get(recipe) {
            return Ok(id);
        }
        let id = Parser::new(self, None, recipe).parse()?;
        trace!(recipe, id = id.0, "eval");
        self.recipe_cache.borrow_mut().insert(Rc::from(recipe), id);
        Ok(id)
    }

    /// Decode a recipe whose indices refer to `environment`.
    ///
    /// Results are memoized per (environment, recipe).
    pub fn eval_in_environment(
        &self,
        environment: TypeId,
        recipe: &str,
    ) -> Result<TypeId, DecodeError> {
        let key = (environment, Rc::<str>::from(recipe));
        if let Some(&id) = self.env_recipe_cache.borrow().get(&key) {
            return Ok(id);
        }
        let id = Parser::new(self, Some(environment), recipe).parse()?;
        trace!(recipe, environment = environment.0, id = id.0, "eval in environment");
        self.env_recipe_cache.borrow_mut().insert(key, id);
        Ok(id)
    }

    /// Extend an environment with more type arguments.
    pub fn bind(&self, environment: TypeId, args: &[TypeId]) -> TypeId {
        self.binding(environment, args)
    }

    /// Resolve an environment index.
    pub(crate) fn index_to_type(&self, environment: TypeId, index: u32) -> Result<TypeId, DecodeErrorKind> {
        let mut env = environment;
        let mut index = index;
        if let TypeData::Binding { base, args } = self.data(env) {
            if index == 0 {
                return Ok(base);
            }
            let args = self.type_list(args);
            let len = args.len() as u32;
            if index <= len {
                return Ok(args[index as usize - 1]);
            }
            index -= len;
            env = base;
        } else if index == 0 {
            return Ok(env);
        }
        let TypeData::Interface { args, .. } = self.data(env) else {
            return Err(DecodeErrorKind::IndexedBase(self.display(env)));
        };
        let args = self.type_list(args);
        if index as usize <= args.len() {
            return Ok(args[index as usize - 1]);
        }
        Err(DecodeErrorKind::BadIndex {
            index,
            environment: self.display(environment),
        })
    }
}

#[derive(Debug)]
enum Item {
    Type(TypeId),
    Name(Rc<str>),
    Index(u32),
    /// `true` for `!` (required named parameter), `false` for `:`.
    Flag(bool),
    Optional(Vec<TypeId>),
    Named(Vec<NamedParam>),
}

#[derive(Debug)]
enum FrameKind {
    Arguments,
    Parameters,
    Optional,
    Named,
    Record(Rc<str>),
}

impl FrameKind {
    fn opener(&self) -> char {
        match self {
            FrameKind::Arguments => '<',
            FrameKind::Parameters | FrameKind::Record(_) => '(',
            FrameKind::Optional => '[',
            FrameKind::Named => '{',
        }
    }
}

struct Frame {
    kind: FrameKind,
    start: usize,
}

struct Parser<'a> {
    universe: &'a TypeUniverse,
    environment: Option<TypeId>,
    recipe: &'a str,
    bytes: &'a [u8],
    position: usize,
    stack: Vec<Item>,
    frames: SmallVec<[Frame; 8]>,
}

#[inline]
fn is_identifier_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b == b'|'
}

#[inline]
fn is_identifier_part(b: u8) -> bool {
    is_identifier_start(b) || b.is_ascii_digit()
}

impl<'a> Parser<'a> {
    fn new(universe: &'a TypeUniverse, environment: Option<TypeId>, recipe: &'a str) -> Self {
        Self {
            universe,
            environment,
            recipe,
            bytes: recipe.as_bytes(),
            position: 0,
            stack: Vec::new(),
            frames: SmallVec::new(),
        }
    }

    fn error(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError {
            kind,
            position: self.position,
            recipe: self.recipe.to_string(),
        }
    }

    fn parse(mut self) -> Result<TypeId, DecodeError> {
        if self.bytes.is_empty() {
            return Err(self.error(DecodeErrorKind::Empty));
        }
        while self.position < self.bytes.len() {
            let b = self.bytes[self.position];
            if b.is_ascii_digit() {
                self.read_number();
                continue;
            }
            if is_identifier_start(b) {
                self.read_identifier();
                continue;
            }
            self.step(b)?;
            self.position += 1;
        }
        if let Some(frame) = self.frames.last() {
            let opener = frame.kind.opener();
            return Err(self.error(DecodeErrorKind::Unbalanced(opener)));
        }
        match self.stack.len() {
            0 => Err(self.error(DecodeErrorKind::StackUnderflow)),
            1 => {
                let item = self.pop()?;
                self.to_type(item)
            }
            n => Err(self.error(DecodeErrorKind::TrailingOperands(n))),
        }
    }

    fn read_number(&mut self) {
        let mut value: u32 = 0;
        while self.position < self.bytes.len() && self.bytes[self.position].is_ascii_digit() {
            let digit = u32::from(self.bytes[self.position] - b'0');
            value = value.saturating_mul(10).saturating_add(digit);
            self.position += 1;
        }
        self.stack.push(Item::Index(value));
    }

    fn read_identifier(&mut self) {
        let start = self.position;
        self.position += 1;
        while self.position < self.bytes.len() && is_identifier_part(self.bytes[self.position]) {
            self.position += 1;
        }
        self.stack.push(Item::Name(Rc::from(&self.recipe[start..self.position])));
    }

    fn step(&mut self, b: u8) -> Result<(), DecodeError> {
        let universe = self.universe;
        match b {
            b',' => {}
            b':' => self.stack.push(Item::Flag(false)),
            b'!' => self.stack.push(Item::Flag(true)),
            b';' => {
                let item = self.pop()?;
                let ty = self.to_type(item)?;
                self.stack.push(Item::Type(ty));
            }
            b'^' => match self.pop()? {
                Item::Index(index) => self.stack.push(Item::Type(universe.generic_param(index))),
                _ => return Err(self.error(DecodeErrorKind::NotAType)),
            },
            b'#' => self.stack.push(Item::Type(TypeId::ERASED)),
            b'@' => self.stack.push(Item::Type(TypeId::DYNAMIC)),
            b'~' => self.stack.push(Item::Type(TypeId::VOID)),
            b'&' => match self.pop()? {
                Item::Index(0) => self.stack.push(Item::Type(TypeId::NEVER)),
                Item::Index(1) => self.stack.push(Item::Type(TypeId::ANY)),
                Item::Index(n) => return Err(self.error(DecodeErrorKind::ExtendedOperation(n))),
                _ => return Err(self.error(DecodeErrorKind::NotAType)),
            },
            b'*' | b'?' | b'/' => {
                let item = self.pop()?;
                let inner = self.to_type(item)?;
                let ty = match b {
                    b'*' => universe.star(inner),
                    b'?' => universe.nullable(inner),
                    _ => universe.future_or(inner),
                };
                self.stack.push(Item::Type(ty));
            }
            b'<' => self.open(FrameKind::Arguments),
            b'>' => self.close_arguments()?,
            b'(' => self.open(FrameKind::Parameters),
            b')' => self.close_parameters()?,
            b'[' => self.open(FrameKind::Optional),
            b']' => {
                let frame = self.close_frame(']')?;
                if !matches!(frame.kind, FrameKind::Optional) {
                    return Err(self.error(DecodeErrorKind::Unbalanced(']')));
                }
                let types = self.collect_types(frame.start)?;
                self.stack.push(Item::Optional(types));
            }
            b'{' => self.open(FrameKind::Named),
            b'}' => self.close_named()?,
            b'+' => {
                let tag_start = self.position + 1;
                let Some(offset) = self.recipe[tag_start..].find('(') else {
                    return Err(self.error(DecodeErrorKind::Unbalanced('+')));
                };
                let shape: Rc<str> = Rc::from(&self.recipe[tag_start..tag_start + offset]);
                self.open(FrameKind::Record(shape));
                // Skip the tag; the loop advances past '('.
                self.position = tag_start + offset;
            }
            other => {
                let ch = self.recipe[self.position..]
                    .chars()
                    .next()
                    .unwrap_or(char::from(other));
                return Err(self.error(DecodeErrorKind::BadCharacter(ch)));
            }
        }
        Ok(())
    }

    fn open(&mut self, kind: FrameKind) {
        self.frames.push(Frame {
            kind,
            start: self.stack.len(),
        });
    }

    fn close_frame(&mut self, closer: char) -> Result<Frame, DecodeError> {
        self.frames
            .pop()
            .ok_or_else(|| self.error(DecodeErrorKind::Unbalanced(closer)))
    }

    fn pop(&mut self) -> Result<Item, DecodeError> {
        let floor = self.frames.last().map_or(0, |frame| frame.start);
        if self.stack.len() <= floor {
            return Err(self.error(DecodeErrorKind::StackUnderflow));
        }
        self.stack
            .pop()
            .ok_or_else(|| self.error(DecodeErrorKind::StackUnderflow))
    }

    fn collect_types(&mut self, start: usize) -> Result<Vec<TypeId>, DecodeError> {
        let items: Vec<Item> = self.stack.drain(start..).collect();
        items.into_iter().map(|item| self.to_type(item)).collect()
    }

    fn to_type(&self, item: Item) -> Result<TypeId, DecodeError> {
        match item {
            Item::Type(ty) => Ok(ty),
            Item::Name(name) => Ok(self.universe.interface(&name, &[])),
            Item::Index(index) => {
                let Some(environment) = self.environment else {
                    return Err(self.error(DecodeErrorKind::NoEnvironment(index)));
                };
                self.universe
                    .index_to_type(environment, index)
                    .map_err(|kind| self.error(kind))
            }
            Item::Flag(_) | Item::Optional(_) | Item::Named(_) => {
                Err(self.error(DecodeErrorKind::NotAType))
            }
        }
    }

    fn close_arguments(&mut self) -> Result<(), DecodeError> {
        let frame = self.close_frame('>')?;
        if !matches!(frame.kind, FrameKind::Arguments) {
            return Err(self.error(DecodeErrorKind::Unbalanced('>')));
        }
        let args = self.collect_types(frame.start)?;
        let head = self.pop()?;
        let universe = self.universe;
        let ty = match head {
            Item::Name(name) => universe.interface(&name, &args),
            other => {
                let base = self.to_type(other)?;
                match universe.data(base) {
                    TypeData::Function(_) => universe.generic_function(base, &args),
                    _ => universe.binding(base, &args),
                }
            }
        };
        self.stack.push(Item::Type(ty));
        Ok(())
    }

    fn close_parameters(&mut self) -> Result<(), DecodeError> {
        let frame = self.close_frame(')')?;
        let items: Vec<Item> = self.stack.drain(frame.start..).collect();
        match frame.kind {
            FrameKind::Record(shape) => {
                let fields = items
                    .into_iter()
                    .map(|item| self.to_type(item))
                    .collect::<Result<Vec<_>, _>>()?;
                let ty = self.universe.record(&shape, &fields);
                self.stack.push(Item::Type(ty));
                Ok(())
            }
            FrameKind::Parameters => {
                let mut required = Vec::with_capacity(items.len());
                let mut optional = Vec::new();
                let mut named = Vec::new();
                let count = items.len();
                for (i, item) in items.into_iter().enumerate() {
                    match item {
                        Item::Optional(types) if i + 1 == count => optional = types,
                        Item::Named(params) if i + 1 == count => named = params,
                        Item::Optional(_) | Item::Named(_) => {
                            return Err(self.error(DecodeErrorKind::UnexpectedParameterState));
                        }
                        other => required.push(self.to_type(other)?),
                    }
                }
                let head = self.pop()?;
                let return_type = self.to_type(head)?;
                let shape = FunctionShape {
                    return_type,
                    required,
                    optional,
                    named,
                };
                let ty = self.universe.function(shape);
                self.stack.push(Item::Type(ty));
                Ok(())
            }
            _ => Err(self.error(DecodeErrorKind::Unbalanced(')'))),
        }
    }

    fn close_named(&mut self) -> Result<(), DecodeError> {
        let frame = self.close_frame('}')?;
        if !matches!(frame.kind, FrameKind::Named) {
            return Err(self.error(DecodeErrorKind::Unbalanced('}')));
        }
        let items: Vec<Item> = self.stack.drain(frame.start..).collect();
        if items.len() % 3 != 0 {
            return Err(self.error(DecodeErrorKind::UnexpectedParameterState));
        }
        let mut named = Vec::with_capacity(items.len() / 3);
        let mut iter = items.into_iter();
        while let (Some(name), Some(flag), Some(ty)) = (iter.next(), iter.next(), iter.next()) {
            let (Item::Name(name), Item::Flag(required)) = (name, flag) else {
                return Err(self.error(DecodeErrorKind::UnexpectedParameterState));
            };
            let ty = self.to_type(ty)?;
            named.push(NamedParam {
                name: self.universe.intern_name(&name),
                required,
                ty,
            });
        }
        self.stack.push(Item::Named(named));
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/decode_tests.rs"]
mod tests;

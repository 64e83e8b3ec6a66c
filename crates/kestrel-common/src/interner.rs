//! Name pool for classes, members and record shapes.
//!
//! Every [`Atom`] indexes into one universe's pool. Atoms from different
//! pools are not comparable; the runtime never mixes them because each
//! `TypeUniverse` owns exactly one pool.

use rustc_hash::FxHashMap;
use serde::Serialize;
use std::rc::Rc;

/// Handle to a pooled name. Serializes as its index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Atom(u32);

impl Atom {
    /// The empty name, present in every pool.
    pub const NONE: Atom = Atom(0);

    #[inline]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Core-library names seeded ahead of user declarations, in atom order.
pub const CORE_NAMES: &[&str] = &[
    "Object",
    "Null",
    "Function",
    "Record",
    "int",
    "double",
    "num",
    "String",
    "bool",
    "Comparable",
    "Pattern",
    "Iterable",
    "List",
    "Map",
    "Future",
    "Stream",
    "StackTrace",
    "Error",
    "Exception",
    "TypeError",
    "ArgumentError",
    "RangeError",
    "StateError",
    "UnsupportedError",
    "NoSuchMethodError",
    "StackOverflowError",
    "JavaScriptObject",
    "JavaScriptFunction",
    "call",
    "toString",
    "hashCode",
    "length",
];

pub struct Interner {
    by_text: FxHashMap<Rc<str>, Atom>,
    texts: Vec<Rc<str>>,
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl Interner {
    /// A pool holding only the empty name.
    pub fn new() -> Self {
        let mut pool = Interner {
            by_text: FxHashMap::default(),
            texts: Vec::new(),
        };
        pool.intern("");
        pool
    }

    /// A pool seeded with [`CORE_NAMES`], so `Object` is always atom 1.
    pub fn with_core_names() -> Self {
        let mut pool = Self::new();
        pool.texts.reserve(CORE_NAMES.len());
        for name in CORE_NAMES {
            pool.intern(name);
        }
        pool
    }

    pub fn intern(&mut self, text: &str) -> Atom {
        if let Some(&atom) = self.by_text.get(text) {
            return atom;
        }
        let atom = Atom(self.texts.len() as u32);
        let shared: Rc<str> = Rc::from(text);
        self.by_text.insert(shared.clone(), atom);
        self.texts.push(shared);
        atom
    }

    /// The atom for `text`, if it was ever interned.
    pub fn lookup(&self, text: &str) -> Option<Atom> {
        self.by_text.get(text).copied()
    }

    /// Text of `atom`; atoms from another pool resolve to `""`.
    pub fn text(&self, atom: Atom) -> &str {
        self.texts.get(atom.0 as usize).map_or("", |text| &**text)
    }

    pub fn shared(&self, atom: Atom) -> Rc<str> {
        match self.texts.get(atom.0 as usize) {
            Some(text) => text.clone(),
            None => Rc::from(""),
        }
    }

    /// Number of names, the empty name included.
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.len() <= 1
    }
}

#[cfg(test)]
#[path = "../tests/interner_tests.rs"]
mod tests;

//! String interning for HIR names.
//!
//! Grounded on `mmcc`'s `Symbol`/`Interner` (`types/entity.rs`,
//! `symbol::Interner`): every HIR name (locals, globals, struct/enum/field
//! names, interned string-literal symbols) is a small `Copy` index rather
//! than a heap-allocated `String`, which matters here because `spec.md`
//! §3.3's `<name>_<scope_id>` renaming scheme mints a fresh name for every
//! local in every nested scope of every function.

use std::fmt;

use bumpalo::Bump;
use hashbrown::HashMap;

/// An interned string. Cheap to copy and compare.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(u32);

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}

/// Owns the backing storage for every interned string produced during one
/// compilation. Strings live for the interner's whole lifetime (the
/// compilation), matching the teacher's arena-backed interner.
pub struct Interner {
    arena: Bump,
    map: HashMap<&'static str, Symbol>,
    strings: Vec<&'static str>,
}

impl Default for Interner {
    fn default() -> Self {
        Interner { arena: Bump::new(), map: HashMap::new(), strings: Vec::new() }
    }
}

impl Interner {
    #[must_use]
    pub fn new() -> Self {
        Interner::default()
    }

    /// Interns `s`, returning the existing symbol if already present.
    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&sym) = self.map.get(s) {
            return sym;
        }
        let bytes = self.arena.alloc_str(s);
        // Safety: `bytes` is owned by `self.arena`, which outlives every
        // access to `self.map`/`self.strings` because both are private
        // fields of the same struct and never exposed with a longer
        // lifetime than `&self`/`&mut self`.
        let leaked: &'static str = unsafe { std::mem::transmute::<&str, &'static str>(bytes) };
        let sym = Symbol(self.strings.len() as u32);
        self.strings.push(leaked);
        self.map.insert(leaked, sym);
        sym
    }

    /// Interns `base_scope_id`, the `<name>_<scope_id>` unique local name
    /// scheme from `spec.md` §3.3.
    pub fn intern_scoped(&mut self, base: &str, scope_id: u32) -> Symbol {
        self.intern(&format!("{base}_{scope_id}"))
    }

    #[must_use]
    pub fn resolve(&self, sym: Symbol) -> &str {
        self.strings[sym.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_same_string_twice_yields_same_symbol() {
        let mut i = Interner::new();
        let a = i.intern("foo");
        let b = i.intern("foo");
        assert_eq!(a, b);
    }

    #[test]
    fn different_strings_yield_different_symbols() {
        let mut i = Interner::new();
        let a = i.intern("foo");
        let b = i.intern("bar");
        assert_ne!(a, b);
    }

    #[test]
    fn resolve_round_trips() {
        let mut i = Interner::new();
        let s = i.intern("hello");
        assert_eq!(i.resolve(s), "hello");
    }

    #[test]
    fn scoped_naming_matches_name_underscore_scope_id() {
        let mut i = Interner::new();
        let s = i.intern_scoped("x", 3);
        assert_eq!(i.resolve(s), "x_3");
    }
}

//! String interner for identifiers.
//!
//! Identifiers are hot (every `Identifier`, field name, and class name is
//! looked up repeatedly during code generation), so we intern them into
//! small copyable [`Symbol`] handles the way mm0's `Interner` does, backed
//! by an arena that owns the actual bytes.

use std::cell::RefCell;
use hashbrown::HashMap;
use typed_arena::Arena;

/// An interned identifier. Cheap to copy and compare.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
  #[must_use] pub fn into_usize(self) -> usize { self.0 as usize }
}

impl std::fmt::Debug for Symbol {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "Symbol({})", self.0)
  }
}

/// Owns the backing storage for every interned string; symbols from one
/// interner must not be used to index another.
pub struct Interner {
  arena: Arena<u8>,
  map: HashMap<&'static str, Symbol>,
  strings: Vec<&'static str>,
}

impl Default for Interner {
  fn default() -> Self { Self::new() }
}

impl Interner {
  #[must_use] pub fn new() -> Self {
    Self { arena: Arena::new(), map: HashMap::new(), strings: Vec::new() }
  }

  pub fn intern(&mut self, s: &str) -> Symbol {
    if let Some(&sym) = self.map.get(s) { return sym }
    let copied: &str = self.arena.alloc_str(s);
    // Safety: the arena lives as long as `self`, and we only ever hand out
    // the `'static` alias internally; no reference escapes `Interner`'s API
    // with a lifetime longer than `self`.
    let copied: &'static str = unsafe { std::mem::transmute(copied) };
    let sym = Symbol(u32::try_from(self.strings.len()).expect("too many identifiers"));
    self.strings.push(copied);
    self.map.insert(copied, sym);
    sym
  }

  #[must_use] pub fn resolve(&self, sym: Symbol) -> &str { self.strings[sym.into_usize()] }
}

thread_local! {
  static INTERNER: RefCell<Interner> = RefCell::new(Interner::new());
}

/// Intern `s` in the global, thread-local interner.
pub fn intern(s: &str) -> Symbol {
  INTERNER.with(|i| i.borrow_mut().intern(s))
}

/// Resolve `sym` to its string, copied out of the global interner.
#[must_use] pub fn resolve(sym: Symbol) -> String {
  INTERNER.with(|i| i.borrow().resolve(sym).to_owned())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn same_text_interns_to_same_symbol() {
    let a = intern("foo_bar");
    let b = intern("foo_bar");
    assert_eq!(a, b);
    assert_eq!(resolve(a), "foo_bar");
  }

  #[test]
  fn distinct_text_interns_distinctly() {
    let a = intern("quux_one");
    let b = intern("quux_two");
    assert_ne!(a, b);
  }
}

//! Symbol environment: the module-level tables the code generator consults
//! while lowering (spec §2 component 6, §3.7).
//!
//! Mirrors the teacher's `types/entity.rs` shape — one owning structure with
//! named collections, looked up by [`Symbol`] — but without mm0's
//! forward-declared-vs-typed `Tc` enums, since Pynux has no separate
//! typechecking phase: a class, union, or function either appears in its
//! table by the time code generation runs, or codegen fails.

use hashbrown::{HashMap, HashSet};

use crate::ast::{ClassDef, EnumDef, ExternDecl, FunctionDef, Type, TypeKind, UnionDef};
use crate::diagnostics::CodeGenError;
use crate::symbol::Symbol;

/// One field of a struct or union layout: name, declared type, byte offset.
#[derive(Debug, Clone)]
pub struct FieldLayout {
  pub name: Symbol,
  pub ty: Type,
  pub offset: u32,
}

/// A class's computed layout: inherited fields first, then its own, each
/// 4-byte aligned (spec §3.7, §4.4.4).
#[derive(Debug, Clone)]
pub struct ClassLayout {
  pub name: Symbol,
  pub fields: Vec<FieldLayout>,
  pub size: u32,
  pub base: Option<Symbol>,
  pub packed: bool,
}

impl ClassLayout {
  #[must_use] pub fn field(&self, name: Symbol) -> Option<&FieldLayout> {
    self.fields.iter().find(|f| f.name == name)
  }
}

/// A union's layout: every field sits at offset 0 (spec §3.7).
#[derive(Debug, Clone)]
pub struct UnionLayout {
  pub name: Symbol,
  pub fields: Vec<FieldLayout>,
  pub size: u32,
}

impl UnionLayout {
  #[must_use] pub fn field(&self, name: Symbol) -> Option<&FieldLayout> {
    self.fields.iter().find(|f| f.name == name)
  }
}

/// An enum's variant table: each variant's tag index and declared payload
/// types, used by `Match` lowering to bind positional slots.
#[derive(Debug, Clone)]
pub struct EnumLayout {
  pub name: Symbol,
  pub variants: Vec<(Symbol, u32, Vec<Type>)>,
}

impl EnumLayout {
  #[must_use] pub fn variant(&self, name: Symbol) -> Option<&(Symbol, u32, Vec<Type>)> {
    self.variants.iter().find(|(n, ..)| *n == name)
  }
}

#[derive(Debug, Clone, Copy)]
pub struct VariantRef {
  pub enum_name: Symbol,
  pub tag: u32,
}

/// One local variable's frame slot: signed offset from `r7`, its size, and
/// (when known) its declared type, which index/address-of lowering consults.
#[derive(Debug, Clone)]
pub struct LocalVar {
  pub offset: i32,
  pub size: u32,
  pub ty: Option<Type>,
}

/// A pending lambda body, captured during expression lowering and flushed
/// as a synthetic top-level function once the enclosing function is done
/// (spec §3.8 "Pending lambdas").
#[derive(Debug, Clone)]
pub struct PendingLambda {
  pub label: String,
  pub params: smallvec::SmallVec<[Symbol; 4]>,
  pub body: Box<crate::ast::Expr>,
}

/// Labels identifying a loop's continue/break targets, pushed on entry and
/// popped on exit (spec §9 "stack of open loops").
#[derive(Debug, Clone)]
pub struct LoopLabels {
  pub continue_label: String,
  pub break_label: String,
}

/// Per-function compilation state: created on entry to `gen_function`,
/// written monotonically, discarded on exit (spec §3.8).
#[derive(Debug, Default)]
pub struct FunctionEnv {
  pub locals: HashMap<Symbol, LocalVar>,
  pub globally_scoped: HashSet<Symbol>,
  pub next_offset: i32,
  pub label_counter: u32,
  pub loop_stack: Vec<LoopLabels>,
  pub defer_stack: Vec<crate::ast::Stmt>,
  pub is_interrupt: bool,
}

impl FunctionEnv {
  #[must_use] pub fn new(is_interrupt: bool) -> Self {
    Self { is_interrupt, ..Self::default() }
  }

  /// Reserve `size` bytes (rounded up to 4) for a new local and record its
  /// offset; returns the allocated `LocalVar`.
  pub fn alloc_local(&mut self, name: Symbol, size: u32, ty: Option<Type>) -> LocalVar {
    let aligned = (size + 3) & !3;
    self.next_offset -= aligned as i32;
    let local = LocalVar { offset: self.next_offset, size: aligned, ty };
    self.locals.insert(name, local.clone());
    local
  }

  #[must_use] pub fn local(&self, name: Symbol) -> Option<&LocalVar> { self.locals.get(&name) }

  /// Total stack reservation so far, rounded up to an 8-byte boundary
  /// (spec §4.4.1 "aligned-to-8 sum of local sizes").
  #[must_use] pub fn frame_size(&self) -> u32 {
    let raw = (-self.next_offset) as u32;
    (raw + 7) & !7
  }

  pub fn new_label(&mut self) -> u32 {
    let n = self.label_counter;
    self.label_counter += 1;
    n
  }

  pub fn mark_global(&mut self, names: impl IntoIterator<Item = Symbol>) {
    self.globally_scoped.extend(names);
  }

  #[must_use] pub fn is_global(&self, name: Symbol) -> bool { self.globally_scoped.contains(&name) }

  pub fn push_loop(&mut self, labels: LoopLabels) { self.loop_stack.push(labels); }
  pub fn pop_loop(&mut self) { self.loop_stack.pop(); }
  #[must_use] pub fn current_loop(&self) -> Option<LoopLabels> { self.loop_stack.last().cloned() }
}

/// One module-scope global variable: its declared type and whether it's
/// array-shaped (element size recorded separately for indexing).
#[derive(Debug, Clone)]
pub struct GlobalVar {
  pub ty: Option<Type>,
  pub array_element_size: Option<u32>,
  pub is_const: bool,
}

/// The whole-program symbol table built by the code generator's first pass
/// over declarations (spec §4.4 "First pass").
#[derive(Debug, Default)]
pub struct Environment {
  pub classes: HashMap<Symbol, ClassLayout>,
  pub unions: HashMap<Symbol, UnionLayout>,
  pub enums: HashMap<Symbol, EnumLayout>,
  pub globals: HashMap<Symbol, GlobalVar>,
  pub defined_funcs: HashSet<Symbol>,
  pub extern_funcs: HashSet<Symbol>,
  /// `(ClassName, property_name) -> accessor method name`.
  pub properties: HashMap<(Symbol, Symbol), Symbol>,
  pub class_bases: HashMap<Symbol, Symbol>,
  pub packed_classes: HashSet<Symbol>,
  /// Function name -> assigned vector slot, in declaration order.
  pub interrupt_vectors: HashMap<Symbol, u32>,
  /// The declared class of a local/global instance variable, used by
  /// `MethodCall` lowering to resolve `obj.method(...)` dispatch.
  pub instance_classes: HashMap<Symbol, Symbol>,
}

impl Environment {
  #[must_use] pub fn new() -> Self { Self::default() }

  pub fn register_extern(&mut self, ext: &ExternDecl) {
    self.extern_funcs.insert(ext.name);
  }

  pub fn register_function(&mut self, f: &FunctionDef) {
    self.defined_funcs.insert(f.name);
    if f.decorators.iter().any(|d| crate::symbol::resolve(*d) == "interrupt") {
      let slot = u32::try_from(self.interrupt_vectors.len()).unwrap_or(u32::MAX);
      self.interrupt_vectors.insert(f.name, slot);
    }
  }

  /// Compute and register a class's field layout. `base` must already be
  /// registered if present (single inheritance, spec §4.4.4).
  pub fn register_class(&mut self, class: &ClassDef) -> Result<(), CodeGenError> {
    let packed = class.decorators.iter().any(|d| crate::symbol::resolve(*d) == "packed");
    if packed { self.packed_classes.insert(class.name); }

    let base_sym = class.bases.first().copied();
    if let Some(base) = base_sym { self.class_bases.insert(class.name, base); }

    let mut fields = Vec::new();
    let mut offset: u32 = 0;
    if let Some(base) = base_sym {
      let base_layout = self.classes.get(&base).ok_or_else(|| {
        CodeGenError::new(format!("unknown base class '{}'", crate::symbol::resolve(base)))
      })?;
      fields.extend(base_layout.fields.iter().cloned());
      offset = base_layout.size;
    }
    for field in &class.fields {
      let size = self.size_of(&field.field_type);
      offset = (offset + 3) & !3;
      fields.push(FieldLayout { name: field.name, ty: field.field_type.clone(), offset });
      offset += size;
    }
    let size = (offset + 3) & !3;

    for method in &class.methods {
      if method.decorators.iter().any(|d| crate::symbol::resolve(*d) == "property") {
        self.properties.insert((class.name, method.name), method.name);
      }
    }

    self.classes.insert(class.name, ClassLayout { name: class.name, fields, size, base: base_sym, packed });
    Ok(())
  }

  /// Compute and register a union's layout: all fields at offset 0, size =
  /// the largest field rounded up to 4 (spec §3.7).
  pub fn register_union(&mut self, union: &UnionDef) {
    let mut fields = Vec::new();
    let mut max_size = 0u32;
    for field in &union.fields {
      let size = self.size_of(&field.field_type);
      max_size = max_size.max(size);
      fields.push(FieldLayout { name: field.name, ty: field.field_type.clone(), offset: 0 });
    }
    let size = (max_size + 3) & !3;
    self.unions.insert(union.name, UnionLayout { name: union.name, fields, size });
  }

  pub fn register_enum(&mut self, e: &EnumDef) {
    let variants = e.variants.iter().enumerate()
      .map(|(i, v)| (v.name, i as u32, v.payload_types.clone()))
      .collect();
    self.enums.insert(e.name, EnumLayout { name: e.name, variants });
  }

  /// Finds which registered enum declares a variant named `name`, with its
  /// declaration-order tag. Variant constructors and `Match` patterns both
  /// use bare variant names (spec §3.6 `EnumVariant`, §8 "Match"), so this
  /// is a flat lookup across every enum rather than one scoped to a type.
  #[must_use] pub fn find_variant(&self, name: Symbol) -> Option<VariantRef> {
    self.enums.values().find_map(|e| e.variant(name).map(|(_, tag, _)| VariantRef { enum_name: e.name, tag: *tag }))
  }

  pub fn register_global(&mut self, name: Symbol, ty: Option<Type>, is_const: bool) {
    let array_element_size = ty.as_ref().and_then(|t| match &t.kind {
      TypeKind::Array { element, .. } => Some(self.size_of(element)),
      _ => None,
    });
    if let Some(t) = &ty {
      if let TypeKind::Named(n) = &t.kind {
        let sym = crate::symbol::intern(n);
        if self.classes.contains_key(&sym) {
          self.instance_classes.insert(name, sym);
        }
      }
    }
    self.globals.insert(name, GlobalVar { ty, array_element_size, is_const });
  }

  /// `size_of(type)` per spec §3.3.
  #[must_use] pub fn size_of(&self, ty: &Type) -> u32 {
    match &ty.kind {
      TypeKind::Named(name) => match name.as_str() {
        "int8" | "uint8" | "char" | "bool" => 1,
        "int16" | "uint16" => 2,
        "int64" | "uint64" | "float64" => 8,
        _ => {
          if let Some(layout) = self.classes.get(&crate::symbol::intern(name)) { return layout.size }
          if let Some(layout) = self.unions.get(&crate::symbol::intern(name)) { return layout.size }
          4
        }
      },
      TypeKind::Pointer(_) | TypeKind::FunctionPointer { .. } => 4,
      TypeKind::Array { size, element } => size * self.size_of(element),
      TypeKind::Tuple(elems) => elems.iter().map(|e| self.size_of(e)).sum(),
      TypeKind::List(_) | TypeKind::Dict { .. } | TypeKind::Optional(_) | TypeKind::Generic { .. } => 4,
    }
  }

  /// `is_float(type)` per spec §4.3.
  #[must_use] pub fn is_float(ty: &Type) -> bool {
    matches!(&ty.kind, TypeKind::Named(n) if n == "float32" || n == "float64" || n == "float")
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::span::Span;

  fn named(name: &str) -> Type {
    Type::new(TypeKind::Named(name.to_string()), Span::point(1, 1))
  }

  fn field(name: &str, ty: Type) -> crate::ast::ClassField {
    crate::ast::ClassField { name: crate::symbol::intern(name), field_type: ty, default: None, span: Span::point(1, 1) }
  }

  #[test]
  fn class_layout_matches_spec_example() {
    let mut env = Environment::new();
    let class = ClassDef {
      name: crate::symbol::intern("P"),
      fields: vec![field("a", named("int8")), field("b", named("int32")), field("c", named("int8"))],
      methods: vec![],
      bases: Default::default(),
      decorators: Default::default(),
      span: Span::point(1, 1),
    };
    env.register_class(&class).unwrap();
    let layout = &env.classes[&class.name];
    assert_eq!(layout.size, 12);
    assert_eq!(layout.fields[0].offset, 0);
    assert_eq!(layout.fields[1].offset, 4);
    assert_eq!(layout.fields[2].offset, 8);
  }

  #[test]
  fn union_layout_matches_spec_example() {
    let mut env = Environment::new();
    let union = UnionDef {
      name: crate::symbol::intern("U"),
      fields: vec![field("a", named("int8")), field("b", named("int64"))],
      span: Span::point(1, 1),
    };
    env.register_union(&union);
    let layout = &env.unions[&union.name];
    assert_eq!(layout.size, 8);
    assert!(layout.fields.iter().all(|f| f.offset == 0));
  }

  #[test]
  fn inherited_fields_come_first() {
    let mut env = Environment::new();
    let base = ClassDef {
      name: crate::symbol::intern("Base"),
      fields: vec![field("x", named("int32"))],
      methods: vec![], bases: Default::default(), decorators: Default::default(), span: Span::point(1, 1),
    };
    env.register_class(&base).unwrap();
    let mut bases = smallvec::SmallVec::new();
    bases.push(base.name);
    let derived = ClassDef {
      name: crate::symbol::intern("Derived"),
      fields: vec![field("y", named("int32"))],
      methods: vec![], bases, decorators: Default::default(), span: Span::point(1, 1),
    };
    env.register_class(&derived).unwrap();
    let layout = &env.classes[&derived.name];
    assert_eq!(layout.fields.len(), 2);
    assert_eq!(layout.fields[0].name, base.fields[0].name);
    assert_eq!(layout.fields[1].offset, 4);
  }

  #[test]
  fn alloc_local_rounds_up_to_four_and_tracks_frame_size() {
    let mut fenv = FunctionEnv::new(false);
    fenv.alloc_local(crate::symbol::intern("a"), 1, None);
    fenv.alloc_local(crate::symbol::intern("b"), 8, None);
    assert_eq!(fenv.frame_size(), 16);
  }
}

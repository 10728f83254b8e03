//! Top-level declarations: functions, classes, enums, externs, imports.

use smallvec::SmallVec;

use super::expr::Expr;
use super::stmt::Block;
use super::types::Type;
use crate::span::Span;
use crate::symbol::Symbol;

#[derive(Debug, Clone)]
pub struct Parameter {
  pub name: Symbol,
  pub param_type: Option<Type>,
  pub default: Option<Expr>,
  pub span: Span,
}

#[derive(Debug, Clone)]
pub struct GenericParam {
  pub name: Symbol,
  pub constraints: Vec<Symbol>,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
  pub name: Symbol,
  pub params: SmallVec<[Parameter; 4]>,
  pub return_type: Option<Type>,
  pub body: Block,
  pub decorators: SmallVec<[Symbol; 2]>,
  pub type_params: Vec<GenericParam>,
  pub span: Span,
}

impl FunctionDef {
  /// True when one of the recognized interrupt-vector decorators is present
  /// (spec §3.7 / §4.3 interrupt vector table).
  #[must_use] pub fn is_interrupt_handler(&self, interrupt_decorator: Symbol) -> bool {
    self.decorators.contains(&interrupt_decorator)
  }
}

#[derive(Debug, Clone)]
pub struct ClassField {
  pub name: Symbol,
  pub field_type: Type,
  pub default: Option<Expr>,
  pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ClassDef {
  pub name: Symbol,
  pub fields: Vec<ClassField>,
  pub methods: Vec<FunctionDef>,
  pub bases: SmallVec<[Symbol; 2]>,
  pub decorators: SmallVec<[Symbol; 2]>,
  pub span: Span,
}

/// `union Name: a: int8; b: int64` — like a class but all fields share
/// offset 0 (spec §3.7); unions carry no methods or base classes.
#[derive(Debug, Clone)]
pub struct UnionDef {
  pub name: Symbol,
  pub fields: Vec<ClassField>,
  pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumVariant {
  pub name: Symbol,
  pub payload_types: Vec<Type>,
  pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumDef {
  pub name: Symbol,
  pub variants: Vec<EnumVariant>,
  pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ExternDecl {
  pub name: Symbol,
  pub params: SmallVec<[Parameter; 4]>,
  pub return_type: Option<Type>,
  pub span: Span,
}

/// `from lib.io import print_str`, `from lib.io import *`, `import lib.math`,
/// `import lib.math as m`.
#[derive(Debug, Clone)]
pub struct ImportDecl {
  pub module: String,
  pub names: Vec<Symbol>,
  pub alias: Option<Symbol>,
  pub star: bool,
  pub span: Span,
}

/// A module-level declaration, distinct from the statements that only ever
/// appear inside a function body.
#[derive(Debug, Clone)]
pub enum DeclKind {
  Function(FunctionDef),
  Class(ClassDef),
  Union(UnionDef),
  Enum(EnumDef),
  Extern(ExternDecl),
  /// A module-level `VarDecl`; its payload reuses `StmtKind::VarDecl`'s
  /// shape rather than duplicating the three fields here.
  Var { name: Symbol, var_type: Option<Type>, value: Option<Expr>, is_const: bool },
}

#[derive(Debug, Clone)]
pub struct Decl {
  pub kind: DeclKind,
  pub span: Span,
}

impl Decl {
  #[must_use] pub fn new(kind: DeclKind, span: Span) -> Self { Self { kind, span } }

  #[must_use] pub fn name(&self) -> Symbol {
    match &self.kind {
      DeclKind::Function(f) => f.name,
      DeclKind::Class(c) => c.name,
      DeclKind::Union(u) => u.name,
      DeclKind::Enum(e) => e.name,
      DeclKind::Extern(e) => e.name,
      DeclKind::Var { name, .. } => *name,
    }
  }
}

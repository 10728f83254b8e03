//! Statement nodes.

use smallvec::SmallVec;

use super::expr::Expr;
use super::types::Type;
use crate::span::Span;
use crate::symbol::Symbol;

pub type Block = Vec<Stmt>;

#[derive(Debug, Clone)]
pub struct ExceptHandler {
  /// `None` for a bare `except:`.
  pub exception_type: Option<Symbol>,
  pub name: Option<Symbol>,
  pub body: Block,
  pub span: Span,
}

#[derive(Debug, Clone)]
pub struct WithItem {
  pub context: Expr,
  pub var: Option<Symbol>,
}

/// `case Some(x):` / `case _:` — a variant name (or `_` wildcard) plus the
/// names it binds from the variant's payload.
#[derive(Debug, Clone)]
pub struct Pattern {
  pub name: Symbol,
  pub bindings: SmallVec<[Symbol; 4]>,
}

#[derive(Debug, Clone)]
pub struct MatchArm {
  pub pattern: Pattern,
  pub body: Block,
  pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
  VarDecl { name: Symbol, var_type: Option<Type>, value: Option<Expr>, is_const: bool },
  Assignment { target: Expr, value: Expr, op: Option<crate::ast::BinOp> },
  /// `a, b = b, a` and `a, b = func()`.
  TupleUnpackAssign { targets: SmallVec<[Symbol; 4]>, value: Expr },
  ExprStmt(Expr),
  Return(Option<Expr>),
  If {
    condition: Expr,
    then_body: Block,
    elif_branches: Vec<(Expr, Block)>,
    else_body: Option<Block>,
  },
  While { condition: Expr, body: Block },
  For { var: Symbol, iterable: Expr, body: Block },
  ForUnpack { vars: SmallVec<[Symbol; 4]>, iterable: Expr, body: Block },
  Break,
  Continue,
  Pass,
  Defer(Box<Stmt>),
  Assert { condition: Expr, message: Option<Expr> },
  Global(SmallVec<[Symbol; 4]>),
  Try { try_body: Block, handlers: Vec<ExceptHandler>, else_body: Block, finally_body: Block },
  Raise(Option<Expr>),
  Yield(Option<Expr>),
  With { items: Vec<WithItem>, body: Block },
  /// `match expr: case A(x): ... case _: ...`. Not part of the original
  /// grammar's documented `Stmt` union, but the parser accepts it as a
  /// statement, so it lives here rather than as a separate top-level type.
  Match { expr: Expr, arms: Vec<MatchArm> },
}

/// A statement node: every node in the AST carries a span.
#[derive(Debug, Clone)]
pub struct Stmt {
  pub kind: StmtKind,
  pub span: Span,
}

impl Stmt {
  #[must_use] pub fn new(kind: StmtKind, span: Span) -> Self { Self { kind, span } }
}

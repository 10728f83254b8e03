//! Expression nodes.

use smallvec::SmallVec;

use super::types::Type;
use crate::span::Span;
use crate::symbol::Symbol;

/// Binary operators, in the exact set the parser's precedence chain covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
  Add, Sub, Mul, Div, IDiv, Mod, Pow,
  Eq, Neq, Lt, Lte, Gt, Gte,
  And, Or, In, NotIn, Is, IsNot,
  BitOr, BitAnd, BitXor, Shl, Shr,
}

/// Unary operators. `Deref`/`Addr` exist only in pointer-arithmetic contexts
/// (`*p`, `&x`); the parser disambiguates them from `Mul`/`BitAnd` by
/// grammatical position, not token identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp { Neg, Not, BitNot, Deref, Addr }

/// Most call-site and literal collections hold a handful of elements;
/// `SmallVec` keeps the common case off the heap.
pub type ExprList = SmallVec<[Expr; 4]>;

#[derive(Debug, Clone)]
pub enum ExprKind {
  Int(i64),
  Float(f64),
  Str(String),
  FString(String),
  Char(char),
  Bool(bool),
  None,
  Ident(Symbol),

  Binary { op: BinOp, left: Box<Expr>, right: Box<Expr> },
  Unary { op: UnaryOp, operand: Box<Expr> },

  Call { func: Box<Expr>, args: ExprList, kwargs: Vec<(Symbol, Expr)> },
  MethodCall { obj: Box<Expr>, method: Symbol, args: ExprList },
  Index { obj: Box<Expr>, index: Box<Expr> },
  Slice { obj: Box<Expr>, start: Option<Box<Expr>>, end: Option<Box<Expr>>, step: Option<Box<Expr>> },
  Member { obj: Box<Expr>, member: Symbol },

  List(ExprList),
  Dict(Vec<(Expr, Expr)>),
  Tuple(ExprList),
  /// `[elem for var in iterable if cond]`. Only a single `for` clause is
  /// supported (no nested comprehensions), matching the original grammar.
  ListComprehension {
    element: Box<Expr>,
    var: Symbol,
    iterable: Box<Expr>,
    condition: Option<Box<Expr>>,
  },
  Conditional { condition: Box<Expr>, then_expr: Box<Expr>, else_expr: Box<Expr> },
  Lambda { params: SmallVec<[Symbol; 4]>, body: Box<Expr> },
  SizeOf(Type),
  Cast { target: Type, expr: Box<Expr> },
  Asm(String),
}

/// An expression node: every node in the AST carries a span.
#[derive(Debug, Clone)]
pub struct Expr {
  pub kind: ExprKind,
  pub span: Span,
}

impl Expr {
  #[must_use] pub fn new(kind: ExprKind, span: Span) -> Self { Self { kind, span } }
}

//! Source position tracking.
//!
//! Every token and AST node carries a [`Span`]; spans never cross files
//! (each module is lexed and parsed independently before the driver merges
//! declarations, so cross-file spans are not representable).

use std::fmt;
use std::rc::Rc;

/// A `(start, end)` pair of line/column positions within a single file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Span {
  pub start_line: u32,
  pub start_col: u32,
  pub end_line: u32,
  pub end_col: u32,
}

impl Span {
  #[must_use] pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
    Self { start_line, start_col, end_line, end_col }
  }

  /// A zero-width span at a single position, used for synthetic nodes
  /// (desugared `for`, flushed lambdas) that have no direct source text.
  #[must_use] pub fn point(line: u32, col: u32) -> Self {
    Self { start_line: line, start_col: col, end_line: line, end_col: col }
  }

  /// The smallest span covering both `self` and `other`.
  #[must_use] pub fn to(self, other: Span) -> Self {
    Self { start_line: self.start_line, start_col: self.start_col, end_line: other.end_line, end_col: other.end_col }
  }
}

impl fmt::Display for Span {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.start_line, self.start_col)
  }
}

/// A [`Span`] paired with the file it occurs in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSpan {
  pub file: Rc<str>,
  pub span: Span,
}

impl FileSpan {
  #[must_use] pub fn new(file: Rc<str>, span: Span) -> Self { Self { file, span } }
}

impl fmt::Display for FileSpan {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.file, self.span)
  }
}

/// Wraps a value with the span of the source text it was parsed from,
/// mirroring the AST's universal "every node carries a span" invariant
/// without requiring every node type to redeclare a `span` field.
#[derive(Clone, Debug)]
pub struct Spanned<T> {
  pub span: Span,
  pub k: T,
}

impl<T> Spanned<T> {
  #[must_use] pub fn new(span: Span, k: T) -> Self { Self { span, k } }
}

impl<T> std::ops::Deref for Spanned<T> {
  type Target = T;
  fn deref(&self) -> &T { &self.k }
}

//! Error kinds for every compiler stage (spec §7), unified into one
//! top-level [`PynuxError`] the driver and CLI propagate fail-fast.
//!
//! Every stage-local error is a small typed value (in the spirit of mm0's
//! `GhostErr`/`LowerErr`); `PynuxError` is the single `thiserror` enum that
//! composes them for display at the process boundary.

use std::path::PathBuf;
use thiserror::Error;

use crate::token::{Token, TokenKind};

/// Lexical error: `message` plus the 1-based line/column it occurred at.
#[derive(Debug, Clone, Error)]
#[error("{message} at line {line}, column {col}")]
pub struct LexError {
  pub message: String,
  pub line: u32,
  pub col: u32,
}

impl LexError {
  #[must_use] pub fn new(message: impl Into<String>, line: u32, col: u32) -> Self {
    Self { message: message.into(), line, col }
  }
}

/// Parse error: `message` anchored to the offending token. The parser never
/// attempts recovery, so this is always the *first* mismatch encountered.
#[derive(Debug, Clone, Error)]
#[error("{message} at line {line}, column {col}")]
pub struct ParseError {
  pub message: String,
  pub line: u32,
  pub col: u32,
  pub found: TokenKind,
}

impl ParseError {
  #[must_use] pub fn new(message: impl Into<String>, tok: &Token) -> Self {
    Self { message: message.into(), line: tok.span.start_line, col: tok.span.start_col, found: tok.kind }
  }
}

/// Code generator error: no source position is attached because by the time
/// lowering runs, the failure is structural (unsupported variant, missing
/// field, `break` outside a loop) rather than a parse-time position.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct CodeGenError(pub String);

impl CodeGenError {
  #[must_use] pub fn new(message: impl Into<String>) -> Self { Self(message.into()) }
}

/// Driver-level I/O or toolchain failure.
#[derive(Debug, Error)]
pub enum DriverError {
  #[error("cannot read {path}: {source}")]
  Io { path: PathBuf, #[source] source: std::io::Error },
  #[error("toolchain failure: {0}")]
  Toolchain(String),
}

/// The unified error type surfaced to the CLI. Fail-fast: the first error
/// encountered aborts the compilation (spec §7).
#[derive(Debug, Error)]
pub enum PynuxError {
  #[error(transparent)]
  Lex(#[from] LexError),
  #[error(transparent)]
  Parse(#[from] ParseError),
  #[error(transparent)]
  CodeGen(#[from] CodeGenError),
  #[error(transparent)]
  Driver(#[from] DriverError),
}

impl PynuxError {
  /// The single-line diagnostic format required by spec §7:
  /// `Error: <message> at line L, column C` for lexical/parse errors,
  /// `Error: <message>` otherwise.
  #[must_use] pub fn diagnostic(&self) -> String {
    format!("Error: {self}")
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::span::Span;
  use crate::token::{Token, TokenKind};

  #[test]
  fn lex_error_diagnostic_includes_position() {
    let err = PynuxError::Lex(LexError::new("unterminated string", 3, 7));
    assert_eq!(err.diagnostic(), "Error: unterminated string at line 3, column 7");
  }

  #[test]
  fn parse_error_diagnostic_includes_position() {
    let tok = Token::text(TokenKind::Eof, Span::point(2, 1));
    let err = PynuxError::Parse(ParseError::new("unexpected end of file", &tok));
    assert_eq!(err.diagnostic(), "Error: unexpected end of file at line 2, column 1");
  }

  #[test]
  fn codegen_error_diagnostic_has_no_position() {
    let err = PynuxError::CodeGen(CodeGenError::new("'break' outside a loop"));
    assert_eq!(err.diagnostic(), "Error: 'break' outside a loop");
  }
}

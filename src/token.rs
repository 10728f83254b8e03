//! The lexical token model: an enumeration of every category the lexer can
//! produce, plus the token record (kind, optional literal value, span).

use crate::span::Span;

/// A literal value carried by a token. Only `Number`, `String`, `FString`,
/// `CharLit` and `Ident` ever carry one; every other kind's value is `None`.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
  Int(i64),
  Float(f64),
  Str(String),
  Char(char),
  Ident(String),
}

macro_rules! token_kinds {
  ($($variant:ident),* $(,)?) => {
    /// All lexical categories the lexer can emit.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum TokenKind { $($variant),* }

    impl TokenKind {
      #[must_use] pub fn name(self) -> &'static str {
        match self { $(TokenKind::$variant => stringify!($variant)),* }
      }
    }
  };
}

token_kinds! {
  // Python-style keywords
  Def, Class, From, Import, As, Return, If, Elif, Else, While, For, In,
  Break, Continue, Pass, With, Raise, Try, Except, Finally, Lambda, Yield,
  Async, Await, And, Or, Not, Is, Assert, Global, Nonlocal, Del,
  True_, False_, None_,

  // Pynux-specific keywords
  Extern, Asm, Defer, Match, Case, Volatile, Packed, Union, Enum, Interrupt,

  // Built-in type-name keywords
  Ptr, List, Dict, Tuple, Optional, Func, Int8, Int16, Int32, Int64,
  Uint8, Uint16, Uint32, Uint64, Float32, Float64, Bool, Char, Str, Bytes,
  Int, Float, Array, Ref, Cast, Auto,

  // Python-compat pseudo-keywords
  Dataclass, Isinstance, Field, Property, Staticmethod, Classmethod, Self_,

  // Literals
  Ident, Number, StringLit, FStringLit, CharLit,

  // Arithmetic operators
  Plus, Minus, Star, Slash, DoubleSlash, Percent, DoubleStar,

  // Comparisons
  Eq, Ne, Lt, Gt, Le, Ge,

  // Bitwise
  Amp, Pipe, Caret, Tilde, Shl, Shr,

  // Assignment / compound assignment
  Assign, PlusEq, MinusEq, StarEq, SlashEq, PercentEq, AmpEq, PipeEq,
  CaretEq, ShlEq, ShrEq, Walrus,

  // Delimiters & punctuation
  LParen, RParen, LBracket, RBracket, LBrace, RBrace, Comma, Colon,
  Semicolon, Dot, DotDot, Ellipsis, Arrow, At,

  // Synthetic
  Newline, Indent, Dedent, Eof,
}

/// A single lexical token: its category, optional literal payload, and span.
#[derive(Clone, Debug)]
pub struct Token {
  pub kind: TokenKind,
  pub value: Option<Literal>,
  pub span: Span,
}

impl Token {
  #[must_use] pub fn new(kind: TokenKind, value: Option<Literal>, span: Span) -> Self {
    Self { kind, value, span }
  }

  #[must_use] pub fn text(kind: TokenKind, span: Span) -> Self { Self::new(kind, None, span) }

  /// The identifier or keyword text of this token, if it has one.
  #[must_use] pub fn ident_name(&self) -> Option<&str> {
    match &self.value {
      Some(Literal::Ident(s)) => Some(s),
      _ => None,
    }
  }
}

/// Fixed keyword table: identifier text → reserved [`TokenKind`]. Built once;
/// the lexer consults it after scanning a full identifier run.
#[must_use] pub fn keyword(name: &str) -> Option<TokenKind> {
  use TokenKind::*;
  Some(match name {
    "def" => Def, "class" => Class, "from" => From, "import" => Import,
    "as" => As, "return" => Return, "if" => If, "elif" => Elif, "else" => Else,
    "while" => While, "for" => For, "in" => In, "break" => Break,
    "continue" => Continue, "pass" => Pass, "with" => With, "raise" => Raise,
    "try" => Try, "except" => Except, "finally" => Finally, "lambda" => Lambda,
    "yield" => Yield, "async" => Async, "await" => Await, "and" => And,
    "or" => Or, "not" => Not, "is" => Is, "assert" => Assert,
    "global" => Global, "nonlocal" => Nonlocal, "del" => Del,
    "True" => True_, "False" => False_, "None" => None_,

    "extern" => Extern, "asm" => Asm, "defer" => Defer, "match" => Match,
    "case" => Case, "volatile" => Volatile, "packed" => Packed,
    "union" => Union, "enum" => Enum, "interrupt" => Interrupt,

    "Ptr" => Ptr, "List" => List, "Dict" => Dict, "Tuple" => Tuple,
    "Optional" => Optional, "Func" => Func, "int8" => Int8, "int16" => Int16,
    "int32" => Int32, "int64" => Int64, "uint8" => Uint8, "uint16" => Uint16,
    "uint32" => Uint32, "uint64" => Uint64, "float32" => Float32,
    "float64" => Float64, "bool" => Bool, "char" => Char, "str" => Str,
    "bytes" => Bytes, "int" => Int, "float" => Float, "Array" => Array,
    "Ref" => Ref, "cast" => Cast, "auto" => Auto,

    "dataclass" => Dataclass, "isinstance" => Isinstance, "field" => Field,
    "property" => Property, "staticmethod" => Staticmethod,
    "classmethod" => Classmethod, "self" => Self_,

    _ => return None,
  })
}

//! Recursive-descent / precedence-climbing parser: tokens → [`Program`].
//!
//! Direct port of `original_source/compiler/parser.py`'s grammar onto the
//! token and AST types defined in this crate. The parser never attempts
//! error recovery: the first mismatch is fatal (spec §4.2).

use smallvec::SmallVec;

use crate::ast::*;
use crate::diagnostics::ParseError;
use crate::span::Span;
use crate::symbol::{self, Symbol};
use crate::token::{Literal, Token, TokenKind};

type PResult<T> = Result<T, ParseError>;

/// Parses a complete token stream (as produced by [`crate::lexer::lex`])
/// into a [`Program`].
pub fn parse(tokens: Vec<Token>, filename: &str) -> PResult<Program> {
  Parser::new(tokens, filename).parse_program()
}

struct Parser<'a> {
  tokens: Vec<Token>,
  filename: &'a str,
  pos: usize,
}

const PRIMITIVE_CAST_KINDS: &[TokenKind] = &[
  TokenKind::Int8, TokenKind::Int16, TokenKind::Int32, TokenKind::Int64,
  TokenKind::Uint8, TokenKind::Uint16, TokenKind::Uint32, TokenKind::Uint64,
  TokenKind::Float32, TokenKind::Float64, TokenKind::Bool, TokenKind::Char,
];

impl<'a> Parser<'a> {
  fn new(tokens: Vec<Token>, filename: &'a str) -> Self { Self { tokens, filename, pos: 0 } }

  fn current(&self) -> &Token { self.tokens.get(self.pos).unwrap_or_else(|| self.tokens.last().unwrap()) }

  fn peek(&self, offset: isize) -> &Token {
    let idx = self.pos as isize + offset;
    if idx < 0 { return &self.tokens[0] }
    self.tokens.get(idx as usize).unwrap_or_else(|| self.tokens.last().unwrap())
  }

  fn advance(&mut self) -> Token {
    let tok = self.current().clone();
    if self.pos < self.tokens.len() - 1 { self.pos += 1 }
    tok
  }

  fn check(&self, kinds: &[TokenKind]) -> bool { kinds.contains(&self.current().kind) }

  fn match_tok(&mut self, kind: TokenKind) -> Option<Token> {
    if self.current().kind == kind { Some(self.advance()) } else { None }
  }

  fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
    if self.current().kind != kind {
      return Err(ParseError::new(format!("expected {}", kind.name()), self.current()));
    }
    Ok(self.advance())
  }

  fn expect_ident(&mut self) -> PResult<Symbol> {
    let tok = self.expect(TokenKind::Ident)?;
    Ok(symbol::intern(tok.ident_name().expect("Ident token always carries a name")))
  }

  fn skip_newlines(&mut self) { while self.match_tok(TokenKind::Newline).is_some() {} }

  /// The span from `start` through the token just consumed.
  fn make_span(&self, start: &Token) -> Span {
    let end = if self.pos > 0 { &self.tokens[self.pos - 1] } else { start };
    start.span.to(end.span)
  }

  // ---------------------------------------------------------------------
  // Types
  // ---------------------------------------------------------------------

  fn parse_type(&mut self) -> PResult<Type> {
    let tok = self.current().clone();

    if self.match_tok(TokenKind::Ptr).is_some() {
      self.expect(TokenKind::LBracket)?;
      let inner = self.parse_type()?;
      self.expect(TokenKind::RBracket)?;
      return Ok(Type::new(TypeKind::Pointer(Box::new(inner)), self.make_span(&tok)));
    }
    if self.match_tok(TokenKind::List).is_some() {
      self.expect(TokenKind::LBracket)?;
      let inner = self.parse_type()?;
      self.expect(TokenKind::RBracket)?;
      return Ok(Type::new(TypeKind::List(Box::new(inner)), self.make_span(&tok)));
    }
    if self.match_tok(TokenKind::Dict).is_some() {
      self.expect(TokenKind::LBracket)?;
      let key = self.parse_type()?;
      self.expect(TokenKind::Comma)?;
      let value = self.parse_type()?;
      self.expect(TokenKind::RBracket)?;
      return Ok(Type::new(TypeKind::Dict { key: Box::new(key), value: Box::new(value) }, self.make_span(&tok)));
    }
    if self.match_tok(TokenKind::Optional).is_some() {
      self.expect(TokenKind::LBracket)?;
      let inner = self.parse_type()?;
      self.expect(TokenKind::RBracket)?;
      return Ok(Type::new(TypeKind::Optional(Box::new(inner)), self.make_span(&tok)));
    }
    if self.match_tok(TokenKind::Tuple).is_some() {
      self.expect(TokenKind::LBracket)?;
      let mut types = vec![self.parse_type()?];
      while self.match_tok(TokenKind::Comma).is_some() { types.push(self.parse_type()?) }
      self.expect(TokenKind::RBracket)?;
      return Ok(Type::new(TypeKind::Tuple(types), self.make_span(&tok)));
    }
    if self.match_tok(TokenKind::Func).is_some() {
      self.expect(TokenKind::LBracket)?;
      self.expect(TokenKind::LBracket)?;
      let mut params = Vec::new();
      if !self.check(&[TokenKind::RBracket]) {
        params.push(self.parse_type()?);
        while self.match_tok(TokenKind::Comma).is_some() { params.push(self.parse_type()?) }
      }
      self.expect(TokenKind::RBracket)?;
      self.expect(TokenKind::Comma)?;
      let ret = self.parse_type()?;
      self.expect(TokenKind::RBracket)?;
      return Ok(Type::new(TypeKind::FunctionPointer { params, ret: Box::new(ret) }, self.make_span(&tok)));
    }
    if self.match_tok(TokenKind::Array).is_some() {
      self.expect(TokenKind::LBracket)?;
      let size_tok = self.expect(TokenKind::Number)?;
      let size = match size_tok.value {
        Some(Literal::Int(n)) => n as u32,
        _ => return Err(ParseError::new("array size must be an integer literal", &size_tok)),
      };
      self.expect(TokenKind::Comma)?;
      let element = self.parse_type()?;
      self.expect(TokenKind::RBracket)?;
      return Ok(Type::new(TypeKind::Array { size, element: Box::new(element) }, self.make_span(&tok)));
    }

    let primitive = match tok.kind {
      TokenKind::Int8 => Some("int8"), TokenKind::Int16 => Some("int16"),
      TokenKind::Int32 => Some("int32"), TokenKind::Int64 => Some("int64"),
      TokenKind::Uint8 => Some("uint8"), TokenKind::Uint16 => Some("uint16"),
      TokenKind::Uint32 => Some("uint32"), TokenKind::Uint64 => Some("uint64"),
      TokenKind::Float32 => Some("float32"), TokenKind::Float64 => Some("float64"),
      TokenKind::Bool => Some("bool"), TokenKind::Char => Some("char"),
      TokenKind::Str => Some("str"), TokenKind::Bytes => Some("bytes"),
      TokenKind::Int => Some("int32"), TokenKind::Float => Some("float32"),
      _ => None,
    };
    if let Some(name) = primitive {
      self.advance();
      return Ok(Type::new(TypeKind::Named(name.to_string()), self.make_span(&tok)));
    }

    if self.check(&[TokenKind::Ident]) {
      let name_tok = self.advance();
      let name = name_tok.ident_name().expect("Ident token always carries a name").to_string();
      if self.match_tok(TokenKind::LBracket).is_some() {
        let mut args = vec![self.parse_type()?];
        while self.match_tok(TokenKind::Comma).is_some() { args.push(self.parse_type()?) }
        self.expect(TokenKind::RBracket)?;
        let rendered: Vec<_> = args.iter().map(Type::display_name).collect();
        return Ok(Type::new(TypeKind::Named(format!("{name}[{}]", rendered.join(", "))), self.make_span(&tok)));
      }
      return Ok(Type::new(TypeKind::Named(name), self.make_span(&tok)));
    }

    Err(ParseError::new(format!("expected type, got {}", tok.kind.name()), &tok))
  }

  // ---------------------------------------------------------------------
  // Expressions (precedence climbing, low → high)
  // ---------------------------------------------------------------------

  fn parse_expression(&mut self) -> PResult<Expr> { self.parse_conditional() }

  fn parse_conditional(&mut self) -> PResult<Expr> {
    let tok = self.current().clone();
    let expr = self.parse_or()?;
    if self.match_tok(TokenKind::If).is_some() {
      let condition = self.parse_or()?;
      self.expect(TokenKind::Else)?;
      let else_expr = self.parse_conditional()?;
      return Ok(Expr::new(ExprKind::Conditional {
        condition: Box::new(condition), then_expr: Box::new(expr), else_expr: Box::new(else_expr),
      }, self.make_span(&tok)));
    }
    Ok(expr)
  }

  fn parse_or(&mut self) -> PResult<Expr> {
    let tok = self.current().clone();
    let mut left = self.parse_and()?;
    while self.match_tok(TokenKind::Or).is_some() {
      let right = self.parse_and()?;
      left = Expr::new(ExprKind::Binary { op: BinOp::Or, left: Box::new(left), right: Box::new(right) }, self.make_span(&tok));
    }
    Ok(left)
  }

  fn parse_and(&mut self) -> PResult<Expr> {
    let tok = self.current().clone();
    let mut left = self.parse_not()?;
    while self.match_tok(TokenKind::And).is_some() {
      let right = self.parse_not()?;
      left = Expr::new(ExprKind::Binary { op: BinOp::And, left: Box::new(left), right: Box::new(right) }, self.make_span(&tok));
    }
    Ok(left)
  }

  fn parse_not(&mut self) -> PResult<Expr> {
    let tok = self.current().clone();
    if self.match_tok(TokenKind::Not).is_some() {
      let operand = self.parse_not()?;
      return Ok(Expr::new(ExprKind::Unary { op: UnaryOp::Not, operand: Box::new(operand) }, self.make_span(&tok)));
    }
    self.parse_comparison()
  }

  fn parse_comparison(&mut self) -> PResult<Expr> {
    let tok = self.current().clone();
    let mut left = self.parse_bitor()?;
    loop {
      let op = match self.current().kind {
        TokenKind::Eq => Some(BinOp::Eq), TokenKind::Ne => Some(BinOp::Neq),
        TokenKind::Lt => Some(BinOp::Lt), TokenKind::Le => Some(BinOp::Lte),
        TokenKind::Gt => Some(BinOp::Gt), TokenKind::Ge => Some(BinOp::Gte),
        TokenKind::In => Some(BinOp::In), TokenKind::Is => Some(BinOp::Is),
        _ => None,
      };
      let Some(mut op) = op else {
        if self.current().kind == TokenKind::Not && self.peek(1).kind == TokenKind::In {
          self.advance();
          self.advance();
          let right = self.parse_bitor()?;
          left = Expr::new(ExprKind::Binary { op: BinOp::NotIn, left: Box::new(left), right: Box::new(right) }, self.make_span(&tok));
          continue;
        }
        break;
      };
      self.advance();
      if op == BinOp::Is && self.match_tok(TokenKind::Not).is_some() { op = BinOp::IsNot }
      let right = self.parse_bitor()?;
      left = Expr::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, self.make_span(&tok));
    }
    Ok(left)
  }

  fn parse_bitor(&mut self) -> PResult<Expr> {
    let tok = self.current().clone();
    let mut left = self.parse_bitxor()?;
    while self.match_tok(TokenKind::Pipe).is_some() {
      let right = self.parse_bitxor()?;
      left = Expr::new(ExprKind::Binary { op: BinOp::BitOr, left: Box::new(left), right: Box::new(right) }, self.make_span(&tok));
    }
    Ok(left)
  }

  fn parse_bitxor(&mut self) -> PResult<Expr> {
    let tok = self.current().clone();
    let mut left = self.parse_bitand()?;
    while self.match_tok(TokenKind::Caret).is_some() {
      let right = self.parse_bitand()?;
      left = Expr::new(ExprKind::Binary { op: BinOp::BitXor, left: Box::new(left), right: Box::new(right) }, self.make_span(&tok));
    }
    Ok(left)
  }

  fn parse_bitand(&mut self) -> PResult<Expr> {
    let tok = self.current().clone();
    let mut left = self.parse_shift()?;
    while self.match_tok(TokenKind::Amp).is_some() {
      let right = self.parse_shift()?;
      left = Expr::new(ExprKind::Binary { op: BinOp::BitAnd, left: Box::new(left), right: Box::new(right) }, self.make_span(&tok));
    }
    Ok(left)
  }

  fn parse_shift(&mut self) -> PResult<Expr> {
    let tok = self.current().clone();
    let mut left = self.parse_additive()?;
    loop {
      if self.match_tok(TokenKind::Shl).is_some() {
        let right = self.parse_additive()?;
        left = Expr::new(ExprKind::Binary { op: BinOp::Shl, left: Box::new(left), right: Box::new(right) }, self.make_span(&tok));
      } else if self.match_tok(TokenKind::Shr).is_some() {
        let right = self.parse_additive()?;
        left = Expr::new(ExprKind::Binary { op: BinOp::Shr, left: Box::new(left), right: Box::new(right) }, self.make_span(&tok));
      } else { break }
    }
    Ok(left)
  }

  fn parse_additive(&mut self) -> PResult<Expr> {
    let tok = self.current().clone();
    let mut left = self.parse_multiplicative()?;
    loop {
      if self.match_tok(TokenKind::Plus).is_some() {
        let right = self.parse_multiplicative()?;
        left = Expr::new(ExprKind::Binary { op: BinOp::Add, left: Box::new(left), right: Box::new(right) }, self.make_span(&tok));
      } else if self.match_tok(TokenKind::Minus).is_some() {
        let right = self.parse_multiplicative()?;
        left = Expr::new(ExprKind::Binary { op: BinOp::Sub, left: Box::new(left), right: Box::new(right) }, self.make_span(&tok));
      } else { break }
    }
    Ok(left)
  }

  fn parse_multiplicative(&mut self) -> PResult<Expr> {
    let tok = self.current().clone();
    let mut left = self.parse_unary()?;
    loop {
      let op = if self.match_tok(TokenKind::Star).is_some() { Some(BinOp::Mul) }
        else if self.match_tok(TokenKind::Slash).is_some() { Some(BinOp::Div) }
        else if self.match_tok(TokenKind::DoubleSlash).is_some() { Some(BinOp::IDiv) }
        else if self.match_tok(TokenKind::Percent).is_some() { Some(BinOp::Mod) }
        else { None };
      let Some(op) = op else { break };
      let right = self.parse_unary()?;
      left = Expr::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, self.make_span(&tok));
    }
    Ok(left)
  }

  fn parse_unary(&mut self) -> PResult<Expr> {
    let tok = self.current().clone();
    if self.match_tok(TokenKind::Minus).is_some() {
      let operand = self.parse_unary()?;
      return Ok(Expr::new(ExprKind::Unary { op: UnaryOp::Neg, operand: Box::new(operand) }, self.make_span(&tok)));
    }
    if self.match_tok(TokenKind::Tilde).is_some() {
      let operand = self.parse_unary()?;
      return Ok(Expr::new(ExprKind::Unary { op: UnaryOp::BitNot, operand: Box::new(operand) }, self.make_span(&tok)));
    }
    if self.match_tok(TokenKind::Amp).is_some() {
      let operand = self.parse_unary()?;
      return Ok(Expr::new(ExprKind::Unary { op: UnaryOp::Addr, operand: Box::new(operand) }, self.make_span(&tok)));
    }
    if self.match_tok(TokenKind::Star).is_some() {
      let operand = self.parse_unary()?;
      return Ok(Expr::new(ExprKind::Unary { op: UnaryOp::Deref, operand: Box::new(operand) }, self.make_span(&tok)));
    }
    self.parse_power()
  }

  fn parse_power(&mut self) -> PResult<Expr> {
    let tok = self.current().clone();
    let left = self.parse_postfix()?;
    if self.match_tok(TokenKind::DoubleStar).is_some() {
      let right = self.parse_power()?;
      return Ok(Expr::new(ExprKind::Binary { op: BinOp::Pow, left: Box::new(left), right: Box::new(right) }, self.make_span(&tok)));
    }
    Ok(left)
  }

  fn parse_postfix(&mut self) -> PResult<Expr> {
    let tok = self.current().clone();
    let mut expr = self.parse_primary()?;
    loop {
      if self.match_tok(TokenKind::LParen).is_some() {
        let mut args = ExprList::new();
        let mut kwargs = Vec::new();
        if !self.check(&[TokenKind::RParen]) {
          self.parse_call_arg(&mut args, &mut kwargs)?;
          while self.match_tok(TokenKind::Comma).is_some() {
            if self.check(&[TokenKind::RParen]) { break }
            self.parse_call_arg(&mut args, &mut kwargs)?;
          }
        }
        self.expect(TokenKind::RParen)?;
        expr = Expr::new(ExprKind::Call { func: Box::new(expr), args, kwargs }, self.make_span(&tok));
      } else if self.match_tok(TokenKind::LBracket).is_some() {
        expr = self.parse_index_or_slice(expr, &tok)?;
      } else if self.match_tok(TokenKind::Dot).is_some() {
        let name = self.expect_ident()?;
        if self.check(&[TokenKind::LParen]) {
          self.advance();
          let mut args = ExprList::new();
          if !self.check(&[TokenKind::RParen]) {
            args.push(self.parse_expression()?);
            while self.match_tok(TokenKind::Comma).is_some() { args.push(self.parse_expression()?) }
          }
          self.expect(TokenKind::RParen)?;
          expr = Expr::new(ExprKind::MethodCall { obj: Box::new(expr), method: name, args }, self.make_span(&tok));
        } else {
          expr = Expr::new(ExprKind::Member { obj: Box::new(expr), member: name }, self.make_span(&tok));
        }
      } else if matches!(expr.kind, ExprKind::Ident(_)) && self.check(&[TokenKind::LBrace]) {
        expr = self.parse_struct_init(expr, &tok)?;
      } else { break }
    }
    Ok(expr)
  }

  fn parse_call_arg(&mut self, args: &mut ExprList, kwargs: &mut Vec<(Symbol, Expr)>) -> PResult<()> {
    let arg = self.parse_expression()?;
    if self.current().kind == TokenKind::Assign {
      if let ExprKind::Ident(name) = arg.kind {
        self.advance();
        let value = self.parse_expression()?;
        kwargs.push((name, value));
        return Ok(());
      }
    }
    args.push(arg);
    Ok(())
  }

  /// `Class{field=value, ...}` struct-init syntax (spec §4.4.2): lowered to
  /// the same `Call{kwargs}` shape `Class(field=value, ...)` produces, so
  /// the code generator's single `gen_struct_construct` entry point handles
  /// both without needing a dedicated AST node.
  fn parse_struct_init(&mut self, callee: Expr, tok: &Token) -> PResult<Expr> {
    self.expect(TokenKind::LBrace)?;
    let mut kwargs = Vec::new();
    if !self.check(&[TokenKind::RBrace]) {
      loop {
        let name = self.expect_ident()?;
        self.expect(TokenKind::Assign)?;
        let value = self.parse_expression()?;
        kwargs.push((name, value));
        if self.match_tok(TokenKind::Comma).is_none() { break }
        if self.check(&[TokenKind::RBrace]) { break }
      }
    }
    self.expect(TokenKind::RBrace)?;
    Ok(Expr::new(ExprKind::Call { func: Box::new(callee), args: ExprList::new(), kwargs }, self.make_span(tok)))
  }

  fn parse_index_or_slice(&mut self, obj: Expr, tok: &Token) -> PResult<Expr> {
    if self.match_tok(TokenKind::Colon).is_some() {
      let end = if self.check(&[TokenKind::RBracket, TokenKind::Colon]) { None } else { Some(Box::new(self.parse_expression()?)) };
      let mut step = None;
      if self.match_tok(TokenKind::Colon).is_some() {
        step = if self.check(&[TokenKind::RBracket]) { None } else { Some(Box::new(self.parse_expression()?)) };
      }
      self.expect(TokenKind::RBracket)?;
      return Ok(Expr::new(ExprKind::Slice { obj: Box::new(obj), start: None, end, step }, self.make_span(tok)));
    }
    let start = self.parse_expression()?;
    if self.match_tok(TokenKind::Colon).is_some() {
      let end = if self.check(&[TokenKind::RBracket, TokenKind::Colon]) { None } else { Some(Box::new(self.parse_expression()?)) };
      let mut step = None;
      if self.match_tok(TokenKind::Colon).is_some() {
        step = if self.check(&[TokenKind::RBracket]) { None } else { Some(Box::new(self.parse_expression()?)) };
      }
      self.expect(TokenKind::RBracket)?;
      return Ok(Expr::new(ExprKind::Slice { obj: Box::new(obj), start: Some(Box::new(start)), end, step }, self.make_span(tok)));
    }
    self.expect(TokenKind::RBracket)?;
    Ok(Expr::new(ExprKind::Index { obj: Box::new(obj), index: Box::new(start) }, self.make_span(tok)))
  }

  fn parse_primary(&mut self) -> PResult<Expr> {
    let tok = self.current().clone();

    if self.match_tok(TokenKind::Number).is_some() {
      return Ok(match tok.value {
        Some(Literal::Float(f)) => Expr::new(ExprKind::Float(f), self.make_span(&tok)),
        Some(Literal::Int(n)) => Expr::new(ExprKind::Int(n), self.make_span(&tok)),
        _ => unreachable!("Number token always carries Int or Float"),
      });
    }
    if self.match_tok(TokenKind::StringLit).is_some() {
      let Some(Literal::Str(s)) = tok.value else { unreachable!() };
      return Ok(Expr::new(ExprKind::Str(s), self.make_span(&tok)));
    }
    if self.match_tok(TokenKind::FStringLit).is_some() {
      let Some(Literal::Str(s)) = tok.value else { unreachable!() };
      return Ok(Expr::new(ExprKind::FString(s), self.make_span(&tok)));
    }
    if self.match_tok(TokenKind::CharLit).is_some() {
      let Some(Literal::Char(c)) = tok.value else { unreachable!() };
      return Ok(Expr::new(ExprKind::Char(c), self.make_span(&tok)));
    }
    if self.match_tok(TokenKind::True_).is_some() { return Ok(Expr::new(ExprKind::Bool(true), self.make_span(&tok))) }
    if self.match_tok(TokenKind::False_).is_some() { return Ok(Expr::new(ExprKind::Bool(false), self.make_span(&tok))) }
    if self.match_tok(TokenKind::None_).is_some() { return Ok(Expr::new(ExprKind::None, self.make_span(&tok))) }
    if self.match_tok(TokenKind::Self_).is_some() {
      return Ok(Expr::new(ExprKind::Ident(symbol::intern("self")), self.make_span(&tok)));
    }

    if self.check(&[TokenKind::Ident]) {
      let name_tok = self.advance();
      let name = name_tok.ident_name().expect("Ident token always carries a name").to_string();
      if name == "sizeof" && self.check(&[TokenKind::LParen]) {
        self.advance();
        let target_type = self.parse_type()?;
        self.expect(TokenKind::RParen)?;
        return Ok(Expr::new(ExprKind::SizeOf(target_type), self.make_span(&tok)));
      }
      return Ok(Expr::new(ExprKind::Ident(symbol::intern(&name)), self.make_span(&tok)));
    }

    if PRIMITIVE_CAST_KINDS.contains(&tok.kind) {
      self.advance();
      let name = primitive_name(tok.kind);
      if self.match_tok(TokenKind::LParen).is_some() {
        let expr = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        return Ok(Expr::new(ExprKind::Cast { target: Type::new(TypeKind::Named(name.to_string()), tok.span), expr: Box::new(expr) }, self.make_span(&tok)));
      }
      return Ok(Expr::new(ExprKind::Ident(symbol::intern(name)), self.make_span(&tok)));
    }

    if self.match_tok(TokenKind::Cast).is_some() {
      self.expect(TokenKind::LBracket)?;
      let cast_type = self.parse_type()?;
      self.expect(TokenKind::RBracket)?;
      self.expect(TokenKind::LParen)?;
      let expr = self.parse_expression()?;
      self.expect(TokenKind::RParen)?;
      return Ok(Expr::new(ExprKind::Cast { target: cast_type, expr: Box::new(expr) }, self.make_span(&tok)));
    }

    if self.match_tok(TokenKind::Ptr).is_some() {
      self.expect(TokenKind::LBracket)?;
      let inner_type = self.parse_type()?;
      self.expect(TokenKind::RBracket)?;
      if self.match_tok(TokenKind::LParen).is_some() {
        let value = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        let span = inner_type.span;
        return Ok(Expr::new(ExprKind::Cast { target: Type::new(TypeKind::Pointer(Box::new(inner_type)), span), expr: Box::new(value) }, self.make_span(&tok)));
      }
      return Ok(Expr::new(ExprKind::Ident(symbol::intern("Ptr")), self.make_span(&tok)));
    }

    if self.match_tok(TokenKind::LBracket).is_some() {
      if self.match_tok(TokenKind::RBracket).is_some() {
        return Ok(Expr::new(ExprKind::List(ExprList::new()), self.make_span(&tok)));
      }
      let first = self.parse_expression()?;
      if self.match_tok(TokenKind::For).is_some() {
        let var = self.expect_ident()?;
        self.expect(TokenKind::In)?;
        let iterable = self.parse_or()?;
        let condition = if self.match_tok(TokenKind::If).is_some() { Some(Box::new(self.parse_or()?)) } else { None };
        self.expect(TokenKind::RBracket)?;
        return Ok(Expr::new(ExprKind::ListComprehension {
          element: Box::new(first), var, iterable: Box::new(iterable), condition,
        }, self.make_span(&tok)));
      }
      let mut elements = ExprList::new();
      elements.push(first);
      while self.match_tok(TokenKind::Comma).is_some() {
        if self.check(&[TokenKind::RBracket]) { break }
        elements.push(self.parse_expression()?);
      }
      self.expect(TokenKind::RBracket)?;
      return Ok(Expr::new(ExprKind::List(elements), self.make_span(&tok)));
    }

    if self.match_tok(TokenKind::LBrace).is_some() {
      if self.match_tok(TokenKind::RBrace).is_some() {
        return Ok(Expr::new(ExprKind::Dict(Vec::new()), self.make_span(&tok)));
      }
      let first = self.parse_expression()?;
      if self.match_tok(TokenKind::Colon).is_some() {
        let first_val = self.parse_expression()?;
        let mut pairs = vec![(first, first_val)];
        while self.match_tok(TokenKind::Comma).is_some() {
          if self.check(&[TokenKind::RBrace]) { break }
          let key = self.parse_expression()?;
          self.expect(TokenKind::Colon)?;
          let val = self.parse_expression()?;
          pairs.push((key, val));
        }
        self.expect(TokenKind::RBrace)?;
        return Ok(Expr::new(ExprKind::Dict(pairs), self.make_span(&tok)));
      }
      let mut elements = ExprList::new();
      elements.push(first);
      while self.match_tok(TokenKind::Comma).is_some() {
        if self.check(&[TokenKind::RBrace]) { break }
        elements.push(self.parse_expression()?);
      }
      self.expect(TokenKind::RBrace)?;
      return Ok(Expr::new(ExprKind::List(elements), self.make_span(&tok)));
    }

    if self.match_tok(TokenKind::LParen).is_some() {
      if self.match_tok(TokenKind::RParen).is_some() {
        return Ok(Expr::new(ExprKind::Tuple(ExprList::new()), self.make_span(&tok)));
      }
      let first = self.parse_expression()?;
      if self.match_tok(TokenKind::Comma).is_some() {
        let mut elements = ExprList::new();
        elements.push(first);
        if !self.check(&[TokenKind::RParen]) {
          elements.push(self.parse_expression()?);
          while self.match_tok(TokenKind::Comma).is_some() {
            if self.check(&[TokenKind::RParen]) { break }
            elements.push(self.parse_expression()?);
          }
        }
        self.expect(TokenKind::RParen)?;
        return Ok(Expr::new(ExprKind::Tuple(elements), self.make_span(&tok)));
      }
      self.expect(TokenKind::RParen)?;
      return Ok(first);
    }

    if self.match_tok(TokenKind::Lambda).is_some() {
      let mut params = SmallVec::new();
      if !self.check(&[TokenKind::Colon]) {
        params.push(self.expect_ident()?);
        while self.match_tok(TokenKind::Comma).is_some() { params.push(self.expect_ident()?) }
      }
      self.expect(TokenKind::Colon)?;
      let body = self.parse_expression()?;
      return Ok(Expr::new(ExprKind::Lambda { params, body: Box::new(body) }, self.make_span(&tok)));
    }

    if self.match_tok(TokenKind::Asm).is_some() {
      self.expect(TokenKind::LParen)?;
      let code_tok = self.expect(TokenKind::StringLit)?;
      let Some(Literal::Str(code)) = code_tok.value else { unreachable!() };
      self.expect(TokenKind::RParen)?;
      return Ok(Expr::new(ExprKind::Asm(code), self.make_span(&tok)));
    }

    Err(ParseError::new(format!("unexpected token: {}", tok.kind.name()), &tok))
  }

  // ---------------------------------------------------------------------
  // Statements
  // ---------------------------------------------------------------------

  fn parse_block(&mut self) -> PResult<Block> {
    self.expect(TokenKind::Colon)?;
    self.expect(TokenKind::Newline)?;
    self.skip_newlines();
    self.expect(TokenKind::Indent)?;

    let mut stmts = Vec::new();
    while !self.check(&[TokenKind::Dedent, TokenKind::Eof]) {
      self.skip_newlines();
      if self.check(&[TokenKind::Dedent, TokenKind::Eof]) { break }
      stmts.push(self.parse_statement()?);
    }
    self.expect(TokenKind::Dedent)?;
    Ok(stmts)
  }

  fn parse_statement(&mut self) -> PResult<Stmt> {
    let tok = self.current().clone();

    if self.match_tok(TokenKind::Return).is_some() {
      let value = if self.check(&[TokenKind::Newline]) { None } else { Some(self.parse_expression()?) };
      self.expect(TokenKind::Newline)?;
      return Ok(Stmt::new(StmtKind::Return(value), self.make_span(&tok)));
    }

    if self.match_tok(TokenKind::If).is_some() {
      let condition = self.parse_expression()?;
      let then_body = self.parse_block()?;
      let mut elif_branches = Vec::new();
      while self.match_tok(TokenKind::Elif).is_some() {
        let cond = self.parse_expression()?;
        let body = self.parse_block()?;
        elif_branches.push((cond, body));
      }
      let else_body = if self.match_tok(TokenKind::Else).is_some() { Some(self.parse_block()?) } else { None };
      return Ok(Stmt::new(StmtKind::If { condition, then_body, elif_branches, else_body }, self.make_span(&tok)));
    }

    if self.match_tok(TokenKind::While).is_some() {
      let condition = self.parse_expression()?;
      let body = self.parse_block()?;
      return Ok(Stmt::new(StmtKind::While { condition, body }, self.make_span(&tok)));
    }

    if self.match_tok(TokenKind::For).is_some() {
      let mut vars: SmallVec<[Symbol; 4]> = SmallVec::new();
      vars.push(self.expect_ident()?);
      while self.match_tok(TokenKind::Comma).is_some() { vars.push(self.expect_ident()?) }
      self.expect(TokenKind::In)?;
      let iterable = self.parse_expression()?;
      let body = self.parse_block()?;
      return Ok(if vars.len() > 1 {
        Stmt::new(StmtKind::ForUnpack { vars, iterable, body }, self.make_span(&tok))
      } else {
        Stmt::new(StmtKind::For { var: vars[0], iterable, body }, self.make_span(&tok))
      });
    }

    if self.match_tok(TokenKind::Break).is_some() {
      self.expect(TokenKind::Newline)?;
      return Ok(Stmt::new(StmtKind::Break, self.make_span(&tok)));
    }
    if self.match_tok(TokenKind::Continue).is_some() {
      self.expect(TokenKind::Newline)?;
      return Ok(Stmt::new(StmtKind::Continue, self.make_span(&tok)));
    }
    if self.match_tok(TokenKind::Pass).is_some() {
      self.expect(TokenKind::Newline)?;
      return Ok(Stmt::new(StmtKind::Pass, self.make_span(&tok)));
    }

    if self.match_tok(TokenKind::Global).is_some() {
      let mut names: SmallVec<[Symbol; 4]> = SmallVec::new();
      names.push(self.expect_ident()?);
      while self.match_tok(TokenKind::Comma).is_some() { names.push(self.expect_ident()?) }
      self.expect(TokenKind::Newline)?;
      return Ok(Stmt::new(StmtKind::Global(names), self.make_span(&tok)));
    }

    if self.match_tok(TokenKind::Defer).is_some() {
      let stmt = self.parse_statement()?;
      return Ok(Stmt::new(StmtKind::Defer(Box::new(stmt)), self.make_span(&tok)));
    }

    if self.match_tok(TokenKind::Assert).is_some() {
      let condition = self.parse_expression()?;
      let message = if self.match_tok(TokenKind::Comma).is_some() { Some(self.parse_expression()?) } else { None };
      self.expect(TokenKind::Newline)?;
      return Ok(Stmt::new(StmtKind::Assert { condition, message }, self.make_span(&tok)));
    }

    if self.match_tok(TokenKind::Match).is_some() {
      let expr = self.parse_expression()?;
      self.expect(TokenKind::Colon)?;
      self.expect(TokenKind::Newline)?;
      self.expect(TokenKind::Indent)?;
      let mut arms = Vec::new();
      while self.match_tok(TokenKind::Case).is_some() {
        let arm_tok = self.peek(-1).clone();
        let pattern = self.parse_pattern()?;
        let body = self.parse_block()?;
        arms.push(MatchArm { pattern, body, span: self.make_span(&arm_tok) });
      }
      self.expect(TokenKind::Dedent)?;
      return Ok(Stmt::new(StmtKind::Match { expr, arms }, self.make_span(&tok)));
    }

    if self.match_tok(TokenKind::Try).is_some() {
      let try_body = self.parse_block()?;
      let mut handlers = Vec::new();
      let mut else_body = Vec::new();
      let mut finally_body = Vec::new();
      while self.match_tok(TokenKind::Except).is_some() {
        let handler_tok = self.peek(-1).clone();
        let mut exception_type = None;
        let mut name = None;
        if !self.check(&[TokenKind::Colon]) {
          exception_type = Some(self.expect_ident()?);
          if self.match_tok(TokenKind::As).is_some() { name = Some(self.expect_ident()?) }
        }
        let body = self.parse_block()?;
        handlers.push(ExceptHandler { exception_type, name, body, span: self.make_span(&handler_tok) });
      }
      if self.match_tok(TokenKind::Else).is_some() { else_body = self.parse_block()? }
      if self.match_tok(TokenKind::Finally).is_some() { finally_body = self.parse_block()? }
      return Ok(Stmt::new(StmtKind::Try { try_body, handlers, else_body, finally_body }, self.make_span(&tok)));
    }

    if self.match_tok(TokenKind::Raise).is_some() {
      let exception = if self.check(&[TokenKind::Newline]) { None } else { Some(self.parse_expression()?) };
      self.expect(TokenKind::Newline)?;
      return Ok(Stmt::new(StmtKind::Raise(exception), self.make_span(&tok)));
    }

    if self.match_tok(TokenKind::Yield).is_some() {
      let value = if self.check(&[TokenKind::Newline]) { None } else { Some(self.parse_expression()?) };
      self.expect(TokenKind::Newline)?;
      return Ok(Stmt::new(StmtKind::Yield(value), self.make_span(&tok)));
    }

    if self.match_tok(TokenKind::With).is_some() {
      let mut items = vec![self.parse_with_item()?];
      while self.match_tok(TokenKind::Comma).is_some() { items.push(self.parse_with_item()?) }
      let body = self.parse_block()?;
      return Ok(Stmt::new(StmtKind::With { items, body }, self.make_span(&tok)));
    }

    // Bare identifier: typed decl, assignment, compound assignment, or
    // tuple-unpacking assignment.
    if self.check(&[TokenKind::Ident]) {
      let name_tok = self.advance();
      let name = symbol::intern(name_tok.ident_name().expect("Ident token always carries a name"));

      if self.match_tok(TokenKind::Comma).is_some() {
        let mut targets: SmallVec<[Symbol; 4]> = SmallVec::new();
        targets.push(name);
        targets.push(self.expect_ident()?);
        while self.match_tok(TokenKind::Comma).is_some() { targets.push(self.expect_ident()?) }
        self.expect(TokenKind::Assign)?;
        let first_expr = self.parse_expression()?;
        let value = if self.match_tok(TokenKind::Comma).is_some() {
          let mut elements = ExprList::new();
          elements.push(first_expr);
          elements.push(self.parse_expression()?);
          while self.match_tok(TokenKind::Comma).is_some() { elements.push(self.parse_expression()?) }
          Expr::new(ExprKind::Tuple(elements), self.make_span(&tok))
        } else { first_expr };
        self.expect(TokenKind::Newline)?;
        return Ok(Stmt::new(StmtKind::TupleUnpackAssign { targets, value }, self.make_span(&tok)));
      }

      if self.match_tok(TokenKind::Colon).is_some() {
        let var_type = self.parse_type()?;
        let value = if self.match_tok(TokenKind::Assign).is_some() { Some(self.parse_expression()?) } else { None };
        self.expect(TokenKind::Newline)?;
        return Ok(Stmt::new(StmtKind::VarDecl { name, var_type: Some(var_type), value, is_const: false }, self.make_span(&tok)));
      }

      if self.match_tok(TokenKind::Assign).is_some() {
        let value = self.parse_expression()?;
        self.expect(TokenKind::Newline)?;
        let target = Expr::new(ExprKind::Ident(name), name_tok.span);
        return Ok(Stmt::new(StmtKind::Assignment { target, value, op: None }, self.make_span(&tok)));
      }

      if let Some(op) = compound_op(self.current().kind) {
        self.advance();
        let value = self.parse_expression()?;
        self.expect(TokenKind::Newline)?;
        let target = Expr::new(ExprKind::Ident(name), name_tok.span);
        return Ok(Stmt::new(StmtKind::Assignment { target, value, op: Some(op) }, self.make_span(&tok)));
      }

      // Not a declaration/assignment after all: back up and fall through
      // to the general expression-statement path below.
      self.pos -= 1;
    }

    let expr = self.parse_expression()?;

    if self.match_tok(TokenKind::Assign).is_some() {
      let value = self.parse_expression()?;
      self.expect(TokenKind::Newline)?;
      return Ok(Stmt::new(StmtKind::Assignment { target: expr, value, op: None }, self.make_span(&tok)));
    }
    if let Some(op) = compound_op(self.current().kind) {
      self.advance();
      let value = self.parse_expression()?;
      self.expect(TokenKind::Newline)?;
      return Ok(Stmt::new(StmtKind::Assignment { target: expr, value, op: Some(op) }, self.make_span(&tok)));
    }

    self.expect(TokenKind::Newline)?;
    Ok(Stmt::new(StmtKind::ExprStmt(expr), self.make_span(&tok)))
  }

  fn parse_with_item(&mut self) -> PResult<WithItem> {
    let context = self.parse_expression()?;
    let var = if self.match_tok(TokenKind::As).is_some() { Some(self.expect_ident()?) } else { None };
    Ok(WithItem { context, var })
  }

  fn parse_pattern(&mut self) -> PResult<Pattern> {
    if self.check(&[TokenKind::Ident]) {
      if self.current().ident_name() == Some("_") {
        self.advance();
        return Ok(Pattern { name: symbol::intern("_"), bindings: SmallVec::new() });
      }
    }
    let name = self.expect_ident()?;
    let mut bindings = SmallVec::new();
    if self.match_tok(TokenKind::LParen).is_some() {
      if !self.check(&[TokenKind::RParen]) {
        bindings.push(self.expect_ident()?);
        while self.match_tok(TokenKind::Comma).is_some() { bindings.push(self.expect_ident()?) }
      }
      self.expect(TokenKind::RParen)?;
    }
    Ok(Pattern { name, bindings })
  }

  // ---------------------------------------------------------------------
  // Declarations
  // ---------------------------------------------------------------------

  fn parse_parameter(&mut self) -> PResult<Parameter> {
    let tok = self.current().clone();
    let name = self.expect_ident()?;
    let param_type = if self.match_tok(TokenKind::Colon).is_some() { Some(self.parse_type()?) } else { None };
    let default = if self.match_tok(TokenKind::Assign).is_some() { Some(self.parse_expression()?) } else { None };
    Ok(Parameter { name, param_type, default, span: self.make_span(&tok) })
  }

  fn parse_function(&mut self, decorators: SmallVec<[Symbol; 2]>) -> PResult<FunctionDef> {
    let tok = self.current().clone();
    self.expect(TokenKind::Def)?;
    let name = self.expect_ident()?;

    self.expect(TokenKind::LParen)?;
    let mut params: SmallVec<[Parameter; 4]> = SmallVec::new();
    if !self.check(&[TokenKind::RParen]) {
      if self.check(&[TokenKind::Self_]) {
        self.advance();
        self.match_tok(TokenKind::Comma);
      }
      if !self.check(&[TokenKind::RParen]) {
        params.push(self.parse_parameter()?);
        while self.match_tok(TokenKind::Comma).is_some() { params.push(self.parse_parameter()?) }
      }
    }
    self.expect(TokenKind::RParen)?;

    let return_type = if self.match_tok(TokenKind::Arrow).is_some() { Some(self.parse_type()?) } else { None };
    let body = self.parse_block()?;

    Ok(FunctionDef { name, params, return_type, body, decorators, type_params: Vec::new(), span: self.make_span(&tok) })
  }

  fn parse_class(&mut self, decorators: SmallVec<[Symbol; 2]>) -> PResult<ClassDef> {
    let tok = self.current().clone();
    self.expect(TokenKind::Class)?;
    let name = self.expect_ident()?;

    let mut bases: SmallVec<[Symbol; 2]> = SmallVec::new();
    if self.match_tok(TokenKind::LParen).is_some() {
      if !self.check(&[TokenKind::RParen]) {
        bases.push(self.expect_ident()?);
        while self.match_tok(TokenKind::Comma).is_some() { bases.push(self.expect_ident()?) }
      }
      self.expect(TokenKind::RParen)?;
    }

    self.expect(TokenKind::Colon)?;
    self.expect(TokenKind::Newline)?;
    self.expect(TokenKind::Indent)?;

    let mut fields = Vec::new();
    let mut methods = Vec::new();

    while !self.check(&[TokenKind::Dedent, TokenKind::Eof]) {
      self.skip_newlines();
      if self.check(&[TokenKind::Dedent, TokenKind::Eof]) { break }

      if self.match_tok(TokenKind::Pass).is_some() {
        self.expect(TokenKind::Newline)?;
        continue;
      }

      let mut method_decorators: SmallVec<[Symbol; 2]> = SmallVec::new();
      while self.match_tok(TokenKind::At).is_some() {
        let dec_name = if self.check(&[TokenKind::Ident, TokenKind::Staticmethod, TokenKind::Classmethod, TokenKind::Property]) {
          let t = self.advance();
          t.ident_name().map(str::to_string).unwrap_or_else(|| t.kind.name().to_lowercase())
        } else {
          return Err(ParseError::new("expected decorator name", self.current()));
        };
        method_decorators.push(symbol::intern(&dec_name));
        self.expect(TokenKind::Newline)?;
        self.skip_newlines();
      }

      if self.check(&[TokenKind::Def]) {
        methods.push(self.parse_function(method_decorators)?);
        continue;
      }
      if !method_decorators.is_empty() {
        return Err(ParseError::new("expected method after decorator", self.current()));
      }

      if self.check(&[TokenKind::Ident]) {
        let field_tok = self.current().clone();
        let field_name = self.expect_ident()?;
        self.expect(TokenKind::Colon)?;
        let field_type = self.parse_type()?;
        let default = if self.match_tok(TokenKind::Assign).is_some() { Some(self.parse_expression()?) } else { None };
        self.expect(TokenKind::Newline)?;
        fields.push(ClassField { name: field_name, field_type, default, span: self.make_span(&field_tok) });
        continue;
      }

      return Err(ParseError::new("expected field or method in class", self.current()));
    }

    self.expect(TokenKind::Dedent)?;
    Ok(ClassDef { name, fields, methods, bases, decorators, span: self.make_span(&tok) })
  }

  /// `union Name: field: type ...`. Not present in the original parser, but
  /// the grammar mirrors `class` bodies restricted to fields (spec §3.7,
  /// §4.4.4) — the `union` keyword is already reserved by the lexer.
  fn parse_union(&mut self) -> PResult<UnionDef> {
    let tok = self.current().clone();
    self.expect(TokenKind::Union)?;
    let name = self.expect_ident()?;
    self.expect(TokenKind::Colon)?;
    self.expect(TokenKind::Newline)?;
    self.expect(TokenKind::Indent)?;

    let mut fields = Vec::new();
    while !self.check(&[TokenKind::Dedent, TokenKind::Eof]) {
      self.skip_newlines();
      if self.check(&[TokenKind::Dedent, TokenKind::Eof]) { break }
      let field_tok = self.current().clone();
      let field_name = self.expect_ident()?;
      self.expect(TokenKind::Colon)?;
      let field_type = self.parse_type()?;
      self.expect(TokenKind::Newline)?;
      fields.push(ClassField { name: field_name, field_type, default: None, span: self.make_span(&field_tok) });
    }
    self.expect(TokenKind::Dedent)?;
    Ok(UnionDef { name, fields, span: self.make_span(&tok) })
  }

  /// `enum Name: Variant; Variant(T1, T2)`. As with [`Self::parse_union`],
  /// the original parser never implemented this despite the AST and
  /// `enum` keyword existing; this fills the gap those leave.
  fn parse_enum(&mut self) -> PResult<EnumDef> {
    let tok = self.current().clone();
    self.expect(TokenKind::Enum)?;
    let name = self.expect_ident()?;
    self.expect(TokenKind::Colon)?;
    self.expect(TokenKind::Newline)?;
    self.expect(TokenKind::Indent)?;

    let mut variants = Vec::new();
    while !self.check(&[TokenKind::Dedent, TokenKind::Eof]) {
      self.skip_newlines();
      if self.check(&[TokenKind::Dedent, TokenKind::Eof]) { break }
      let variant_tok = self.current().clone();
      let variant_name = self.expect_ident()?;
      let mut payload_types = Vec::new();
      if self.match_tok(TokenKind::LParen).is_some() {
        if !self.check(&[TokenKind::RParen]) {
          payload_types.push(self.parse_type()?);
          while self.match_tok(TokenKind::Comma).is_some() { payload_types.push(self.parse_type()?) }
        }
        self.expect(TokenKind::RParen)?;
      }
      self.expect(TokenKind::Newline)?;
      variants.push(EnumVariant { name: variant_name, payload_types, span: self.make_span(&variant_tok) });
    }
    self.expect(TokenKind::Dedent)?;
    Ok(EnumDef { name, variants, span: self.make_span(&tok) })
  }

  fn parse_import(&mut self) -> PResult<ImportDecl> {
    let tok = self.current().clone();

    if self.match_tok(TokenKind::From).is_some() {
      let mut parts = vec![self.expect_ident_text()?];
      while self.match_tok(TokenKind::Dot).is_some() { parts.push(self.expect_ident_text()?) }
      let module = parts.join(".");
      self.expect(TokenKind::Import)?;

      if self.match_tok(TokenKind::Star).is_some() {
        self.expect(TokenKind::Newline)?;
        return Ok(ImportDecl { module, names: Vec::new(), alias: None, star: true, span: self.make_span(&tok) });
      }

      let mut names = vec![self.expect_ident()?];
      while self.match_tok(TokenKind::Comma).is_some() { names.push(self.expect_ident()?) }
      self.expect(TokenKind::Newline)?;
      return Ok(ImportDecl { module, names, alias: None, star: false, span: self.make_span(&tok) });
    }

    if self.match_tok(TokenKind::Import).is_some() {
      let mut parts = vec![self.expect_ident_text()?];
      while self.match_tok(TokenKind::Dot).is_some() { parts.push(self.expect_ident_text()?) }
      let module = parts.join(".");
      let alias = if self.match_tok(TokenKind::As).is_some() { Some(self.expect_ident()?) } else { None };
      self.expect(TokenKind::Newline)?;
      return Ok(ImportDecl { module, names: Vec::new(), alias, star: false, span: self.make_span(&tok) });
    }

    Err(ParseError::new("expected import statement", &tok))
  }

  fn expect_ident_text(&mut self) -> PResult<String> {
    let tok = self.expect(TokenKind::Ident)?;
    Ok(tok.ident_name().expect("Ident token always carries a name").to_string())
  }

  fn parse_extern(&mut self) -> PResult<ExternDecl> {
    let tok = self.current().clone();
    self.expect(TokenKind::Extern)?;
    self.expect(TokenKind::Def)?;
    let name = self.expect_ident()?;

    self.expect(TokenKind::LParen)?;
    let mut params: SmallVec<[Parameter; 4]> = SmallVec::new();
    if !self.check(&[TokenKind::RParen]) {
      params.push(self.parse_parameter()?);
      while self.match_tok(TokenKind::Comma).is_some() { params.push(self.parse_parameter()?) }
    }
    self.expect(TokenKind::RParen)?;

    let return_type = if self.match_tok(TokenKind::Arrow).is_some() { Some(self.parse_type()?) } else { None };
    self.expect(TokenKind::Newline)?;
    Ok(ExternDecl { name, params, return_type, span: self.make_span(&tok) })
  }

  fn parse_program(&mut self) -> PResult<Program> {
    let start = self.current().clone();
    let mut imports = Vec::new();
    let mut declarations = Vec::new();

    self.skip_newlines();

    while !self.check(&[TokenKind::Eof]) {
      let decl_tok = self.current().clone();
      let mut decorators: SmallVec<[Symbol; 2]> = SmallVec::new();
      while self.match_tok(TokenKind::At).is_some() {
        // `interrupt` is a reserved keyword, not an identifier, but must
        // still be admitted here or `@interrupt` could never be written
        // (spec's interrupt vector map, component table row 6).
        let name = if self.check(&[TokenKind::Interrupt]) {
          self.advance();
          symbol::intern("interrupt")
        } else {
          self.expect_ident()?
        };
        decorators.push(name);
        self.expect(TokenKind::Newline)?;
      }

      if self.check(&[TokenKind::From, TokenKind::Import]) {
        imports.push(self.parse_import()?);
        self.skip_newlines();
        continue;
      }
      if self.check(&[TokenKind::Extern]) {
        let d = self.parse_extern()?;
        declarations.push(Decl::new(DeclKind::Extern(d), self.make_span(&decl_tok)));
        self.skip_newlines();
        continue;
      }
      if self.check(&[TokenKind::Def]) {
        let d = self.parse_function(decorators)?;
        declarations.push(Decl::new(DeclKind::Function(d), self.make_span(&decl_tok)));
        self.skip_newlines();
        continue;
      }
      if self.check(&[TokenKind::Class]) {
        let d = self.parse_class(decorators)?;
        declarations.push(Decl::new(DeclKind::Class(d), self.make_span(&decl_tok)));
        self.skip_newlines();
        continue;
      }
      if self.check(&[TokenKind::Union]) {
        let d = self.parse_union()?;
        declarations.push(Decl::new(DeclKind::Union(d), self.make_span(&decl_tok)));
        self.skip_newlines();
        continue;
      }
      if self.check(&[TokenKind::Enum]) {
        let d = self.parse_enum()?;
        declarations.push(Decl::new(DeclKind::Enum(d), self.make_span(&decl_tok)));
        self.skip_newlines();
        continue;
      }

      if self.check(&[TokenKind::Ident]) {
        let name_tok = self.advance();
        let name = symbol::intern(name_tok.ident_name().expect("Ident token always carries a name"));
        if self.match_tok(TokenKind::Colon).is_some() {
          let var_type = self.parse_type()?;
          let value = if self.match_tok(TokenKind::Assign).is_some() { Some(self.parse_expression()?) } else { None };
          self.expect(TokenKind::Newline)?;
          declarations.push(Decl::new(
            DeclKind::Var { name, var_type: Some(var_type), value, is_const: false },
            self.make_span(&decl_tok),
          ));
          self.skip_newlines();
          continue;
        }
        self.pos -= 1;
      }

      return Err(ParseError::new(format!("unexpected token at top level: {}", self.current().kind.name()), self.current()));
    }

    Ok(Program { imports, declarations, span: self.make_span(&start) })
  }
}

fn primitive_name(kind: TokenKind) -> &'static str {
  match kind {
    TokenKind::Int8 => "int8", TokenKind::Int16 => "int16",
    TokenKind::Int32 => "int32", TokenKind::Int64 => "int64",
    TokenKind::Uint8 => "uint8", TokenKind::Uint16 => "uint16",
    TokenKind::Uint32 => "uint32", TokenKind::Uint64 => "uint64",
    TokenKind::Float32 => "float32", TokenKind::Float64 => "float64",
    TokenKind::Bool => "bool", TokenKind::Char => "char",
    _ => unreachable!("only called with a PRIMITIVE_CAST_KINDS member"),
  }
}

fn compound_op(kind: TokenKind) -> Option<BinOp> {
  Some(match kind {
    TokenKind::PlusEq => BinOp::Add,
    TokenKind::MinusEq => BinOp::Sub,
    TokenKind::StarEq => BinOp::Mul,
    TokenKind::SlashEq => BinOp::Div,
    TokenKind::PercentEq => BinOp::Mod,
    TokenKind::AmpEq => BinOp::BitAnd,
    TokenKind::PipeEq => BinOp::BitOr,
    TokenKind::CaretEq => BinOp::BitXor,
    TokenKind::ShlEq => BinOp::Shl,
    TokenKind::ShrEq => BinOp::Shr,
    _ => return None,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lexer::lex;

  fn parse_src(src: &str) -> Program {
    let tokens = lex(src, "<test>").expect("lex");
    parse(tokens, "<test>").expect("parse")
  }

  #[test]
  fn parses_simple_function() {
    let prog = parse_src("def main() -> int32:\n    x: int32 = 42\n    return x\n");
    assert_eq!(prog.declarations.len(), 1);
    let DeclKind::Function(f) = &prog.declarations[0].kind else { panic!("expected function") };
    assert_eq!(f.body.len(), 2);
  }

  #[test]
  fn parses_if_elif_else() {
    let prog = parse_src("def f() -> int32:\n    if x:\n        return 1\n    elif y:\n        return 2\n    else:\n        return 3\n");
    let DeclKind::Function(f) = &prog.declarations[0].kind else { panic!() };
    let StmtKind::If { elif_branches, else_body, .. } = &f.body[0].kind else { panic!("expected if") };
    assert_eq!(elif_branches.len(), 1);
    assert!(else_body.is_some());
  }

  #[test]
  fn precedence_climbs_correctly() {
    let prog = parse_src("def f() -> int32:\n    return 1 + 2 * 3\n");
    let DeclKind::Function(f) = &prog.declarations[0].kind else { panic!() };
    let StmtKind::Return(Some(expr)) = &f.body[0].kind else { panic!() };
    let ExprKind::Binary { op: BinOp::Add, right, .. } = &expr.kind else { panic!("expected top-level add") };
    assert!(matches!(right.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
  }

  #[test]
  fn parses_class_with_fields_and_methods() {
    let prog = parse_src("class Point:\n    x: int32\n    y: int32\n    def sum(self) -> int32:\n        return self.x + self.y\n");
    let DeclKind::Class(c) = &prog.declarations[0].kind else { panic!() };
    assert_eq!(c.fields.len(), 2);
    assert_eq!(c.methods.len(), 1);
  }

  #[test]
  fn parses_union_and_enum() {
    let prog = parse_src("union U:\n    a: int8\n    b: int64\n\nenum Option:\n    Some(int32)\n    None_\n");
    assert!(matches!(prog.declarations[0].kind, DeclKind::Union(_)));
    assert!(matches!(prog.declarations[1].kind, DeclKind::Enum(_)));
  }

  #[test]
  fn parses_match_statement() {
    let prog = parse_src("def f(k: int32) -> int32:\n    match k:\n        case One(v):\n            return v\n        case _:\n            return 0\n");
    let DeclKind::Function(f) = &prog.declarations[0].kind else { panic!() };
    let StmtKind::Match { arms, .. } = &f.body[0].kind else { panic!("expected match") };
    assert_eq!(arms.len(), 2);
  }

  #[test]
  fn parses_tuple_unpacking() {
    let prog = parse_src("def f():\n    a, b = 1, 2\n    a, b = b, a\n");
    let DeclKind::Function(f) = &prog.declarations[0].kind else { panic!() };
    assert!(matches!(f.body[0].kind, StmtKind::TupleUnpackAssign { .. }));
    assert!(matches!(f.body[1].kind, StmtKind::TupleUnpackAssign { .. }));
  }

  #[test]
  fn rejects_break_outside_context_as_parse_succeeds_but_flagged_later() {
    // The parser accepts `break` anywhere lexically valid; loop-context
    // validation is a code generation concern (spec §4.4.6).
    let prog = parse_src("def f():\n    break\n");
    let DeclKind::Function(f) = &prog.declarations[0].kind else { panic!() };
    assert!(matches!(f.body[0].kind, StmtKind::Break));
  }

  #[test]
  fn power_is_right_associative() {
    let prog = parse_src("def f() -> int32:\n    return 2 ** 3 ** 2\n");
    let DeclKind::Function(f) = &prog.declarations[0].kind else { panic!() };
    let StmtKind::Return(Some(expr)) = &f.body[0].kind else { panic!() };
    let ExprKind::Binary { op: BinOp::Pow, left, right } = &expr.kind else { panic!("expected top-level pow") };
    assert!(matches!(left.kind, ExprKind::Int(2)));
    assert!(matches!(right.kind, ExprKind::Binary { op: BinOp::Pow, .. }));
  }

  #[test]
  fn or_and_precedence() {
    let prog = parse_src("def f() -> bool:\n    return a or b and c\n");
    let DeclKind::Function(f) = &prog.declarations[0].kind else { panic!() };
    let StmtKind::Return(Some(expr)) = &f.body[0].kind else { panic!() };
    let ExprKind::Binary { op: BinOp::Or, right, .. } = &expr.kind else { panic!("expected top-level or") };
    assert!(matches!(right.kind, ExprKind::Binary { op: BinOp::And, .. }));
  }

  #[test]
  fn parses_brace_struct_init() {
    let prog = parse_src("def f() -> int32:\n    return P{x=3, y=4}.sum()\n");
    let DeclKind::Function(f) = &prog.declarations[0].kind else { panic!() };
    let StmtKind::Return(Some(expr)) = &f.body[0].kind else { panic!() };
    let ExprKind::MethodCall { obj, method, .. } = &expr.kind else { panic!("expected method call") };
    assert_eq!(crate::symbol::resolve(*method), "sum");
    let ExprKind::Call { func, kwargs, args } = &obj.kind else { panic!("expected struct-init call") };
    assert!(args.is_empty());
    assert_eq!(kwargs.len(), 2);
    assert!(matches!(func.kind, ExprKind::Ident(_)));
  }
}

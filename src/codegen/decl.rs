//! Top-level declaration lowering: the first-pass collector, function and
//! class bodies, the `.data` section, and pending-lambda flushing (spec
//! §4.4, §4.4.1, §4.4.4).

use crate::ast::{ClassDef, DeclKind, Expr, ExprKind, FunctionDef, Parameter, Program, Stmt, StmtKind, Type, TypeKind};
use crate::diagnostics::CodeGenError;
use crate::entity::{Environment, FunctionEnv, LocalVar};
use crate::span::Span;
use crate::symbol::{intern, resolve, Symbol};

use super::{decorator_named, CodeGen};

fn class_type(name: Symbol) -> Type { Type::new(TypeKind::Named(resolve(name)), Span::point(0, 0)) }

impl CodeGen {
  /// First pass over declarations: globals, classes (with inherited layout
  /// resolved in dependency order), unions, enums, externs (spec §4.4
  /// "First pass").
  pub(super) fn collect_declarations(&mut self, program: &Program) -> Result<(), CodeGenError> {
    for decl in &program.declarations {
      match &decl.kind {
        DeclKind::Extern(e) => self.env.register_extern(e),
        DeclKind::Function(f) => self.env.register_function(f),
        DeclKind::Var { name, var_type, is_const, .. } => {
          self.env.register_global(*name, var_type.clone(), *is_const);
        }
        _ => {}
      }
    }

    let mut remaining: Vec<&ClassDef> = program.declarations.iter()
      .filter_map(|d| if let DeclKind::Class(c) = &d.kind { Some(c) } else { None })
      .collect();
    while !remaining.is_empty() {
      let before = remaining.len();
      let mut err = None;
      remaining.retain(|c| {
        let ready = c.bases.first().is_none_or(|b| self.env.classes.contains_key(b));
        if !ready { return true }
        if let Err(e) = self.env.register_class(c) { err = Some(e); }
        false
      });
      if let Some(e) = err { return Err(e) }
      if remaining.len() == before {
        return Err(CodeGenError::new("unresolvable class inheritance (unknown or circular base)"));
      }
    }

    for decl in &program.declarations {
      if let DeclKind::Union(u) = &decl.kind { self.env.register_union(u) }
    }
    for decl in &program.declarations {
      if let DeclKind::Enum(e) = &decl.kind { self.env.register_enum(e) }
    }
    Ok(())
  }

  pub(super) fn gen_function(&mut self, f: &FunctionDef, _class_name: Option<Symbol>) -> Result<(), CodeGenError> {
    let label = resolve(f.name);
    self.gen_function_body(label, &f.params, &f.body, &f.decorators)
  }

  /// Emit every method of a class, renamed `<Class>_<method>` (spec §4.4),
  /// prepending the implicit `self`/`cls` parameter per §4.4.4.
  pub(super) fn gen_class(&mut self, class: &ClassDef) -> Result<(), CodeGenError> {
    for method in &class.methods {
      let is_static = decorator_named(&method.decorators, "staticmethod");
      let is_classmethod = decorator_named(&method.decorators, "classmethod");

      let mut params: Vec<Parameter> = Vec::with_capacity(method.params.len() + 1);
      if is_classmethod {
        params.push(Parameter { name: intern("cls"), param_type: Some(class_type(class.name)), default: None, span: method.span });
      } else if !is_static {
        params.push(Parameter { name: intern("self"), param_type: Some(class_type(class.name)), default: None, span: method.span });
      }
      params.extend(method.params.iter().cloned());

      let label = format!("{}_{}", resolve(class.name), resolve(method.name));
      self.gen_function_body(label, &params, &method.body, &method.decorators)?;
    }
    Ok(())
  }

  /// Shared frame setup/teardown for a function or method body (spec
  /// §4.4.1). The stack-reservation instruction is patched in after the
  /// body has been lowered, since the final frame size isn't known until
  /// every local has been allocated.
  fn gen_function_body(&mut self, label: String, params: &[Parameter], body: &[Stmt], decorators: &[Symbol]) -> Result<(), CodeGenError> {
    let is_interrupt = decorator_named(decorators, "interrupt");
    self.label_prefix = label.clone();
    self.fenv = Some(FunctionEnv::new(is_interrupt));

    self.emit(format!("{label}:"));
    self.emit(if is_interrupt { "  push {r0-r3, r7, r12, lr}" } else { "  push {r7, lr}" });
    self.emit("  mov r7, sp");
    let reserve_index = self.out_len();
    self.emit(String::new());

    for (i, param) in params.iter().enumerate() {
      let size = param.param_type.as_ref().map_or(4, |t| self.env.size_of(t));
      if i < 4 {
        let local = self.fenv().alloc_local(param.name, size, param.param_type.clone());
        self.emit(format!("  str r{i}, [r7, #{}]", local.offset));
      } else {
        let offset = 8 + (i as i32 - 4) * 4;
        self.fenv().locals.insert(param.name, LocalVar { offset, size: 4, ty: param.param_type.clone() });
      }
    }

    self.gen_block(body)?;

    let falls_through = !matches!(body.last().map(|s| &s.kind), Some(StmtKind::Return(_)));
    if falls_through { self.emit_return_sequence(is_interrupt)?; }

    let frame_size = self.fenv().frame_size();
    self.patch(reserve_index, Self::stack_reserve_instructions(frame_size));

    self.emit(".ltorg");
    self.fenv = None;
    Ok(())
  }

  /// The `sub sp, sp, #K` prologue instruction, sized per the three
  /// magnitude bands in spec §4.4.1.
  fn stack_reserve_instructions(size: u32) -> String {
    if size == 0 { return String::new() }
    if size <= 508 { format!("  sub sp, sp, #{size}") }
    else if size <= 4095 { format!("  sub.w sp, sp, #{size}") }
    else { format!("  ldr r12, ={size}\n  sub sp, sp, r12") }
  }

  /// Pop every queued lambda body and emit it as a synthetic top-level
  /// function (spec §3.8). Lowering a lambda body can itself queue more
  /// lambdas, so this drains to a fixed point rather than a single sweep.
  pub(super) fn flush_pending_lambdas(&mut self) -> Result<(), CodeGenError> {
    while let Some(lambda) = self.pending_lambdas.pop() {
      let span = lambda.body.span;
      let params: Vec<Parameter> = lambda.params.iter()
        .map(|p| Parameter { name: *p, param_type: None, default: None, span })
        .collect();
      let body = [Stmt::new(StmtKind::Return(Some((*lambda.body).clone())), span)];
      self.gen_function_body(lambda.label, &params, &body, &[])?;
    }
    Ok(())
  }

  /// Each global with a constant initial value (int, bool, char, float via
  /// IEEE-754 bit pattern, or a cast thereof) is emitted as `.word`; all
  /// others reserve zeroed `.space` (spec §4.4, §6.3).
  pub(super) fn emit_data_section(&mut self, program: &Program) {
    for decl in &program.declarations {
      if let DeclKind::Var { name, var_type, value, .. } = &decl.kind {
        let label = resolve(*name);
        let size = var_type.as_ref().map_or(4, |t| self.env.size_of(t));
        self.emit_data(".align 2");
        self.emit_data(format!("{label}:"));
        match value.as_ref().and_then(|v| Self::const_word(v, var_type.as_ref())) {
          Some(word) => self.emit_data(format!("  .word {word}")),
          None => self.emit_data(format!("  .space {size}")),
        }
      }
    }
  }

  fn const_word(expr: &Expr, ty: Option<&Type>) -> Option<String> {
    match &expr.kind {
      ExprKind::Int(n) => Some(n.to_string()),
      ExprKind::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
      ExprKind::Char(c) => Some((*c as u32).to_string()),
      ExprKind::None => Some("0".to_string()),
      ExprKind::Cast { expr, .. } => Self::const_word(expr, ty),
      ExprKind::Unary { op: crate::ast::UnaryOp::Neg, operand } => {
        Self::const_word(operand, ty).map(|w| format!("-({w})"))
      }
      ExprKind::Float(f) => {
        let is_f64 = ty.is_some_and(|t| matches!(&t.kind, TypeKind::Named(n) if n == "float64"));
        if is_f64 {
          let bits = f.to_bits();
          Some(format!("{}\n  .word {}", bits as u32, (bits >> 32) as u32))
        } else {
          Some((*f as f32).to_bits().to_string())
        }
      }
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stack_reserve_picks_the_right_instruction_band() {
    assert_eq!(CodeGen::stack_reserve_instructions(0), "");
    assert_eq!(CodeGen::stack_reserve_instructions(32), "  sub sp, sp, #32");
    assert_eq!(CodeGen::stack_reserve_instructions(508), "  sub sp, sp, #508");
    assert_eq!(CodeGen::stack_reserve_instructions(509), "  sub.w sp, sp, #509");
    assert_eq!(CodeGen::stack_reserve_instructions(4095), "  sub.w sp, sp, #4095");
    assert_eq!(CodeGen::stack_reserve_instructions(4096), "  ldr r12, =4096\n  sub sp, sp, r12");
  }

  #[test]
  fn const_word_folds_int_bool_char_and_negation() {
    let span = Span::point(0, 0);
    let int_expr = Expr::new(ExprKind::Int(7), span);
    assert_eq!(CodeGen::const_word(&int_expr, None), Some("7".to_string()));

    let bool_expr = Expr::new(ExprKind::Bool(true), span);
    assert_eq!(CodeGen::const_word(&bool_expr, None), Some("1".to_string()));

    let neg_expr = Expr::new(ExprKind::Unary { op: crate::ast::UnaryOp::Neg, operand: Box::new(int_expr) }, span);
    assert_eq!(CodeGen::const_word(&neg_expr, None), Some("-(7)".to_string()));
  }
}

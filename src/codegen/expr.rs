//! Expression lowering: every [`ExprKind`] variant evaluates to a value (or
//! address) left in `r0` (spec §4.4.2).

use crate::ast::{BinOp, Expr, ExprKind, ExprList, Type, TypeKind, UnaryOp};
use crate::diagnostics::CodeGenError;
use crate::entity::LocalVar;
use crate::symbol::{intern, resolve, Symbol};

use super::{runtime, CodeGen, LIST_COMPREHENSION_CAP};

fn invert_cond(cond: &str) -> &'static str {
  match cond {
    "eq" => "ne", "ne" => "eq", "lt" => "ge", "le" => "gt", "gt" => "le", "ge" => "lt",
    _ => "ne",
  }
}

impl CodeGen {
  pub(super) fn gen_expr(&mut self, expr: &Expr) -> Result<(), CodeGenError> {
    match &expr.kind {
      ExprKind::Int(n) => { self.load_int_literal(*n); Ok(()) }
      ExprKind::Float(f) => { self.load_float_literal(*f); Ok(()) }
      ExprKind::Str(s) => {
        let label = self.intern_string(s);
        self.emit(format!("  ldr r0, ={label}"));
        Ok(())
      }
      // Bare f-string expressions load the raw template; only `print(f"...")`
      // decomposes interpolation (preserved asymmetry, not a missing case).
      ExprKind::FString(s) => {
        let label = self.intern_string(s);
        self.emit(format!("  ldr r0, ={label}"));
        Ok(())
      }
      ExprKind::Char(c) => { self.emit(format!("  movs r0, #{}", *c as u32)); Ok(()) }
      ExprKind::Bool(b) => { self.emit(format!("  movs r0, #{}", i32::from(*b))); Ok(()) }
      ExprKind::None => { self.emit("  movs r0, #0"); Ok(()) }
      ExprKind::Ident(sym) => self.gen_ident(*sym),
      ExprKind::Binary { op, left, right } => self.gen_binary(*op, left, right),
      ExprKind::Unary { op, operand } => self.gen_unary(*op, operand),
      ExprKind::Call { func, args, kwargs } => self.gen_call(func, args, kwargs),
      ExprKind::MethodCall { obj, method, args } => self.gen_method_call(obj, *method, args),
      ExprKind::Index { obj, index } => self.gen_index(obj, index),
      ExprKind::Slice { obj, start, end, step } => {
        self.gen_slice(obj, start.as_deref(), end.as_deref(), step.as_deref())
      }
      ExprKind::Member { obj, member } => self.gen_member_access(obj, *member),
      ExprKind::List(items) => self.gen_list_literal(items),
      ExprKind::Dict(pairs) => self.gen_dict_literal(pairs),
      ExprKind::Tuple(items) => self.gen_tuple_literal(items),
      ExprKind::ListComprehension { element, var, iterable, condition } => {
        self.gen_list_comprehension(element, *var, iterable, condition.as_deref())
      }
      ExprKind::Conditional { condition, then_expr, else_expr } => {
        self.gen_conditional(condition, then_expr, else_expr)
      }
      ExprKind::Lambda { params, body } => self.gen_lambda(params, body),
      ExprKind::SizeOf(ty) => { let sz = self.env.size_of(ty); self.load_int_literal(i64::from(sz)); Ok(()) }
      ExprKind::Cast { expr: inner, .. } => self.gen_expr(inner),
      ExprKind::Asm(code) => {
        for line in code.lines() {
          let trimmed = line.trim();
          if !trimmed.is_empty() { self.emit(format!("  {trimmed}")); }
        }
        Ok(())
      }
    }
  }

  pub(super) fn load_int_literal(&mut self, n: i64) {
    if (-256..256).contains(&n) { self.emit(format!("  movs r0, #{n}")); }
    else if (0..=65535).contains(&n) { self.emit(format!("  movw r0, #{n}")); }
    else { self.emit(format!("  ldr r0, ={n}")); }
  }

  fn load_float_literal(&mut self, f: f64) {
    let bits = (f as f32).to_bits();
    self.emit(format!("  ldr r0, =0x{bits:08x}"));
  }

  fn load_instr_for_size(size: u32) -> String {
    match size { 1 => "  ldrb r0, [r0]".into(), 2 => "  ldrh r0, [r0]".into(), _ => "  ldr r0, [r0]".into() }
  }

  fn load_local_instr(size: u32, offset: i32) -> String {
    match size {
      1 => format!("  ldrb r0, [r7, #{offset}]"),
      2 => format!("  ldrh r0, [r7, #{offset}]"),
      _ => format!("  ldr r0, [r7, #{offset}]"),
    }
  }

  pub(super) fn store_instr_for_size(size: u32, base: &str, offset: i32) -> String {
    match size {
      1 => format!("  strb r0, [{base}, #{offset}]"),
      2 => format!("  strh r0, [{base}, #{offset}]"),
      _ => format!("  str r0, [{base}, #{offset}]"),
    }
  }

  fn gen_ident(&mut self, sym: Symbol) -> Result<(), CodeGenError> {
    if let Some(fenv) = &self.fenv {
      if !fenv.is_global(sym) {
        if let Some(local) = fenv.local(sym).cloned() {
          if matches!(local.ty.as_ref().map(|t| &t.kind), Some(TypeKind::Array { .. })) {
            self.emit(format!("  add r0, r7, #{}", local.offset));
          } else {
            self.emit(Self::load_local_instr(local.size, local.offset));
          }
          return Ok(());
        }
      }
    }
    if self.env.defined_funcs.contains(&sym) || self.env.extern_funcs.contains(&sym) {
      self.emit(format!("  ldr r0, ={}", resolve(sym)));
      return Ok(());
    }
    if let Some(global) = self.env.globals.get(&sym) {
      if global.array_element_size.is_some() {
        self.emit(format!("  ldr r0, ={}", resolve(sym)));
      } else {
        let size = global.ty.as_ref().map_or(4, |t| self.env.size_of(t));
        self.emit(format!("  ldr r0, ={}", resolve(sym)));
        self.emit(Self::load_instr_for_size(size));
      }
      return Ok(());
    }
    // A module-scope name with neither a local slot nor a registered global
    // table entry: treat it as an externally linked label, per the source's
    // fallback "load label and dereference".
    self.emit(format!("  ldr r0, ={}", resolve(sym)));
    self.emit("  ldr r0, [r0]");
    Ok(())
  }

  /// `expr_type(expr)` per spec §4.3: a conservative local lookup used only
  /// for element-size decisions, not full inference.
  pub(super) fn expr_type(&self, expr: &Expr) -> Option<Type> {
    match &expr.kind {
      ExprKind::Int(_) => Some(named_type("int32")),
      ExprKind::Float(_) => Some(named_type("float32")),
      ExprKind::Str(_) => Some(named_type("str")),
      ExprKind::FString(_) => Some(named_type("str")),
      ExprKind::Char(_) => Some(named_type("char")),
      ExprKind::Bool(_) => Some(named_type("bool")),
      ExprKind::Ident(sym) => {
        if let Some(fenv) = &self.fenv {
          if let Some(local) = fenv.local(*sym) { return local.ty.clone() }
        }
        self.env.globals.get(sym).and_then(|g| g.ty.clone())
      }
      ExprKind::Index { obj, .. } => {
        let base = self.expr_type(obj)?;
        match base.kind {
          TypeKind::Array { element, .. } | TypeKind::Pointer(element) | TypeKind::List(element) => Some(*element),
          _ => None,
        }
      }
      ExprKind::Unary { op: UnaryOp::Deref, operand } => {
        match self.expr_type(operand)?.kind {
          TypeKind::Pointer(inner) => Some(*inner),
          _ => None,
        }
      }
      ExprKind::Member { obj, member } => {
        let class_name = self.resolve_class_of(obj).ok()?;
        let layout = self.env.classes.get(&class_name)?;
        layout.field(*member).map(|f| f.ty.clone())
      }
      ExprKind::Cast { target, .. } => Some(target.clone()),
      _ => None,
    }
  }

  /// The element size used for scaling an index or address-of computation
  /// (array element type, pointer base type, `str` -> 1 byte, else 4).
  pub(super) fn element_size(&self, obj: &Expr) -> u32 {
    match self.expr_type(obj) {
      Some(t) => match &t.kind {
        TypeKind::Array { element, .. } | TypeKind::Pointer(element) | TypeKind::List(element) => self.env.size_of(element),
        TypeKind::Named(n) if n == "str" => 1,
        _ => 4,
      },
      None => 4,
    }
  }

  pub(super) fn resolve_class_of(&self, expr: &Expr) -> Result<Symbol, CodeGenError> {
    let ty = self.expr_type(expr).ok_or_else(|| CodeGenError::new("cannot resolve receiver class"))?;
    match &ty.kind {
      TypeKind::Named(n) => Ok(intern(n)),
      TypeKind::Pointer(inner) => match &inner.kind {
        TypeKind::Named(n) => Ok(intern(n)),
        _ => Err(CodeGenError::new("cannot resolve receiver class")),
      },
      _ => Err(CodeGenError::new("cannot resolve receiver class")),
    }
  }

  /// Scale `r1` (index) by `elem_size` and add to `r0` (base), leaving the
  /// computed address in `r0`.
  pub(super) fn scale_and_add(&mut self, elem_size: u32) {
    if elem_size > 1 && elem_size.is_power_of_two() {
      self.emit(format!("  lsl r1, r1, #{}", elem_size.trailing_zeros()));
    } else if elem_size != 1 {
      self.emit(format!("  movs r2, #{elem_size}"));
      self.emit("  mul r1, r1, r2");
    }
    self.emit("  add r0, r0, r1");
  }

  fn gen_binary(&mut self, op: BinOp, left: &Expr, right: &Expr) -> Result<(), CodeGenError> {
    match op {
      BinOp::And => return self.gen_short_circuit(left, right, true),
      BinOp::Or => return self.gen_short_circuit(left, right, false),
      _ => {}
    }
    self.gen_expr(right)?;
    self.emit("  push {r0}");
    self.gen_expr(left)?;
    self.emit("  pop {r1}");
    match op {
      BinOp::Add => self.emit("  add r0, r0, r1"),
      BinOp::Sub => self.emit("  sub r0, r0, r1"),
      BinOp::Mul => self.emit("  mul r0, r0, r1"),
      BinOp::Div | BinOp::IDiv => self.emit(format!("  bl {}", runtime::AEABI_IDIV)),
      BinOp::Mod => { self.emit(format!("  bl {}", runtime::AEABI_IDIVMOD)); self.emit("  mov r0, r1"); }
      BinOp::Pow => self.emit(format!("  bl {}", runtime::PYNUX_POW)),
      BinOp::BitOr => self.emit("  orr r0, r0, r1"),
      BinOp::BitAnd => self.emit("  and r0, r0, r1"),
      BinOp::BitXor => self.emit("  eor r0, r0, r1"),
      BinOp::Shl => self.emit("  lsl r0, r0, r1"),
      BinOp::Shr => self.emit("  lsr r0, r0, r1"),
      BinOp::Eq => self.gen_comparison("eq"),
      BinOp::Neq => self.gen_comparison("ne"),
      BinOp::Lt => self.gen_comparison("lt"),
      BinOp::Lte => self.gen_comparison("le"),
      BinOp::Gt => self.gen_comparison("gt"),
      BinOp::Gte => self.gen_comparison("ge"),
      BinOp::Is => self.gen_comparison("eq"),
      BinOp::IsNot => self.gen_comparison("ne"),
      BinOp::In => self.emit(format!("  bl {}", runtime::PYNUX_IN)),
      BinOp::NotIn => { self.emit(format!("  bl {}", runtime::PYNUX_IN)); self.emit("  eor r0, r0, #1"); }
      BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
    Ok(())
  }

  fn gen_comparison(&mut self, cond: &str) {
    self.emit("  cmp r0, r1");
    self.gen_bool_from_flags(cond);
  }

  fn gen_bool_from_flags(&mut self, cond: &str) {
    let inverse = invert_cond(cond);
    self.emit(format!("  ite {cond}"));
    self.emit(format!("  mov{cond} r0, #1"));
    self.emit(format!("  mov{inverse} r0, #0"));
  }

  /// `and`/`or` short-circuit via branches rather than nested IT blocks
  /// (spec §4.4.2).
  fn gen_short_circuit(&mut self, left: &Expr, right: &Expr, is_and: bool) -> Result<(), CodeGenError> {
    let tag = if is_and { "and" } else { "or" };
    let short_circuit = self.new_label(&format!("{tag}_short"));
    let end = self.new_label(&format!("{tag}_end"));
    self.gen_expr(left)?;
    self.emit("  cmp r0, #0");
    self.emit(format!("  b{} {short_circuit}", if is_and { "eq" } else { "ne" }));
    self.gen_expr(right)?;
    self.emit("  cmp r0, #0");
    self.emit(format!("  b{} {short_circuit}", if is_and { "eq" } else { "ne" }));
    self.emit(format!("  movs r0, #{}", i32::from(!is_and)));
    self.emit(format!("  b {end}"));
    self.emit(format!("{short_circuit}:"));
    self.emit(format!("  movs r0, #{}", i32::from(is_and)));
    self.emit(format!("{end}:"));
    Ok(())
  }

  fn gen_unary(&mut self, op: UnaryOp, operand: &Expr) -> Result<(), CodeGenError> {
    if let UnaryOp::Addr = op { return self.gen_addr_of(operand) }
    self.gen_expr(operand)?;
    match op {
      UnaryOp::Neg => self.emit("  rsb r0, r0, #0"),
      UnaryOp::Not => { self.emit("  cmp r0, #0"); self.gen_bool_from_flags("eq"); }
      UnaryOp::BitNot => self.emit("  mvn r0, r0"),
      UnaryOp::Deref => self.emit("  ldr r0, [r0]"),
      UnaryOp::Addr => unreachable!("handled above"),
    }
    Ok(())
  }

  /// `&expr` computed without evaluating `expr` (spec §4.4.2). Fails with
  /// `CodeGenError` when `expr` is not an lvalue (spec §4.4.6).
  pub(super) fn gen_addr_of(&mut self, expr: &Expr) -> Result<(), CodeGenError> {
    match &expr.kind {
      ExprKind::Ident(sym) => {
        if let Some(local) = self.fenv().local(*sym).cloned() {
          self.emit(format!("  add r0, r7, #{}", local.offset));
          return Ok(());
        }
        if self.env.globals.contains_key(sym) {
          self.emit(format!("  ldr r0, ={}", resolve(*sym)));
          return Ok(());
        }
        Err(CodeGenError::new(format!("cannot take the address of undeclared name '{}'", resolve(*sym))))
      }
      ExprKind::Index { obj, index } => {
        let elem_size = self.element_size(obj);
        self.gen_expr(index)?;
        self.emit("  push {r0}");
        self.gen_expr(obj)?;
        self.emit("  pop {r1}");
        self.scale_and_add(elem_size);
        Ok(())
      }
      ExprKind::Member { obj, member } => self.gen_member_addr(obj, *member),
      ExprKind::Unary { op: UnaryOp::Deref, operand } => self.gen_expr(operand),
      _ => Err(CodeGenError::new("'&' applied to a non-lvalue expression")),
    }
  }

  fn gen_member_addr(&mut self, obj: &Expr, member: Symbol) -> Result<(), CodeGenError> {
    let class_name = self.resolve_class_of(obj)?;
    let layout = self.env.classes.get(&class_name).cloned()
      .ok_or_else(|| CodeGenError::new(format!("unknown class '{}'", resolve(class_name))))?;
    let field = layout.field(member)
      .ok_or_else(|| CodeGenError::new(format!("no field '{}' on class '{}'", resolve(member), resolve(class_name))))?
      .clone();
    self.gen_expr(obj)?;
    if field.offset != 0 { self.emit(format!("  adds r0, r0, #{}", field.offset)); }
    Ok(())
  }

  fn gen_member_access(&mut self, obj: &Expr, member: Symbol) -> Result<(), CodeGenError> {
    if let Ok(class_name) = self.resolve_class_of(obj) {
      if let Some(accessor) = self.env.properties.get(&(class_name, member)).copied() {
        let label = format!("{}_{}", resolve(class_name), resolve(accessor));
        self.gen_expr(obj)?;
        self.emit("  push {r0}");
        self.emit("  pop {r0}");
        self.emit(format!("  bl {label}"));
        return Ok(());
      }
    }
    let class_name = self.resolve_class_of(obj)?;
    let layout = self.env.classes.get(&class_name).cloned()
      .ok_or_else(|| CodeGenError::new(format!("unknown class '{}'", resolve(class_name))))?;
    let field = layout.field(member)
      .ok_or_else(|| CodeGenError::new(format!("no field '{}' on class '{}'", resolve(member), resolve(class_name))))?
      .clone();
    self.gen_expr(obj)?;
    if field.offset != 0 { self.emit(format!("  adds r0, r0, #{}", field.offset)); }
    let size = self.env.size_of(&field.ty);
    self.emit(Self::load_instr_for_size(size));
    Ok(())
  }

  fn gen_index(&mut self, obj: &Expr, index: &Expr) -> Result<(), CodeGenError> {
    if let Some(t) = self.expr_type(obj) {
      if let TypeKind::Dict { key, .. } = &t.kind {
        let by_str = matches!(&key.kind, TypeKind::Named(n) if n == "str");
        self.gen_expr(index)?;
        self.emit("  push {r0}");
        self.gen_expr(obj)?;
        self.emit("  pop {r1}");
        let sym = if by_str { runtime::PYNUX_DICT_GET_STR } else { runtime::PYNUX_DICT_GET_INT };
        self.emit(format!("  bl {sym}"));
        return Ok(());
      }
    }

    let elem_size = self.element_size(obj);
    let static_len = self.static_array_len(obj);
    self.gen_expr(index)?;
    self.emit("  push {r0}");
    self.gen_expr(obj)?;
    self.emit("  mov r2, r0");
    self.emit("  pop {r1}");
    self.emit("  cmp r1, #0");
    let nonneg = self.new_label("idx_nonneg");
    self.emit(format!("  bge {nonneg}"));
    match static_len {
      Some(len) => { self.emit(format!("  movs r3, #{len}")); self.emit("  add r1, r1, r3"); }
      None => {
        self.emit("  push {r1, r2}");
        self.emit("  mov r0, r2");
        self.emit(format!("  bl {}", runtime::PYNUX_STRLEN));
        self.emit("  mov r3, r0");
        self.emit("  pop {r1, r2}");
        self.emit("  add r1, r1, r3");
      }
    }
    self.emit(format!("{nonneg}:"));
    self.emit("  mov r0, r2");
    self.scale_and_add(elem_size);

    let nested_element = match self.expr_type(obj) {
      Some(t) => match t.kind {
        TypeKind::Array { element, .. } | TypeKind::Pointer(element) | TypeKind::List(element) => Some(*element),
        _ => None,
      },
      None => None,
    };
    let is_nested_array = matches!(nested_element.as_ref().map(|t| &t.kind), Some(TypeKind::Array { .. }));
    if !is_nested_array { self.emit(Self::load_instr_for_size(elem_size)); }
    Ok(())
  }

  pub(super) fn static_array_len(&self, obj: &Expr) -> Option<u32> {
    match self.expr_type(obj)?.kind {
      TypeKind::Array { size, .. } => Some(size),
      _ => None,
    }
  }

  fn gen_slice(&mut self, obj: &Expr, start: Option<&Expr>, end: Option<&Expr>, step: Option<&Expr>) -> Result<(), CodeGenError> {
    match step { Some(e) => self.gen_expr(e)?, None => self.load_int_literal(1) }
    self.emit("  push {r0}");
    match end { Some(e) => self.gen_expr(e)?, None => self.load_int_literal(-1) }
    self.emit("  push {r0}");
    match start { Some(e) => self.gen_expr(e)?, None => self.load_int_literal(0) }
    self.emit("  push {r0}");
    self.gen_expr(obj)?;
    self.emit("  pop {r1}");
    self.emit("  pop {r2}");
    self.emit("  pop {r3}");
    self.emit(format!("  bl {}", runtime::PYNUX_SLICE));
    Ok(())
  }

  /// Returns the number of stack-argument bytes the caller must clean up.
  pub(super) fn gen_call_args(&mut self, args: &ExprList) -> Result<u32, CodeGenError> {
    let extra = if args.len() > 4 { &args[4..] } else { &[] };
    for arg in extra.iter().rev() {
      self.gen_expr(arg)?;
      self.emit("  push {r0}");
    }
    let reg_args: &[Expr] = if args.len() > 4 { &args[..4] } else { args };
    for arg in reg_args {
      self.gen_expr(arg)?;
      self.emit("  push {r0}");
    }
    for i in (0..reg_args.len()).rev() {
      self.emit(format!("  pop {{r{i}}}"));
    }
    Ok(u32::try_from(extra.len()).unwrap_or(0) * 4)
  }

  pub(super) fn gen_direct_call(&mut self, name: &str, args: &ExprList) -> Result<(), CodeGenError> {
    let cleanup = self.gen_call_args(args)?;
    self.emit(format!("  bl {name}"));
    if cleanup > 0 { self.emit(format!("  add sp, sp, #{cleanup}")); }
    Ok(())
  }

  pub(super) fn gen_runtime_call(&mut self, sym: &str, args: &ExprList) -> Result<(), CodeGenError> {
    self.gen_direct_call(sym, args)
  }

  fn gen_indirect_call(&mut self, sym: Symbol, args: &ExprList) -> Result<(), CodeGenError> {
    let local = self.fenv().local(sym).cloned()
      .ok_or_else(|| CodeGenError::new(format!("'{}' is not a callable local", resolve(sym))))?;
    self.emit("  push {r4}");
    self.emit(format!("  ldr r4, [r7, #{}]", local.offset));
    let cleanup = self.gen_call_args(args)?;
    self.emit("  blx r4");
    if cleanup > 0 { self.emit(format!("  add sp, sp, #{cleanup}")); }
    self.emit("  pop {r4}");
    Ok(())
  }

  fn gen_call(&mut self, func: &Expr, args: &ExprList, kwargs: &[(Symbol, Expr)]) -> Result<(), CodeGenError> {
    if let ExprKind::Ident(sym) = &func.kind {
      if self.env.classes.contains_key(sym) || self.env.unions.contains_key(sym) {
        return self.gen_struct_construct(*sym, args, kwargs);
      }
      if let Some(variant) = self.env.find_variant(*sym) {
        return self.gen_enum_variant_construct(variant.tag, args);
      }
      let name = resolve(*sym);
      if super::builtins::is_builtin_name(&name) {
        return self.gen_builtin_call(&name, args, kwargs);
      }
      let is_local = self.fenv.as_ref().is_some_and(|f| f.local(*sym).is_some() && !f.is_global(*sym));
      if is_local { return self.gen_indirect_call(*sym, args) }
      return self.gen_direct_call(&name, args);
    }
    if let ExprKind::Member { obj, member } = &func.kind {
      if let ExprKind::Ident(class_sym) = &obj.kind {
        if self.env.classes.contains_key(class_sym) {
          let label = format!("{}_{}", resolve(*class_sym), resolve(*member));
          return self.gen_direct_call(&label, args);
        }
      }
    }
    Err(CodeGenError::new("unsupported call target"))
  }

  fn gen_method_call(&mut self, obj: &Expr, method: Symbol, args: &ExprList) -> Result<(), CodeGenError> {
    if matches!(self.expr_type(obj), Some(Type { kind: TypeKind::Named(n), .. }) if n == "str") {
      if let Some(sym) = runtime::str_method_symbol(&resolve(method)) {
        let mut full_args = ExprList::new();
        full_args.push(obj.clone());
        full_args.extend(args.iter().cloned());
        return self.gen_direct_call(sym, &full_args);
      }
    }
    let class_name = self.resolve_class_of(obj)?;
    let label = format!("{}_{}", resolve(class_name), resolve(method));
    let mut full_args = ExprList::new();
    full_args.push(obj.clone());
    full_args.extend(args.iter().cloned());
    self.gen_direct_call(&label, &full_args)
  }

  /// `Class(args)` (stack-allocated positional constructor) and
  /// `Class{field=value, ...}` (heap-allocated, spec §4.4.2 "Struct/union
  /// init") share this entry point, distinguished by whether kwargs were
  /// supplied.
  fn gen_struct_construct(&mut self, sym: Symbol, args: &ExprList, kwargs: &[(Symbol, Expr)]) -> Result<(), CodeGenError> {
    let (fields, size) = if let Some(layout) = self.env.classes.get(&sym) {
      (layout.fields.clone(), layout.size)
    } else if let Some(layout) = self.env.unions.get(&sym) {
      (layout.fields.clone(), layout.size)
    } else {
      return Err(CodeGenError::new(format!("unknown struct/union '{}'", resolve(sym))));
    };

    if kwargs.is_empty() {
      let temp_name = intern(&format!("__ctor_tmp_{}", self.fenv().new_label()));
      let local = self.fenv().alloc_local(temp_name, size, None);
      for word_off in (0..size).step_by(4) {
        self.emit("  movs r0, #0");
        self.emit(format!("  str r0, [r7, #{}]", local.offset + word_off as i32));
      }
      for (field, arg) in fields.iter().zip(args.iter()) {
        self.gen_expr(arg)?;
        let field_size = self.env.size_of(&field.ty);
        self.emit(Self::store_instr_for_size(field_size, "r7", local.offset + field.offset as i32));
      }
      self.emit(format!("  add r0, r7, #{}", local.offset));
    } else {
      self.load_int_literal(i64::from(size));
      self.emit("  bl malloc");
      for word_off in (0..size.min(32)).step_by(4) {
        self.emit(format!("  movs r1, #0"));
        self.emit(format!("  str r1, [r0, #{word_off}]"));
      }
      self.emit("  push {r0}");
      for (name, value) in kwargs {
        let field = fields.iter().find(|f| f.name == *name)
          .ok_or_else(|| CodeGenError::new(format!("no field '{}' on '{}'", resolve(*name), resolve(sym))))?
          .clone();
        self.gen_expr(value)?;
        self.emit("  ldr r1, [sp]");
        let field_size = self.env.size_of(&field.ty);
        self.emit(Self::store_instr_for_size(field_size, "r1", field.offset as i32));
      }
      self.emit("  pop {r0}");
    }
    Ok(())
  }

  /// `Variant(args)`: a heap-allocated `[tag, payload...]` word array — the
  /// layout `gen_match` reads back via the `(j+1)*4` positional offsets
  /// spec §4.4.3 documents. The tag is the variant's declaration order
  /// within its enum, assigned by [`crate::entity::Environment::register_enum`].
  fn gen_enum_variant_construct(&mut self, tag: u32, args: &ExprList) -> Result<(), CodeGenError> {
    let n = u32::try_from(args.len()).unwrap_or(0);
    self.load_int_literal(i64::from(4 + n * 4));
    self.emit("  bl malloc");
    self.emit("  push {r0}");
    self.emit(format!("  movs r1, #{tag}"));
    self.emit("  ldr r2, [sp]");
    self.emit("  str r1, [r2]");
    for (i, arg) in args.iter().enumerate() {
      self.gen_expr(arg)?;
      self.emit("  ldr r1, [sp]");
      self.emit(format!("  str r0, [r1, #{}]", (i + 1) * 4));
    }
    self.emit("  pop {r0}");
    Ok(())
  }

  fn gen_list_literal(&mut self, items: &ExprList) -> Result<(), CodeGenError> {
    let n = u32::try_from(items.len()).unwrap_or(0);
    self.load_int_literal(i64::from(8 + n * 4));
    self.emit("  bl malloc");
    self.emit("  push {r0}");
    self.emit(format!("  movs r1, #{n}"));
    self.emit("  str r1, [r0]");
    self.emit("  str r1, [r0, #4]");
    for (i, item) in items.iter().enumerate() {
      self.gen_expr(item)?;
      self.emit("  ldr r1, [sp]");
      self.emit(format!("  str r0, [r1, #{}]", 8 + i * 4));
    }
    self.emit("  pop {r0}");
    Ok(())
  }

  fn gen_dict_literal(&mut self, pairs: &[(Expr, Expr)]) -> Result<(), CodeGenError> {
    let n = u32::try_from(pairs.len()).unwrap_or(0);
    self.load_int_literal(i64::from(4 + n * 8));
    self.emit("  bl malloc");
    self.emit("  push {r0}");
    self.emit(format!("  movs r1, #{n}"));
    self.emit("  str r1, [r0]");
    for (i, (key, value)) in pairs.iter().enumerate() {
      self.gen_expr(key)?;
      self.emit("  ldr r1, [sp]");
      self.emit(format!("  str r0, [r1, #{}]", 4 + i * 8));
      self.gen_expr(value)?;
      self.emit("  ldr r1, [sp]");
      self.emit(format!("  str r0, [r1, #{}]", 4 + i * 8 + 4));
    }
    self.emit("  pop {r0}");
    Ok(())
  }

  fn gen_tuple_literal(&mut self, items: &ExprList) -> Result<(), CodeGenError> {
    let n = u32::try_from(items.len()).unwrap_or(0);
    if n == 0 { self.emit("  movs r0, #0"); return Ok(()) }
    self.load_int_literal(i64::from(n * 4));
    self.emit("  bl malloc");
    self.emit("  push {r0}");
    for (i, item) in items.iter().enumerate() {
      self.gen_expr(item)?;
      self.emit("  ldr r1, [sp]");
      self.emit(format!("  str r0, [r1, #{}]", i * 4));
    }
    self.emit("  pop {r0}");
    Ok(())
  }

  fn as_int_literal(expr: Option<&Expr>) -> Option<i64> {
    match expr.map(|e| &e.kind) { Some(ExprKind::Int(n)) => Some(*n), _ => None }
  }

  /// Extracts `(start, end, step)` from a `range(...)` call (spec §4.4.3
  /// `For` desugaring / §4.4.2 comprehension constraint). Fails for any
  /// other iterable shape.
  pub(super) fn range_args<'e>(&self, iterable: &'e Expr) -> Result<(Option<&'e Expr>, &'e Expr, Option<&'e Expr>), CodeGenError> {
    if let ExprKind::Call { func, args, .. } = &iterable.kind {
      if let ExprKind::Ident(sym) = &func.kind {
        if resolve(*sym) == "range" {
          return match args.len() {
            1 => Ok((None, &args[0], None)),
            2 => Ok((Some(&args[0]), &args[1], None)),
            3 => Ok((Some(&args[0]), &args[1], Some(&args[2]))),
            _ => Err(CodeGenError::new("range() takes between 1 and 3 arguments")),
          };
        }
      }
    }
    Err(CodeGenError::new("this construct only supports a range(...) iterable"))
  }

  fn gen_list_comprehension(&mut self, element: &Expr, var: Symbol, iterable: &Expr, condition: Option<&Expr>) -> Result<(), CodeGenError> {
    let (start, end, step) = self.range_args(iterable)?;
    if let (Some(s), Some(e)) = (Self::as_int_literal(start).or(Some(0)), Self::as_int_literal(Some(end))) {
      let count = (e - s).max(0) as u32;
      if count > LIST_COMPREHENSION_CAP {
        tracing::warn!(count, cap = LIST_COMPREHENSION_CAP, "list comprehension range statically exceeds the preallocation cap");
      }
    }

    let cap_bytes = 8 + LIST_COMPREHENSION_CAP * 4;
    self.load_int_literal(i64::from(cap_bytes));
    self.emit("  bl malloc");
    let data_name = intern(&format!("__listcomp_data_{}", self.fenv().new_label()));
    let data_local = self.fenv().alloc_local(data_name, 4, None);
    self.emit(format!("  str r0, [r7, #{}]", data_local.offset));

    let len_name = intern(&format!("__listcomp_len_{}", self.fenv().new_label()));
    let len_local = self.fenv().alloc_local(len_name, 4, None);
    self.emit("  movs r0, #0");
    self.emit(format!("  str r0, [r7, #{}]", len_local.offset));

    let i_name = intern(&format!("__listcomp_i_{}", self.fenv().new_label()));
    match start { Some(e) => self.gen_expr(e)?, None => self.load_int_literal(0) }
    let i_local = self.fenv().alloc_local(i_name, 4, None);
    self.emit(format!("  str r0, [r7, #{}]", i_local.offset));

    let loop_start = self.new_label("listcomp_start");
    let loop_end = self.new_label("listcomp_end");
    self.emit(format!("{loop_start}:"));
    self.emit(format!("  ldr r0, [r7, #{}]", i_local.offset));
    self.emit("  push {r0}");
    self.gen_expr(end)?;
    self.emit("  pop {r1}");
    self.emit("  cmp r1, r0");
    self.emit(format!("  bge {loop_end}"));

    self.fenv().locals.insert(var, LocalVar { offset: i_local.offset, size: 4, ty: None });

    if let Some(cond) = condition {
      let skip = self.new_label("listcomp_skip");
      self.gen_expr(cond)?;
      self.emit("  cmp r0, #0");
      self.emit(format!("  beq {skip}"));
      self.gen_element_store(element, &data_local, &len_local)?;
      self.emit(format!("{skip}:"));
    } else {
      self.gen_element_store(element, &data_local, &len_local)?;
    }

    self.emit(format!("  ldr r0, [r7, #{}]", i_local.offset));
    self.emit("  push {r0}");
    match step { Some(e) => self.gen_expr(e)?, None => self.load_int_literal(1) }
    self.emit("  mov r1, r0");
    self.emit("  pop {r0}");
    self.emit("  add r0, r0, r1");
    self.emit(format!("  str r0, [r7, #{}]", i_local.offset));
    self.emit(format!("  b {loop_start}"));
    self.emit(format!("{loop_end}:"));
    self.emit(format!("  ldr r0, [r7, #{}]", data_local.offset));
    Ok(())
  }

  fn gen_element_store(&mut self, element: &Expr, data_local: &LocalVar, len_local: &LocalVar) -> Result<(), CodeGenError> {
    self.gen_expr(element)?;
    self.emit("  push {r0}");
    self.emit(format!("  ldr r1, [r7, #{}]", len_local.offset));
    self.emit(format!("  ldr r2, [r7, #{}]", data_local.offset));
    self.emit("  lsl r3, r1, #2");
    self.emit("  add r2, r2, r3");
    self.emit("  pop {r0}");
    self.emit("  str r0, [r2]");
    self.emit(format!("  ldr r1, [r7, #{}]", len_local.offset));
    self.emit("  adds r1, r1, #1");
    self.emit(format!("  str r1, [r7, #{}]", len_local.offset));
    Ok(())
  }

  fn gen_conditional(&mut self, condition: &Expr, then_expr: &Expr, else_expr: &Expr) -> Result<(), CodeGenError> {
    let else_label = self.new_label("cond_else");
    let end_label = self.new_label("cond_end");
    self.gen_expr(condition)?;
    self.emit("  cmp r0, #0");
    self.emit(format!("  beq {else_label}"));
    self.gen_expr(then_expr)?;
    self.emit(format!("  b {end_label}"));
    self.emit(format!("{else_label}:"));
    self.gen_expr(else_expr)?;
    self.emit(format!("{end_label}:"));
    Ok(())
  }

  fn gen_lambda(&mut self, params: &smallvec::SmallVec<[Symbol; 4]>, body: &Expr) -> Result<(), CodeGenError> {
    let label = self.queue_lambda(params.clone(), Box::new(body.clone()));
    self.emit(format!("  ldr r0, ={label}"));
    Ok(())
  }

  pub(super) fn literal_str(expr: &Expr) -> Option<String> {
    match &expr.kind { ExprKind::Str(s) => Some(s.clone()), _ => None }
  }

  pub(super) fn emit_print_str_literal(&mut self, s: &str) {
    let label = self.intern_string(s);
    self.emit(format!("  ldr r0, ={label}"));
    self.emit(format!("  bl {}", runtime::PRINT_STR));
  }

  pub(super) fn emit_print_for_type(&mut self, ty: Option<&Type>) {
    match ty.map(|t| &t.kind) {
      Some(TypeKind::Named(n)) if n == "str" => self.emit(format!("  bl {}", runtime::PRINT_STR)),
      Some(TypeKind::Named(n)) if n == "char" => self.emit(format!("  bl {}", runtime::UART_PUTC)),
      Some(TypeKind::Named(n)) if n == "bool" => {
        let true_label = self.intern_string("True");
        let false_label = self.intern_string("False");
        let else_label = self.new_label("print_bool_false");
        let end_label = self.new_label("print_bool_end");
        self.emit("  cmp r0, #0");
        self.emit(format!("  beq {else_label}"));
        self.emit(format!("  ldr r0, ={true_label}"));
        self.emit(format!("  b {end_label}"));
        self.emit(format!("{else_label}:"));
        self.emit(format!("  ldr r0, ={false_label}"));
        self.emit(format!("{end_label}:"));
        self.emit(format!("  bl {}", runtime::PRINT_STR));
      }
      _ => self.emit(format!("  bl {}", runtime::PRINT_INT)),
    }
  }

  /// Decomposes an f-string template into literal and `{expr}` segments,
  /// printing each in turn (spec §4.4.2). Interpolated segments are
  /// resolved as bare identifiers — the only shape the source's print path
  /// reliably supports (see the bare-expression asymmetry note above).
  pub(super) fn gen_fstring_print(&mut self, template: &str) -> Result<(), CodeGenError> {
    let mut literal = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
      match c {
        '{' if chars.peek() == Some(&'{') => { chars.next(); literal.push('{'); }
        '}' if chars.peek() == Some(&'}') => { chars.next(); literal.push('}'); }
        '{' => {
          if !literal.is_empty() { self.emit_print_str_literal(&literal); literal.clear(); }
          let mut name = String::new();
          for inner in chars.by_ref() {
            if inner == '}' { break }
            name.push(inner);
          }
          let sym = intern(name.trim());
          let synthetic = Expr::new(ExprKind::Ident(sym), expr_point_span());
          self.gen_expr(&synthetic)?;
          let ty = self.expr_type(&synthetic);
          self.emit_print_for_type(ty.as_ref());
        }
        _ => literal.push(c),
      }
    }
    if !literal.is_empty() { self.emit_print_str_literal(&literal); }
    Ok(())
  }
}

fn named_type(name: &str) -> Type { Type::new(TypeKind::Named(name.to_string()), expr_point_span()) }
pub(super) fn expr_point_span() -> crate::span::Span { crate::span::Span::point(0, 0) }

#[cfg(test)]
mod tests {
  fn generate_src(src: &str) -> String {
    let tokens = crate::lexer::lex(src, "<test>").expect("lexes");
    let program = crate::parser::parse(tokens, "<test>").expect("parses");
    super::super::generate(&program).expect("generates")
  }

  #[test]
  fn integer_division_calls_the_aeabi_helper() {
    let asm = generate_src("def f(a: int32, b: int32) -> int32:\n    return a // b\n");
    assert!(asm.contains("bl __aeabi_idiv"), "{asm}");
  }

  #[test]
  fn comparison_lowers_to_an_if_then_else_block() {
    let asm = generate_src("def f(a: int32, b: int32) -> bool:\n    return a < b\n");
    assert!(asm.to_lowercase().contains("ite"), "{asm}");
  }

  #[test]
  fn short_circuit_and_skips_the_right_operand_on_false() {
    let asm = generate_src("def f(a: bool, b: bool) -> bool:\n    return a and b\n");
    assert!(asm.contains("cmp r0, #0"), "{asm}");
  }

  #[test]
  fn indirect_call_through_a_function_pointer_local() {
    let asm = generate_src(
      "def f(cb: Func[[int32], int32]) -> int32:\n    return cb(1)\n",
    );
    assert!(asm.contains("blx") || asm.contains("bx"), "expected an indirect branch:\n{asm}");
  }
}

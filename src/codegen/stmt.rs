//! Statement lowering and function-body plumbing (spec §4.4.1, §4.4.3).
//!
//! Every routine here either writes directly into the generator's output
//! vector or recurses into [`super::expr`] for the value-producing half.
//! None of it returns a value in `r0` — a statement's job is side effects
//! and control flow, not a result.

use crate::ast::{BinOp, Expr, ExprKind, Stmt, StmtKind, Type};
use crate::diagnostics::CodeGenError;
use crate::entity::LoopLabels;
use crate::symbol::{intern, resolve, Symbol};

use super::{runtime, CodeGen};

impl CodeGen {
  pub(super) fn gen_block(&mut self, stmts: &[Stmt]) -> Result<(), CodeGenError> {
    for stmt in stmts { self.gen_stmt(stmt)?; }
    Ok(())
  }

  pub(super) fn gen_stmt(&mut self, stmt: &Stmt) -> Result<(), CodeGenError> {
    match &stmt.kind {
      StmtKind::VarDecl { name, var_type, value, .. } => self.gen_var_decl(*name, var_type.as_ref(), value.as_ref()),
      StmtKind::Assignment { target, value, op } => self.gen_assignment(target, value, *op),
      StmtKind::TupleUnpackAssign { targets, value } => self.gen_tuple_unpack_assign(targets, value),
      StmtKind::ExprStmt(e) => self.gen_expr(e),
      StmtKind::Return(value) => self.gen_return(value.as_ref()),
      StmtKind::If { condition, then_body, elif_branches, else_body } => {
        self.gen_if(condition, then_body, elif_branches, else_body.as_deref())
      }
      StmtKind::While { condition, body } => self.gen_while(condition, body),
      StmtKind::For { var, iterable, body } => self.gen_for(*var, iterable, body),
      StmtKind::ForUnpack { vars, iterable, body } => self.gen_for_unpack(vars, iterable, body),
      StmtKind::Break => self.gen_break(),
      StmtKind::Continue => self.gen_continue(),
      StmtKind::Pass => Ok(()),
      StmtKind::Defer(inner) => { self.fenv().defer_stack.push((**inner).clone()); Ok(()) }
      StmtKind::Assert { condition, message } => self.gen_assert(condition, message.as_ref()),
      StmtKind::Global(names) => { self.fenv().mark_global(names.iter().copied()); Ok(()) }
      StmtKind::Try { try_body, handlers, else_body, finally_body } => {
        self.gen_try_stmt(try_body, handlers, else_body, finally_body)
      }
      StmtKind::Raise(exc) => self.gen_raise(exc.as_ref()),
      StmtKind::Yield(value) => self.gen_yield(value.as_ref()),
      StmtKind::With { items, body } => self.gen_with(items, body),
      StmtKind::Match { expr, arms } => self.gen_match(expr, arms),
    }
  }

  /// The shared epilogue: every `Return` and every fall-off-the-end path
  /// replays the defer stack in LIFO order first (spec §4.4.3 `Defer`),
  /// then restores the frame. The defer stack is drained by cloning rather
  /// than draining in place, since a later return path in the same
  /// function must see the same deferred statements again.
  pub(super) fn emit_return_sequence(&mut self, is_interrupt: bool) -> Result<(), CodeGenError> {
    let deferred: Vec<Stmt> = self.fenv().defer_stack.iter().rev().cloned().collect();
    for stmt in &deferred { self.gen_stmt(stmt)?; }
    self.emit("  mov sp, r7");
    self.emit(if is_interrupt { "  pop {r0-r3, r7, r12, pc}" } else { "  pop {r7, pc}" });
    Ok(())
  }

  fn gen_return(&mut self, value: Option<&Expr>) -> Result<(), CodeGenError> {
    if let Some(e) = value { self.gen_expr(e)?; } else { self.emit("  movs r0, #0"); }
    let is_interrupt = self.fenv().is_interrupt;
    self.emit_return_sequence(is_interrupt)
  }

  /// `VarDecl`: allocate a local, remembering its declared type (and, for
  /// arrays, element size via the type itself) so later index/address-of
  /// lowering can consult it.
  fn gen_var_decl(&mut self, name: Symbol, var_type: Option<&Type>, value: Option<&Expr>) -> Result<(), CodeGenError> {
    let size = var_type.map_or(4, |t| self.env.size_of(t));
    let local = self.fenv().alloc_local(name, size, var_type.cloned());
    if let Some(e) = value {
      self.gen_expr(e)?;
      self.emit(Self::store_instr_for_size(local.size, "r7", local.offset));
    }
    Ok(())
  }

  /// `Assignment`: evaluate RHS, apply a compound operator if present
  /// (re-reading the current LHS value first), then store to whichever
  /// destination `target` names (spec §4.4.3).
  fn gen_assignment(&mut self, target: &Expr, value: &Expr, op: Option<BinOp>) -> Result<(), CodeGenError> {
    if let Some(op) = op {
      self.gen_expr(value)?;
      self.emit("  push {r0}");
      self.gen_expr(target)?;
      self.emit("  pop {r1}");
      self.emit_compound_op(op);
    } else {
      self.gen_expr(value)?;
    }
    self.store_to(target)
  }

  fn emit_compound_op(&mut self, op: BinOp) {
    match op {
      BinOp::Add => self.emit("  add r0, r0, r1"),
      BinOp::Sub => self.emit("  sub r0, r0, r1"),
      BinOp::Mul => self.emit("  mul r0, r0, r1"),
      BinOp::Div | BinOp::IDiv => self.emit(format!("  bl {}", runtime::AEABI_IDIV)),
      BinOp::Mod => { self.emit(format!("  bl {}", runtime::AEABI_IDIVMOD)); self.emit("  mov r0, r1"); }
      BinOp::BitOr => self.emit("  orr r0, r0, r1"),
      BinOp::BitAnd => self.emit("  and r0, r0, r1"),
      BinOp::BitXor => self.emit("  eor r0, r0, r1"),
      BinOp::Shl => self.emit("  lsl r0, r0, r1"),
      BinOp::Shr => self.emit("  lsr r0, r0, r1"),
      _ => self.emit(format!("  @ unsupported compound operator {op:?}")),
    }
  }

  /// Store the value currently in `r0` to `target`. Handles every
  /// destination shape spec §4.4.3 names: local, global, index, member, and
  /// the auto-allocating bare-identifier case.
  pub(super) fn store_to(&mut self, target: &Expr) -> Result<(), CodeGenError> {
    match &target.kind {
      ExprKind::Ident(sym) => self.store_to_ident(*sym),
      ExprKind::Index { obj, index } => {
        self.emit("  push {r0}");
        let elem_size = self.element_size(obj);
        self.gen_expr(index)?;
        self.emit("  push {r0}");
        self.gen_expr(obj)?;
        self.emit("  pop {r1}");
        self.scale_and_add(elem_size);
        self.emit("  mov r2, r0");
        self.emit("  pop {r0}");
        self.emit(Self::store_instr_for_size(elem_size, "r2", 0));
        Ok(())
      }
      ExprKind::Member { obj, member } => {
        self.emit("  push {r0}");
        self.gen_member_addr(obj, *member)?;
        self.emit("  mov r2, r0");
        self.pop_into_field_target(obj, *member, "r2")
      }
      ExprKind::Unary { op: crate::ast::UnaryOp::Deref, operand } => {
        self.emit("  push {r0}");
        self.gen_expr(operand)?;
        self.emit("  mov r1, r0");
        self.emit("  pop {r0}");
        self.emit("  str r0, [r1]");
        Ok(())
      }
      _ => Err(CodeGenError::new("invalid assignment target")),
    }
  }

  fn pop_into_field_target(&mut self, obj: &Expr, member: Symbol, addr_reg: &str) -> Result<(), CodeGenError> {
    let class_name = self.resolve_class_of(obj)?;
    let size = self.env.classes.get(&class_name)
      .and_then(|layout| layout.field(member))
      .map_or(4, |f| self.env.size_of(&f.ty));
    self.emit("  pop {r0}");
    self.emit(Self::store_instr_for_size(size, addr_reg, 0));
    Ok(())
  }

  /// A bare identifier that is neither a known local nor a global
  /// auto-allocates a fresh untyped local on its first assignment (spec
  /// §4.4.3's "first-time assignment" case).
  fn store_to_ident(&mut self, sym: Symbol) -> Result<(), CodeGenError> {
    if self.fenv().is_global(sym) || self.env.globals.contains_key(&sym) {
      self.emit(format!("  ldr r1, ={}", resolve(sym)));
      self.emit("  str r0, [r1]");
      return Ok(());
    }
    let local = match self.fenv().local(sym).cloned() {
      Some(l) => l,
      None => self.fenv().alloc_local(sym, 4, None),
    };
    self.emit(Self::store_instr_for_size(local.size, "r7", local.offset));
    Ok(())
  }

  fn gen_tuple_unpack_assign(&mut self, targets: &[Symbol], value: &Expr) -> Result<(), CodeGenError> {
    self.gen_expr(value)?;
    self.emit("  push {r0}");
    let from_tuple_literal = matches!(&value.kind, ExprKind::Tuple(_));
    for (i, target) in targets.iter().enumerate() {
      self.emit("  ldr r0, [sp]");
      if from_tuple_literal {
        self.emit(format!("  ldr r0, [r0, #{}]", i * 4));
      } else {
        if i > 0 { self.emit(format!("  add r0, r0, #{}", i * 4)); }
        self.emit("  ldr r0, [r0]");
      }
      let local = match self.fenv().local(*target).cloned() {
        Some(l) => l,
        None => self.fenv().alloc_local(*target, 4, None),
      };
      self.emit(Self::store_instr_for_size(local.size, "r7", local.offset));
    }
    self.emit("  add sp, sp, #4");
    Ok(())
  }

  /// Chain of `else_k`/`endif` labels; a `.ltorg` every
  /// [`super::LTORG_ELIF_PERIOD`] elif branches keeps `ldr rX, =...` in
  /// later branches within PC-relative range (spec §4.4.3 `If`).
  fn gen_if(&mut self, condition: &Expr, then_body: &[Stmt], elif_branches: &[(Expr, Vec<Stmt>)], else_body: Option<&[Stmt]>) -> Result<(), CodeGenError> {
    let end_label = self.new_label("endif");
    let mut next_label = self.new_label("else");

    self.gen_expr(condition)?;
    self.emit("  cmp r0, #0");
    self.emit(format!("  beq {next_label}"));
    self.gen_block(then_body)?;
    self.emit(format!("  b {end_label}"));

    for (i, (cond, body)) in elif_branches.iter().enumerate() {
      self.emit(format!("{next_label}:"));
      next_label = self.new_label("else");
      self.gen_expr(cond)?;
      self.emit("  cmp r0, #0");
      self.emit(format!("  beq {next_label}"));
      self.gen_block(body)?;
      self.emit(format!("  b {end_label}"));
      if (i + 1) % super::LTORG_ELIF_PERIOD == 0 { self.emit(".ltorg"); }
    }

    self.emit(format!("{next_label}:"));
    if let Some(body) = else_body { self.gen_block(body)?; }
    self.emit(format!("{end_label}:"));
    Ok(())
  }

  fn gen_while(&mut self, condition: &Expr, body: &[Stmt]) -> Result<(), CodeGenError> {
    let start = self.new_label("while_start");
    let end = self.new_label("while_end");
    self.fenv().push_loop(LoopLabels { continue_label: start.clone(), break_label: end.clone() });
    self.emit(format!("{start}:"));
    self.gen_expr(condition)?;
    self.emit("  cmp r0, #0");
    self.emit(format!("  beq {end}"));
    self.gen_block(body)?;
    self.emit(format!("  b {start}"));
    self.emit(format!("{end}:"));
    self.fenv().pop_loop();
    Ok(())
  }

  /// `For`: only `range(...)` is a supported iterable (spec §4.4.3).
  /// Desugars into `i`/`_end_i`/`_step_i` locals, a guard, the body, and an
  /// increment, mirroring [`super::expr::CodeGen::gen_list_comprehension`]'s
  /// identical range-walking shape.
  fn gen_for(&mut self, var: Symbol, iterable: &Expr, body: &[Stmt]) -> Result<(), CodeGenError> {
    let (start, end, step) = self.range_args(iterable)?;

    match start { Some(e) => self.gen_expr(e)?, None => self.load_int_literal(0) }
    let i_local = self.fenv().alloc_local(var, 4, None);
    self.emit(Self::store_instr_for_size(4, "r7", i_local.offset));

    self.gen_expr(end)?;
    let end_name = intern(&format!("_end_{}", self.fenv().new_label()));
    let end_local = self.fenv().alloc_local(end_name, 4, None);
    self.emit(Self::store_instr_for_size(4, "r7", end_local.offset));

    match step { Some(e) => self.gen_expr(e)?, None => self.load_int_literal(1) }
    let step_name = intern(&format!("_step_{}", self.fenv().new_label()));
    let step_local = self.fenv().alloc_local(step_name, 4, None);
    self.emit(Self::store_instr_for_size(4, "r7", step_local.offset));

    let start_label = self.new_label("for_start");
    let cont_label = self.new_label("for_cont");
    let end_label = self.new_label("for_end");
    self.fenv().push_loop(LoopLabels { continue_label: cont_label.clone(), break_label: end_label.clone() });

    self.emit(format!("{start_label}:"));
    self.emit(format!("  ldr r0, [r7, #{}]", i_local.offset));
    self.emit("  push {r0}");
    self.emit(format!("  ldr r0, [r7, #{}]", end_local.offset));
    self.emit("  pop {r1}");
    self.emit("  cmp r1, r0");
    self.emit(format!("  bge {end_label}"));

    self.gen_block(body)?;

    self.emit(format!("{cont_label}:"));
    self.emit(format!("  ldr r0, [r7, #{}]", i_local.offset));
    self.emit("  push {r0}");
    self.emit(format!("  ldr r0, [r7, #{}]", step_local.offset));
    self.emit("  mov r1, r0");
    self.emit("  pop {r0}");
    self.emit("  add r0, r0, r1");
    self.emit(format!("  str r0, [r7, #{}]", i_local.offset));
    self.emit(format!("  b {start_label}"));
    self.emit(format!("{end_label}:"));
    self.fenv().pop_loop();
    Ok(())
  }

  /// `ForUnpack`: `enumerate(list)` and `zip(list1, ...)` are recognised by
  /// call shape; anything else falls back to the generic iterable-unpack
  /// path, which assumes a list header `[len, cap, data...]` layout (the
  /// same layout [`super::expr::CodeGen::gen_list_literal`] writes) and
  /// destructures each element as a packed word array (spec §4.4.3).
  fn gen_for_unpack(&mut self, vars: &[Symbol], iterable: &Expr, body: &[Stmt]) -> Result<(), CodeGenError> {
    if let ExprKind::Call { func, args, .. } = &iterable.kind {
      if let ExprKind::Ident(sym) = &func.kind {
        match resolve(*sym).as_str() {
          "enumerate" if args.len() == 1 && vars.len() == 2 => {
            return self.gen_for_enumerate(vars[0], vars[1], &args[0], body);
          }
          "zip" if !args.is_empty() && vars.len() == args.len() => {
            return self.gen_for_zip(vars, args, body);
          }
          _ => {}
        }
      }
    }
    self.gen_for_unpack_generic(vars, iterable, body)
  }

  fn gen_for_enumerate(&mut self, index_var: Symbol, elem_var: Symbol, list: &Expr, body: &[Stmt]) -> Result<(), CodeGenError> {
    self.gen_expr(list)?;
    let data_name = intern(&format!("_enum_data_{}", self.fenv().new_label()));
    let data_local = self.fenv().alloc_local(data_name, 4, None);
    self.emit(Self::store_instr_for_size(4, "r7", data_local.offset));

    self.emit(format!("  ldr r0, [r7, #{}]", data_local.offset));
    self.emit("  ldr r0, [r0]");
    let len_name = intern(&format!("_enum_len_{}", self.fenv().new_label()));
    let len_local = self.fenv().alloc_local(len_name, 4, None);
    self.emit(Self::store_instr_for_size(4, "r7", len_local.offset));

    self.load_int_literal(0);
    let i_local = self.fenv().alloc_local(index_var, 4, None);
    self.emit(Self::store_instr_for_size(4, "r7", i_local.offset));
    self.fenv().alloc_local(elem_var, 4, None);
    let elem_local = self.fenv().local(elem_var).cloned().unwrap();

    let start = self.new_label("enum_start");
    let end = self.new_label("enum_end");
    self.fenv().push_loop(LoopLabels { continue_label: start.clone(), break_label: end.clone() });
    self.emit(format!("{start}:"));
    self.emit(format!("  ldr r0, [r7, #{}]", i_local.offset));
    self.emit("  push {r0}");
    self.emit(format!("  ldr r0, [r7, #{}]", len_local.offset));
    self.emit("  pop {r1}");
    self.emit("  cmp r1, r0");
    self.emit(format!("  bge {end}"));

    self.emit(format!("  ldr r0, [r7, #{}]", data_local.offset));
    self.emit(format!("  ldr r1, [r7, #{}]", i_local.offset));
    self.scale_and_add(4);
    self.emit("  adds r0, r0, #8");
    self.emit("  ldr r0, [r0]");
    self.emit(Self::store_instr_for_size(4, "r7", elem_local.offset));

    self.gen_block(body)?;

    self.emit(format!("  ldr r0, [r7, #{}]", i_local.offset));
    self.emit("  adds r0, r0, #1");
    self.emit(format!("  str r0, [r7, #{}]", i_local.offset));
    self.emit(format!("  b {start}"));
    self.emit(format!("{end}:"));
    self.fenv().pop_loop();
    Ok(())
  }

  /// `zip`: compute the minimum length across every input list before the
  /// loop starts, then index each list by the shared counter.
  fn gen_for_zip(&mut self, vars: &[Symbol], lists: &[Expr], body: &[Stmt]) -> Result<(), CodeGenError> {
    let mut data_locals = Vec::with_capacity(lists.len());
    let min_len_name = intern(&format!("_zip_minlen_{}", self.fenv().new_label()));
    let min_len_local = self.fenv().alloc_local(min_len_name, 4, None);

    for (i, list) in lists.iter().enumerate() {
      self.gen_expr(list)?;
      let data_name = intern(&format!("_zip_data{i}_{}", self.fenv().new_label()));
      let data_local = self.fenv().alloc_local(data_name, 4, None);
      self.emit(Self::store_instr_for_size(4, "r7", data_local.offset));

      self.emit("  ldr r0, [r0]");
      if i == 0 {
        self.emit(Self::store_instr_for_size(4, "r7", min_len_local.offset));
      } else {
        self.emit("  push {r0}");
        self.emit(format!("  ldr r0, [r7, #{}]", min_len_local.offset));
        self.emit("  pop {r1}");
        self.emit("  cmp r1, r0");
        let keep = self.new_label("zip_keep_min");
        self.emit(format!("  bge {keep}"));
        self.emit("  mov r0, r1");
        self.emit(format!("{keep}:"));
        self.emit(Self::store_instr_for_size(4, "r7", min_len_local.offset));
      }
      data_locals.push(data_local);
    }

    self.load_int_literal(0);
    let i_name = intern(&format!("_zip_i_{}", self.fenv().new_label()));
    let i_local = self.fenv().alloc_local(i_name, 4, None);
    self.emit(Self::store_instr_for_size(4, "r7", i_local.offset));

    let start = self.new_label("zip_start");
    let end = self.new_label("zip_end");
    self.fenv().push_loop(LoopLabels { continue_label: start.clone(), break_label: end.clone() });
    self.emit(format!("{start}:"));
    self.emit(format!("  ldr r0, [r7, #{}]", i_local.offset));
    self.emit("  push {r0}");
    self.emit(format!("  ldr r0, [r7, #{}]", min_len_local.offset));
    self.emit("  pop {r1}");
    self.emit("  cmp r1, r0");
    self.emit(format!("  bge {end}"));

    for (var, data_local) in vars.iter().zip(data_locals.iter()) {
      self.emit(format!("  ldr r0, [r7, #{}]", data_local.offset));
      self.emit(format!("  ldr r1, [r7, #{}]", i_local.offset));
      self.scale_and_add(4);
      self.emit("  adds r0, r0, #8");
      self.emit("  ldr r0, [r0]");
      let var_local = self.fenv().alloc_local(*var, 4, None);
      self.emit(Self::store_instr_for_size(4, "r7", var_local.offset));
    }

    self.gen_block(body)?;

    self.emit(format!("  ldr r0, [r7, #{}]", i_local.offset));
    self.emit("  adds r0, r0, #1");
    self.emit(format!("  str r0, [r7, #{}]", i_local.offset));
    self.emit(format!("  b {start}"));
    self.emit(format!("{end}:"));
    self.fenv().pop_loop();
    Ok(())
  }

  /// Generic iterable unpacking: the evaluated iterable is a list-header
  /// pointer (`[len, cap, data...]`); each loop body target reads one word
  /// at the matching offset. Used for `for a, b in pairs:` where `pairs`
  /// isn't recognised as `enumerate`/`zip`.
  fn gen_for_unpack_generic(&mut self, vars: &[Symbol], iterable: &Expr, body: &[Stmt]) -> Result<(), CodeGenError> {
    self.gen_expr(iterable)?;
    let data_name = intern(&format!("_unpack_data_{}", self.fenv().new_label()));
    let data_local = self.fenv().alloc_local(data_name, 4, None);
    self.emit(Self::store_instr_for_size(4, "r7", data_local.offset));
    self.emit(format!("  ldr r0, [r7, #{}]", data_local.offset));
    self.emit("  ldr r0, [r0]");
    let len_name = intern(&format!("_unpack_len_{}", self.fenv().new_label()));
    let len_local = self.fenv().alloc_local(len_name, 4, None);
    self.emit(Self::store_instr_for_size(4, "r7", len_local.offset));

    self.load_int_literal(0);
    let i_name = intern(&format!("_unpack_i_{}", self.fenv().new_label()));
    let i_local = self.fenv().alloc_local(i_name, 4, None);
    self.emit(Self::store_instr_for_size(4, "r7", i_local.offset));

    let start = self.new_label("unpack_start");
    let end = self.new_label("unpack_end");
    self.fenv().push_loop(LoopLabels { continue_label: start.clone(), break_label: end.clone() });
    self.emit(format!("{start}:"));
    self.emit(format!("  ldr r0, [r7, #{}]", i_local.offset));
    self.emit("  push {r0}");
    self.emit(format!("  ldr r0, [r7, #{}]", len_local.offset));
    self.emit("  pop {r1}");
    self.emit("  cmp r1, r0");
    self.emit(format!("  bge {end}"));

    self.emit(format!("  ldr r0, [r7, #{}]", data_local.offset));
    self.emit(format!("  ldr r1, [r7, #{}]", i_local.offset));
    self.scale_and_add(4);
    self.emit("  adds r0, r0, #8");
    self.emit("  ldr r0, [r0]");
    let tuple_name = intern(&format!("_unpack_tuple_{}", self.fenv().new_label()));
    let tuple_local = self.fenv().alloc_local(tuple_name, 4, None);
    self.emit(Self::store_instr_for_size(4, "r7", tuple_local.offset));

    for (j, var) in vars.iter().enumerate() {
      self.emit(format!("  ldr r0, [r7, #{}]", tuple_local.offset));
      if j > 0 { self.emit(format!("  adds r0, r0, #{}", j * 4)); }
      self.emit("  ldr r0, [r0]");
      let var_local = self.fenv().alloc_local(*var, 4, None);
      self.emit(Self::store_instr_for_size(4, "r7", var_local.offset));
    }

    self.gen_block(body)?;

    self.emit(format!("  ldr r0, [r7, #{}]", i_local.offset));
    self.emit("  adds r0, r0, #1");
    self.emit(format!("  str r0, [r7, #{}]", i_local.offset));
    self.emit(format!("  b {start}"));
    self.emit(format!("{end}:"));
    self.fenv().pop_loop();
    Ok(())
  }

  fn gen_break(&mut self) -> Result<(), CodeGenError> {
    let label = self.fenv().current_loop()
      .ok_or_else(|| CodeGenError::new("'break' outside a loop"))?
      .break_label;
    self.emit(format!("  b {label}"));
    Ok(())
  }

  fn gen_continue(&mut self) -> Result<(), CodeGenError> {
    let label = self.fenv().current_loop()
      .ok_or_else(|| CodeGenError::new("'continue' outside a loop"))?
      .continue_label;
    self.emit(format!("  b {label}"));
    Ok(())
  }

  fn gen_assert(&mut self, condition: &Expr, message: Option<&Expr>) -> Result<(), CodeGenError> {
    self.gen_expr(condition)?;
    self.emit("  cmp r0, #0");
    let ok = self.new_label("assert_ok");
    self.emit(format!("  bne {ok}"));
    match message {
      Some(m) => { self.gen_expr(m)?; self.emit(format!("  bl {}", runtime::PYNUX_ASSERT_FAIL_MSG)); }
      None => self.emit(format!("  bl {}", runtime::PYNUX_ASSERT_FAIL)),
    }
    self.emit(format!("{ok}:"));
    Ok(())
  }

  /// Best-effort `try/except/finally` via an `_error_flag` local (spec
  /// §4.4.3, §9.3): no stack unwinding, just a flag a runtime helper is
  /// expected to set before returning control here. Only the first handler
  /// runs; `else` runs only when the flag reads zero; `finally` always runs.
  fn gen_try_stmt(&mut self, try_body: &[Stmt], handlers: &[crate::ast::ExceptHandler], else_body: &[Stmt], finally_body: &[Stmt]) -> Result<(), CodeGenError> {
    let error_name = intern(&format!("_error_flag_{}", self.fenv().new_label()));
    let error_local = self.fenv().alloc_local(error_name, 4, None);
    let handler_label = self.new_label("except");
    let finally_label = self.new_label("finally");
    let end_label = self.new_label("endtry");

    self.emit("  movs r0, #0");
    self.emit(Self::store_instr_for_size(4, "r7", error_local.offset));

    self.gen_block(try_body)?;

    self.emit(format!("  ldr r0, [r7, #{}]", error_local.offset));
    self.emit("  cmp r0, #0");
    self.emit(format!("  bne {handler_label}"));

    self.gen_block(else_body)?;
    self.emit(format!("  b {finally_label}"));

    self.emit(format!("{handler_label}:"));
    if let Some(handler) = handlers.first() {
      if let Some(name) = handler.name {
        let exc_local = self.fenv().alloc_local(name, 4, None);
        self.emit(format!("  ldr r0, [r7, #{}]", error_local.offset));
        self.emit(Self::store_instr_for_size(4, "r7", exc_local.offset));
      }
      self.gen_block(&handler.body)?;
      self.emit("  movs r0, #0");
      self.emit(Self::store_instr_for_size(4, "r7", error_local.offset));
    }

    self.emit(format!("{finally_label}:"));
    self.gen_block(finally_body)?;
    self.emit(format!("{end_label}:"));
    Ok(())
  }

  fn gen_raise(&mut self, exc: Option<&Expr>) -> Result<(), CodeGenError> {
    match exc {
      Some(e) => { self.gen_expr(e)?; self.emit(format!("  bl {}", runtime::PYNUX_RAISE)); }
      None => self.emit(format!("  bl {}", runtime::PYNUX_RERAISE)),
    }
    Ok(())
  }

  /// Generators are not true coroutines (spec §4.4.3): `yield` stores its
  /// value and a "yielded" state tag into two fixed globals, then returns
  /// to the caller exactly like `return`. Resumption is not modelled.
  fn gen_yield(&mut self, value: Option<&Expr>) -> Result<(), CodeGenError> {
    match value { Some(e) => self.gen_expr(e)?, None => self.emit("  movs r0, #0") }
    self.emit("  ldr r1, =__generator_value");
    self.emit("  str r0, [r1]");
    self.emit("  ldr r1, =__generator_state");
    self.emit("  movs r0, #1");
    self.emit("  str r0, [r1]");
    self.emit("  mov sp, r7");
    self.emit("  pop {r7, pc}");
    Ok(())
  }

  /// `With`: evaluate each context expression, call `<Class>___enter__`
  /// when the static class is known (else the generic runtime fallback),
  /// optionally bind the result, run the body, then call `__exit__` for
  /// every item in reverse order (spec §4.4.3).
  fn gen_with(&mut self, items: &[crate::ast::WithItem], body: &[Stmt]) -> Result<(), CodeGenError> {
    let mut exit_classes = Vec::with_capacity(items.len());
    for item in items {
      let class_name = self.resolve_class_of(&item.context).ok();
      self.gen_expr(&item.context)?;
      self.emit("  push {r0}");
      match class_name {
        Some(c) => self.emit(format!("  bl {}___enter__", resolve(c))),
        None => {
          self.emit("  ldr r0, [sp]");
          self.emit(format!("  bl {}", runtime::PYNUX_CONTEXT_ENTER));
        }
      }
      if let Some(var) = item.var {
        let local = self.fenv().alloc_local(var, 4, None);
        self.emit(Self::store_instr_for_size(4, "r7", local.offset));
      }
      exit_classes.push(class_name);
    }

    self.gen_block(body)?;

    for class_name in exit_classes.into_iter().rev() {
      self.emit("  pop {r0}");
      match class_name {
        Some(c) => self.emit(format!("  bl {}___exit__", resolve(c))),
        None => self.emit(format!("  bl {}", runtime::PYNUX_CONTEXT_EXIT)),
      }
    }
    Ok(())
  }

  /// `Match`: the matched value stays on the stack across arms (spec
  /// §4.4.3); each non-wildcard arm's bindings are extracted at
  /// `(j + 1) * 4` from it, matching the variant-payload layout
  /// [`crate::entity::EnumLayout`] describes. A non-wildcard arm only runs
  /// when the matched value's tag word (offset 0) equals its variant's
  /// declared tag; `_` always matches and is expected to be the final arm.
  fn gen_match(&mut self, expr: &Expr, arms: &[crate::ast::MatchArm]) -> Result<(), CodeGenError> {
    let end_label = self.new_label("endmatch");
    self.gen_expr(expr)?;
    self.emit("  push {r0}");

    for arm in arms {
      if resolve(arm.pattern.name) == "_" {
        self.emit("  pop {r0}");
        self.gen_block(&arm.body)?;
        self.emit(format!("  b {end_label}"));
      } else {
        let next_arm = self.new_label("matcharm");
        let tag = self.env.find_variant(arm.pattern.name)
          .ok_or_else(|| CodeGenError::new(format!("'{}' is not a known match pattern", resolve(arm.pattern.name))))?
          .tag;
        self.emit("  ldr r0, [sp]");
        self.emit("  ldr r0, [r0]");
        self.emit(format!("  cmp r0, #{tag}"));
        self.emit(format!("  bne {next_arm}"));
        for (j, binding) in arm.pattern.bindings.iter().enumerate() {
          let bind_local = self.fenv().alloc_local(*binding, 4, None);
          self.emit("  ldr r0, [sp]");
          self.emit(format!("  ldr r1, [r0, #{}]", (j + 1) * 4));
          self.emit(Self::store_instr_for_size(4, "r7", bind_local.offset));
        }
        self.gen_block(&arm.body)?;
        self.emit("  add sp, sp, #4");
        self.emit(format!("  b {end_label}"));
        self.emit(format!("{next_arm}:"));
      }
    }

    self.emit("  add sp, sp, #4");
    self.emit(format!("{end_label}:"));
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  fn generate_src(src: &str) -> String {
    let tokens = crate::lexer::lex(src, "<test>").expect("lexes");
    let program = crate::parser::parse(tokens, "<test>").expect("parses");
    super::super::generate(&program).expect("generates")
  }

  #[test]
  fn match_checks_each_non_wildcard_variant_tag() {
    let asm = generate_src(
      "enum E:\n    Zero\n    One(int32)\n\ndef f(k: E) -> int32:\n    match k:\n        case One(v):\n            return v\n        case _:\n            return 0\n",
    );
    assert!(asm.contains("cmp r0, #1"), "expected a comparison against One's tag (1):\n{asm}");
    assert!(asm.to_lowercase().contains("bne"), "{asm}");
  }

  #[test]
  fn while_loop_emits_a_backward_branch() {
    let asm = generate_src("def f(n: int32) -> int32:\n    while n > 0:\n        n = n - 1\n    return n\n");
    assert!(asm.contains("f:"));
    assert!(asm.matches("cmp").count() >= 1);
  }

  #[test]
  fn break_and_continue_target_the_enclosing_loop_labels() {
    let asm = generate_src(
      "def f(n: int32) -> int32:\n    for i in range(n):\n        if i == 5:\n            break\n        if i == 2:\n            continue\n    return n\n",
    );
    assert!(asm.contains("for_end"), "{asm}");
    assert!(asm.contains("for_cont"), "{asm}");
  }

  #[test]
  fn defer_runs_reverse_of_declaration_order() {
    let asm = generate_src("def f() -> int32:\n    defer trace(1)\n    defer trace(2)\n    return 0\n");
    let pos_2 = asm.find("#2").expect("trace(2) emitted");
    let pos_1 = asm.rfind("#1").expect("trace(1) emitted");
    assert!(pos_2 < pos_1, "{asm}");
  }
}

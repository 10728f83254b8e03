//! The "fixed set of low-level built-ins" plus the Python-shaped builtins
//! (spec §4.4.2): memory/event barriers, atomics over `ldrex`/`strex`,
//! critical sections, bit manipulation, math dispatch, and the
//! iteration/reduction builtins (`print`, `len`, `abs`, `min`, `max`, `ord`,
//! `chr`, `input`, `sum`, `any`, `all`, `reversed`, `sorted`).
//!
//! `abs`/`min`/`max` are claimed by the general-purpose branch before the
//! math-dispatch table is ever consulted, exactly as in the source's
//! `elif` chain ordering (see [`super::runtime::math_symbol`]'s doc
//! comment) — this module's dispatch order preserves that.

use crate::ast::{Expr, ExprKind, ExprList};
use crate::diagnostics::CodeGenError;
use crate::symbol::Symbol;

use super::{runtime, CodeGen};

const BARRIERS: &[&str] = &["dmb", "dsb", "isb", "wfi", "wfe", "sev", "clrex"];
const ATOMICS: &[&str] = &[
  "atomic_load", "atomic_store", "atomic_add", "atomic_sub",
  "atomic_cmpxchg", "atomic_or", "atomic_and", "atomic_xor",
];
const BITOPS: &[&str] = &[
  "bit_set", "bit_clear", "bit_test", "bit_toggle", "bits_get", "bits_set",
  "clz", "rbit", "rev", "rev16",
];
const GENERAL: &[&str] = &[
  "print", "len", "abs", "min", "max", "ord", "chr", "input",
  "sum", "any", "all", "reversed", "sorted",
];
const MATH: &[&str] = &[
  "sqrt", "pow", "clamp", "sign", "gcd", "lcm",
  "sin", "cos", "tan", "rand", "randint", "srand", "distance",
];

#[must_use] pub fn is_builtin_name(name: &str) -> bool {
  BARRIERS.contains(&name)
    || ATOMICS.contains(&name)
    || name == "critical_enter" || name == "critical_exit"
    || BITOPS.contains(&name)
    || GENERAL.contains(&name)
    || MATH.contains(&name)
}

impl CodeGen {
  pub(super) fn gen_builtin_call(&mut self, name: &str, args: &ExprList, kwargs: &[(Symbol, Expr)]) -> Result<(), CodeGenError> {
    if BARRIERS.contains(&name) {
      self.emit(format!("  {name}"));
      self.emit("  movs r0, #0");
      return Ok(());
    }
    if name == "critical_enter" {
      self.emit("  mrs r0, primask");
      self.emit("  cpsid i");
      return Ok(());
    }
    if name == "critical_exit" {
      require_arity(name, args, 1)?;
      self.gen_expr(&args[0])?;
      self.emit("  msr primask, r0");
      self.emit("  movs r0, #0");
      return Ok(());
    }
    if let Some(sym) = runtime::atomic_symbol(name) {
      return self.gen_atomic(name, sym, args);
    }
    if BITOPS.contains(&name) {
      return self.gen_bitop(name, args);
    }
    match name {
      "print" => self.gen_builtin_print(args, kwargs),
      "len" => self.gen_builtin_len(args),
      "abs" => self.gen_builtin_abs(args),
      "min" => self.gen_builtin_min(args),
      "max" => self.gen_builtin_max(args),
      "ord" => self.gen_builtin_ord(args),
      "chr" => self.gen_builtin_chr(args),
      "input" => self.gen_builtin_input(args),
      "sum" => self.gen_builtin_sum(args),
      "any" => self.gen_builtin_any(args),
      "all" => self.gen_builtin_all(args),
      "reversed" => self.gen_builtin_reversed(args),
      "sorted" => self.gen_builtin_sorted(args),
      _ => self.gen_math(name, args),
    }
  }

  /// `ldrex`/`strex` retry loops (spec §4.4.2 atomics). `load`/`store` need
  /// no retry; the read-modify-write family (`add`/`sub`/`or`/`and`/`xor`)
  /// and `cmpxchg` do.
  fn gen_atomic(&mut self, name: &str, sym: &str, args: &ExprList) -> Result<(), CodeGenError> {
    match name {
      "atomic_load" => {
        require_arity(name, args, 1)?;
        self.gen_expr(&args[0])?;
        self.emit("  ldrex r0, [r0]");
        Ok(())
      }
      "atomic_store" => {
        require_arity(name, args, 2)?;
        self.gen_expr(&args[0])?;
        self.emit("  push {r0}");
        self.gen_expr(&args[1])?;
        self.emit("  mov r1, r0");
        self.emit("  pop {r2}");
        self.emit("  strex r0, r1, [r2]");
        Ok(())
      }
      "atomic_cmpxchg" => {
        require_arity(name, args, 3)?;
        let retry = self.new_label("atomic_cmpxchg");
        let done = self.new_label("atomic_cmpxchg_done");
        self.gen_expr(&args[0])?;
        self.emit("  push {r0}");
        self.gen_expr(&args[1])?;
        self.emit("  push {r0}");
        self.gen_expr(&args[2])?;
        self.emit("  mov r3, r0");
        self.emit("  pop {r1}");
        self.emit("  pop {r2}");
        self.emit(format!("{retry}:"));
        self.emit("  ldrex r0, [r2]");
        self.emit("  cmp r0, r1");
        self.emit(format!("  bne {done}"));
        self.emit("  strex r4, r3, [r2]");
        self.emit(format!("  cbnz r4, {retry}"));
        self.emit(format!("{done}:"));
        Ok(())
      }
      _ => {
        require_arity(name, args, 2)?;
        let op = match name {
          "atomic_add" => "add", "atomic_sub" => "sub",
          "atomic_or" => "orr", "atomic_and" => "and", "atomic_xor" => "eor",
          _ => unreachable!("covered by runtime::atomic_symbol"),
        };
        let _ = sym;
        let retry = self.new_label(name);
        self.gen_expr(&args[0])?;
        self.emit("  push {r0}");
        self.gen_expr(&args[1])?;
        self.emit("  mov r1, r0");
        self.emit("  pop {r2}");
        self.emit(format!("{retry}:"));
        self.emit("  ldrex r0, [r2]");
        self.emit(format!("  {op} r3, r0, r1"));
        self.emit("  strex r4, r3, [r2]");
        self.emit(format!("  cbnz r4, {retry}"));
        Ok(())
      }
    }
  }

  fn gen_bitop(&mut self, name: &str, args: &ExprList) -> Result<(), CodeGenError> {
    match name {
      "bit_set" | "bit_clear" | "bit_toggle" | "bit_test" => {
        require_arity(name, args, 2)?;
        self.gen_expr(&args[0])?;
        self.emit("  push {r0}");
        self.gen_expr(&args[1])?;
        self.emit("  movs r1, #1");
        self.emit("  lsl r1, r1, r0");
        self.emit("  pop {r0}");
        match name {
          "bit_set" => self.emit("  orr r0, r0, r1"),
          "bit_clear" => self.emit("  bic r0, r0, r1"),
          "bit_toggle" => self.emit("  eor r0, r0, r1"),
          "bit_test" => {
            self.emit("  tst r0, r1");
            self.emit("  ite ne");
            self.emit("  movne r0, #1");
            self.emit("  moveq r0, #0");
          }
          _ => unreachable!(),
        }
        Ok(())
      }
      "bits_get" => {
        require_arity(name, args, 3)?;
        self.gen_expr(&args[0])?;
        self.emit("  push {r0}");
        self.gen_expr(&args[1])?;
        self.emit("  push {r0}");
        self.gen_expr(&args[2])?;
        self.emit("  mov r2, r0");
        self.emit("  pop {r1}");
        self.emit("  pop {r0}");
        self.emit("  lsr r0, r0, r1");
        self.emit("  movs r3, #1");
        self.emit("  lsl r3, r3, r2");
        self.emit("  subs r3, r3, #1");
        self.emit("  and r0, r0, r3");
        Ok(())
      }
      "bits_set" => {
        require_arity(name, args, 4)?;
        self.gen_expr(&args[0])?;
        self.emit("  push {r0}");
        self.gen_expr(&args[1])?;
        self.emit("  push {r0}");
        self.gen_expr(&args[2])?;
        self.emit("  push {r0}");
        self.gen_expr(&args[3])?;
        self.emit("  mov r3, r0");
        self.emit("  pop {r2}");
        self.emit("  pop {r1}");
        self.emit("  pop {r0}");
        self.emit("  push {r4, r5}");
        self.emit("  movs r4, #1");
        self.emit("  lsl r4, r4, r3");
        self.emit("  subs r4, r4, #1");
        self.emit("  and r1, r1, r4");
        self.emit("  lsl r4, r4, r2");
        self.emit("  bic r0, r0, r4");
        self.emit("  lsl r1, r1, r2");
        self.emit("  orr r0, r0, r1");
        self.emit("  pop {r4, r5}");
        Ok(())
      }
      "clz" | "rbit" | "rev" | "rev16" => {
        require_arity(name, args, 1)?;
        self.gen_expr(&args[0])?;
        self.emit(format!("  {name} r0, r0"));
        Ok(())
      }
      _ => unreachable!("covered by BITOPS"),
    }
  }

  fn gen_math(&mut self, name: &str, args: &ExprList) -> Result<(), CodeGenError> {
    let sym = runtime::math_symbol(name)
      .ok_or_else(|| CodeGenError::new(format!("'{name}' is not a recognised builtin")))?;
    match name {
      "sqrt" => { require_arity(name, args, 1)?; self.gen_expr(&args[0])?; self.emit(format!("  bl {sym}")); }
      "sign" => { require_arity(name, args, 1)?; self.gen_expr(&args[0])?; self.emit(format!("  bl {sym}")); }
      "rand" => { self.emit(format!("  bl {sym}")); }
      "srand" => { require_arity(name, args, 1)?; self.gen_expr(&args[0])?; self.emit(format!("  bl {sym}")); }
      "pow" | "gcd" | "lcm" | "randint" => {
        require_arity(name, args, 2)?;
        self.gen_expr(&args[1])?;
        self.emit("  push {r0}");
        self.gen_expr(&args[0])?;
        self.emit("  pop {r1}");
        self.emit(format!("  bl {sym}"));
      }
      "clamp" => {
        require_arity(name, args, 3)?;
        self.gen_expr(&args[2])?;
        self.emit("  push {r0}");
        self.gen_expr(&args[1])?;
        self.emit("  push {r0}");
        self.gen_expr(&args[0])?;
        self.emit("  pop {r1}");
        self.emit("  pop {r2}");
        self.emit(format!("  bl {sym}"));
      }
      "sin" | "cos" | "tan" => { require_arity(name, args, 1)?; self.gen_expr(&args[0])?; self.emit(format!("  bl {sym}")); }
      "distance" => {
        require_arity(name, args, 4)?;
        self.gen_expr(&args[3])?;
        self.emit("  push {r0}");
        self.gen_expr(&args[2])?;
        self.emit("  push {r0}");
        self.gen_expr(&args[1])?;
        self.emit("  push {r0}");
        self.gen_expr(&args[0])?;
        self.emit("  pop {r1}");
        self.emit("  pop {r2}");
        self.emit("  pop {r3}");
        self.emit(format!("  bl {sym}"));
      }
      _ => unreachable!("covered by MATH"),
    }
    Ok(())
  }

  fn gen_builtin_print(&mut self, args: &ExprList, kwargs: &[(Symbol, Expr)]) -> Result<(), CodeGenError> {
    let sep = kwargs.iter().find(|(k, _)| crate::symbol::resolve(*k) == "sep")
      .and_then(|(_, v)| Self::literal_str(v)).unwrap_or_else(|| " ".to_string());
    let end = kwargs.iter().find(|(k, _)| crate::symbol::resolve(*k) == "end")
      .and_then(|(_, v)| Self::literal_str(v)).unwrap_or_else(|| "\n".to_string());

    for (i, arg) in args.iter().enumerate() {
      if i > 0 && !sep.is_empty() { self.emit_print_literal_segment(&sep); }
      match &arg.kind {
        ExprKind::Str(s) => self.emit_print_str_literal(s),
        ExprKind::FString(s) => self.gen_fstring_print(s)?,
        ExprKind::Char(c) => { self.emit(format!("  movs r0, #{}", *c as u32)); self.emit(format!("  bl {}", runtime::UART_PUTC)); }
        ExprKind::Bool(b) => {
          let label = self.intern_string(if *b { "True" } else { "False" });
          self.emit(format!("  ldr r0, ={label}"));
          self.emit(format!("  bl {}", runtime::PRINT_STR));
        }
        _ => {
          self.gen_expr(arg)?;
          let ty = self.expr_type(arg);
          self.emit_print_for_type(ty.as_ref());
        }
      }
    }
    if !end.is_empty() { self.emit_print_literal_segment(&end); }
    Ok(())
  }

  fn emit_print_literal_segment(&mut self, s: &str) {
    if s.chars().count() == 1 {
      let c = s.chars().next().expect("checked count == 1");
      self.emit(format!("  movs r0, #{}", c as u32));
      self.emit(format!("  bl {}", runtime::UART_PUTC));
    } else {
      self.emit_print_str_literal(s);
    }
  }

  fn gen_builtin_len(&mut self, args: &ExprList) -> Result<(), CodeGenError> {
    require_arity("len", args, 1)?;
    let arg = &args[0];
    if let ExprKind::Str(s) = &arg.kind {
      self.emit(format!("  movs r0, #{}", s.len()));
      return Ok(());
    }
    if let Some(len) = self.static_array_len(arg) {
      self.load_int_literal(i64::from(len));
      return Ok(());
    }
    self.gen_expr(arg)?;
    self.emit(format!("  bl {}", runtime::PYNUX_STRLEN));
    Ok(())
  }

  fn gen_builtin_abs(&mut self, args: &ExprList) -> Result<(), CodeGenError> {
    require_arity("abs", args, 1)?;
    self.gen_expr(&args[0])?;
    self.emit("  cmp r0, #0");
    self.emit("  it lt");
    self.emit("  rsblt r0, r0, #0");
    Ok(())
  }

  fn gen_builtin_min(&mut self, args: &ExprList) -> Result<(), CodeGenError> {
    if args.len() < 2 { return Err(CodeGenError::new("min() takes at least 2 arguments")) }
    self.gen_expr(&args[0])?;
    for arg in &args[1..] {
      self.emit("  push {r0}");
      self.gen_expr(arg)?;
      self.emit("  pop {r1}");
      self.emit("  cmp r0, r1");
      self.emit("  it ge");
      self.emit("  movge r0, r1");
    }
    Ok(())
  }

  fn gen_builtin_max(&mut self, args: &ExprList) -> Result<(), CodeGenError> {
    if args.len() < 2 { return Err(CodeGenError::new("max() takes at least 2 arguments")) }
    self.gen_expr(&args[0])?;
    for arg in &args[1..] {
      self.emit("  push {r0}");
      self.gen_expr(arg)?;
      self.emit("  pop {r1}");
      self.emit("  cmp r0, r1");
      self.emit("  it le");
      self.emit("  movle r0, r1");
    }
    Ok(())
  }

  fn gen_builtin_ord(&mut self, args: &ExprList) -> Result<(), CodeGenError> {
    require_arity("ord", args, 1)?;
    match &args[0].kind {
      ExprKind::Char(c) => { self.emit(format!("  movs r0, #{}", *c as u32)); }
      ExprKind::Str(s) if s.chars().count() == 1 => {
        let c = s.chars().next().expect("checked count == 1");
        self.emit(format!("  movs r0, #{}", c as u32));
      }
      _ => {
        self.gen_expr(&args[0])?;
        self.emit("  ldrb r0, [r0]");
      }
    }
    Ok(())
  }

  fn gen_builtin_chr(&mut self, args: &ExprList) -> Result<(), CodeGenError> {
    require_arity("chr", args, 1)?;
    self.gen_expr(&args[0])
  }

  fn gen_builtin_input(&mut self, args: &ExprList) -> Result<(), CodeGenError> {
    if let Some(prompt) = args.first() {
      self.gen_expr(prompt)?;
      self.emit(format!("  bl {}", runtime::PRINT_STR));
    }
    self.emit("  movs r0, #128");
    self.emit("  bl malloc");
    self.emit("  push {r0}");
    self.emit(format!("  bl {}", runtime::PYNUX_READ_LINE));
    self.emit("  pop {r0}");
    Ok(())
  }

  /// Shared prelude for the array-reduction builtins (`sum`/`any`/`all`/
  /// `reversed`/`sorted`): resolve `arg`'s static array length and element
  /// size, or fail — these builtins require a statically-sized array (spec
  /// §4.4.6).
  fn require_static_array(&self, builtin: &str, arg: &Expr) -> Result<(u32, u32), CodeGenError> {
    let len = self.static_array_len(arg)
      .ok_or_else(|| CodeGenError::new(format!("{builtin}() requires an array with known size")))?;
    Ok((len, self.element_size(arg)))
  }

  fn emit_load_elem(&mut self, reg: &str, base_reg: &str, elem_size: u32) {
    let instr = match elem_size { 1 => "ldrb", 2 => "ldrh", _ => "ldr" };
    self.emit(format!("  {instr} {reg}, [{base_reg}]"));
  }

  fn gen_builtin_sum(&mut self, args: &ExprList) -> Result<(), CodeGenError> {
    if args.is_empty() { return Err(CodeGenError::new("sum() takes at least 1 argument")) }
    let (size, elem_size) = self.require_static_array("sum", &args[0])?;
    self.gen_expr(&args[0])?;
    self.emit("  push {r4, r5, r6}");
    self.emit("  mov r4, r0");
    self.emit("  movs r5, #0");
    self.load_counter("r6", size);
    let loop_label = self.new_label("sum_loop");
    let done_label = self.new_label("sum_done");
    self.emit(format!("{loop_label}:"));
    self.emit("  cmp r6, #0");
    self.emit(format!("  beq {done_label}"));
    self.emit_load_elem("r0", "r4", elem_size);
    self.emit("  add r5, r5, r0");
    self.emit(format!("  add r4, r4, #{elem_size}"));
    self.emit("  sub r6, r6, #1");
    self.emit(format!("  b {loop_label}"));
    self.emit(format!("{done_label}:"));
    self.emit("  mov r0, r5");
    self.emit("  pop {r4, r5, r6}");
    Ok(())
  }

  fn gen_builtin_any(&mut self, args: &ExprList) -> Result<(), CodeGenError> {
    require_arity("any", args, 1)?;
    let (size, elem_size) = self.require_static_array("any", &args[0])?;
    self.gen_expr(&args[0])?;
    self.emit("  push {r4, r6}");
    self.emit("  mov r4, r0");
    self.load_counter("r6", size);
    let loop_label = self.new_label("any_loop");
    let found_label = self.new_label("any_found");
    let end_label = self.new_label("any_end");
    self.emit(format!("{loop_label}:"));
    self.emit("  cmp r6, #0");
    self.emit(format!("  beq {found_label}_none"));
    self.emit_load_elem("r0", "r4", elem_size);
    self.emit("  cmp r0, #0");
    self.emit(format!("  bne {found_label}"));
    self.emit(format!("  add r4, r4, #{elem_size}"));
    self.emit("  sub r6, r6, #1");
    self.emit(format!("  b {loop_label}"));
    self.emit(format!("{found_label}:"));
    self.emit("  movs r0, #1");
    self.emit(format!("  b {end_label}"));
    self.emit(format!("{found_label}_none:"));
    self.emit("  movs r0, #0");
    self.emit(format!("{end_label}:"));
    self.emit("  pop {r4, r6}");
    Ok(())
  }

  fn gen_builtin_all(&mut self, args: &ExprList) -> Result<(), CodeGenError> {
    require_arity("all", args, 1)?;
    let (size, elem_size) = self.require_static_array("all", &args[0])?;
    self.gen_expr(&args[0])?;
    self.emit("  push {r4, r6}");
    self.emit("  mov r4, r0");
    self.load_counter("r6", size);
    let loop_label = self.new_label("all_loop");
    let false_label = self.new_label("all_false");
    let end_label = self.new_label("all_end");
    self.emit(format!("{loop_label}:"));
    self.emit("  cmp r6, #0");
    self.emit(format!("  beq {false_label}_none"));
    self.emit_load_elem("r0", "r4", elem_size);
    self.emit("  cmp r0, #0");
    self.emit(format!("  beq {false_label}"));
    self.emit(format!("  add r4, r4, #{elem_size}"));
    self.emit("  sub r6, r6, #1");
    self.emit(format!("  b {loop_label}"));
    self.emit(format!("{false_label}:"));
    self.emit("  movs r0, #0");
    self.emit(format!("  b {end_label}"));
    self.emit(format!("{false_label}_none:"));
    self.emit("  movs r0, #1");
    self.emit(format!("{end_label}:"));
    self.emit("  pop {r4, r6}");
    Ok(())
  }

  fn gen_builtin_reversed(&mut self, args: &ExprList) -> Result<(), CodeGenError> {
    require_arity("reversed", args, 1)?;
    let (size, elem_size) = self.require_static_array("reversed", &args[0])?;
    self.gen_expr(&args[0])?;
    self.emit("  push {r4, r5}");
    self.emit("  mov r4, r0");
    self.emit(format!("  add r5, r4, #{}", (size.saturating_sub(1)) * elem_size));
    let loop_label = self.new_label("rev_loop");
    let done_label = self.new_label("rev_done");
    self.emit(format!("{loop_label}:"));
    self.emit("  cmp r4, r5");
    self.emit(format!("  bge {done_label}"));
    let (load, store) = match elem_size { 1 => ("ldrb", "strb"), 2 => ("ldrh", "strh"), _ => ("ldr", "str") };
    self.emit(format!("  {load} r0, [r4]"));
    self.emit(format!("  {load} r1, [r5]"));
    self.emit(format!("  {store} r1, [r4]"));
    self.emit(format!("  {store} r0, [r5]"));
    self.emit(format!("  add r4, r4, #{elem_size}"));
    self.emit(format!("  sub r5, r5, #{elem_size}"));
    self.emit(format!("  b {loop_label}"));
    self.emit(format!("{done_label}:"));
    self.emit("  pop {r4, r5}");
    self.gen_expr(&args[0])
  }

  /// Insertion sort, in-place, `int32`-element arrays only (matches the
  /// source's restriction). Uses `r8`/`r9`/`r10` as scratch instead of the
  /// source's `r7`, which this generator reserves as the frame pointer
  /// (spec §6.4) — using it here would corrupt every local access for the
  /// rest of the enclosing function.
  fn gen_builtin_sorted(&mut self, args: &ExprList) -> Result<(), CodeGenError> {
    require_arity("sorted", args, 1)?;
    let (size, elem_size) = self.require_static_array("sorted", &args[0])?;
    if elem_size != 4 {
      tracing::warn!(elem_size, "sorted() only supports int32 arrays; returning input unchanged");
      return self.gen_expr(&args[0]);
    }
    self.gen_expr(&args[0])?;
    self.emit("  push {r4, r5, r6, r8, r9, r10}");
    self.emit("  mov r4, r0");
    self.emit(format!("  movs r5, #{size}"));
    self.emit("  movs r6, #1");
    let outer = self.new_label("sort_outer");
    let inner = self.new_label("sort_inner");
    let inner_done = self.new_label("sort_inner_done");
    let done = self.new_label("sort_done");
    self.emit(format!("{outer}:"));
    self.emit("  cmp r6, r5");
    self.emit(format!("  bge {done}"));
    self.emit("  lsl r0, r6, #2");
    self.emit("  ldr r8, [r4, r0]");
    self.emit("  sub r9, r6, #1");
    self.emit(format!("{inner}:"));
    self.emit("  cmp r9, #0");
    self.emit(format!("  blt {inner_done}"));
    self.emit("  lsl r0, r9, #2");
    self.emit("  ldr r10, [r4, r0]");
    self.emit("  cmp r10, r8");
    self.emit(format!("  ble {inner_done}"));
    self.emit("  add r0, r9, #1");
    self.emit("  lsl r0, r0, #2");
    self.emit("  str r10, [r4, r0]");
    self.emit("  sub r9, r9, #1");
    self.emit(format!("  b {inner}"));
    self.emit(format!("{inner_done}:"));
    self.emit("  add r0, r9, #1");
    self.emit("  lsl r0, r0, #2");
    self.emit("  str r8, [r4, r0]");
    self.emit("  add r6, r6, #1");
    self.emit(format!("  b {outer}"));
    self.emit(format!("{done}:"));
    self.emit("  mov r0, r4");
    self.emit("  pop {r4, r5, r6, r8, r9, r10}");
    Ok(())
  }

  fn load_counter(&mut self, reg: &str, n: u32) {
    if n < 256 { self.emit(format!("  movs {reg}, #{n}")); }
    else { self.emit(format!("  movw {reg}, #{n}")); }
  }
}

fn require_arity(name: &str, args: &ExprList, n: usize) -> Result<(), CodeGenError> {
  if args.len() == n { Ok(()) } else { Err(CodeGenError::new(format!("{name}() takes exactly {n} argument(s)"))) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn is_builtin_name_covers_every_category() {
    assert!(is_builtin_name("dmb"));
    assert!(is_builtin_name("atomic_add"));
    assert!(is_builtin_name("critical_enter"));
    assert!(is_builtin_name("bit_set"));
    assert!(is_builtin_name("print"));
    assert!(is_builtin_name("sqrt"));
    assert!(!is_builtin_name("not_a_builtin"));
  }

  #[test]
  fn require_arity_rejects_wrong_count() {
    let args = ExprList::new();
    assert!(require_arity("len", &args, 1).is_err());
    assert!(require_arity("len", &args, 0).is_ok());
  }
}

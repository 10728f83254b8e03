//! AST to ARM Thumb-2 code generation (spec §4.4).
//!
//! Single pass, no intermediate representation: every lowering routine
//! writes assembly text lines directly into the generator's output vector
//! (spec §9 "strings as the single IR"). State that the original source
//! kept on module-level collections instead lives as named fields of this
//! one owning [`CodeGen`] value.

mod builtins;
mod decl;
mod expr;
pub mod runtime;
mod stmt;

use hashbrown::HashMap;
use tracing::debug;

use crate::ast::Program;
use crate::diagnostics::CodeGenError;
use crate::entity::{Environment, FunctionEnv, PendingLambda};
use crate::symbol::resolve;

/// List comprehensions preallocate a fixed-capacity buffer rather than
/// growing dynamically (§9.5); longer comprehensions silently overrun this
/// cap at runtime unless the bound is statically known to exceed it, in
/// which case [`CodeGen::gen_list_comprehension`] warns at compile time.
pub const LIST_COMPREHENSION_CAP: u32 = 256;

/// Emit a `.ltorg` every this many `elif` branches in one `If` chain, so
/// `ldr rX, =...` instructions in later branches stay within PC-relative
/// range (spec §4.4.5).
const LTORG_ELIF_PERIOD: usize = 10;

pub struct CodeGen {
  pub(super) env: Environment,
  out: Vec<String>,
  data: Vec<String>,
  rodata: Vec<String>,
  string_labels: HashMap<String, String>,
  string_order: Vec<(String, String)>,
  string_counter: u32,
  pending_lambdas: Vec<PendingLambda>,
  lambda_counter: u32,
  fenv: Option<FunctionEnv>,
  label_prefix: String,
}

impl Default for CodeGen {
  fn default() -> Self { Self::new() }
}

impl CodeGen {
  #[must_use] pub fn new() -> Self {
    Self {
      env: Environment::new(),
      out: Vec::new(),
      data: Vec::new(),
      rodata: Vec::new(),
      string_labels: HashMap::new(),
      string_order: Vec::new(),
      string_counter: 0,
      pending_lambdas: Vec::new(),
      lambda_counter: 0,
      fenv: None,
      label_prefix: String::new(),
    }
  }

  pub(super) fn emit(&mut self, line: impl Into<String>) { self.out.push(line.into()); }
  pub(super) fn out_len(&self) -> usize { self.out.len() }
  pub(super) fn patch(&mut self, index: usize, line: String) { self.out[index] = line; }
  pub(super) fn emit_data(&mut self, line: impl Into<String>) { self.data.push(line.into()); }
  pub(super) fn emit_rodata(&mut self, line: impl Into<String>) { self.rodata.push(line.into()); }

  pub(super) fn fenv(&mut self) -> &mut FunctionEnv {
    self.fenv.as_mut().expect("gen_expr/gen_stmt called outside a function body")
  }

  /// A per-function label: `.<tag>_<func>_<n>` (spec §4.4.5).
  pub(super) fn new_label(&mut self, tag: &str) -> String {
    let n = self.fenv().new_label();
    format!(".{tag}_{}_{n}", self.label_prefix)
  }

  /// Intern a string literal, returning its stable `.str_N` label
  /// (deduplicated by content, spec §3.8).
  pub(super) fn intern_string(&mut self, content: &str) -> String {
    if let Some(label) = self.string_labels.get(content) { return label.clone() }
    let label = format!(".str_{}", self.string_counter);
    self.string_counter += 1;
    self.string_labels.insert(content.to_string(), label.clone());
    self.string_order.push((label.clone(), content.to_string()));
    debug!(label = %label, "interned new string literal");
    label
  }

  pub(super) fn queue_lambda(&mut self, params: smallvec::SmallVec<[crate::symbol::Symbol; 4]>, body: Box<crate::ast::Expr>) -> String {
    let label = format!("__lambda_{}", self.lambda_counter);
    self.lambda_counter += 1;
    self.pending_lambdas.push(PendingLambda { label: label.clone(), params, body });
    label
  }

  /// Escape a string literal's bytes the way `.rodata` emission requires:
  /// printable ASCII passes through, everything else becomes `\NNN` octal.
  fn escape_asciz(content: &str) -> String {
    let mut out = String::new();
    for byte in content.bytes() {
      match byte {
        b'"' => out.push_str("\\\""),
        b'\\' => out.push_str("\\\\"),
        0x20..=0x7e => out.push(byte as char),
        _ => out.push_str(&format!("\\{byte:03o}")),
      }
    }
    out
  }

  fn emit_rodata_section(&mut self) {
    let entries = std::mem::take(&mut self.string_order);
    for (label, content) in entries {
      self.emit_rodata(format!("{label}:"));
      self.emit_rodata(format!("  .asciz \"{}\"", Self::escape_asciz(&content)));
    }
  }

  fn gen_program(&mut self, program: &Program) -> Result<(), CodeGenError> {
    self.collect_declarations(program)?;

    for decl in &program.declarations {
      match &decl.kind {
        crate::ast::DeclKind::Function(f) => self.gen_function(f, None)?,
        crate::ast::DeclKind::Class(c) => self.gen_class(c)?,
        _ => {}
      }
    }
    self.flush_pending_lambdas()?;
    self.emit_data_section(program);
    self.emit_rodata_section();
    Ok(())
  }

  fn finish(self) -> String {
    let mut buf = String::from(".syntax unified\n.cpu cortex-m3\n.thumb\n\n.text\n");
    for line in &self.out { buf.push_str(line); buf.push('\n'); }
    buf.push_str("\n.data\n");
    for line in &self.data { buf.push_str(line); buf.push('\n'); }
    buf.push_str("\n.rodata\n");
    for line in &self.rodata { buf.push_str(line); buf.push('\n'); }
    buf
  }
}

/// `generate(program) -> assembly text` (spec §4.4 top-level contract).
pub fn generate(program: &Program) -> Result<String, CodeGenError> {
  let mut cg = CodeGen::new();
  cg.gen_program(program)?;
  let name_count = program.declarations.len();
  debug!(declarations = name_count, "code generation complete");
  Ok(cg.finish())
}

#[must_use] pub(super) fn decorator_named(decorators: &[crate::symbol::Symbol], name: &str) -> bool {
  decorators.iter().any(|d| resolve(*d) == name)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn escapes_non_printable_bytes_as_octal() {
    assert_eq!(CodeGen::escape_asciz("a\nb"), "a\\012b");
  }

  #[test]
  fn string_interning_deduplicates_by_content() {
    let mut cg = CodeGen::new();
    let a = cg.intern_string("hello");
    let b = cg.intern_string("hello");
    let c = cg.intern_string("world");
    assert_eq!(a, b);
    assert_ne!(a, c);
  }
}

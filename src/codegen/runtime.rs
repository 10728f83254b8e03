//! Glossary of runtime symbols the generator emits calls to (spec §6.3,
//! GLOSSARY). The runtime itself — startup, UART, heap, string/list/dict
//! helpers — is an external collaborator; this module only fixes the names
//! and the AAPCS convention used to call them.

pub const PRINT_STR: &str = "print_str";
pub const PRINT_INT: &str = "print_int";
pub const UART_PUTC: &str = "uart_putc";

pub const AEABI_IDIV: &str = "__aeabi_idiv";
pub const AEABI_IDIVMOD: &str = "__aeabi_idivmod";
pub const PYNUX_POW: &str = "__pynux_pow";
pub const PYNUX_IN: &str = "__pynux_in";
pub const PYNUX_SLICE: &str = "__pynux_slice";
pub const PYNUX_STRLEN: &str = "__pynux_strlen";

pub const PYNUX_DICT_GET_INT: &str = "__pynux_dict_get_int";
pub const PYNUX_DICT_GET_STR: &str = "__pynux_dict_get_str";

pub const PYNUX_ASSERT_FAIL: &str = "__pynux_assert_fail";
pub const PYNUX_ASSERT_FAIL_MSG: &str = "__pynux_assert_fail_msg";
pub const PYNUX_RAISE: &str = "__pynux_raise";
pub const PYNUX_RERAISE: &str = "__pynux_reraise";

pub const PYNUX_CONTEXT_ENTER: &str = "__pynux_context_enter";
pub const PYNUX_CONTEXT_EXIT: &str = "__pynux_context_exit";

pub const PYNUX_READ_LINE: &str = "__pynux_read_line";

/// String methods dispatch to `__pynux_str_*`, except `count`/`index`, which
/// the original source maps to bare `str_count`/`str_index` symbols — an
/// inconsistent naming the rewrite preserves rather than "fixes" (§9, treat
/// as an open question to preserve, not a bug to correct).
#[must_use] pub fn str_method_symbol(method: &str) -> Option<&'static str> {
  Some(match method {
    "upper" => "__pynux_str_upper",
    "lower" => "__pynux_str_lower",
    "strip" => "__pynux_str_strip",
    "lstrip" => "__pynux_str_lstrip",
    "rstrip" => "__pynux_str_rstrip",
    "startswith" => "__pynux_str_startswith",
    "endswith" => "__pynux_str_endswith",
    "find" => "__pynux_str_find",
    "replace" => "__pynux_str_replace",
    "split" => "__pynux_str_split",
    "join" => "__pynux_str_join",
    "isdigit" => "__pynux_str_isdigit",
    "isalpha" => "__pynux_str_isalpha",
    "count" => "str_count",
    "index" => "str_index",
    _ => return None,
  })
}

/// Low-level builtins with no argument-evaluation beyond their call (spec
/// §4.4.2's "fixed set of low-level built-ins").
#[must_use] pub fn is_barrier(name: &str) -> bool {
  matches!(name, "dmb" | "dsb" | "isb" | "wfi" | "wfe" | "sev" | "clrex")
}

#[must_use] pub fn atomic_symbol(name: &str) -> Option<&'static str> {
  Some(match name {
    "atomic_load" => "__pynux_atomic_load",
    "atomic_store" => "__pynux_atomic_store",
    "atomic_add" => "__pynux_atomic_add",
    "atomic_sub" => "__pynux_atomic_sub",
    "atomic_cmpxchg" => "__pynux_atomic_cmpxchg",
    "atomic_or" => "__pynux_atomic_or",
    "atomic_and" => "__pynux_atomic_and",
    "atomic_xor" => "__pynux_atomic_xor",
    _ => return None,
  })
}

/// Maps a surface builtin name to the `lib/math`-style runtime symbol it
/// lowers to. `abs`/`min`/`max` are deliberately absent: those names are
/// claimed earlier in the dispatch order by the general-purpose builtins
/// (spec §4.4.2), so a math-specific `abs`/`min`/`max` branch is never
/// reached — the same precedence the source gives them.
#[must_use] pub fn math_symbol(name: &str) -> Option<&'static str> {
  Some(match name {
    "sqrt" => "isqrt",
    "pow" => "pow_int",
    "clamp" => "clamp",
    "sign" => "sign",
    "gcd" => "gcd",
    "lcm" => "lcm",
    "sin" => "sin_deg",
    "cos" => "cos_deg",
    "tan" => "tan_deg",
    "rand" => "rand",
    "randint" => "rand_range",
    "srand" => "srand",
    "distance" => "distance",
    _ => return None,
  })
}

/// `free` is a bump-allocator no-op in the runtime (§9.2); deallocation
/// contracts here are advisory only. Kept as a named constant so call sites
/// read as a deliberate choice rather than a missing case.
pub const PYNUX_FREE_IS_NOOP: &str = "free";

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn str_method_symbol_preserves_source_inconsistency() {
    assert_eq!(str_method_symbol("upper"), Some("__pynux_str_upper"));
    assert_eq!(str_method_symbol("count"), Some("str_count"));
    assert_eq!(str_method_symbol("index"), Some("str_index"));
    assert_eq!(str_method_symbol("nonexistent"), None);
  }

  #[test]
  fn math_symbol_excludes_general_purpose_names() {
    assert_eq!(math_symbol("abs"), None);
    assert_eq!(math_symbol("min"), None);
    assert_eq!(math_symbol("max"), None);
    assert_eq!(math_symbol("sqrt"), Some("isqrt"));
    assert_eq!(math_symbol("pow"), Some("pow_int"));
  }

  #[test]
  fn atomic_symbol_covers_every_atomic_name() {
    for name in ["atomic_load", "atomic_store", "atomic_add", "atomic_sub", "atomic_cmpxchg", "atomic_or", "atomic_and", "atomic_xor"] {
      assert!(atomic_symbol(name).is_some(), "{name} should resolve to a runtime symbol");
    }
    assert_eq!(atomic_symbol("not_atomic"), None);
  }

  #[test]
  fn is_barrier_matches_the_fixed_set() {
    assert!(is_barrier("dmb"));
    assert!(is_barrier("wfi"));
    assert!(!is_barrier("atomic_load"));
  }
}

//! Type expressions: the vocabulary of `int32`, `Ptr[T]`, `Array[N, T]`,
//! `List[T]`, `Dict[K, V]`, `Tuple[...]`, and `Optional[T]`.

use crate::span::Span;

/// The shape of a type expression, independent of where it appeared.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
  /// A named scalar or class type: `int32`, `bool`, `str`, `MyClass`.
  Named(String),
  Pointer(Box<Type>),
  Array { size: u32, element: Box<Type> },
  List(Box<Type>),
  Dict { key: Box<Type>, value: Box<Type> },
  Tuple(Vec<Type>),
  Optional(Box<Type>),
  /// A function pointer type, `Func[[params...], ret]`; same 4-byte size
  /// as `Pointer` at layout time (§3.3), distinguished only so indirect
  /// calls through a typed local get a parameter/return shape to check.
  FunctionPointer { params: Vec<Type>, ret: Box<Type> },
  /// An unbound generic type parameter, e.g. `T` in a generic function.
  Generic { name: String, constraints: Vec<String> },
}

/// A type expression: every node in the AST carries a span, types included.
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
  pub kind: TypeKind,
  pub span: Span,
}

impl Type {
  #[must_use] pub fn new(kind: TypeKind, span: Span) -> Self { Self { kind, span } }

  /// The canonical display name, matching the original's `Type.name`
  /// properties (`Ptr[int32]`, `Array[4, uint8]`, ...).
  #[must_use] pub fn display_name(&self) -> String {
    match &self.kind {
      TypeKind::Named(n) => n.clone(),
      TypeKind::Pointer(inner) => format!("Ptr[{}]", inner.display_name()),
      TypeKind::Array { size, element } => format!("Array[{size}, {}]", element.display_name()),
      TypeKind::List(inner) => format!("List[{}]", inner.display_name()),
      TypeKind::Dict { key, value } => format!("Dict[{}, {}]", key.display_name(), value.display_name()),
      TypeKind::Tuple(elems) => {
        let parts: Vec<_> = elems.iter().map(Type::display_name).collect();
        format!("Tuple[{}]", parts.join(", "))
      }
      TypeKind::Optional(inner) => format!("Optional[{}]", inner.display_name()),
      TypeKind::FunctionPointer { params, ret } => {
        let parts: Vec<_> = params.iter().map(Type::display_name).collect();
        format!("Func[[{}], {}]", parts.join(", "), ret.display_name())
      }
      TypeKind::Generic { name, .. } => name.clone(),
    }
  }
}

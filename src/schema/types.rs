//! Primitive type descriptors and the type-expr grammar fields are declared
//! with.

use serde::{Deserialize, Serialize};

/// A primitive type keyword. `Text`, `Bytes` and `Obj` are dynamic-length;
/// everything else is fixed-width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Bool,
    Char,
    Text,
    Bytes,
    Obj,
}

impl PrimitiveKind {
    pub fn is_dynamic(self) -> bool {
        matches!(self, PrimitiveKind::Text | PrimitiveKind::Bytes | PrimitiveKind::Obj)
    }

    /// Byte width on disk for fixed-length kinds. `None` for dynamic kinds,
    /// whose stored length is `int32 len || payload`.
    pub fn fixed_len(self) -> Option<usize> {
        match self {
            PrimitiveKind::Byte => Some(1),
            PrimitiveKind::Short => Some(2),
            PrimitiveKind::Int => Some(4),
            PrimitiveKind::Long => Some(8),
            PrimitiveKind::Float => Some(4),
            PrimitiveKind::Double => Some(8),
            PrimitiveKind::Bool => Some(1),
            PrimitiveKind::Char => Some(4),
            PrimitiveKind::Text | PrimitiveKind::Bytes | PrimitiveKind::Obj => None,
        }
    }
}

/// A field's type. One of: a primitive keyword, a named nested schema, an
/// inline field list, or `(ARRAY inner)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeExpr {
    Primitive(PrimitiveKind),
    /// Reference to another schema, resolved to a schema id at registration.
    Named(String),
    /// Embedded field list, walked inline at the enclosing address stream.
    Inline(Vec<FieldDecl>),
    Array(Box<TypeExpr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub type_expr: TypeExpr,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, type_expr: TypeExpr) -> Self {
        Self { name: name.into(), type_expr }
    }
}

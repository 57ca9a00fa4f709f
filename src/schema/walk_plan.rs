//! Precompiled schema walk plans.
//!
//! A walk plan is computed once, when a schema is registered, and reused by
//! every subsequent encode/decode. It replaces re-deriving field offsets
//! from the schema's field list (and the reflection that would require) with
//! a flat, cache-friendly opcode sequence per design: `FIELD(kind)`,
//! `ARRAY_BEGIN`/`ARRAY_END`, `SUB_SCHEMA(id)`, `INLINE_BEGIN`/`INLINE_END`.
//! Nested arrays and inline field lists carry their own sub-plans, computed
//! by the same compiler, so the whole thing is built bottom-up once.

use super::types::{FieldDecl, PrimitiveKind, TypeExpr};
use crate::error::Result;

/// One opcode in a schema's top-level (or inline) field list.
#[derive(Debug, Clone)]
pub enum Op {
    Field { name: String, kind: PrimitiveKind },
    SubSchema { name: String, schema_id: u32 },
    Inline { name: String, plan: Vec<Op> },
    Array { name: String, elem: Box<ElemPlan> },
}

impl Op {
    pub fn name(&self) -> &str {
        match self {
            Op::Field { name, .. }
            | Op::SubSchema { name, .. }
            | Op::Inline { name, .. }
            | Op::Array { name, .. } => name,
        }
    }
}

/// The plan for a single array element (unnamed — arrays have no per-element
/// field name).
#[derive(Debug, Clone)]
pub enum ElemPlan {
    Field(PrimitiveKind),
    SubSchema(u32),
    Inline(Vec<Op>),
    Array(Box<ElemPlan>),
}

/// Resolve a schema name to its id. Implemented by the schema table so the
/// compiler can stay decoupled from its storage.
pub trait SchemaIdResolver {
    fn resolve(&self, name: &str) -> Result<u32>;
}

pub fn compile_fields(fields: &[FieldDecl], resolver: &dyn SchemaIdResolver) -> Result<Vec<Op>> {
    fields.iter().map(|f| compile_field(f, resolver)).collect()
}

fn compile_field(field: &FieldDecl, resolver: &dyn SchemaIdResolver) -> Result<Op> {
    let name = field.name.clone();
    Ok(match &field.type_expr {
        TypeExpr::Primitive(kind) => Op::Field { name, kind: *kind },
        TypeExpr::Named(schema_name) => Op::SubSchema { name, schema_id: resolver.resolve(schema_name)? },
        TypeExpr::Inline(inner) => Op::Inline { name, plan: compile_fields(inner, resolver)? },
        TypeExpr::Array(inner) => Op::Array { name, elem: Box::new(compile_elem(inner, resolver)?) },
    })
}

fn compile_elem(type_expr: &TypeExpr, resolver: &dyn SchemaIdResolver) -> Result<ElemPlan> {
    Ok(match type_expr {
        TypeExpr::Primitive(kind) => ElemPlan::Field(*kind),
        TypeExpr::Named(schema_name) => ElemPlan::SubSchema(resolver.resolve(schema_name)?),
        TypeExpr::Inline(inner) => ElemPlan::Inline(compile_fields(inner, resolver)?),
        TypeExpr::Array(inner) => ElemPlan::Array(Box::new(compile_elem(inner, resolver)?)),
    })
}

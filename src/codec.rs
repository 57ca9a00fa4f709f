//! Schema-directed cell codec: encode a value map into a cell body, decode
//! it back, and support partial reads (`get_in`, `select_keys`) and pure
//! length computation over already-encoded bytes.
//!
//! All dynamic fields (`Text`, `Bytes`, `Obj`, arrays) are stored as
//! `int32 count_or_len || payload`, little-endian, per the walk plan's
//! opcode sequence.

use crate::error::{NebError, Result};
use crate::schema::types::PrimitiveKind;
use crate::schema::walk_plan::{ElemPlan, Op};
use crate::schema::{Schema, SchemaTable};
use crate::value::{CellMap, CellValue};

// ── Encode ───────────────────────────────────────────────────────────

pub fn encoded_len(schemas: &SchemaTable, schema: &Schema, value: &CellMap) -> Result<usize> {
    fields_len(schemas, &schema.plan, value)
}

fn fields_len(schemas: &SchemaTable, plan: &[Op], value: &CellMap) -> Result<usize> {
    let mut total = 0;
    for op in plan {
        let v = value.get(op.name()).ok_or_else(|| missing(op.name()))?;
        total += op_len(schemas, op, v)?;
    }
    Ok(total)
}

fn op_len(schemas: &SchemaTable, op: &Op, value: &CellValue) -> Result<usize> {
    match op {
        Op::Field { kind, .. } => primitive_len(*kind, value),
        Op::SubSchema { schema_id, .. } => {
            let sub = schemas.get_by_id(*schema_id)?;
            let map = expect_map(value)?;
            fields_len(schemas, &sub.plan, map)
        }
        Op::Inline { plan, .. } => {
            let map = expect_map(value)?;
            fields_len(schemas, plan, map)
        }
        Op::Array { elem, .. } => {
            let items = expect_array(value)?;
            let mut total = 4; // int32 count
            for item in items {
                total += elem_len(schemas, elem, item)?;
            }
            Ok(total)
        }
    }
}

fn elem_len(schemas: &SchemaTable, elem: &ElemPlan, value: &CellValue) -> Result<usize> {
    match elem {
        ElemPlan::Field(kind) => primitive_len(*kind, value),
        ElemPlan::SubSchema(id) => {
            let sub = schemas.get_by_id(*id)?;
            fields_len(schemas, &sub.plan, expect_map(value)?)
        }
        ElemPlan::Inline(plan) => fields_len(schemas, plan, expect_map(value)?),
        ElemPlan::Array(inner) => {
            let items = expect_array(value)?;
            let mut total = 4;
            for item in items {
                total += elem_len(schemas, inner, item)?;
            }
            Ok(total)
        }
    }
}

fn primitive_len(kind: PrimitiveKind, value: &CellValue) -> Result<usize> {
    if let Some(fixed) = kind.fixed_len() {
        return Ok(fixed);
    }
    Ok(4 + match (kind, value) {
        (PrimitiveKind::Text, CellValue::Text(s)) => s.len(),
        (PrimitiveKind::Bytes, CellValue::Bytes(b)) => b.len(),
        (PrimitiveKind::Obj, CellValue::Obj(b)) => b.len(),
        _ => return Err(type_mismatch(kind, value)),
    })
}

pub fn encode_fields(schemas: &SchemaTable, plan: &[Op], value: &CellMap, out: &mut Vec<u8>) -> Result<()> {
    for op in plan {
        let v = value.get(op.name()).ok_or_else(|| missing(op.name()))?;
        encode_op(schemas, op, v, out)?;
    }
    Ok(())
}

fn encode_op(schemas: &SchemaTable, op: &Op, value: &CellValue, out: &mut Vec<u8>) -> Result<()> {
    match op {
        Op::Field { kind, .. } => encode_primitive(*kind, value, out),
        Op::SubSchema { schema_id, .. } => {
            let sub = schemas.get_by_id(*schema_id)?;
            encode_fields(schemas, &sub.plan, expect_map(value)?, out)
        }
        Op::Inline { plan, .. } => encode_fields(schemas, plan, expect_map(value)?, out),
        Op::Array { elem, .. } => {
            let items = expect_array(value)?;
            out.extend_from_slice(&(items.len() as u32).to_le_bytes());
            for item in items {
                encode_elem(schemas, elem, item, out)?;
            }
            Ok(())
        }
    }
}

fn encode_elem(schemas: &SchemaTable, elem: &ElemPlan, value: &CellValue, out: &mut Vec<u8>) -> Result<()> {
    match elem {
        ElemPlan::Field(kind) => encode_primitive(*kind, value, out),
        ElemPlan::SubSchema(id) => {
            let sub = schemas.get_by_id(*id)?;
            encode_fields(schemas, &sub.plan, expect_map(value)?, out)
        }
        ElemPlan::Inline(plan) => encode_fields(schemas, plan, expect_map(value)?, out),
        ElemPlan::Array(inner) => {
            let items = expect_array(value)?;
            out.extend_from_slice(&(items.len() as u32).to_le_bytes());
            for item in items {
                encode_elem(schemas, inner, item, out)?;
            }
            Ok(())
        }
    }
}

fn encode_primitive(kind: PrimitiveKind, value: &CellValue, out: &mut Vec<u8>) -> Result<()> {
    match (kind, value) {
        (PrimitiveKind::Byte, CellValue::Byte(v)) => out.push(*v as u8),
        (PrimitiveKind::Short, CellValue::Short(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (PrimitiveKind::Int, CellValue::Int(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (PrimitiveKind::Long, CellValue::Long(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (PrimitiveKind::Float, CellValue::Float(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (PrimitiveKind::Double, CellValue::Double(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (PrimitiveKind::Bool, CellValue::Bool(v)) => out.push(*v as u8),
        (PrimitiveKind::Char, CellValue::Char(v)) => out.extend_from_slice(&(*v as u32).to_le_bytes()),
        (PrimitiveKind::Text, CellValue::Text(s)) => {
            out.extend_from_slice(&(s.len() as u32).to_le_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        (PrimitiveKind::Bytes, CellValue::Bytes(b)) => {
            out.extend_from_slice(&(b.len() as u32).to_le_bytes());
            out.extend_from_slice(b);
        }
        (PrimitiveKind::Obj, CellValue::Obj(b)) => {
            out.extend_from_slice(&(b.len() as u32).to_le_bytes());
            out.extend_from_slice(b);
        }
        _ => return Err(type_mismatch(kind, value)),
    }
    Ok(())
}

// ── Decode ───────────────────────────────────────────────────────────

pub fn decode_fields(schemas: &SchemaTable, plan: &[Op], body: &[u8], pos: &mut usize) -> Result<CellMap> {
    let mut map = CellMap::new();
    for op in plan {
        let value = decode_op(schemas, op, body, pos)?;
        map.insert(op.name().to_string(), value);
    }
    Ok(map)
}

fn decode_op(schemas: &SchemaTable, op: &Op, body: &[u8], pos: &mut usize) -> Result<CellValue> {
    match op {
        Op::Field { kind, .. } => decode_primitive(*kind, body, pos),
        Op::SubSchema { schema_id, .. } => {
            let sub = schemas.get_by_id(*schema_id)?;
            Ok(CellValue::Map(decode_fields(schemas, &sub.plan, body, pos)?))
        }
        Op::Inline { plan, .. } => Ok(CellValue::Map(decode_fields(schemas, plan, body, pos)?)),
        Op::Array { elem, .. } => {
            let count = read_u32(body, pos)? as usize;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(decode_elem(schemas, elem, body, pos)?);
            }
            Ok(CellValue::Array(items))
        }
    }
}

fn decode_elem(schemas: &SchemaTable, elem: &ElemPlan, body: &[u8], pos: &mut usize) -> Result<CellValue> {
    match elem {
        ElemPlan::Field(kind) => decode_primitive(*kind, body, pos),
        ElemPlan::SubSchema(id) => {
            let sub = schemas.get_by_id(*id)?;
            Ok(CellValue::Map(decode_fields(schemas, &sub.plan, body, pos)?))
        }
        ElemPlan::Inline(plan) => Ok(CellValue::Map(decode_fields(schemas, plan, body, pos)?)),
        ElemPlan::Array(inner) => {
            let count = read_u32(body, pos)? as usize;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(decode_elem(schemas, inner, body, pos)?);
            }
            Ok(CellValue::Array(items))
        }
    }
}

fn decode_primitive(kind: PrimitiveKind, body: &[u8], pos: &mut usize) -> Result<CellValue> {
    Ok(match kind {
        PrimitiveKind::Byte => CellValue::Byte(read_bytes::<1>(body, pos)?[0] as i8),
        PrimitiveKind::Short => CellValue::Short(i16::from_le_bytes(read_bytes(body, pos)?)),
        PrimitiveKind::Int => CellValue::Int(i32::from_le_bytes(read_bytes(body, pos)?)),
        PrimitiveKind::Long => CellValue::Long(i64::from_le_bytes(read_bytes(body, pos)?)),
        PrimitiveKind::Float => CellValue::Float(f32::from_le_bytes(read_bytes(body, pos)?)),
        PrimitiveKind::Double => CellValue::Double(f64::from_le_bytes(read_bytes(body, pos)?)),
        PrimitiveKind::Bool => CellValue::Bool(read_bytes::<1>(body, pos)?[0] != 0),
        PrimitiveKind::Char => {
            let code = u32::from_le_bytes(read_bytes(body, pos)?);
            CellValue::Char(char::from_u32(code).ok_or_else(|| NebError::Codec(format!("invalid char codepoint {code}")))?)
        }
        PrimitiveKind::Text => {
            let len = read_u32(body, pos)? as usize;
            let bytes = read_slice(body, pos, len)?;
            CellValue::Text(String::from_utf8(bytes.to_vec()).map_err(|e| NebError::Codec(e.to_string()))?)
        }
        PrimitiveKind::Bytes => {
            let len = read_u32(body, pos)? as usize;
            CellValue::Bytes(read_slice(body, pos, len)?.to_vec())
        }
        PrimitiveKind::Obj => {
            let len = read_u32(body, pos)? as usize;
            CellValue::Obj(read_slice(body, pos, len)?.to_vec())
        }
    })
}

fn read_bytes<const N: usize>(body: &[u8], pos: &mut usize) -> Result<[u8; N]> {
    let slice = read_slice(body, pos, N)?;
    Ok(slice.try_into().unwrap())
}

fn read_u32(body: &[u8], pos: &mut usize) -> Result<u32> {
    Ok(u32::from_le_bytes(read_bytes(body, pos)?))
}

fn read_slice<'a>(body: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8]> {
    let end = pos.checked_add(len).ok_or_else(|| NebError::CorruptReplica("length overflow".into()))?;
    if end > body.len() {
        return Err(NebError::CorruptReplica(format!("read past end of body ({end} > {})", body.len())));
    }
    let slice = &body[*pos..end];
    *pos = end;
    Ok(slice)
}

// ── Pure length / partial reads ─────────────────────────────────────

/// Body length of an already-encoded cell, walking the schema without
/// retaining the decoded values. Used by `delete_cell`/`replace_cell` to
/// learn `L_old`.
pub fn stored_len(schemas: &SchemaTable, schema: &Schema, body: &[u8]) -> Result<usize> {
    let mut pos = 0;
    decode_fields(schemas, &schema.plan, body, &mut pos)?;
    Ok(pos)
}

/// Decode the whole cell body then walk `path`, descending through named
/// sub-schemas and inline field lists.
pub fn get_in(schemas: &SchemaTable, schema: &Schema, body: &[u8], path: &[&str]) -> Result<Option<CellValue>> {
    let map = decode_fields(schemas, &schema.plan, body, &mut 0)?;
    Ok(get_in_map(&CellValue::Map(map), path))
}

fn get_in_map(value: &CellValue, path: &[&str]) -> Option<CellValue> {
    match path.split_first() {
        None => Some(value.clone()),
        Some((head, rest)) => {
            let map = value.as_map()?;
            let next = map.get(*head)?;
            get_in_map(next, rest)
        }
    }
}

/// Decode the whole cell body and restrict to the named top-level keys.
pub fn select_keys(schemas: &SchemaTable, schema: &Schema, body: &[u8], keys: &[&str]) -> Result<CellMap> {
    let mut map = decode_fields(schemas, &schema.plan, body, &mut 0)?;
    map.retain(|k, _| keys.contains(&k.as_str()));
    Ok(map)
}

// ── Helpers ──────────────────────────────────────────────────────────

fn expect_map(value: &CellValue) -> Result<&CellMap> {
    value.as_map().ok_or_else(|| NebError::Codec("expected a map value".into()))
}

fn expect_array(value: &CellValue) -> Result<&[CellValue]> {
    value.as_array().ok_or_else(|| NebError::Codec("expected an array value".into()))
}

fn missing(name: &str) -> NebError {
    NebError::Codec(format!("value missing field '{name}'"))
}

fn type_mismatch(kind: PrimitiveKind, value: &CellValue) -> NebError {
    NebError::Codec(format!("value {value:?} does not match declared type {kind:?}"))
}

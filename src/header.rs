//! Fixed-width cell header, written at the start of every cell and
//! tombstone. All multi-byte fields are little-endian.

use crate::error::{NebError, Result};

/// `hash(8) + partition(8) + schema_id(4) + cell_length(4) + cell_type(1) + version(8)`
pub const CELL_HEADER_SIZE: usize = 33;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CellType {
    Normal = 1,
    Tombstone = 2,
}

impl CellType {
    fn from_u8(v: u8) -> Result<Self> {
        match v {
            1 => Ok(CellType::Normal),
            2 => Ok(CellType::Tombstone),
            other => Err(NebError::CorruptReplica(format!("unknown cell_type byte {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellHeader {
    pub hash: u64,
    pub partition: u64,
    pub schema_id: u32,
    pub cell_length: u32,
    pub cell_type: CellType,
    pub version: u64,
}

impl CellHeader {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.hash.to_le_bytes());
        out.extend_from_slice(&self.partition.to_le_bytes());
        out.extend_from_slice(&self.schema_id.to_le_bytes());
        out.extend_from_slice(&self.cell_length.to_le_bytes());
        out.push(self.cell_type as u8);
        out.extend_from_slice(&self.version.to_le_bytes());
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < CELL_HEADER_SIZE {
            return Err(NebError::CorruptReplica("header truncated".into()));
        }
        let hash = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
        let partition = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
        let schema_id = u32::from_le_bytes(bytes[16..20].try_into().unwrap());
        let cell_length = u32::from_le_bytes(bytes[20..24].try_into().unwrap());
        let cell_type = CellType::from_u8(bytes[24])?;
        let version = u64::from_le_bytes(bytes[25..33].try_into().unwrap());
        Ok(Self { hash, partition, schema_id, cell_length, cell_type, version })
    }

    /// Overwrite just the `cell_type` byte of an already-encoded header,
    /// used to tombstone a cell in place without rewriting the rest.
    pub fn patch_tombstone(bytes: &mut [u8]) {
        bytes[24] = CellType::Tombstone as u8;
    }
}

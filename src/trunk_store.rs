//! Collection of trunks, routing a cell id to its owning trunk by
//! `partition mod trunk_count`. This is the outermost layer the core
//! exposes: RPC framing, cluster routing, and schema-registry distribution
//! all sit above it and are out of scope here.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::function_registry::FunctionRegistry;
use crate::id::CellId;
use crate::schema::SchemaTable;
use crate::trunk::Trunk;
use crate::value::{CellMap, CellValue};

pub struct TrunkStore {
    trunks: Vec<Arc<Trunk>>,
}

impl TrunkStore {
    pub fn new(config: &Config) -> Self {
        let trunk_count = config.trunk_count();
        let segments_per_trunk = config.segments_per_trunk();
        let trunks = (0..trunk_count as u32)
            .map(|id| Arc::new(Trunk::new(id, segments_per_trunk, config.segment_size, config.lock_stripes)))
            .collect();
        Self { trunks }
    }

    pub fn trunk_count(&self) -> usize {
        self.trunks.len()
    }

    pub fn trunks(&self) -> &[Arc<Trunk>] {
        &self.trunks
    }

    fn trunk_id_for(&self, partition: u64) -> usize {
        (partition % self.trunks.len() as u64) as usize
    }

    pub fn trunk_for(&self, partition: u64) -> &Arc<Trunk> {
        &self.trunks[self.trunk_id_for(partition)]
    }

    // ── Single-cell operations ───────────────────────────────────────

    pub fn new_cell(&self, schemas: &SchemaTable, id: CellId, schema_id: u32, value: &CellMap) -> Result<()> {
        self.trunk_for(id.partition).new_cell(schemas, id.hash, id.partition, schema_id, value)
    }

    pub fn read_cell(&self, schemas: &SchemaTable, id: CellId) -> Result<CellMap> {
        self.trunk_for(id.partition).read_cell(schemas, id.hash)
    }

    pub fn replace_cell(&self, schemas: &SchemaTable, id: CellId, value: &CellMap) -> Result<()> {
        self.trunk_for(id.partition).replace_cell(schemas, id.hash, value)
    }

    pub fn update_cell(&self, schemas: &SchemaTable, registry: &FunctionRegistry, id: CellId, fn_name: &str, args: &[CellValue]) -> Result<CellMap> {
        self.trunk_for(id.partition).update_cell(schemas, registry, id.hash, fn_name, args)
    }

    pub fn delete_cell(&self, id: CellId) -> Result<()> {
        self.trunk_for(id.partition).delete_cell(id.hash)
    }

    pub fn get_in_cell(&self, schemas: &SchemaTable, id: CellId, path: &[&str]) -> Result<Option<CellValue>> {
        self.trunk_for(id.partition).get_in_cell(schemas, id.hash, path)
    }

    pub fn select_keys_from_cell(&self, schemas: &SchemaTable, id: CellId, keys: &[&str]) -> Result<CellMap> {
        self.trunk_for(id.partition).select_keys_from_cell(schemas, id.hash, keys)
    }

    pub fn new_cell_by_raw_if_newer(&self, id: CellId, version: u64, bytes: &[u8]) -> Result<bool> {
        self.trunk_for(id.partition).new_cell_by_raw_if_newer(id.hash, version, bytes)
    }

    // ── Batch variants ────────────────────────────────────────────────
    //
    // Each accepts a list of `(id, args...)` tuples and reduces the
    // per-cell results into `{id: result}`. `_noreply` variants run the
    // same dispatch but discard the results, for fire-and-forget callers
    // that don't want to pay for collecting a reply map.

    pub fn batch_new_cell(&self, schemas: &SchemaTable, items: &[(CellId, u32, CellMap)]) -> HashMap<CellId, Result<()>> {
        items.iter().map(|(id, schema_id, value)| (*id, self.new_cell(schemas, *id, *schema_id, value))).collect()
    }

    pub fn batch_new_cell_noreply(&self, schemas: &SchemaTable, items: &[(CellId, u32, CellMap)]) {
        for (id, schema_id, value) in items {
            let _ = self.new_cell(schemas, *id, *schema_id, value);
        }
    }

    pub fn batch_read_cell(&self, schemas: &SchemaTable, ids: &[CellId]) -> HashMap<CellId, Result<CellMap>> {
        ids.iter().map(|id| (*id, self.read_cell(schemas, *id))).collect()
    }

    pub fn batch_delete_cell(&self, ids: &[CellId]) -> HashMap<CellId, Result<()>> {
        ids.iter().map(|id| (*id, self.delete_cell(*id))).collect()
    }

    pub fn batch_delete_cell_noreply(&self, ids: &[CellId]) {
        for id in ids {
            let _ = self.delete_cell(*id);
        }
    }

    /// Per-trunk cell counts, used by distribution tests and operational
    /// introspection.
    pub fn cell_counts(&self) -> Vec<usize> {
        self.trunks.iter().map(|t| t.len()).collect()
    }

    pub fn total_cells(&self) -> usize {
        self.trunks.iter().map(|t| t.len()).sum()
    }
}

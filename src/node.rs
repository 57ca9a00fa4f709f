//! `Node` — the single-node storage engine, wired up from a [`Config`].
//!
//! # Architecture
//!
//! - [`SchemaTable`] holds the registered schemas, shared read-mostly across
//!   every trunk.
//! - [`TrunkStore`] owns the trunks and routes a cell id to the one that
//!   holds it.
//! - [`FunctionRegistry`] holds the named closures `update_cell` dispatches
//!   to; register these once at startup.
//! - A [`Defragmenter`] and, if `config.auto_backsync` is set, a
//!   [`DurabilityWriter`] each run one background worker per trunk.
//!
//! Nothing here is process-wide mutable state: every component is owned by
//! the `Node` that created it, so tests can build independent nodes side by
//! side.
//!
//! # Usage
//!
//! ```no_run
//! use neb::config::Config;
//! use neb::node::Node;
//! use neb::schema::types::{FieldDecl, PrimitiveKind, TypeExpr};
//!
//! let node = Node::new(Config::default());
//! let schema_id = node.schemas().add("point", vec![
//!     FieldDecl::new("x", TypeExpr::Primitive(PrimitiveKind::Int)),
//!     FieldDecl::new("y", TypeExpr::Primitive(PrimitiveKind::Int)),
//! ], None).unwrap();
//! ```

use std::sync::Arc;

use crate::config::Config;
use crate::defrag::Defragmenter;
use crate::durability::DurabilityWriter;
use crate::error::Result;
use crate::function_registry::FunctionRegistry;
use crate::id::CellId;
use crate::schema::SchemaTable;
use crate::trunk_store::TrunkStore;
use crate::value::{CellMap, CellValue};

pub struct Node {
    config: Config,
    schemas: Arc<SchemaTable>,
    trunks: Arc<TrunkStore>,
    registry: FunctionRegistry,
    defrag: Option<Defragmenter>,
    durability: Option<DurabilityWriter>,
}

impl Node {
    /// Build a node and start its background workers. Does not recover from
    /// replica directories even if `config.recover_backup_at_startup` is
    /// set — call [`Node::recover_at_startup`] once the caller has also
    /// finished registering update functions and loading a persisted
    /// schema table, since recovered cells may immediately become visible
    /// to readers.
    pub fn new(config: Config) -> Self {
        let schemas = Arc::new(SchemaTable::new());
        let trunks = Arc::new(TrunkStore::new(&config));

        let defrag = Some(Defragmenter::start(trunks.trunks(), config.defrag_threshold, config.defrag_interval));

        let durability = if config.auto_backsync && config.durability && !config.replica_dirs.is_empty() {
            match DurabilityWriter::start(trunks.trunks(), config.replica_dirs.clone(), config.segment_size, config.backsync_interval) {
                Ok(writer) => Some(writer),
                Err(err) => {
                    tracing::warn!(error = %err, "failed to start durability writer, continuing without backup");
                    None
                }
            }
        } else {
            None
        };

        Self { config, schemas, trunks, registry: FunctionRegistry::new(), defrag, durability }
    }

    pub fn schemas(&self) -> &SchemaTable {
        &self.schemas
    }

    pub fn trunks(&self) -> &TrunkStore {
        &self.trunks
    }

    pub fn registry_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run recovery against every configured replica directory, in order.
    /// Intended to be called once, before the node starts serving traffic.
    pub fn recover_at_startup(&self) -> Result<Vec<crate::durability::RecoveryReport>> {
        if !self.config.recover_backup_at_startup {
            return Ok(Vec::new());
        }
        let parallelism = self.config.recovery_parallelism.unwrap_or_else(|| crate::resource::recovery_parallelism(1, crate::resource::detect().cpu_count));
        self.config
            .replica_dirs
            .iter()
            .map(|dir| crate::durability::recover_directory(&self.trunks, dir, self.config.segment_size, parallelism, self.config.keep_imported_backup))
            .collect()
    }

    // ── In-process API (§6) ───────────────────────────────────────────

    pub fn new_cell(&self, id: CellId, schema_id: u32, value: &CellMap) -> Result<()> {
        self.trunks.new_cell(&self.schemas, id, schema_id, value)
    }

    pub fn read_cell(&self, id: CellId) -> Result<CellMap> {
        self.trunks.read_cell(&self.schemas, id)
    }

    pub fn replace_cell(&self, id: CellId, value: &CellMap) -> Result<()> {
        self.trunks.replace_cell(&self.schemas, id, value)
    }

    pub fn update_cell(&self, id: CellId, fn_name: &str, args: &[CellValue]) -> Result<CellMap> {
        self.trunks.update_cell(&self.schemas, &self.registry, id, fn_name, args)
    }

    pub fn delete_cell(&self, id: CellId) -> Result<()> {
        self.trunks.delete_cell(id)
    }

    pub fn get_in_cell(&self, id: CellId, path: &[&str]) -> Result<Option<CellValue>> {
        self.trunks.get_in_cell(&self.schemas, id, path)
    }

    pub fn select_keys_from_cell(&self, id: CellId, keys: &[&str]) -> Result<CellMap> {
        self.trunks.select_keys_from_cell(&self.schemas, id, keys)
    }

    pub fn new_cell_by_raw_if_newer(&self, id: CellId, version: u64, bytes: &[u8]) -> Result<bool> {
        self.trunks.new_cell_by_raw_if_newer(id, version, bytes)
    }

    /// Ask the backup workers to run a cycle now, instead of waiting for
    /// the next `backsync_interval` tick. A no-op if durability isn't
    /// enabled.
    pub fn request_backup(&self) {
        if let Some(durability) = &self.durability {
            durability.wake_all();
        }
    }

    /// Run one fully synchronous backup cycle across every trunk, bypassing
    /// the background workers. Used by callers (and tests) that need the
    /// replica files caught up before proceeding, e.g. immediately before
    /// simulating a crash.
    pub fn backup_now(&self) -> Result<()> {
        crate::durability::backup_now(self.trunks.trunks(), &self.config.replica_dirs, self.config.segment_size)
    }

    pub fn shutdown(mut self) {
        if let Some(defrag) = self.defrag.take() {
            defrag.shutdown();
        }
        if let Some(durability) = self.durability.take() {
            durability.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{FieldDecl, PrimitiveKind, TypeExpr};

    #[test]
    fn schema_write_read_round_trips_with_reserved_keys() {
        let node = Node::new(Config { trunks_size: 4096, memory_size: 4096, segment_size: 4096, ..Config::default() });
        let sid = node
            .schemas()
            .add("array-schema", vec![FieldDecl::new("arr", TypeExpr::Array(Box::new(TypeExpr::Primitive(PrimitiveKind::Long))))], Some(1))
            .unwrap();

        let value: CellMap = [("arr".to_string(), CellValue::Array((0..100).map(CellValue::Long).collect()))].into_iter().collect();
        let id = CellId::new(1, 1);
        node.new_cell(id, sid, &value).unwrap();

        let read = node.read_cell(id).unwrap();
        assert_eq!(read.get("arr"), value.get("arr"));
        assert_eq!(read.get(crate::value::SCHEMA_KEY), Some(&CellValue::Int(1)));
        assert_eq!(read.get(crate::value::HASH_KEY), Some(&CellValue::Long(1)));
    }

    #[test]
    fn update_cell_dispatches_through_the_function_registry() {
        let mut node = Node::new(Config { trunks_size: 4096, memory_size: 4096, segment_size: 4096, ..Config::default() });
        let sid = node.schemas().add("counter", vec![FieldDecl::new("count", TypeExpr::Primitive(PrimitiveKind::Int))], None).unwrap();
        node.registry_mut().register(
            "increment",
            Box::new(|current, args| {
                let by = match args.first() {
                    Some(CellValue::Int(n)) => *n,
                    _ => 1,
                };
                let mut next = current.clone();
                if let Some(CellValue::Int(count)) = next.get("count") {
                    next.insert("count".to_string(), CellValue::Int(count + by));
                }
                Ok(next)
            }),
        );

        let id = CellId::new(0, 1);
        let value: CellMap = [("count".to_string(), CellValue::Int(10))].into_iter().collect();
        node.new_cell(id, sid, &value).unwrap();
        let updated = node.update_cell(id, "increment", &[CellValue::Int(5)]).unwrap();
        assert_eq!(updated.get("count"), Some(&CellValue::Int(15)));
    }
}

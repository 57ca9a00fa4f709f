//! Schema table: maps schema id <-> schema name <-> field list, and
//! resolves the precomputed walk plan used by the cell codec.

pub mod types;
pub mod walk_plan;

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{NebError, Result};
use types::FieldDecl;
use walk_plan::{compile_fields, Op, SchemaIdResolver};

#[derive(Debug)]
pub struct Schema {
    pub id: u32,
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub plan: Vec<Op>,
}

/// On-disk representation of one schema table entry. Exact syntax is a Neb
/// implementation detail; this one is a JSON array of these records.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaRecord {
    id: u32,
    name: String,
    fields: Vec<FieldDecl>,
}

struct Inner {
    by_id: HashMap<u32, std::sync::Arc<Schema>>,
    by_name: HashMap<String, u32>,
    next_id: u32,
}

impl SchemaIdResolver for Inner {
    fn resolve(&self, name: &str) -> Result<u32> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| NebError::SchemaNameNotFound(name.to_string()))
    }
}

pub struct SchemaTable {
    inner: RwLock<Inner>,
}

impl SchemaTable {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner { by_id: HashMap::new(), by_name: HashMap::new(), next_id: 1 }),
        }
    }

    /// Register a schema. `id` pins a specific id (used when reloading a
    /// persisted table); `None` assigns the next monotonic id.
    ///
    /// Named sub-schemas referenced by `fields` must already be registered —
    /// forward references across schemas are not supported.
    pub fn add(&self, name: &str, fields: Vec<FieldDecl>, id: Option<u32>) -> Result<u32> {
        let mut inner = self.inner.write().unwrap();
        if inner.by_name.contains_key(name) {
            return Err(NebError::SchemaExists(name.to_string()));
        }
        let plan = compile_fields(&fields, &*inner)?;
        let schema_id = match id {
            Some(id) => id,
            None => inner.next_id,
        };
        if schema_id >= inner.next_id {
            inner.next_id = schema_id + 1;
        }
        let schema = Schema { id: schema_id, name: name.to_string(), fields, plan };
        inner.by_id.insert(schema_id, std::sync::Arc::new(schema));
        inner.by_name.insert(name.to_string(), schema_id);
        Ok(schema_id)
    }

    pub fn remove(&self, id: u32) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let schema = inner.by_id.remove(&id).ok_or(NebError::SchemaNotFound(id))?;
        inner.by_name.remove(&schema.name);
        Ok(())
    }

    pub fn get_by_id(&self, id: u32) -> Result<std::sync::Arc<Schema>> {
        self.inner.read().unwrap().by_id.get(&id).cloned().ok_or(NebError::SchemaNotFound(id))
    }

    pub fn get_by_name(&self, name: &str) -> Result<std::sync::Arc<Schema>> {
        let inner = self.inner.read().unwrap();
        let id = *inner.by_name.get(name).ok_or_else(|| NebError::SchemaNameNotFound(name.to_string()))?;
        inner.by_id.get(&id).cloned().ok_or(NebError::SchemaNotFound(id))
    }

    pub fn id_by_name(&self, name: &str) -> Result<u32> {
        self.inner
            .read()
            .unwrap()
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| NebError::SchemaNameNotFound(name.to_string()))
    }

    /// Load a persisted schema table, preserving ids and registration order
    /// (required since later entries may reference earlier ones by name).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let table = Self::new();
        if !path.exists() {
            return Ok(table);
        }
        let raw = std::fs::read_to_string(path)?;
        let records: Vec<SchemaRecord> = serde_json::from_str(&raw)?;
        for record in records {
            table.add(&record.name, record.fields, Some(record.id))?;
        }
        Ok(table)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let inner = self.inner.read().unwrap();
        let mut records: Vec<SchemaRecord> = inner
            .by_id
            .values()
            .map(|s| SchemaRecord { id: s.id, name: s.name.clone(), fields: s.fields.clone() })
            .collect();
        records.sort_by_key(|r| r.id);
        let raw = serde_json::to_string_pretty(&records)?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}

impl Default for SchemaTable {
    fn default() -> Self {
        Self::new()
    }
}

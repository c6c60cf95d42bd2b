// Table bindings: thin CRUD pass-through to a record store

use crate::error::{Error, Result};
use crate::logging::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A single row, keyed by field name.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Column description returned by [`TableBinding::field_names`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    #[serde(rename = "type")]
    pub field_type: String,
    pub default: Option<serde_json::Value>,
}

impl FieldInfo {
    pub fn new(field_type: impl Into<String>) -> Self {
        Self {
            field_type: field_type.into(),
            default: None,
        }
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// CRUD access to one table.
pub trait TableBinding: Send + Sync {
    fn table(&self) -> &str;

    /// Every record in the table
    fn find(&self) -> Result<Vec<Record>>;

    fn create(&self, id: &str, data: Record) -> Result<Record>;

    fn read(&self, id: &str) -> Result<Option<Record>>;

    /// Apply `data` and return the record as re-read after the update.
    fn update(&self, id: &str, data: Record) -> Result<Option<Record>>;

    /// Whether a record was removed
    fn delete(&self, id: &str) -> Result<bool>;

    /// `None` when the table declares no fields.
    fn field_names(&self) -> Result<Option<BTreeMap<String, FieldInfo>>>;
}

/// In-process table. Clones share the same rows.
#[derive(Debug, Clone)]
pub struct MemoryBinding {
    table: String,
    fields: BTreeMap<String, FieldInfo>,
    rows: Arc<RwLock<BTreeMap<String, Record>>>,
}

impl MemoryBinding {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: BTreeMap::new(),
            rows: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, info: FieldInfo) -> Self {
        self.fields.insert(name.into(), info);
        self
    }

    fn with_defaults(&self, id: &str, mut data: Record) -> Record {
        for (name, info) in &self.fields {
            if let Some(default) = &info.default {
                data.entry(name.clone()).or_insert_with(|| default.clone());
            }
        }
        data.insert("id".to_string(), serde_json::Value::String(id.to_string()));
        data
    }
}

impl TableBinding for MemoryBinding {
    fn table(&self) -> &str {
        &self.table
    }

    fn find(&self) -> Result<Vec<Record>> {
        Ok(self.rows.read().values().cloned().collect())
    }

    fn create(&self, id: &str, data: Record) -> Result<Record> {
        let mut rows = self.rows.write();
        if rows.contains_key(id) {
            return Err(Error::Binding(format!(
                "{}: record {} already exists",
                self.table, id
            )));
        }
        let record = self.with_defaults(id, data);
        rows.insert(id.to_string(), record.clone());
        debug!(table = %self.table, id, "Record created");
        Ok(record)
    }

    fn read(&self, id: &str) -> Result<Option<Record>> {
        Ok(self.rows.read().get(id).cloned())
    }

    fn update(&self, id: &str, data: Record) -> Result<Option<Record>> {
        {
            let mut rows = self.rows.write();
            let Some(record) = rows.get_mut(id) else {
                return Ok(None);
            };
            for (field, value) in data {
                if field != "id" {
                    record.insert(field, value);
                }
            }
        }
        debug!(table = %self.table, id, "Record updated");
        self.read(id)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.rows.write().remove(id).is_some();
        debug!(table = %self.table, id, removed, "Record delete");
        Ok(removed)
    }

    fn field_names(&self) -> Result<Option<BTreeMap<String, FieldInfo>>> {
        if self.fields.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.fields.clone()))
        }
    }
}

//! Schema definitions for the SurrealDB `records` table
//!
//! A record is stored as one row:
//! - `entity` / `record_id`: identity (unique together)
//! - `attributes`: the attribute map, serialized as JSON text so attribute
//!   shapes survive the round trip exactly
//! - `lookup`: one `attribute=<lookup key>` entry per attribute, indexed, so
//!   equality filters run inside the database

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::record::{Record, RecordId};
use crate::storage_traits::{Condition, StoreResult};

/// Row in the `records` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordRow {
    /// SurrealDB record ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<surrealdb::sql::Thing>,
    /// Entity (type) name
    pub entity: String,
    /// Record identifier (UUID string)
    pub record_id: String,
    /// JSON-encoded attribute map
    pub attributes: String,
    /// Equality lookup keys
    pub lookup: Vec<String>,
}

impl RecordRow {
    /// Build the row for a record
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        let lookup = record
            .attributes
            .iter()
            .map(|(name, value)| lookup_entry(name, &value.lookup_key()))
            .collect();

        Ok(RecordRow {
            id: None,
            entity: record.entity.clone(),
            record_id: record.id.to_string(),
            attributes: serde_json::to_string(&record.attributes)?,
            lookup,
        })
    }

    /// Convert the row back into a record
    pub fn into_record(self) -> StoreResult<Record> {
        let id: RecordId = self
            .record_id
            .parse()
            .map_err(|e| StoreError::Serialization(format!("bad record_id {}: {e}", self.record_id)))?;

        Ok(Record {
            entity: self.entity,
            id,
            attributes: serde_json::from_str(&self.attributes)?,
        })
    }
}

/// Lookup entry a condition must find in a row's `lookup` array
pub fn condition_entry(condition: &Condition) -> String {
    match condition {
        Condition::Equal { attribute, value } => lookup_entry(attribute, &value.lookup_key()),
    }
}

fn lookup_entry(attribute: &str, key: &str) -> String {
    format!("{attribute}={key}")
}

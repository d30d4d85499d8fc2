//! SurrealDB schema migrations and initialization
//!
//! Sets up the `records` table with its identity and lookup indexes.

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StateError;
use crate::Result;

/// Initialize all rollup-store tables in SurrealDB
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing rollup-store SurrealDB schema");
    init_records_table(db).await?;
    info!("rollup-store schema initialization complete");
    Ok(())
}

/// Initialize `records` table
///
/// Schema:
/// ```text
/// TABLE records {
///   entity:      STRING (indexed with record_id, unique)
///   record_id:   STRING
///   attributes:  STRING (JSON attribute map)
///   lookup:      ARRAY<STRING> (indexed)
/// }
/// ```
async fn init_records_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing records table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS records SCHEMALESS;

        -- One row per (entity, record_id)
        DEFINE INDEX IF NOT EXISTS idx_record_identity ON TABLE records COLUMNS entity, record_id UNIQUE;

        -- Entity scans
        DEFINE INDEX IF NOT EXISTS idx_record_entity ON TABLE records COLUMNS entity;

        -- Equality filters
        DEFINE INDEX IF NOT EXISTS idx_record_lookup ON TABLE records COLUMNS lookup;
    "#;

    db.query(sql)
        .await
        .map_err(|e| StateError::SchemaSetup(format!("records table: {e}")))?
        .check()
        .map_err(|e| StateError::SchemaSetup(format!("records table: {e}")))?;

    debug!("records table initialized");
    Ok(())
}

//! SurrealDB-backed RecordStore implementation
//!
//! Uses `schema::RecordRow` for persistence, converting to/from
//! [`Record`] at the boundary. Equality filters are pushed into the database
//! through the indexed `lookup` array; pages are addressed by offset.

use async_trait::async_trait;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, instrument};

use crate::error::StoreError;
use crate::handle::SurrealHandle;
use crate::record::{Record, RecordId};
use crate::schema::{condition_entry, RecordRow};
use crate::storage_traits::{cookie_offset, Query, RecordPage, RecordStore, StoreResult};

/// SurrealDB-backed implementation of [`RecordStore`].
#[derive(Clone)]
pub struct SurrealRecordStore {
    db: Surreal<Any>,
}

impl SurrealRecordStore {
    /// Wrap an open handle.
    pub fn new(handle: &SurrealHandle) -> Self {
        Self {
            db: handle.db().clone(),
        }
    }

    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> crate::Result<Self> {
        let handle = SurrealHandle::setup_db().await?;
        Ok(Self::new(&handle))
    }

    /// Create from environment variables.
    ///
    /// Uses the same env-var chain as [`SurrealHandle::setup_from_env`].
    pub async fn from_env() -> crate::Result<Self> {
        let handle = SurrealHandle::setup_from_env().await?;
        Ok(Self::new(&handle))
    }
}

#[async_trait]
impl RecordStore for SurrealRecordStore {
    #[instrument(skip_all, fields(entity = %query.entity, conditions = query.conditions.len()))]
    async fn retrieve_multiple(&self, query: &Query) -> StoreResult<RecordPage> {
        query.validate()?;

        let offset = cookie_offset(query.page.cookie.as_deref())?;
        let keys: Vec<String> = query.conditions.iter().map(condition_entry).collect();
        // Fetch one extra row to learn whether another page follows.
        let sql = format!(
            "SELECT entity, record_id, attributes, lookup FROM records \
             WHERE entity = $entity AND lookup CONTAINSALL $keys \
             ORDER BY record_id ASC LIMIT {} START {}",
            query.page.size + 1,
            offset
        );

        let mut res = self
            .db
            .query(sql)
            .bind(("entity", query.entity.clone()))
            .bind(("keys", keys))
            .await?;

        let mut rows: Vec<RecordRow> = res.take(0).map_err(|e| StoreError::Backend(e.to_string()))?;

        let more_records = rows.len() > query.page.size;
        rows.truncate(query.page.size);
        let returned = rows.len();

        let records = rows
            .into_iter()
            .map(|row| row.into_record().map(|r| query.columns.project(&r)))
            .collect::<StoreResult<Vec<Record>>>()?;

        debug!(returned, more_records, "retrieved page");

        Ok(RecordPage {
            records,
            more_records,
            paging_cookie: more_records.then(|| (offset + returned).to_string()),
        })
    }

    async fn retrieve(&self, entity: &str, id: RecordId) -> StoreResult<Option<Record>> {
        let mut res = self
            .db
            .query(
                "SELECT entity, record_id, attributes, lookup FROM records \
                 WHERE entity = $entity AND record_id = $rid",
            )
            .bind(("entity", entity.to_string()))
            .bind(("rid", id.to_string()))
            .await?;

        let rows: Vec<RecordRow> = res.take(0).map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter().next().map(RecordRow::into_record).transpose()
    }

    #[instrument(skip_all, fields(entity = %record.entity, id = %record.id))]
    async fn upsert(&self, record: Record) -> StoreResult<()> {
        let row = RecordRow::from_record(&record)?;

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE records WHERE entity = $entity AND record_id = $rid; \
                 CREATE records CONTENT $row; \
                 COMMIT TRANSACTION;",
            )
            .bind(("entity", row.entity.clone()))
            .bind(("rid", row.record_id.clone()))
            .bind(("row", row))
            .await?
            .check()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        debug!("record upserted");
        Ok(())
    }
}

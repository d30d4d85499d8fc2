//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryRecordStore`, which satisfies the [`RecordStore`] contract
//! without any external dependencies, records every query it receives, and
//! can be switched into a failing mode to simulate transport errors.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::{Record, RecordId};
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryRecordStore
// ---------------------------------------------------------------------------

/// In-memory record store backed by a `BTreeMap<(entity, id), Record>`.
///
/// Iteration order is (entity, id), which keeps paging deterministic.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<BTreeMap<(String, RecordId), Record>>,
    queries: Mutex<Vec<Query>>,
    failure: Mutex<Option<String>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with `records`.
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Synchronous insert for test setup.
    pub fn insert(&self, record: Record) {
        let mut records = self.records.lock().unwrap();
        records.insert((record.entity.clone(), record.id), record);
    }

    /// Every query passed to `retrieve_multiple`, in call order.
    pub fn queries(&self) -> Vec<Query> {
        self.queries.lock().unwrap().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    /// Make every subsequent operation fail with `StoreError::Unavailable`.
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.lock().unwrap() = Some(reason.into());
    }

    /// Clear a failure set by [`fail_with`](Self::fail_with).
    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> StoreResult<()> {
        match self.failure.lock().unwrap().as_ref() {
            Some(reason) => Err(StoreError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn retrieve_multiple(&self, query: &Query) -> StoreResult<RecordPage> {
        self.queries.lock().unwrap().push(query.clone());
        self.check_available()?;
        query.validate()?;

        let offset = cookie_offset(query.page.cookie.as_deref())?;
        let records = self.records.lock().unwrap();
        let matching: Vec<&Record> = records.values().filter(|r| query.matches(r)).collect();

        let end = (offset + query.page.size).min(matching.len());
        let page: Vec<Record> = matching
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|r| query.columns.project(r))
            .collect();

        let more_records = end < matching.len();
        Ok(RecordPage {
            records: page,
            more_records,
            paging_cookie: more_records.then(|| end.to_string()),
        })
    }

    async fn retrieve(&self, entity: &str, id: RecordId) -> StoreResult<Option<Record>> {
        self.check_available()?;
        let records = self.records.lock().unwrap();
        Ok(records.get(&(entity.to_string(), id)).cloned())
    }

    async fn upsert(&self, record: Record) -> StoreResult<()> {
        self.check_available()?;
        self.insert(record);
        Ok(())
    }
}

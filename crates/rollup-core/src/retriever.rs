//! Sibling retrieval.
//!
//! Issues one logical query for every child of a parent and follows the
//! store's paging cookie until the result set is exhausted.

use std::collections::HashSet;

use rollup_store::{ColumnSet, Condition, EntityReference, Query, Record, RecordStore};
use tracing::{debug, instrument, warn};

use crate::domain::{Result, RollupSettings};

/// Fetches all records sharing a parent reference.
#[derive(Debug, Clone)]
pub struct SiblingRetriever<'a> {
    settings: &'a RollupSettings,
}

impl<'a> SiblingRetriever<'a> {
    pub fn new(settings: &'a RollupSettings) -> Self {
        Self { settings }
    }

    /// The first-page query for the children of `parent`.
    pub fn query_for(&self, parent: &EntityReference) -> Query {
        Query::new(self.settings.entity.clone())
            .filter(Condition::equal(
                self.settings.parent_attribute.clone(),
                parent.clone(),
            ))
            .select(ColumnSet::columns([
                self.settings.value_attribute.clone(),
                self.settings.parent_attribute.clone(),
            ]))
            .page_size(self.settings.page_size)
    }

    /// Retrieve every sibling under `parent`.
    ///
    /// Store failures are returned as [`crate::RollupError::StoreUnavailable`]
    /// without retry. A record returned on more than one page is kept once;
    /// a record whose reference does not point at `parent` is dropped.
    #[instrument(skip_all, fields(parent = %parent))]
    pub async fn retrieve(
        &self,
        store: &dyn RecordStore,
        parent: &EntityReference,
    ) -> Result<Vec<Record>> {
        let query = self.query_for(parent);
        let mut siblings = Vec::new();
        let mut seen = HashSet::new();
        let mut pages = 0usize;
        let mut stray = 0usize;
        let mut page = store.retrieve_multiple(&query).await?;

        loop {
            pages += 1;
            for record in page.records {
                if record.get_reference(&self.settings.parent_attribute) != Some(parent) {
                    stray += 1;
                    continue;
                }
                if seen.insert(record.id) {
                    siblings.push(record);
                }
            }

            match page.paging_cookie {
                Some(cookie) if page.more_records => {
                    page = store.retrieve_multiple(&query.continue_from(cookie)).await?;
                }
                _ => break,
            }
        }

        if stray > 0 {
            warn!(stray, "store returned records under a different parent");
        }
        debug!(pages, siblings = siblings.len(), "siblings retrieved");
        Ok(siblings)
    }
}

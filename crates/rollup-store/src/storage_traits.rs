//! Storage trait definitions for the rollup step
//!
//! [`RecordStore`] is the store handle the step consumes: a paged,
//! equality-filtered query over one entity type, plus the single-record
//! lookup and upsert a host needs to commit the step's mutation.
//!
//! All operations are async and backend-agnostic. An in-memory fake is
//! provided for testing via the `fakes` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::record::{AttributeValue, Record, RecordId};

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Page size used when a query does not ask for one
pub const DEFAULT_PAGE_SIZE: usize = 5000;

/// Largest page a single `retrieve_multiple` call may ask for
pub const MAX_PAGE_SIZE: usize = 5000;

// ---------------------------------------------------------------------------
// Query model
// ---------------------------------------------------------------------------

/// A single filter predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    /// `attribute` is present and equal to `value`
    Equal {
        attribute: String,
        value: AttributeValue,
    },
}

impl Condition {
    pub fn equal(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Condition::Equal {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Evaluate the predicate against a record
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Condition::Equal { attribute, value } => record
                .get(attribute)
                .is_some_and(|v| v.lookup_key() == value.lookup_key()),
        }
    }
}

/// Attributes a query asks the store to return
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnSet {
    All,
    Columns(Vec<String>),
}

impl ColumnSet {
    pub fn columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnSet::Columns(names.into_iter().map(Into::into).collect())
    }

    /// Apply the column set to a full record
    pub fn project(&self, record: &Record) -> Record {
        match self {
            ColumnSet::All => record.clone(),
            ColumnSet::Columns(names) => record.project(names),
        }
    }
}

/// Which page of results to return
///
/// `cookie` is opaque to callers: pass back the `paging_cookie` of the
/// previous [`RecordPage`] to continue, or `None` for the first page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub size: usize,
    pub cookie: Option<String>,
}

impl PageRequest {
    pub fn first(size: usize) -> Self {
        Self { size, cookie: None }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

/// Description of a multi-record retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Entity type to search
    pub entity: String,
    /// Conjunction of filter predicates
    pub conditions: Vec<Condition>,
    /// Attributes to return
    pub columns: ColumnSet,
    /// Requested page
    pub page: PageRequest,
}

impl Query {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            conditions: Vec::new(),
            columns: ColumnSet::All,
            page: PageRequest::default(),
        }
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn select(mut self, columns: ColumnSet) -> Self {
        self.columns = columns;
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page.size = size;
        self
    }

    /// The same query positioned at the page after `cookie`
    pub fn continue_from(&self, cookie: String) -> Self {
        let mut next = self.clone();
        next.page.cookie = Some(cookie);
        next
    }

    /// Whether `record` satisfies every condition of the query
    pub fn matches(&self, record: &Record) -> bool {
        record.entity == self.entity && self.conditions.iter().all(|c| c.matches(record))
    }

    pub(crate) fn validate(&self) -> StoreResult<()> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.page.size) {
            return Err(StoreError::InvalidQuery(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page.size
            )));
        }
        if self.entity.is_empty() {
            return Err(StoreError::InvalidQuery("entity must not be empty".to_string()));
        }
        Ok(())
    }
}

/// One page of query results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPage {
    pub records: Vec<Record>,
    /// Whether another page follows this one
    pub more_records: bool,
    /// Cookie to request the next page with; present iff `more_records`
    pub paging_cookie: Option<String>,
}

/// Decode an offset-style paging cookie.
pub(crate) fn cookie_offset(cookie: Option<&str>) -> StoreResult<usize> {
    match cookie {
        None => Ok(0),
        Some(c) => c
            .parse::<usize>()
            .map_err(|_| StoreError::InvalidQuery(format!("malformed paging cookie: {c}"))),
    }
}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

/// Platform record store.
///
/// Guarantees:
/// - `retrieve_multiple` returns only records of `query.entity` satisfying
///   every condition, restricted to `query.columns` (the id is always kept).
/// - Results are returned in pages of at most `query.page.size`; callers
///   that need the full set must follow `paging_cookie` until
///   `more_records` is false.
/// - `upsert` replaces the whole stored record with the same entity and id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Retrieve one page of records matching `query`.
    async fn retrieve_multiple(&self, query: &Query) -> StoreResult<RecordPage>;

    /// Retrieve a single record by entity and id, if it exists.
    async fn retrieve(&self, entity: &str, id: RecordId) -> StoreResult<Option<Record>>;

    /// Create or replace a record.
    async fn upsert(&self, record: Record) -> StoreResult<()>;
}

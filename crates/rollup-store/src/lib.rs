//! Rollup-Store: Record Model and Store Backends
//!
//! This crate provides the data layer for the sibling rollup step. It defines
//! the typed record model the step reads and mutates, the backend-agnostic
//! [`RecordStore`] query capability, and two conforming implementations.
//!
//! ## Key Components
//!
//! - `Record` / `AttributeValue`: typed entity instances and their values
//! - `RecordStore`: paged query + upsert capability consumed by the step
//! - `MemoryRecordStore`: in-memory fake with query capture and fault injection
//! - `SurrealRecordStore`: SurrealDB-backed store (in-memory, local or cloud)

mod error;
pub mod fakes;
mod handle;
pub mod migrations;
mod record;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::{StateError, StoreError};
pub use handle::{CloudConfig, SurrealHandle};
pub use record::{AttributeValue, EntityReference, Record, RecordId};
pub use schema::RecordRow;
pub use storage_traits::{
    ColumnSet, Condition, PageRequest, Query, RecordPage, RecordStore, StoreResult,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use surreal_store::SurrealRecordStore;

/// Result type for connection and schema operations
pub type Result<T> = std::result::Result<T, StateError>;

//! Error types for rollup-store

use thiserror::Error;

/// Errors raised while connecting to a backend or preparing its schema
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),

    /// Configuration is incomplete or malformed
    #[error("Invalid store configuration: {0}")]
    Config(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Connection(err.to_string())
    }
}

/// Errors returned by [`crate::RecordStore`] operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached or refused the request
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The backend failed while executing the request
    #[error("store backend error: {0}")]
    Backend(String),

    /// The query could not be executed as described
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A stored row could not be converted to or from a record
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<surrealdb::Error> for StoreError {
    /// Client-side failures (no connection, transport, protocol) mean the
    /// store could not be reached; anything the server reported is a backend
    /// error.
    fn from(err: surrealdb::Error) -> Self {
        match err {
            surrealdb::Error::Api(e) => StoreError::Unavailable(e.to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

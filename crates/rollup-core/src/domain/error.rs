//! Domain-level error taxonomy for the rollup step.
//!
//! Every variant is fatal for the invocation: the step returns it to the
//! host without having mutated the triggering record.

use rollup_store::StoreError;

/// Rollup step errors.
#[derive(Debug, thiserror::Error)]
pub enum RollupError {
    #[error("{entity}({record}) has no parent reference in '{attribute}'")]
    MissingParent {
        entity: String,
        record: String,
        attribute: String,
    },

    #[error("{entity}({record}) has no value in '{attribute}'")]
    MissingValue {
        entity: String,
        record: String,
        attribute: String,
    },

    #[error("sibling query failed: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("attribute '{attribute}' is not an integer: {detail}")]
    Format { attribute: String, detail: String },

    #[error("invalid step configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for rollup operations.
pub type Result<T> = std::result::Result<T, RollupError>;

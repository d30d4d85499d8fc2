//! Domain types for the rollup step.

pub mod config;
pub mod context;
pub mod error;

pub use config::{RollupConfig, RollupSettings};
pub use context::{EntityImages, ExecutionContext, MessageName, PRE_IMAGE};
pub use error::{Result, RollupError};

//! Rollup Core
//!
//! The sibling rollup step: when a child record is created or updated, sum
//! an integer attribute across every record sharing its parent reference and
//! write `"<own>/<total>"` onto the triggering record.
//!
//! ```ignore
//! let step = RollupStep::new(RollupConfig::new(secure, unsecure))?;
//! let outcome = step.execute(&mut ctx, &store, &TracingSink).await?;
//! // host persists ctx.target
//! ```

pub mod calculator;
pub mod domain;
pub mod retriever;
pub mod step;
pub mod telemetry;
pub mod trace;

pub use calculator::{format_summary, integer_value, RollupCalculator, RollupSummary};
pub use domain::{
    ExecutionContext, MessageName, Result, RollupConfig, RollupError, RollupSettings, PRE_IMAGE,
};
pub use retriever::SiblingRetriever;
pub use step::{Outcome, RollupStep, SkipReason};
pub use trace::{render, MemoryTraceSink, TraceEntry, TraceSink, TracingSink};

pub use rollup_store::{AttributeValue, EntityReference, Record, RecordId, RecordStore};

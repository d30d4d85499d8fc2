//! Execution entry point.
//!
//! [`RollupStep`] is what the host registers on the create/update event of
//! the child entity. The host constructs it once from the registration
//! configuration and calls [`RollupStep::execute`] per event with the store
//! handle and trace sink; on `Ok` the host persists the mutated target, on
//! `Err` it rolls back the whole operation.

use rollup_store::{EntityReference, RecordStore};
use serde::Serialize;
use tracing::{info, instrument};

use crate::calculator::{RollupCalculator, RollupSummary};
use crate::domain::{
    ExecutionContext, MessageName, Result, RollupConfig, RollupError, RollupSettings,
};
use crate::retriever::SiblingRetriever;
use crate::trace::TraceSink;

/// Why an invocation did nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The step only handles create and update
    UnsupportedMessage { message: String },
    /// The event fired for an entity other than the configured one
    OtherEntity { entity: String },
}

/// Result of a successful invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Applied(RollupSummary),
    Skipped(SkipReason),
}

/// The sibling rollup step.
#[derive(Debug, Clone)]
pub struct RollupStep {
    config: RollupConfig,
    settings: RollupSettings,
}

impl RollupStep {
    /// Build the step from its registration configuration.
    ///
    /// Fails with [`RollupError::InvalidConfig`] if the unsecure
    /// configuration is present but malformed.
    pub fn new(config: RollupConfig) -> Result<Self> {
        let settings = config.settings()?;
        Ok(Self { config, settings })
    }

    pub fn config(&self) -> &RollupConfig {
        &self.config
    }

    pub fn settings(&self) -> &RollupSettings {
        &self.settings
    }

    /// Run the rollup for one pipeline event.
    ///
    /// Check order: message and entity (skip), parent reference
    /// (`MissingParent`), own value (`MissingValue`/`Format`), then the
    /// sibling query. Nothing is queried unless the target is complete, and
    /// `ctx.target` is only modified on success.
    #[instrument(
        skip_all,
        fields(
            correlation_id = %ctx.correlation_id,
            message = %ctx.message,
            record = %ctx.target.id,
        )
    )]
    pub async fn execute(
        &self,
        ctx: &mut ExecutionContext,
        store: &dyn RecordStore,
        trace: &dyn TraceSink,
    ) -> Result<Outcome> {
        if !matches!(ctx.message, MessageName::Create | MessageName::Update) {
            trace.trace("Rollup skipped for message {0}", &[&ctx.message]);
            return Ok(Outcome::Skipped(SkipReason::UnsupportedMessage {
                message: ctx.message.to_string(),
            }));
        }
        if ctx.primary_entity != self.settings.entity || ctx.target.entity != self.settings.entity {
            trace.trace("Rollup skipped for entity {0}", &[&ctx.primary_entity]);
            return Ok(Outcome::Skipped(SkipReason::OtherEntity {
                entity: ctx.primary_entity.clone(),
            }));
        }

        let parent = self.parent_of(ctx)?;
        let calculator = RollupCalculator::new(&self.settings);
        calculator.own_value(&ctx.target)?;

        trace.trace("Retrieving siblings under {0}", &[&parent]);
        let siblings = match SiblingRetriever::new(&self.settings)
            .retrieve(store, &parent)
            .await
        {
            Ok(siblings) => siblings,
            Err(err) => {
                trace.trace("Sibling query failed: {0}", &[&err]);
                return Err(err);
            }
        };
        trace.trace("Retrieved {0} sibling(s)", &[&siblings.len()]);

        let summary = calculator.apply(&mut ctx.target, parent, &siblings)?;
        trace.trace(
            "Wrote {0} to {1}",
            &[&summary.formatted, &self.settings.summary_attribute],
        );
        info!(
            parent = %summary.parent,
            display_total = summary.display_total,
            included_self = summary.included_self,
            "rollup applied"
        );

        Ok(Outcome::Applied(summary))
    }

    /// The parent reference of the triggering record.
    fn parent_of(&self, ctx: &ExecutionContext) -> Result<EntityReference> {
        let attribute = &self.settings.parent_attribute;
        let from_target = ctx.target.get_reference(attribute);
        let from_pre_image = || {
            self.settings
                .parent_from_pre_image
                .then(|| ctx.pre_image().and_then(|img| img.get_reference(attribute)))
                .flatten()
        };

        from_target
            .or_else(from_pre_image)
            .cloned()
            .ok_or_else(|| RollupError::MissingParent {
                entity: ctx.target.entity.clone(),
                record: ctx.target.id.to_string(),
                attribute: attribute.clone(),
            })
    }
}

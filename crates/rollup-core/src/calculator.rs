//! Rollup calculation.
//!
//! Sums the value attribute across the retrieved siblings, adds the
//! triggering record's own value, and writes `"<own>/<total>"` onto the
//! triggering record.
//!
//! The triggering record is counted exactly once, with its in-flight value.
//! A stored copy returned by the query (same id) is skipped, since on an
//! update it still carries the pre-update value.

use rollup_store::{AttributeValue, EntityReference, Record, RecordId};
use serde::Serialize;
use tracing::warn;

use crate::domain::{Result, RollupError, RollupSettings};

/// Outcome of one rollup calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollupSummary {
    pub parent: EntityReference,
    pub own_value: i64,
    /// Sum over the retrieved siblings, excluding any stored copy of the trigger
    pub sibling_total: i64,
    /// Total written into the summary attribute
    pub display_total: i64,
    pub sibling_count: usize,
    /// Whether a stored copy of the triggering record was retrieved (and skipped)
    pub included_self: bool,
    pub formatted: String,
}

/// Convert an attribute value to an integer.
///
/// Decimals with no fractional part are accepted; every other shape is a
/// format error.
pub fn integer_value(attribute: &str, value: &AttributeValue) -> Result<i64> {
    let format_err = |detail: String| RollupError::Format {
        attribute: attribute.to_string(),
        detail,
    };

    match value {
        AttributeValue::Integer(v) => Ok(*v),
        AttributeValue::Decimal(v)
            if v.fract() == 0.0 && *v >= i64::MIN as f64 && *v < i64::MAX as f64 =>
        {
            Ok(*v as i64)
        }
        AttributeValue::Decimal(v) => Err(format_err(format!("decimal {v} is not integral"))),
        other => Err(format_err(format!("found {}", other.kind()))),
    }
}

/// `"<own>/<total>"` in plain decimal.
pub fn format_summary(own_value: i64, display_total: i64) -> String {
    format!("{own_value}/{display_total}")
}

/// Computes and applies the rollup for one triggering record.
#[derive(Debug, Clone)]
pub struct RollupCalculator<'a> {
    settings: &'a RollupSettings,
}

impl<'a> RollupCalculator<'a> {
    pub fn new(settings: &'a RollupSettings) -> Self {
        Self { settings }
    }

    /// The triggering record's own value. Absent or null is `MissingValue`.
    pub fn own_value(&self, record: &Record) -> Result<i64> {
        let attribute = &self.settings.value_attribute;
        match record.get(attribute) {
            None | Some(AttributeValue::Null) => Err(RollupError::MissingValue {
                entity: record.entity.clone(),
                record: record.id.to_string(),
                attribute: attribute.clone(),
            }),
            Some(value) => integer_value(attribute, value),
        }
    }

    /// A sibling's contribution. Absent or null contributes 0.
    pub fn sibling_value(&self, sibling: &Record) -> Result<i64> {
        let attribute = &self.settings.value_attribute;
        match sibling.get(attribute) {
            None | Some(AttributeValue::Null) => {
                warn!(sibling = %sibling.id, attribute = %attribute, "sibling has no value, counting 0");
                Ok(0)
            }
            Some(value) => integer_value(attribute, value),
        }
    }

    /// Compute the totals without touching any record.
    pub fn compute(
        &self,
        own_id: RecordId,
        own_value: i64,
        parent: EntityReference,
        siblings: &[Record],
    ) -> Result<RollupSummary> {
        let overflow = || RollupError::Format {
            attribute: self.settings.value_attribute.clone(),
            detail: "sum exceeds the 64-bit integer range".to_string(),
        };

        let mut sibling_total: i64 = 0;
        let mut included_self = false;
        for sibling in siblings {
            if sibling.id == own_id {
                included_self = true;
                continue;
            }
            sibling_total = sibling_total
                .checked_add(self.sibling_value(sibling)?)
                .ok_or_else(overflow)?;
        }
        let display_total = sibling_total.checked_add(own_value).ok_or_else(overflow)?;

        Ok(RollupSummary {
            parent,
            own_value,
            sibling_total,
            display_total,
            sibling_count: siblings.len(),
            included_self,
            formatted: format_summary(own_value, display_total),
        })
    }

    /// Compute the rollup and write it onto `record`.
    ///
    /// On error `record` is left unmodified.
    pub fn apply(
        &self,
        record: &mut Record,
        parent: EntityReference,
        siblings: &[Record],
    ) -> Result<RollupSummary> {
        let own_value = self.own_value(record)?;
        let summary = self.compute(record.id, own_value, parent, siblings)?;
        record.set(
            self.settings.summary_attribute.clone(),
            summary.formatted.clone(),
        );
        Ok(summary)
    }
}

//! Step configuration.
//!
//! The host hands the step two free-form strings at registration time. The
//! secure string is accepted and never read. The unsecure string may carry a
//! JSON object overriding the attribute names the step works with.

use serde::{Deserialize, Serialize};

use super::error::{Result, RollupError};
use rollup_store::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Configuration strings supplied by the host when the step is registered.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupConfig {
    #[serde(default)]
    pub secure_config: String,
    #[serde(default)]
    pub unsecure_config: String,
}

impl RollupConfig {
    pub fn new(secure_config: impl Into<String>, unsecure_config: impl Into<String>) -> Self {
        Self {
            secure_config: secure_config.into(),
            unsecure_config: unsecure_config.into(),
        }
    }

    /// Resolve the settings carried by the unsecure configuration.
    pub fn settings(&self) -> Result<RollupSettings> {
        RollupSettings::parse(&self.unsecure_config)
    }
}

// Keeps the secure string out of logs and panic messages.
impl std::fmt::Debug for RollupConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollupConfig")
            .field("secure_config", &"<redacted>")
            .field("unsecure_config", &self.unsecure_config)
            .finish()
    }
}

/// Attribute names and limits the step operates with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RollupSettings {
    /// Entity type of the child records
    pub entity: String,
    /// Reference attribute pointing at the shared parent
    pub parent_attribute: String,
    /// Integer attribute being summed
    pub value_attribute: String,
    /// Text attribute receiving `"<own>/<total>"`
    pub summary_attribute: String,
    /// Page size for sibling retrieval
    pub page_size: usize,
    /// Fall back to the `preImage` parent reference when the target lacks one
    pub parent_from_pre_image: bool,
}

impl Default for RollupSettings {
    fn default() -> Self {
        Self {
            entity: "lat_rollupentity".to_string(),
            parent_attribute: "lat_parentrollupid".to_string(),
            value_attribute: "lat_value".to_string(),
            summary_attribute: "lat_name".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            parent_from_pre_image: false,
        }
    }
}

impl RollupSettings {
    /// Parse an unsecure configuration string. Blank means defaults.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: RollupSettings = serde_json::from_str(raw)
            .map_err(|e| RollupError::InvalidConfig(format!("unsecure configuration: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(RollupError::InvalidConfig(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        for (name, value) in [
            ("entity", &self.entity),
            ("parent_attribute", &self.parent_attribute),
            ("value_attribute", &self.value_attribute),
            ("summary_attribute", &self.summary_attribute),
        ] {
            if value.trim().is_empty() {
                return Err(RollupError::InvalidConfig(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }
}

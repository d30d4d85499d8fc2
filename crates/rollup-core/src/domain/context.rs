//! Triggering context handed to the step by the host pipeline.

use std::collections::BTreeMap;

use rollup_store::Record;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Label the host uses for the pre-operation snapshot.
pub const PRE_IMAGE: &str = "preImage";

/// Record operation that fired the pipeline event.
///
/// Hosts send free-form message names; the known ones are matched without
/// regard to case and anything else is carried as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageName {
    Create,
    Update,
    Delete,
    Other(String),
}

impl From<String> for MessageName {
    fn from(name: String) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "create" => MessageName::Create,
            "update" => MessageName::Update,
            "delete" => MessageName::Delete,
            _ => MessageName::Other(name),
        }
    }
}

impl From<MessageName> for String {
    fn from(message: MessageName) -> Self {
        message.to_string()
    }
}

impl std::fmt::Display for MessageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageName::Create => write!(f, "Create"),
            MessageName::Update => write!(f, "Update"),
            MessageName::Delete => write!(f, "Delete"),
            MessageName::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Record snapshots keyed by label.
pub type EntityImages = BTreeMap<String, Record>;

/// Everything the host knows about the operation in flight.
///
/// `target` is the record being created or updated; the step mutates it in
/// place and the host persists it after the step returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub message: MessageName,
    pub primary_entity: String,
    pub target: Record,
    #[serde(default)]
    pub pre_images: EntityImages,
    /// Post-operation snapshots; only populated by hosts running the step
    /// after the operation, which this step does not rely on
    #[serde(default)]
    pub post_images: EntityImages,
    /// Calling user
    #[serde(default = "Uuid::nil")]
    pub user_id: Uuid,
    /// Correlates trace output of one pipeline run
    #[serde(default = "Uuid::new_v4")]
    pub correlation_id: Uuid,
}

impl ExecutionContext {
    pub fn new(message: MessageName, target: Record) -> Self {
        Self {
            message,
            primary_entity: target.entity.clone(),
            target,
            pre_images: EntityImages::new(),
            post_images: EntityImages::new(),
            user_id: Uuid::nil(),
            correlation_id: Uuid::new_v4(),
        }
    }

    pub fn with_pre_image(mut self, image: Record) -> Self {
        self.pre_images.insert(PRE_IMAGE.to_string(), image);
        self
    }

    pub fn pre_image(&self) -> Option<&Record> {
        self.pre_images.get(PRE_IMAGE)
    }
}

//! Typed record model
//!
//! A [`Record`] is an entity instance identified by its entity (type) name and
//! a 128-bit [`RecordId`]. Attribute values are held in a sorted map so that
//! an attribute that is *absent* is distinguishable from one explicitly set to
//! [`AttributeValue::Null`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque 128-bit record identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    /// Generate a new random RecordId
    pub fn new() -> Self {
        RecordId(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(RecordId)
    }
}

/// Pointer to another record by entity name and id. Carries no ownership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityReference {
    pub entity: String,
    pub id: RecordId,
}

impl EntityReference {
    pub fn new(entity: impl Into<String>, id: RecordId) -> Self {
        Self {
            entity: entity.into(),
            id,
        }
    }
}

impl std::fmt::Display for EntityReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.entity, self.id)
    }
}

/// A typed attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Integer(i64),
    Decimal(f64),
    Text(String),
    Reference(EntityReference),
    Null,
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Short name of the value's shape, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            AttributeValue::Integer(_) => "integer",
            AttributeValue::Decimal(_) => "decimal",
            AttributeValue::Text(_) => "text",
            AttributeValue::Reference(_) => "reference",
            AttributeValue::Null => "null",
        }
    }

    /// Canonical string used by backends to index equality filters.
    ///
    /// Two values compare equal under a store filter iff their lookup keys
    /// are equal.
    pub fn lookup_key(&self) -> String {
        match self {
            AttributeValue::Integer(v) => format!("i:{v}"),
            AttributeValue::Decimal(v) => format!("d:{v}"),
            AttributeValue::Text(v) => format!("s:{v}"),
            AttributeValue::Reference(r) => format!("r:{}:{}", r.entity, r.id),
            AttributeValue::Null => "null".to_string(),
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Integer(i64::from(v))
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Decimal(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Text(v)
    }
}

impl From<EntityReference> for AttributeValue {
    fn from(v: EntityReference) -> Self {
        AttributeValue::Reference(v)
    }
}

/// A typed, identified bag of named attribute values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Entity (type) name, e.g. `lat_rollupentity`
    pub entity: String,
    /// Unique identifier
    pub id: RecordId,
    /// Attribute values keyed by attribute name
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Record {
    /// Create an empty record
    pub fn new(entity: impl Into<String>, id: RecordId) -> Self {
        Self {
            entity: entity.into(),
            id,
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.set(attribute, value);
        self
    }

    /// Get an attribute. `None` means absent; `Some(Null)` means explicitly null.
    pub fn get(&self, attribute: &str) -> Option<&AttributeValue> {
        self.attributes.get(attribute)
    }

    /// Set an attribute, returning the previous value if any
    pub fn set(
        &mut self,
        attribute: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Option<AttributeValue> {
        self.attributes.insert(attribute.into(), value.into())
    }

    pub fn remove(&mut self, attribute: &str) -> Option<AttributeValue> {
        self.attributes.remove(attribute)
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.attributes.contains_key(attribute)
    }

    /// The attribute as a reference, if it is one
    pub fn get_reference(&self, attribute: &str) -> Option<&EntityReference> {
        match self.get(attribute) {
            Some(AttributeValue::Reference(r)) => Some(r),
            _ => None,
        }
    }

    /// The attribute as text, if it is text
    pub fn get_text(&self, attribute: &str) -> Option<&str> {
        match self.get(attribute) {
            Some(AttributeValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Copy of this record restricted to the named attributes.
    pub fn project(&self, columns: &[String]) -> Record {
        let attributes = self
            .attributes
            .iter()
            .filter(|(name, _)| columns.iter().any(|c| c == *name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Record {
            entity: self.entity.clone(),
            id: self.id,
            attributes,
        }
    }
}

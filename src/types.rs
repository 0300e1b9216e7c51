//! Documents exchanged with the policy service.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Response of a data query.
///
/// OPA omits `result` when the requested document is undefined, so it is
/// optional here rather than defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse<T = Value> {
    /// The decision document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    /// Decision log identifier, present when decision logging is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_id: Option<String>,
}

impl<T> QueryResponse<T> {
    /// Create a response holding the given result.
    pub fn new(result: T) -> Self {
        Self {
            result: Some(result),
            decision_id: None,
        }
    }
}

/// Body of a 4xx response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BadRequestBody {
    /// Warning attached by the Data API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<Warning>,
    /// Error code of OPA's standard error envelope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Error message of OPA's standard error envelope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BadRequestBody {
    /// A one-line description, preferring the warning over the envelope.
    pub fn summary(&self) -> Option<String> {
        self.warning
            .as_ref()
            .and_then(|warning| describe(warning.message.as_deref(), warning.code.as_deref()))
            .or_else(|| describe(self.message.as_deref(), self.code.as_deref()))
    }
}

fn describe(message: Option<&str>, code: Option<&str>) -> Option<String> {
    match (message, code) {
        (Some(message), Some(code)) => Some(format!("{} ({})", message, code)),
        (Some(message), None) => Some(message.to_string()),
        (None, Some(code)) => Some(code.to_string()),
        (None, None) => None,
    }
}

/// Warning reported by the policy service.
///
/// Either field may be missing from what the service sends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Machine-readable warning code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Warning {
    /// Create a warning with both code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: Some(message.into()),
        }
    }
}

/// A typed input document for the common subject/resource shape.
///
/// Anything else goes into `extra` and is flattened into the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryInput {
    /// Who is acting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Entity>,
    /// What is acted upon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Entity>,
    /// Request headers forwarded to the policy
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Additional fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QueryInput {
    /// Create an empty input document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the subject.
    pub fn with_subject(mut self, subject: Entity) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Set the resource.
    pub fn with_resource(mut self, resource: Entity) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Add a forwarded header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add an extra field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Convert to a JSON document.
    pub fn to_value(&self) -> crate::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Subject or resource reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Identifier, numeric or textual
    pub id: EntityId,
    /// Optional type tag
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Entity {
    /// Create a reference without a type tag.
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            kind: None,
        }
    }

    /// Set the type tag.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

/// Identifier that serializes as a bare string or number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Numeric identifier
    Number(i64),
    /// Textual identifier
    Text(String),
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        EntityId::Number(id)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId::Text(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        EntityId::Text(id)
    }
}

/// Shared entity vocabulary
///
/// Entities are described to the rest of the system through a small field
/// table: the diff engine walks it, the repository builds UPDATE statements
/// from it, and payload parsing validates incoming JSON against it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Request field naming the author of a mutation; never an entity attribute
pub const ACTOR_FIELD: &str = "user_id";

/// The audited entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Project,
    Task,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::Project, EntityKind::Task];

    pub fn label(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Task => "task",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            Self::Project => "projects",
            Self::Task => "tasks",
        }
    }

    pub fn comments_table(self) -> &'static str {
        match self {
            Self::Project => "project_comments",
            Self::Task => "task_comments",
        }
    }

    pub fn documents_table(self) -> &'static str {
        match self {
            Self::Project => "project_documents",
            Self::Task => "task_documents",
        }
    }

    /// Column that dependent rows use to reference the entity
    pub fn foreign_key(self) -> &'static str {
        match self {
            Self::Project => "project_id",
            Self::Task => "task_id",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Storage type of an updatable field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Uuid,
    Timestamp,
}

/// One updatable field of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Required fields can never be cleared
    pub required: bool,
}

impl FieldDef {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, required: true }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, required: false }
    }
}

/// A field value as stored or requested
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// String form used in audit payloads; an unset value is the empty string
    pub fn to_audit_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(text) => text.clone(),
            Self::Uuid(id) => id.to_string(),
            Self::Timestamp(ts) => ts.to_rfc3339(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            other => Value::String(other.to_audit_string()),
        }
    }

    /// Parse a JSON value according to the declared field kind
    pub fn from_json(def: &FieldDef, value: &Value) -> Result<Self, String> {
        let text = match value {
            Value::Null => return Ok(Self::Null),
            Value::String(text) => text,
            other => return Err(format!("field '{}' expects a string, got {}", def.name, other)),
        };
        match def.kind {
            FieldKind::Text => Ok(Self::Text(text.clone())),
            FieldKind::Uuid => Uuid::parse_str(text)
                .map(Self::Uuid)
                .map_err(|e| format!("field '{}' is not a valid UUID: {}", def.name, e)),
            FieldKind::Timestamp => DateTime::parse_from_rfc3339(text)
                .map(|ts| Self::Timestamp(ts.with_timezone(&Utc)))
                .map_err(|e| format!("field '{}' is not an RFC 3339 timestamp: {}", def.name, e)),
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// An audited, mutable record owned by the entity repository
pub trait Entity:
    for<'r> FromRow<'r, SqliteRow> + Serialize + Clone + fmt::Debug + Send + Sync + Unpin + 'static
{
    const KIND: EntityKind;

    /// Updatable fields in declaration order
    const FIELDS: &'static [FieldDef];

    fn id(&self) -> i64;

    /// Current value of an updatable field; undeclared names read as null
    fn field(&self, name: &str) -> FieldValue;
}

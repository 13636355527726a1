/// Field-level change detection between stored state and an update payload
///
/// Full updates compare every declared field (absent means null, so a full
/// update can clear a field). Partial updates compare only the fields the
/// payload carries. The actor field is never a candidate.

use crate::entity::{Entity, FieldDef, FieldValue, ACTOR_FIELD};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Update semantics requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateMode {
    /// PUT: every declared field is written
    Full,
    /// PATCH: only fields present in the payload are written
    Partial,
}

/// An incoming update: who asked, and the declared fields they sent
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePayload {
    pub actor_id: Uuid,
    fields: BTreeMap<String, FieldValue>,
}

impl UpdatePayload {
    pub fn new(actor_id: Uuid) -> Self {
        Self {
            actor_id,
            fields: BTreeMap::new(),
        }
    }

    /// Add a field value; the actor field is ignored
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        if name != ACTOR_FIELD {
            self.fields.insert(name.to_string(), value.into());
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Parse a JSON request body for entity `E`
    ///
    /// `user_id` becomes the actor; declared fields are type-checked; unknown
    /// keys are ignored.
    pub fn from_json<E: Entity>(body: &Value, mode: UpdateMode) -> Result<Self> {
        let object = body
            .as_object()
            .ok_or_else(|| Error::Validation("update body must be a JSON object".to_string()))?;

        let actor_id = object
            .get(ACTOR_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Validation(format!("'{}' is required", ACTOR_FIELD)))
            .and_then(|raw| {
                Uuid::parse_str(raw)
                    .map_err(|e| Error::Validation(format!("'{}' is not a valid UUID: {}", ACTOR_FIELD, e)))
            })?;

        let mut payload = Self::new(actor_id);
        for def in E::FIELDS {
            if let Some(raw) = object.get(def.name) {
                let value = FieldValue::from_json(def, raw).map_err(Error::Validation)?;
                payload.fields.insert(def.name.to_string(), value);
            }
        }

        payload.validate::<E>(mode)?;
        Ok(payload)
    }

    /// Reject payloads that would clear a required field
    pub fn validate<E: Entity>(&self, mode: UpdateMode) -> Result<()> {
        for def in E::FIELDS.iter().filter(|def| def.required) {
            let clears = match self.fields.get(def.name) {
                Some(FieldValue::Text(text)) => text.trim().is_empty(),
                Some(value) => value.is_null(),
                None => mode == UpdateMode::Full,
            };
            if clears {
                return Err(Error::Validation(format!(
                    "field '{}' of {} cannot be empty",
                    def.name,
                    E::KIND
                )));
            }
        }
        Ok(())
    }
}

/// One changed field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: &'static str,
    pub old: FieldValue,
    pub new: FieldValue,
}

/// Changed fields of one update, in entity declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<FieldChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldChange> {
        self.changes.iter()
    }

    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.changes.iter().find(|change| change.field == field)
    }

    pub fn fields(&self) -> Vec<&'static str> {
        self.changes.iter().map(|change| change.field).collect()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a FieldChange;
    type IntoIter = std::slice::Iter<'a, FieldChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

/// Fields the update writes, with the value each one receives
///
/// The same candidate list feeds both the diff and the repository apply.
pub fn assignments<E: Entity>(
    payload: &UpdatePayload,
    mode: UpdateMode,
) -> Vec<(&'static FieldDef, FieldValue)> {
    E::FIELDS
        .iter()
        .filter(|def| def.name != ACTOR_FIELD)
        .filter_map(|def| match (mode, payload.get(def.name)) {
            (_, Some(value)) => Some((def, value.clone())),
            (UpdateMode::Full, None) => Some((def, FieldValue::Null)),
            (UpdateMode::Partial, None) => None,
        })
        .collect()
}

/// Compute the change set of applying `payload` to `current`
pub fn diff<E: Entity>(current: &E, payload: &UpdatePayload, mode: UpdateMode) -> ChangeSet {
    let changes = assignments::<E>(payload, mode)
        .into_iter()
        .filter_map(|(def, new)| {
            let old = current.field(def.name);
            (old != new).then_some(FieldChange {
                field: def.name,
                old,
                new,
            })
        })
        .collect();
    ChangeSet { changes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Task;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn task() -> Task {
        Task {
            id: 7,
            name: "Write report".to_string(),
            description: Some("quarterly".to_string()),
            project_id: 1,
            parent_task_id: None,
            creator_id: Uuid::nil(),
            executor_id: Some(Uuid::from_u128(42)),
            completion_date: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            create_date: Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap(),
            update_date: None,
        }
    }

    #[test]
    fn partial_diff_ignores_absent_fields() {
        let payload = UpdatePayload::new(Uuid::new_v4()).with("name", "Write final report");
        let changes = diff(&task(), &payload, UpdateMode::Partial);

        assert_eq!(changes.fields(), vec!["name"]);
        assert!(changes.get("description").is_none());
    }

    #[test]
    fn partial_diff_of_equal_value_is_empty() {
        let payload = UpdatePayload::new(Uuid::new_v4()).with("name", "Write report");
        assert!(diff(&task(), &payload, UpdateMode::Partial).is_empty());
    }

    #[test]
    fn full_diff_clears_omitted_fields() {
        let payload = UpdatePayload::new(Uuid::new_v4()).with("name", "Write report");
        let changes = diff(&task(), &payload, UpdateMode::Full);

        assert_eq!(changes.fields(), vec!["description", "executor_id", "completion_date"]);
        let executor = changes.get("executor_id").unwrap();
        assert_eq!(executor.old, FieldValue::Uuid(Uuid::from_u128(42)));
        assert_eq!(executor.new, FieldValue::Null);
    }

    #[test]
    fn full_assignments_cover_every_declared_field() {
        let payload = UpdatePayload::new(Uuid::new_v4()).with("name", "x");
        let fields: Vec<&str> = assignments::<Task>(&payload, UpdateMode::Full)
            .iter()
            .map(|(def, _)| def.name)
            .collect();
        assert_eq!(fields, vec!["name", "description", "executor_id", "completion_date"]);
    }

    #[test]
    fn actor_field_is_never_a_candidate() {
        let payload = UpdatePayload::new(Uuid::new_v4()).with(ACTOR_FIELD, Uuid::new_v4());
        assert!(!payload.contains(ACTOR_FIELD));
        assert!(diff(&task(), &payload, UpdateMode::Partial).is_empty());
    }

    #[test]
    fn json_payload_extracts_actor_and_typed_fields() {
        let actor = Uuid::new_v4();
        let body = json!({
            "user_id": actor.to_string(),
            "executor_id": null,
            "completion_date": "2024-06-01T00:00:00Z",
            "unknown": 1
        });
        let payload = UpdatePayload::from_json::<Task>(&body, UpdateMode::Partial).unwrap();

        assert_eq!(payload.actor_id, actor);
        assert_eq!(payload.get("executor_id"), Some(&FieldValue::Null));
        assert_eq!(
            payload.get("completion_date"),
            Some(&FieldValue::Timestamp(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()))
        );
        assert!(!payload.contains("unknown"));
    }

    #[test]
    fn json_payload_rejects_bad_input() {
        let actor = Uuid::new_v4().to_string();

        let missing_actor = json!({ "name": "x" });
        assert!(matches!(
            UpdatePayload::from_json::<Task>(&missing_actor, UpdateMode::Partial),
            Err(Error::Validation(_))
        ));

        let full_without_name = json!({ "user_id": actor });
        assert!(matches!(
            UpdatePayload::from_json::<Task>(&full_without_name, UpdateMode::Full),
            Err(Error::Validation(_))
        ));

        let null_name = json!({ "user_id": actor, "name": null });
        assert!(matches!(
            UpdatePayload::from_json::<Task>(&null_name, UpdateMode::Partial),
            Err(Error::Validation(_))
        ));

        let blank_name = json!({ "user_id": actor, "name": "   " });
        assert!(matches!(
            UpdatePayload::from_json::<Task>(&blank_name, UpdateMode::Partial),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            UpdatePayload::new(Uuid::new_v4())
                .with("name", "")
                .validate::<Task>(UpdateMode::Full),
            Err(Error::Validation(_))
        ));

        let bad_executor = json!({ "user_id": actor, "executor_id": "bob" });
        assert!(matches!(
            UpdatePayload::from_json::<Task>(&bad_executor, UpdateMode::Partial),
            Err(Error::Validation(_))
        ));
    }
}

/// Audit trail persistence
///
/// Turns each field change into one typed, immutable record, and manages the
/// user-authored free-text comments that share the same table.

use crate::audit::comment_type::CommentKind;
use crate::audit::diff::{ChangeSet, FieldChange};
use crate::database::Database;
use crate::entity::{entity_exists, EntityKind};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

/// A persisted audit record or user comment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub entity_id: i64,
    pub type_id: i64,
    pub user_id: Uuid,
    pub create_date: DateTime<Utc>,
    pub data: Value,
}

impl AuditRecord {
    pub fn kind(&self) -> Option<CommentKind> {
        CommentKind::from_id(self.type_id)
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        let data: String = row.try_get("data")?;
        Ok(Self {
            id: row.try_get("id")?,
            entity_id: row.try_get("entity_id")?,
            type_id: row.try_get("type_id")?,
            user_id: row.try_get("user_id")?,
            create_date: row.try_get("create_date")?,
            data: serde_json::from_str(&data)
                .map_err(|e| Error::Database(sqlx::Error::Decode(Box::new(e))))?,
        })
    }
}

/// Audit category and payload for one field change
///
/// Returns `None` for fields that are applied but not audited.
pub fn encode(change: &FieldChange) -> Option<(CommentKind, Value)> {
    match change.field {
        "name" => Some((
            CommentKind::Rename,
            json!({ "early_name": change.old.to_json(), "name": change.new.to_json() }),
        )),
        // content is never echoed into the trail
        "description" => Some((CommentKind::Rename, json!({ "description": null }))),
        "executor_id" => Some((
            CommentKind::Reassign,
            json!({
                "early_executor_id": change.old.to_audit_string(),
                "executor_id": change.new.to_audit_string(),
            }),
        )),
        "completion_date" => Some((
            CommentKind::Reschedule,
            json!({
                "early_completion_date": change.old.to_audit_string(),
                "completion_date": change.new.to_audit_string(),
            }),
        )),
        _ => None,
    }
}

fn select_comments(kind: EntityKind) -> String {
    format!(
        "SELECT id, {fk} AS entity_id, type_id, user_id, create_date, data FROM {table}",
        fk = kind.foreign_key(),
        table = kind.comments_table(),
    )
}

/// Writer for the comment tables of every entity kind
#[derive(Debug, Clone)]
pub struct AuditLogWriter {
    db: Database,
}

impl AuditLogWriter {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist one record per audited change, inside the caller's transaction
    ///
    /// Records share `create_date` and are written in change-set order.
    pub async fn record_in(
        conn: &mut SqliteConnection,
        kind: EntityKind,
        entity_id: i64,
        actor_id: Uuid,
        create_date: DateTime<Utc>,
        changes: &ChangeSet,
    ) -> Result<Vec<AuditRecord>> {
        let mut records = Vec::with_capacity(changes.len());
        for change in changes {
            let Some((comment_kind, data)) = encode(change) else {
                tracing::debug!("⏭️ Field '{}' of {} {} is not audited", change.field, kind, entity_id);
                continue;
            };
            let record = AuditRecord {
                id: Uuid::new_v4(),
                entity_id,
                type_id: comment_kind.id(),
                user_id: actor_id,
                create_date,
                data,
            };
            Self::insert_in(conn, kind, &record).await?;
            records.push(record);
        }
        Ok(records)
    }

    async fn insert_in(conn: &mut SqliteConnection, kind: EntityKind, record: &AuditRecord) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (id, {}, type_id, user_id, create_date, data) VALUES (?, ?, ?, ?, ?, ?)",
            kind.comments_table(),
            kind.foreign_key(),
        );
        sqlx::query(&sql)
            .bind(record.id)
            .bind(record.entity_id)
            .bind(record.type_id)
            .bind(record.user_id)
            .bind(record.create_date)
            .bind(record.data.to_string())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Add a free-text comment, bypassing diffing
    pub async fn create_user_comment(
        &self,
        kind: EntityKind,
        entity_id: i64,
        actor_id: Uuid,
        message: &str,
    ) -> Result<AuditRecord> {
        // write lock first: a deferred read snapshot cannot be upgraded under WAL
        let mut tx = self.db.begin_write().await?;
        if !entity_exists(&mut tx, kind, entity_id).await? {
            return Err(Error::not_found(format!("{} {}", kind, entity_id)));
        }

        let record = AuditRecord {
            id: Uuid::new_v4(),
            entity_id,
            type_id: CommentKind::FreeText.id(),
            user_id: actor_id,
            create_date: Utc::now(),
            data: json!({ "message": message }),
        };
        Self::insert_in(&mut tx, kind, &record).await?;
        tx.commit().await?;

        tracing::info!("💬 Comment {} added to {} {}", record.id, kind, entity_id);
        Ok(record)
    }

    /// Replace the message of a free-text comment
    ///
    /// System records are immutable and resolve as not found.
    pub async fn update_user_comment(
        &self,
        kind: EntityKind,
        entity_id: i64,
        comment_id: Uuid,
        message: &str,
    ) -> Result<AuditRecord> {
        let sql = format!(
            "UPDATE {} SET data = ? WHERE id = ? AND {} = ? AND type_id = ?",
            kind.comments_table(),
            kind.foreign_key(),
        );
        let result = sqlx::query(&sql)
            .bind(json!({ "message": message }).to_string())
            .bind(comment_id)
            .bind(entity_id)
            .bind(CommentKind::FreeText.id())
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() != 1 {
            return Err(Error::not_found(format!("comment {}", comment_id)));
        }
        self.get(kind, entity_id, comment_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("comment {}", comment_id)))
    }

    /// Delete a free-text comment inside the caller's transaction
    ///
    /// Returns the removed record and the storage keys of its attachments; the
    /// caller unlinks them after commit.
    pub async fn delete_user_comment_in(
        conn: &mut SqliteConnection,
        kind: EntityKind,
        entity_id: i64,
        comment_id: Uuid,
    ) -> Result<(AuditRecord, Vec<String>)> {
        let select = format!(
            "{} WHERE id = ? AND {} = ? AND type_id = ?",
            select_comments(kind),
            kind.foreign_key()
        );
        let row = sqlx::query(&select)
            .bind(comment_id)
            .bind(entity_id)
            .bind(CommentKind::FreeText.id())
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| Error::not_found(format!("comment {}", comment_id)))?;
        let record = AuditRecord::from_row(&row)?;

        let keys_sql = format!("SELECT storage_key FROM {} WHERE comment_id = ?", kind.documents_table());
        let keys = sqlx::query_scalar::<_, String>(&keys_sql)
            .bind(comment_id)
            .fetch_all(&mut *conn)
            .await?;

        let delete = format!(
            "DELETE FROM {} WHERE id = ? AND type_id = ?",
            kind.comments_table()
        );
        let result = sqlx::query(&delete)
            .bind(comment_id)
            .bind(CommentKind::FreeText.id())
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() != 1 {
            return Err(Error::not_found(format!("comment {}", comment_id)));
        }

        Ok((record, keys))
    }

    /// All records of an entity, oldest first
    pub async fn list(&self, kind: EntityKind, entity_id: i64) -> Result<Vec<AuditRecord>> {
        let sql = format!(
            "{} WHERE {} = ? ORDER BY create_date, rowid",
            select_comments(kind),
            kind.foreign_key()
        );
        let rows = sqlx::query(&sql).bind(entity_id).fetch_all(self.db.pool()).await?;
        rows.iter().map(AuditRecord::from_row).collect()
    }

    /// One record, scoped to its entity
    pub async fn get(&self, kind: EntityKind, entity_id: i64, comment_id: Uuid) -> Result<Option<AuditRecord>> {
        let mut conn = self.db.pool().acquire().await?;
        Self::get_in(&mut conn, kind, entity_id, comment_id).await
    }

    pub async fn get_in(
        conn: &mut SqliteConnection,
        kind: EntityKind,
        entity_id: i64,
        comment_id: Uuid,
    ) -> Result<Option<AuditRecord>> {
        let sql = format!("{} WHERE id = ? AND {} = ?", select_comments(kind), kind.foreign_key());
        let row = sqlx::query(&sql)
            .bind(comment_id)
            .bind(entity_id)
            .fetch_optional(&mut *conn)
            .await?;
        row.as_ref().map(AuditRecord::from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::FieldValue;
    use chrono::TimeZone;

    fn change(field: &'static str, old: FieldValue, new: FieldValue) -> FieldChange {
        FieldChange { field, old, new }
    }

    #[test]
    fn rename_carries_both_names() {
        let (kind, data) = encode(&change("name", "old".into(), "new".into())).unwrap();
        assert_eq!(kind, CommentKind::Rename);
        assert_eq!(data, json!({ "early_name": "old", "name": "new" }));
    }

    #[test]
    fn description_change_hides_content() {
        let (kind, data) = encode(&change("description", "a".into(), "b".into())).unwrap();
        assert_eq!(kind, CommentKind::Rename);
        assert_eq!(data, json!({ "description": null }));
    }

    #[test]
    fn reassignment_uses_empty_string_for_unset() {
        let executor = Uuid::from_u128(7);
        let (kind, data) = encode(&change("executor_id", executor.into(), FieldValue::Null)).unwrap();
        assert_eq!(kind, CommentKind::Reassign);
        assert_eq!(data, json!({ "early_executor_id": executor.to_string(), "executor_id": "" }));

        let (_, data) = encode(&change("executor_id", FieldValue::Null, executor.into())).unwrap();
        assert_eq!(data, json!({ "early_executor_id": "", "executor_id": executor.to_string() }));
    }

    #[test]
    fn reschedule_formats_timestamps() {
        let due = Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap();
        let (kind, data) = encode(&change("completion_date", FieldValue::Null, due.into())).unwrap();
        assert_eq!(kind, CommentKind::Reschedule);
        assert_eq!(
            data,
            json!({ "early_completion_date": "", "completion_date": "2024-03-01T10:30:00+00:00" })
        );
    }

    #[test]
    fn unrecognized_fields_are_not_audited() {
        assert!(encode(&change("parent_task_id", FieldValue::Null, "3".into())).is_none());
    }
}

/// SQLite persistence for audited entities
///
/// Every operation comes in a pool flavour for plain reads and an `_in`
/// flavour that runs on a caller-supplied connection, so the update and
/// deletion paths can keep read, write and audit inside one transaction.

use crate::entity::types::{Entity, EntityKind, FieldDef, FieldValue};
use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::marker::PhantomData;

/// Subtree document keys of a project: its own documents plus those of every task in it
const PROJECT_STORAGE_KEYS: &str = r#"
    SELECT storage_key FROM project_documents WHERE project_id = ?1
    UNION ALL
    SELECT d.storage_key
    FROM task_documents d
    JOIN tasks t ON t.id = d.task_id
    WHERE t.project_id = ?1
"#;

/// Subtree document keys of a task: its own documents plus those of all descendants
const TASK_STORAGE_KEYS: &str = r#"
    WITH RECURSIVE subtree(id) AS (
        SELECT id FROM tasks WHERE id = ?1
        UNION ALL
        SELECT t.id FROM tasks t JOIN subtree s ON t.parent_task_id = s.id
    )
    SELECT d.storage_key
    FROM task_documents d
    JOIN subtree s ON s.id = d.task_id
"#;

/// Repository for one entity kind
#[derive(Debug, Clone)]
pub struct EntityRepository<E> {
    pool: SqlitePool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> EntityRepository<E> {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    /// Retrieve an entity by id
    pub async fn get(&self, id: i64) -> Result<Option<E>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_in(&mut conn, id).await
    }

    pub async fn get_in(conn: &mut SqliteConnection, id: i64) -> Result<Option<E>> {
        let sql = format!("SELECT * FROM {} WHERE id = ?", E::KIND.table());
        let entity = sqlx::query_as::<_, E>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(entity)
    }

    /// Write the given field values and stamp `update_date`
    ///
    /// Returns the number of rows touched; anything but 1 means the entity
    /// is gone.
    pub async fn apply_in(
        conn: &mut SqliteConnection,
        id: i64,
        assignments: &[(&'static FieldDef, FieldValue)],
        update_date: DateTime<Utc>,
    ) -> Result<u64> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET ", E::KIND.table()));
        {
            let mut set = builder.separated(", ");
            for (def, value) in assignments {
                set.push(format!("{} = ", def.name));
                match value {
                    FieldValue::Null => set.push_bind_unseparated(None::<String>),
                    FieldValue::Text(text) => set.push_bind_unseparated(text.clone()),
                    FieldValue::Uuid(id) => set.push_bind_unseparated(*id),
                    FieldValue::Timestamp(ts) => set.push_bind_unseparated(*ts),
                };
            }
            set.push("update_date = ");
            set.push_bind_unseparated(update_date);
        }
        builder.push(" WHERE id = ").push_bind(id);

        let result = builder.build().execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    /// Delete the entity row; dependent rows go with it through ON DELETE CASCADE
    pub async fn delete_in(conn: &mut SqliteConnection, id: i64) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE id = ?", E::KIND.table());
        let result = sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    /// Storage keys of every document the cascade from `id` will remove
    pub async fn storage_keys_in(conn: &mut SqliteConnection, id: i64) -> Result<Vec<String>> {
        let sql = match E::KIND {
            EntityKind::Project => PROJECT_STORAGE_KEYS,
            EntityKind::Task => TASK_STORAGE_KEYS,
        };
        let keys = sqlx::query_scalar::<_, String>(sql)
            .bind(id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(keys)
    }
}

/// Whether an entity of `kind` with `id` exists
pub async fn entity_exists(conn: &mut SqliteConnection, kind: EntityKind, id: i64) -> Result<bool> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?)", kind.table());
    let exists: bool = sqlx::query_scalar(&sql).bind(id).fetch_one(&mut *conn).await?;
    Ok(exists)
}

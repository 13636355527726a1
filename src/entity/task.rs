/// Task entity and task-specific persistence
///
/// Tasks belong to a project and may nest under a parent task. Deleting a
/// task removes its whole subtree.

use crate::entity::types::{Entity, EntityKind, FieldDef, FieldKind, FieldValue};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

/// A stored task or subtask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub project_id: i64,
    pub parent_task_id: Option<i64>,
    pub creator_id: Uuid,
    pub executor_id: Option<Uuid>,
    pub completion_date: Option<DateTime<Utc>>,
    pub create_date: DateTime<Utc>,
    pub update_date: Option<DateTime<Utc>>,
}

/// Fields accepted when creating a task
#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub project_id: i64,
    #[serde(default)]
    pub parent_task_id: Option<i64>,
    pub creator_id: Uuid,
    #[serde(default)]
    pub executor_id: Option<Uuid>,
    #[serde(default)]
    pub completion_date: Option<DateTime<Utc>>,
}

impl Entity for Task {
    const KIND: EntityKind = EntityKind::Task;

    const FIELDS: &'static [FieldDef] = &[
        FieldDef::required("name", FieldKind::Text),
        FieldDef::optional("description", FieldKind::Text),
        FieldDef::optional("executor_id", FieldKind::Uuid),
        FieldDef::optional("completion_date", FieldKind::Timestamp),
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "name" => self.name.as_str().into(),
            "description" => self.description.clone().into(),
            "executor_id" => self.executor_id.into(),
            "completion_date" => self.completion_date.into(),
            _ => FieldValue::Null,
        }
    }
}

impl Task {
    /// Insert a new task after checking its project and parent
    ///
    /// A parent task must live in the same project.
    pub async fn create(
        conn: &mut SqliteConnection,
        new: &NewTask,
        create_date: DateTime<Utc>,
    ) -> Result<Task> {
        let project: Option<i64> = sqlx::query_scalar("SELECT id FROM projects WHERE id = ?")
            .bind(new.project_id)
            .fetch_optional(&mut *conn)
            .await?;
        if project.is_none() {
            return Err(Error::not_found(format!("project {}", new.project_id)));
        }

        if let Some(parent_id) = new.parent_task_id {
            let parent: Option<i64> =
                sqlx::query_scalar("SELECT id FROM tasks WHERE id = ? AND project_id = ?")
                    .bind(parent_id)
                    .bind(new.project_id)
                    .fetch_optional(&mut *conn)
                    .await?;
            if parent.is_none() {
                return Err(Error::not_found(format!("parent task {}", parent_id)));
            }
        }

        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (name, description, project_id, parent_task_id, creator_id,
                               executor_id, completion_date, create_date)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, name, description, project_id, parent_task_id, creator_id,
                      executor_id, completion_date, create_date, update_date
            "#,
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.project_id)
        .bind(new.parent_task_id)
        .bind(new.creator_id)
        .bind(new.executor_id)
        .bind(new.completion_date)
        .bind(create_date)
        .fetch_one(&mut *conn)
        .await?;

        Ok(task)
    }

    /// Direct children of `parent_task_id` (top-level tasks when `None`), oldest first
    pub async fn list(
        pool: &SqlitePool,
        project_id: i64,
        parent_task_id: Option<i64>,
    ) -> Result<Vec<Task>> {
        let tasks = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, name, description, project_id, parent_task_id, creator_id,
                   executor_id, completion_date, create_date, update_date
            FROM tasks
            WHERE project_id = ? AND parent_task_id IS ?
            ORDER BY create_date, id
            "#,
        )
        .bind(project_id)
        .bind(parent_task_id)
        .fetch_all(pool)
        .await?;

        Ok(tasks)
    }
}

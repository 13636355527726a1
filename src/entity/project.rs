/// Project entity and project-specific persistence
///
/// Projects are the top-level containers; tasks hang off a project and are
/// removed together with it.

use crate::entity::types::{Entity, EntityKind, FieldDef, FieldKind, FieldValue};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

const SELECT_PROJECT: &str = "SELECT id, name, description, creator_id, completion_date, create_date, update_date FROM projects";

/// A stored project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: Uuid,
    pub completion_date: Option<DateTime<Utc>>,
    pub create_date: DateTime<Utc>,
    pub update_date: Option<DateTime<Utc>>,
}

/// Fields accepted when creating a project
#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub creator_id: Uuid,
    #[serde(default)]
    pub completion_date: Option<DateTime<Utc>>,
}

impl Entity for Project {
    const KIND: EntityKind = EntityKind::Project;

    const FIELDS: &'static [FieldDef] = &[
        FieldDef::required("name", FieldKind::Text),
        FieldDef::optional("description", FieldKind::Text),
        FieldDef::optional("completion_date", FieldKind::Timestamp),
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "name" => self.name.as_str().into(),
            "description" => self.description.clone().into(),
            "completion_date" => self.completion_date.into(),
            _ => FieldValue::Null,
        }
    }
}

impl Project {
    /// Insert a new project stamped with `create_date`
    pub async fn create(
        conn: &mut SqliteConnection,
        new: &NewProject,
        create_date: DateTime<Utc>,
    ) -> Result<Project> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (name, description, creator_id, completion_date, create_date)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, name, description, creator_id, completion_date, create_date, update_date
            "#,
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.creator_id)
        .bind(new.completion_date)
        .bind(create_date)
        .fetch_one(&mut *conn)
        .await?;

        Ok(project)
    }

    /// All projects, oldest first
    pub async fn list(pool: &SqlitePool) -> Result<Vec<Project>> {
        let sql = format!("{SELECT_PROJECT} ORDER BY create_date, id");
        Ok(sqlx::query_as::<_, Project>(&sql).fetch_all(pool).await?)
    }
}

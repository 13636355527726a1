/// SQLite connection management and schema initialization
///
/// One database file holds projects, tasks, their comment trails and their
/// document metadata. Foreign keys are enforced so that deleting an entity
/// cascades to every dependent row.

use crate::config::DatabaseConfig;
use crate::entity::EntityKind;
use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::time::Duration;

/// Write transactions take the database write lock before their first read
const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";

/// Shared handle to the relational store
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database file and make sure the schema exists
    ///
    /// Writers queue on the database lock for up to `busy_timeout_ms` before
    /// the attempt fails as a conflict.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let path = config.path.as_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        tracing::info!("🗄️ Opening database: {}", path.display());

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;

        tracing::info!("✅ Database ready: {}", path.display());
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a serializable unit of work
    ///
    /// The snapshot read, the apply and the audit inserts of one update all
    /// run inside the returned transaction; dropping it without commit rolls
    /// everything back.
    pub async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with(BEGIN_WRITE).await?)
    }

    /// Create tables and indexes; safe to call repeatedly
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comment_types (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT,
                creator_id BLOB NOT NULL,
                completion_date TEXT,
                create_date TEXT NOT NULL,
                update_date TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                parent_task_id INTEGER REFERENCES tasks(id) ON DELETE CASCADE,
                creator_id BLOB NOT NULL,
                executor_id BLOB,
                completion_date TEXT,
                create_date TEXT NOT NULL,
                update_date TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id, parent_task_id)")
            .execute(&self.pool)
            .await?;

        for kind in EntityKind::ALL {
            self.init_kind_schema(kind).await?;
        }

        Ok(())
    }

    /// Comment trail and document metadata tables for one entity kind
    async fn init_kind_schema(&self, kind: EntityKind) -> Result<()> {
        let comments = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {comments} (
                id BLOB PRIMARY KEY,
                {fk} INTEGER NOT NULL REFERENCES {entities}(id) ON DELETE CASCADE,
                type_id INTEGER NOT NULL REFERENCES comment_types(id),
                user_id BLOB NOT NULL,
                create_date TEXT NOT NULL,
                data TEXT NOT NULL
            )
            "#,
            comments = kind.comments_table(),
            fk = kind.foreign_key(),
            entities = kind.table(),
        );
        sqlx::query(&comments).execute(&self.pool).await?;

        let documents = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {documents} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                {fk} INTEGER NOT NULL REFERENCES {entities}(id) ON DELETE CASCADE,
                comment_id BLOB REFERENCES {comments}(id) ON DELETE CASCADE,
                user_id BLOB NOT NULL,
                name TEXT NOT NULL,
                storage_key TEXT NOT NULL UNIQUE,
                create_date TEXT NOT NULL
            )
            "#,
            documents = kind.documents_table(),
            fk = kind.foreign_key(),
            entities = kind.table(),
            comments = kind.comments_table(),
        );
        sqlx::query(&documents).execute(&self.pool).await?;

        let indexes = [
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{c}_entity ON {c}({fk}, create_date)",
                c = kind.comments_table(),
                fk = kind.foreign_key(),
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{d}_entity ON {d}({fk}, comment_id)",
                d = kind.documents_table(),
                fk = kind.foreign_key(),
            ),
        ];
        for ddl in &indexes {
            sqlx::query(ddl).execute(&self.pool).await?;
        }

        Ok(())
    }
}

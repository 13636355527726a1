/// Comment-type taxonomy and its startup-seeded registry
///
/// The set of audit record categories is closed: every id maps to one
/// `CommentKind`. Rows are upserted from a JSON seed file at startup and the
/// validated mapping is kept in an ArcSwap for lock-free reads.

use crate::error::{Error, Result};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Category of an audit record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CommentKind {
    /// Rename or generic field edit
    Rename,
    /// Executor reassignment
    Reassign,
    /// Completion date change
    Reschedule,
    /// User-authored comment
    FreeText,
}

impl CommentKind {
    pub const ALL: [CommentKind; 4] = [
        CommentKind::Rename,
        CommentKind::Reassign,
        CommentKind::Reschedule,
        CommentKind::FreeText,
    ];

    /// Externally fixed type id
    pub fn id(self) -> i64 {
        match self {
            Self::Rename => 1,
            Self::Reassign => 2,
            Self::Reschedule => 3,
            Self::FreeText => 4,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }
}

/// A taxonomy row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CommentType {
    pub id: i64,
    pub name: String,
}

/// Read-mostly registry of comment types backed by the `comment_types` table
#[derive(Debug)]
pub struct CommentTypeRegistry {
    types: ArcSwap<HashMap<CommentKind, CommentType>>,
    pool: SqlitePool,
}

impl CommentTypeRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            types: ArcSwap::new(Arc::new(HashMap::new())),
            pool,
        }
    }

    /// Insert or overwrite a comment type by primary key
    ///
    /// A single conditional insert, so concurrent startups cannot race into a
    /// duplicate-key failure.
    pub async fn upsert(&self, id: i64, name: &str) -> Result<CommentType> {
        let kind = CommentKind::from_id(id)
            .ok_or_else(|| Error::Config(format!("unknown comment type id {}", id)))?;

        let stored = sqlx::query_as::<_, CommentType>(
            r#"
            INSERT INTO comment_types (id, name)
            VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            RETURNING id, name
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        self.types.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(kind, stored.clone());
            next
        });

        tracing::debug!("🏷️ Upserted comment type {} = '{}'", stored.id, stored.name);
        Ok(stored)
    }

    /// Seed the taxonomy from a JSON array of `{id, name}`
    ///
    /// Every entry is validated before the first write, so a malformed file
    /// leaves the table untouched.
    pub async fn load_from_file(&self, path: &Path) -> Result<usize> {
        tracing::info!("📥 Loading comment types from {}", path.display());

        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("cannot read comment types file '{}': {}", path.display(), e))
        })?;
        let entries: Vec<CommentType> = serde_json::from_str(&raw).map_err(|e| {
            Error::Config(format!("malformed comment types file '{}': {}", path.display(), e))
        })?;

        if let Some(bad) = entries.iter().find(|e| CommentKind::from_id(e.id).is_none()) {
            return Err(Error::Config(format!(
                "comment type id {} ('{}') is not a known category",
                bad.id, bad.name
            )));
        }

        for entry in &entries {
            self.upsert(entry.id, &entry.name).await?;
        }

        tracing::info!("✅ Upserted {} comment types", entries.len());
        Ok(entries.len())
    }

    /// Rebuild the in-memory mapping from the table
    pub async fn init_from_storage(&self) -> Result<()> {
        let rows = sqlx::query_as::<_, CommentType>("SELECT id, name FROM comment_types")
            .fetch_all(&self.pool)
            .await?;

        let mut types = HashMap::new();
        for row in rows {
            match CommentKind::from_id(row.id) {
                Some(kind) => {
                    types.insert(kind, row);
                }
                None => tracing::warn!("⚠️ Ignoring unknown comment type row {}", row.id),
            }
        }
        self.types.store(Arc::new(types));

        tracing::info!("Initialized comment type registry with {} types", self.types.load().len());
        Ok(())
    }

    /// Fail unless every category has a row
    pub fn ensure_complete(&self) -> Result<()> {
        let types = self.types.load();
        let missing: Vec<i64> = CommentKind::ALL
            .into_iter()
            .filter(|kind| !types.contains_key(kind))
            .map(CommentKind::id)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!("comment type taxonomy is missing ids {:?}", missing)))
        }
    }

    pub fn get(&self, kind: CommentKind) -> Option<CommentType> {
        self.types.load().get(&kind).cloned()
    }

    /// All registered types ordered by id
    pub fn list(&self) -> Vec<CommentType> {
        let mut types: Vec<CommentType> = self.types.load().values().cloned().collect();
        types.sort_by_key(|t| t.id);
        types
    }
}

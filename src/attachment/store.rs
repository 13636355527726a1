/// Attachment persistence across the database and the blob directory
///
/// Bytes are written before the metadata row is inserted, so a row never
/// points at a missing file. The reverse (a file with no row) can happen and
/// is cleaned up by the orphan sweep.

use crate::attachment::media::extension_for;
use crate::entity::{entity_exists, EntityKind};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-supplied name, kept for display only
    pub file_name: String,
    /// Declared media type, checked against the allow-list
    pub media_type: String,
    pub content: Vec<u8>,
}

/// Where uploaded files are attached and who attached them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentTarget {
    pub kind: EntityKind,
    pub entity_id: i64,
    pub comment_id: Option<Uuid>,
    pub actor_id: Uuid,
}

/// A stored attachment's metadata row
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Attachment {
    pub id: i64,
    pub entity_id: i64,
    pub comment_id: Option<Uuid>,
    pub user_id: Uuid,
    /// Original file name
    pub name: String,
    /// Content-store path: {root}/{uuid}{ext}
    pub storage_key: String,
    pub create_date: DateTime<Utc>,
}

fn select_documents(kind: EntityKind) -> String {
    format!(
        "SELECT id, {fk} AS entity_id, comment_id, user_id, name, storage_key, create_date FROM {table}",
        fk = kind.foreign_key(),
        table = kind.documents_table(),
    )
}

/// Attachment store rooted at one blob directory
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    pool: SqlitePool,
    root: PathBuf,
}

impl AttachmentStore {
    pub fn new(pool: SqlitePool, root: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the blob directory if needed
    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Fresh random key; independent of any user-supplied name
    fn new_storage_key(&self, extension: &str) -> String {
        self.root
            .join(format!("{}{}", Uuid::new_v4(), extension))
            .to_string_lossy()
            .into_owned()
    }

    /// Check that the entity exists and, if given, that the comment belongs to it
    pub async fn ensure_target(&self, target: &AttachmentTarget) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        if !entity_exists(&mut conn, target.kind, target.entity_id).await? {
            return Err(Error::not_found(format!("{} {}", target.kind, target.entity_id)));
        }
        if let Some(comment_id) = target.comment_id {
            let sql = format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ? AND {} = ?)",
                target.kind.comments_table(),
                target.kind.foreign_key(),
            );
            let exists: bool = sqlx::query_scalar(&sql)
                .bind(comment_id)
                .bind(target.entity_id)
                .fetch_one(&mut *conn)
                .await?;
            if !exists {
                return Err(Error::not_found(format!("comment {}", comment_id)));
            }
        }
        Ok(())
    }

    /// Store one file
    ///
    /// Returns `Ok(None)` when the media type is not allowed. The target is
    /// assumed to exist; use `store_batch` for request-facing uploads.
    pub async fn store(&self, target: &AttachmentTarget, upload: Upload) -> Result<Option<Attachment>> {
        let Some(extension) = extension_for(&upload.media_type) else {
            tracing::debug!(
                "⏭️ Dropping '{}' with unsupported media type '{}'",
                upload.file_name,
                upload.media_type
            );
            return Ok(None);
        };

        let storage_key = self.new_storage_key(extension);
        if let Err(e) = tokio::fs::write(&storage_key, &upload.content).await {
            tracing::error!("❌ Failed to write blob {}: {}", storage_key, e);
            return Err(Error::Io(e));
        }

        let sql = format!(
            r#"
            INSERT INTO {table} ({fk}, comment_id, user_id, name, storage_key, create_date)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, {fk} AS entity_id, comment_id, user_id, name, storage_key, create_date
            "#,
            table = target.kind.documents_table(),
            fk = target.kind.foreign_key(),
        );
        let inserted = sqlx::query_as::<_, Attachment>(&sql)
            .bind(target.entity_id)
            .bind(target.comment_id)
            .bind(target.actor_id)
            .bind(&upload.file_name)
            .bind(&storage_key)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await;

        match inserted {
            Ok(attachment) => {
                tracing::info!(
                    "📎 Stored '{}' for {} {} at {}",
                    attachment.name,
                    target.kind,
                    target.entity_id,
                    attachment.storage_key
                );
                Ok(Some(attachment))
            }
            Err(e) => {
                self.unlink(&storage_key).await;
                Err(e.into())
            }
        }
    }

    /// Store every allowed file of a batch; disallowed files are skipped
    pub async fn store_batch(&self, target: &AttachmentTarget, uploads: Vec<Upload>) -> Result<Vec<Attachment>> {
        self.ensure_target(target).await?;

        let total = uploads.len();
        let mut stored = Vec::with_capacity(total);
        for upload in uploads {
            if let Some(attachment) = self.store(target, upload).await? {
                stored.push(attachment);
            }
        }

        if stored.len() < total {
            tracing::info!(
                "📎 Stored {}/{} files for {} {} (others had unsupported types)",
                stored.len(),
                total,
                target.kind,
                target.entity_id
            );
        }
        Ok(stored)
    }

    /// Attachments of an entity, or only those of one of its comments
    pub async fn list(&self, kind: EntityKind, entity_id: i64, comment_id: Option<Uuid>) -> Result<Vec<Attachment>> {
        let mut sql = format!("{} WHERE {} = ?", select_documents(kind), kind.foreign_key());
        if comment_id.is_some() {
            sql.push_str(" AND comment_id = ?");
        }
        sql.push_str(" ORDER BY create_date, id");

        let mut query = sqlx::query_as::<_, Attachment>(&sql).bind(entity_id);
        if let Some(comment_id) = comment_id {
            query = query.bind(comment_id);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    pub async fn get(&self, kind: EntityKind, entity_id: i64, id: i64) -> Result<Option<Attachment>> {
        let sql = format!("{} WHERE id = ? AND {} = ?", select_documents(kind), kind.foreign_key());
        let attachment = sqlx::query_as::<_, Attachment>(&sql)
            .bind(id)
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(attachment)
    }

    /// Delete the metadata row, then the file
    ///
    /// The file delete is best effort: once the row is gone the database is
    /// authoritative and a leftover file is only logged.
    pub async fn remove(&self, kind: EntityKind, entity_id: i64, id: i64) -> Result<Attachment> {
        let sql = format!(
            r#"
            DELETE FROM {table} WHERE id = ? AND {fk} = ?
            RETURNING id, {fk} AS entity_id, comment_id, user_id, name, storage_key, create_date
            "#,
            table = kind.documents_table(),
            fk = kind.foreign_key(),
        );
        let removed = sqlx::query_as::<_, Attachment>(&sql)
            .bind(id)
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found(format!("document {}", id)))?;

        self.unlink(&removed.storage_key).await;
        tracing::info!("🗑️ Removed document {} of {} {}", id, kind, entity_id);
        Ok(removed)
    }

    /// Best-effort removal of blobs whose rows are already gone
    pub async fn unlink_all(&self, keys: &[String]) {
        for key in keys {
            self.unlink(key).await;
        }
    }

    /// Remove one blob; returns whether a file was actually deleted
    pub async fn unlink(&self, key: &str) -> bool {
        match tokio::fs::remove_file(key).await {
            Ok(()) => {
                tracing::debug!("🧹 Unlinked blob {}", key);
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Blob {} already absent", key);
                false
            }
            Err(e) => {
                tracing::warn!("⚠️ Failed to unlink blob {} (left as residual): {}", key, e);
                false
            }
        }
    }

    /// Every storage key referenced by a metadata row of any entity kind
    pub async fn referenced_keys(&self) -> Result<HashSet<String>> {
        let mut keys = HashSet::new();
        for kind in EntityKind::ALL {
            let sql = format!("SELECT storage_key FROM {}", kind.documents_table());
            let rows = sqlx::query_scalar::<_, String>(&sql).fetch_all(&self.pool).await?;
            keys.extend(rows);
        }
        Ok(keys)
    }
}

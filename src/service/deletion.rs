/// Cascade deletion across the database and the blob directory
///
/// Rows go first, in one transaction, relying on ON DELETE CASCADE for
/// comments, documents and subtasks. The storage keys gathered inside that
/// transaction are handed back so the caller can unlink blobs after commit.

use crate::audit::{AuditLogWriter, AuditRecord};
use crate::database::Database;
use crate::entity::{Entity, EntityKind, EntityRepository};
use crate::error::{Error, Result};
use uuid::Uuid;

/// A committed deletion and the blobs it orphaned
#[derive(Debug, Clone)]
pub struct Deletion<T> {
    /// Snapshot taken just before the delete
    pub removed: T,
    /// Blobs that no longer have a metadata row
    pub storage_keys: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CascadeDeletionCoordinator {
    db: Database,
}

impl CascadeDeletionCoordinator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Delete an entity with everything that hangs off it
    pub async fn delete_entity<E: Entity>(&self, id: i64) -> Result<Deletion<E>> {
        let mut tx = self.db.begin_write().await?;

        let entity = EntityRepository::<E>::get_in(&mut tx, id)
            .await?
            .ok_or_else(|| Error::not_found(format!("{} {}", E::KIND, id)))?;
        let storage_keys = EntityRepository::<E>::storage_keys_in(&mut tx, id).await?;

        let rows = EntityRepository::<E>::delete_in(&mut tx, id).await?;
        if rows != 1 {
            return Err(Error::not_found(format!("{} {}", E::KIND, id)));
        }
        tx.commit().await?;

        tracing::info!(
            "🗑️ Deleted {} {} with {} attached files",
            E::KIND,
            id,
            storage_keys.len()
        );
        Ok(Deletion {
            removed: entity,
            storage_keys,
        })
    }

    /// Delete a free-text comment together with its attachments' rows
    pub async fn delete_user_comment(
        &self,
        kind: EntityKind,
        entity_id: i64,
        comment_id: Uuid,
    ) -> Result<Deletion<AuditRecord>> {
        let mut tx = self.db.begin_write().await?;
        let (record, storage_keys) =
            AuditLogWriter::delete_user_comment_in(&mut tx, kind, entity_id, comment_id).await?;
        tx.commit().await?;

        tracing::info!("🗑️ Deleted comment {} of {} {}", comment_id, kind, entity_id);
        Ok(Deletion {
            removed: record,
            storage_keys,
        })
    }
}

/// Audited entity updates
///
/// Snapshot read, change detection, apply and audit inserts run in one
/// write transaction, so the recorded before/after always describes the row
/// that was actually overwritten.

use crate::audit::{assignments, diff, AuditLogWriter, AuditRecord, ChangeSet, UpdateMode, UpdatePayload};
use crate::database::Database;
use crate::entity::{Entity, EntityRepository};
use crate::error::{Error, Result};
use chrono::Utc;

/// Result of a successful update
#[derive(Debug, Clone)]
pub struct UpdateOutcome<E> {
    /// Entity as stored after the update
    pub entity: E,
    /// Fields that actually changed
    pub changes: ChangeSet,
    /// One record per audited change, all stamped with the entity's update_date
    pub records: Vec<AuditRecord>,
}

/// Runs diff-and-apply updates for any entity kind
#[derive(Debug, Clone)]
pub struct AuditedUpdater {
    db: Database,
}

impl AuditedUpdater {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Apply `payload` to entity `id` and record what changed
    ///
    /// A write-lock conflict is retried once with a fresh read; a second
    /// conflict surfaces to the caller.
    pub async fn update<E: Entity>(
        &self,
        id: i64,
        payload: &UpdatePayload,
        mode: UpdateMode,
    ) -> Result<UpdateOutcome<E>> {
        payload.validate::<E>(mode)?;

        match self.try_update::<E>(id, payload, mode).await {
            Err(e) if e.is_retryable() => {
                tracing::warn!("🔁 Write conflict on {} {}, retrying with a fresh snapshot", E::KIND, id);
                self.try_update::<E>(id, payload, mode).await
            }
            other => other,
        }
    }

    async fn try_update<E: Entity>(
        &self,
        id: i64,
        payload: &UpdatePayload,
        mode: UpdateMode,
    ) -> Result<UpdateOutcome<E>> {
        let mut tx = self.db.begin_write().await?;
        // taken under the write lock so update_date follows commit order
        let update_date = Utc::now();

        let current = EntityRepository::<E>::get_in(&mut tx, id)
            .await?
            .ok_or_else(|| Error::not_found(format!("{} {}", E::KIND, id)))?;

        let changes = diff(&current, payload, mode);
        tracing::debug!("📝 {} {} changes: {:?}", E::KIND, id, changes.fields());

        let written = assignments::<E>(payload, mode);
        let rows = EntityRepository::<E>::apply_in(&mut tx, id, &written, update_date).await?;
        if rows != 1 {
            return Err(Error::not_found(format!("{} {}", E::KIND, id)));
        }

        let records =
            AuditLogWriter::record_in(&mut tx, E::KIND, id, payload.actor_id, update_date, &changes).await?;

        let entity = EntityRepository::<E>::get_in(&mut tx, id)
            .await?
            .ok_or_else(|| Error::not_found(format!("{} {}", E::KIND, id)))?;

        tx.commit().await?;

        tracing::info!(
            "✏️ Updated {} {} ({:?}): {} changed fields, {} audit records",
            E::KIND,
            id,
            mode,
            changes.len(),
            records.len()
        );

        Ok(UpdateOutcome {
            entity,
            changes,
            records,
        })
    }
}

/// Service layer
///
/// Wires the repositories, the audit writer and the attachment store into
/// the operations exposed over HTTP: create, audited update, cascade delete,
/// and comment management with attachments.

// Diff-and-apply with audit records in one transaction
pub mod update;

// Entity and comment deletion with post-commit blob cleanup
pub mod deletion;

pub use deletion::{CascadeDeletionCoordinator, Deletion};
pub use update::{AuditedUpdater, UpdateOutcome};

use crate::attachment::{Attachment, AttachmentStore, AttachmentTarget, Upload};
use crate::audit::{AuditLogWriter, AuditRecord, CommentTypeRegistry, UpdateMode, UpdatePayload};
use crate::config::Config;
use crate::database::Database;
use crate::entity::{Entity, EntityKind, EntityRepository, NewProject, NewTask, Project, Task};
use crate::error::Result;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Every core component behind one cloneable handle
#[derive(Debug, Clone)]
pub struct Backend {
    pub db: Database,
    pub registry: Arc<CommentTypeRegistry>,
    pub audit: AuditLogWriter,
    pub attachments: Arc<AttachmentStore>,
    pub updater: AuditedUpdater,
    pub deletion: CascadeDeletionCoordinator,
}

impl Backend {
    /// Assemble components over an open database; the taxonomy is not seeded
    pub fn new(db: Database, storage_root: impl Into<PathBuf>) -> Self {
        let pool = db.pool().clone();
        Self {
            registry: Arc::new(CommentTypeRegistry::new(pool.clone())),
            audit: AuditLogWriter::new(db.clone()),
            attachments: Arc::new(AttachmentStore::new(pool, storage_root)),
            updater: AuditedUpdater::new(db.clone()),
            deletion: CascadeDeletionCoordinator::new(db.clone()),
            db,
        }
    }

    /// Open storage and seed the taxonomy; any failure aborts startup
    pub async fn open(config: &Config) -> Result<Self> {
        let db = Database::connect(&config.database).await?;
        let backend = Self::new(db, config.storage.root.clone());

        backend.attachments.ensure_root().await?;
        backend.registry.init_from_storage().await?;
        backend.registry.load_from_file(&config.comment_types.path).await?;
        backend.registry.ensure_complete()?;

        Ok(backend)
    }

    pub fn repository<E: Entity>(&self) -> EntityRepository<E> {
        EntityRepository::new(self.db.pool().clone())
    }

    pub async fn create_project(&self, new: &NewProject) -> Result<Project> {
        let mut conn = self.db.pool().acquire().await?;
        let project = Project::create(&mut conn, new, Utc::now()).await?;
        tracing::info!("🆕 Created project {} ({})", project.id, project.name);
        Ok(project)
    }

    /// Create a task and attach the allowed files among `uploads`
    pub async fn create_task(&self, new: &NewTask, uploads: Vec<Upload>) -> Result<(Task, Vec<Attachment>)> {
        let task = {
            let mut tx = self.db.begin_write().await?;
            let task = Task::create(&mut tx, new, Utc::now()).await?;
            tx.commit().await?;
            task
        };
        tracing::info!("🆕 Created task {} ({}) in project {}", task.id, task.name, task.project_id);

        let attachments = if uploads.is_empty() {
            Vec::new()
        } else {
            let target = AttachmentTarget {
                kind: EntityKind::Task,
                entity_id: task.id,
                comment_id: None,
                actor_id: task.creator_id,
            };
            self.attachments.store_batch(&target, uploads).await?
        };
        Ok((task, attachments))
    }

    pub async fn update<E: Entity>(
        &self,
        id: i64,
        payload: &UpdatePayload,
        mode: UpdateMode,
    ) -> Result<UpdateOutcome<E>> {
        self.updater.update::<E>(id, payload, mode).await
    }

    /// Delete an entity, then unlink its blobs once the rows are gone
    pub async fn delete<E: Entity>(&self, id: i64) -> Result<Deletion<E>> {
        let deletion = self.deletion.delete_entity::<E>(id).await?;
        self.attachments.unlink_all(&deletion.storage_keys).await;
        Ok(deletion)
    }

    /// Add a free-text comment with optional attachments
    pub async fn add_comment(
        &self,
        kind: EntityKind,
        entity_id: i64,
        actor_id: Uuid,
        message: &str,
        uploads: Vec<Upload>,
    ) -> Result<(AuditRecord, Vec<Attachment>)> {
        let comment = self
            .audit
            .create_user_comment(kind, entity_id, actor_id, message)
            .await?;

        let attachments = if uploads.is_empty() {
            Vec::new()
        } else {
            let target = AttachmentTarget {
                kind,
                entity_id,
                comment_id: Some(comment.id),
                actor_id,
            };
            self.attachments.store_batch(&target, uploads).await?
        };
        Ok((comment, attachments))
    }

    /// Delete a free-text comment, then unlink its attachments' blobs
    pub async fn delete_comment(&self, kind: EntityKind, entity_id: i64, comment_id: Uuid) -> Result<AuditRecord> {
        let deletion = self
            .deletion
            .delete_user_comment(kind, entity_id, comment_id)
            .await?;
        self.attachments.unlink_all(&deletion.storage_keys).await;
        Ok(deletion.removed)
    }
}

/// Orphaned blob reconciliation
///
/// The database is the source of truth for attachments. Any file under the
/// storage root that no metadata row references is garbage, once it is older
/// than the grace period that covers uploads between file write and row insert.
/// The sweep runs on a cron schedule via tokio-cron-scheduler.

use crate::attachment::store::AttachmentStore;
use crate::error::Result;
use anyhow::Context;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Files looked at under the storage root
    pub scanned: usize,
    /// Unreferenced files deleted
    pub removed: usize,
    /// Unreferenced files spared because they are still inside the grace period
    pub recent: usize,
}

/// Deletes blobs with no matching metadata row
#[derive(Debug)]
pub struct OrphanSweeper {
    store: Arc<AttachmentStore>,
    grace: Duration,
}

impl OrphanSweeper {
    pub fn new(store: Arc<AttachmentStore>, grace: Duration) -> Self {
        Self { store, grace }
    }

    /// Run one reconciliation pass
    pub async fn sweep_once(&self) -> Result<SweepReport> {
        let referenced = self.store.referenced_keys().await?;
        let mut report = SweepReport::default();

        let mut entries = match tokio::fs::read_dir(self.store.root()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e.into()),
        };

        let now = SystemTime::now();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            report.scanned += 1;

            let key = entry.path().to_string_lossy().into_owned();
            if referenced.contains(&key) {
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < self.grace {
                report.recent += 1;
                continue;
            }

            if self.store.unlink(&key).await {
                report.removed += 1;
            }
        }

        tracing::info!(
            "🧹 Orphan sweep: scanned {}, removed {}, spared {} recent",
            report.scanned,
            report.removed,
            report.recent
        );
        Ok(report)
    }
}

/// Cron-driven runner for the orphan sweep
pub struct SweepScheduler {
    scheduler: RwLock<JobScheduler>,
    job_id: RwLock<Option<Uuid>>,
    sweeper: Arc<OrphanSweeper>,
}

impl SweepScheduler {
    pub async fn new(sweeper: Arc<OrphanSweeper>) -> anyhow::Result<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler: RwLock::new(scheduler),
            job_id: RwLock::new(None),
            sweeper,
        })
    }

    /// Register the sweep job with a six-field cron schedule and start ticking
    pub async fn start(&self, schedule: &str) -> anyhow::Result<()> {
        tracing::info!("⏰ Scheduling orphan sweep: {}", schedule);

        let sweeper = Arc::clone(&self.sweeper);
        let job = Job::new_async(schedule, move |_uuid, _l| {
            let sweeper = Arc::clone(&sweeper);
            Box::pin(async move {
                tracing::debug!("🔔 Orphan sweep triggered");
                if let Err(e) = sweeper.sweep_once().await {
                    tracing::error!("❌ Orphan sweep failed: {}", e);
                }
            })
        })
        .with_context(|| format!("invalid sweep schedule '{}'", schedule))?;

        let job_id = {
            let scheduler = self.scheduler.read().await;
            let job_id = scheduler.add(job).await?;
            scheduler.start().await?;
            job_id
        };
        *self.job_id.write().await = Some(job_id);

        tracing::info!("✅ Orphan sweep scheduled ({})", job_id);
        Ok(())
    }

    /// Remove the job and shut the scheduler down
    pub async fn stop(&self) -> anyhow::Result<()> {
        if let Some(job_id) = self.job_id.write().await.take() {
            let scheduler = self.scheduler.read().await;
            if let Err(e) = scheduler.remove(&job_id).await {
                tracing::warn!("⚠️ Failed to remove sweep job {}: {}", job_id, e);
            }
        }

        let mut scheduler = self.scheduler.write().await;
        scheduler.shutdown().await?;

        tracing::info!("⏹️ Orphan sweep stopped");
        Ok(())
    }
}

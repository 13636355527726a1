/// Attachment layer
///
/// Validates and stores uploaded documents, tracks their metadata rows, and
/// reconciles the blob directory against the database.

// Allowed media types and their storage extensions
pub mod media;

// Write-then-record storage and best-effort removal
pub mod store;

// Periodic orphaned blob cleanup
pub mod sweep;

pub use media::{extension_for, ALLOWED_MEDIA_TYPES};
pub use store::{Attachment, AttachmentStore, AttachmentTarget, Upload};
pub use sweep::{OrphanSweeper, SweepReport, SweepScheduler};

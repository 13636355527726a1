/// Audit layer
///
/// Computes what an update changes and records it as typed, immutable
/// comments next to user-authored free-text comments.

// Closed taxonomy of audit record kinds and its seeded registry
pub mod comment_type;

// Full/partial change detection
pub mod diff;

// Record persistence and user comment management
pub mod writer;

pub use comment_type::{CommentKind, CommentType, CommentTypeRegistry};
pub use diff::{assignments, diff, ChangeSet, FieldChange, UpdateMode, UpdatePayload};
pub use writer::{AuditLogWriter, AuditRecord};

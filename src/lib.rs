/// Taskhub: audited project/task backend
///
/// Every update records one typed audit entry per changed field, atomically
/// with the update itself. Uploaded documents live in a blob directory and
/// are cleaned up with their parent entity or comment.

// Core configuration and setup
pub mod config;

// Error type shared by the storage and service layers
pub mod error;

// SQLite pool and schema
pub mod database;

// Project and task entities, field metadata and repositories
pub mod entity;

// Comment types, change detection and the audit trail
pub mod audit;

// Document storage, media allow-list and orphan sweep
pub mod attachment;

// Audited updates, cascade deletion and the backend facade
pub mod service;

// HTTP API layer - REST endpoints for projects, tasks, comments and documents
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use entity::{EntityKind, Project, Task};
pub use error::{Error, Result};
pub use server::start_server;
pub use service::Backend;

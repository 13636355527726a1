/// Entity layer
///
/// Projects and tasks, the field tables that describe them, and the
/// repository that reads, applies and deletes them.

pub mod types;

pub mod project;

pub mod task;

// Generic get/apply/delete over any entity kind
pub mod repository;

pub use project::{NewProject, Project};
pub use repository::{entity_exists, EntityRepository};
pub use task::{NewTask, Task};
pub use types::{Entity, EntityKind, FieldDef, FieldKind, FieldValue, ACTOR_FIELD};

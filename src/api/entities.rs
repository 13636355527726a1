/// Project and task REST endpoints
///
/// PUT replaces every updatable field (absent means cleared), PATCH touches
/// only the fields present in the body. Both record one audit entry per
/// changed field.

use crate::{
    api::{into_status, AppState, MultipartForm},
    attachment::Attachment,
    audit::{AuditRecord, UpdateMode, UpdatePayload},
    entity::{Entity, NewProject, NewTask, Project, Task},
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Multipart part carrying the task JSON on creation
const TASK_PART: &str = "task";

/// Response for audited updates
#[derive(Debug, Serialize)]
pub struct UpdateResponse<E> {
    pub entity: E,
    /// Names of the fields whose stored value changed
    pub changed: Vec<&'static str>,
    pub audit: Vec<AuditRecord>,
}

/// Response for task creation
#[derive(Debug, Serialize)]
pub struct TaskCreated {
    pub task: Task,
    pub documents: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
pub struct TaskQuery {
    pub project_id: i64,
    #[serde(default)]
    pub parent_task_id: Option<i64>,
}

/// Create project and task routes
pub fn create_entity_routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{id}",
            get(get_entity::<Project>)
                .put(replace_entity::<Project>)
                .patch(patch_entity::<Project>)
                .delete(delete_entity::<Project>),
        )
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/{id}",
            get(get_entity::<Task>)
                .put(replace_entity::<Task>)
                .patch(patch_entity::<Task>)
                .delete(delete_entity::<Task>),
        )
}

/// POST /projects
async fn create_project(
    State(state): State<AppState>,
    Json(new): Json<NewProject>,
) -> Result<Json<Project>, StatusCode> {
    if new.name.trim().is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let project = state.backend.create_project(&new).await.map_err(into_status)?;
    Ok(Json(project))
}

/// GET /projects
async fn list_projects(State(state): State<AppState>) -> Result<Json<Vec<Project>>, StatusCode> {
    let projects = Project::list(state.backend.db.pool())
        .await
        .map_err(into_status)?;
    Ok(Json(projects))
}

/// POST /tasks
///
/// Multipart body: a `task` part with the task JSON, plus any number of
/// `files` parts. Unsupported file types are skipped.
async fn create_task(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<TaskCreated>, StatusCode> {
    let form = MultipartForm::read(multipart).await?;
    let new: NewTask = form.json(TASK_PART)?;
    if new.name.trim().is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let (task, documents) = state
        .backend
        .create_task(&new, form.files)
        .await
        .map_err(into_status)?;
    Ok(Json(TaskCreated { task, documents }))
}

/// GET /tasks?project_id=..&parent_task_id=..
async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> Result<Json<Vec<Task>>, StatusCode> {
    let tasks = Task::list(state.backend.db.pool(), query.project_id, query.parent_task_id)
        .await
        .map_err(into_status)?;
    Ok(Json(tasks))
}

/// GET /{projects|tasks}/{id}
async fn get_entity<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<E>, StatusCode> {
    match state.backend.repository::<E>().get(id).await {
        Ok(Some(entity)) => Ok(Json(entity)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => Err(into_status(e)),
    }
}

/// PUT /{projects|tasks}/{id}
async fn replace_entity<E: Entity>(
    state: State<AppState>,
    id: Path<i64>,
    body: Json<Value>,
) -> Result<Json<UpdateResponse<E>>, StatusCode> {
    update_entity::<E>(state, id, body, UpdateMode::Full).await
}

/// PATCH /{projects|tasks}/{id}
async fn patch_entity<E: Entity>(
    state: State<AppState>,
    id: Path<i64>,
    body: Json<Value>,
) -> Result<Json<UpdateResponse<E>>, StatusCode> {
    update_entity::<E>(state, id, body, UpdateMode::Partial).await
}

async fn update_entity<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
    mode: UpdateMode,
) -> Result<Json<UpdateResponse<E>>, StatusCode> {
    let payload = UpdatePayload::from_json::<E>(&body, mode).map_err(into_status)?;

    let outcome = state
        .backend
        .update::<E>(id, &payload, mode)
        .await
        .map_err(into_status)?;

    Ok(Json(UpdateResponse {
        changed: outcome.changes.fields(),
        entity: outcome.entity,
        audit: outcome.records,
    }))
}

/// DELETE /{projects|tasks}/{id}
async fn delete_entity<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<E>, StatusCode> {
    let deletion = state.backend.delete::<E>(id).await.map_err(into_status)?;
    Ok(Json(deletion.removed))
}

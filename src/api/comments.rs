/// Comment trail endpoints
///
/// The trail mixes system audit records with free-text user comments. Only
/// the latter can be edited or deleted; system records answer 404.

use crate::{
    api::{into_status, AppState, MultipartForm},
    attachment::Attachment,
    audit::{AuditRecord, CommentType},
    entity::{Entity, Project, Task},
};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, put},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Multipart part carrying the comment JSON
const COMMENT_PART: &str = "comment";

#[derive(Debug, Deserialize)]
pub struct NewComment {
    pub user_id: Uuid,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct EditComment {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CommentCreated {
    pub comment: AuditRecord,
    pub documents: Vec<Attachment>,
}

/// Create comment routes for both entity kinds
pub fn create_comment_routes() -> Router<AppState> {
    Router::new()
        .route("/comment-types", get(list_comment_types))
        .route(
            "/projects/{id}/comments",
            get(list_comments::<Project>).post(create_comment::<Project>),
        )
        .route(
            "/projects/{id}/comments/{comment_id}",
            put(update_comment::<Project>).delete(delete_comment::<Project>),
        )
        .route(
            "/tasks/{id}/comments",
            get(list_comments::<Task>).post(create_comment::<Task>),
        )
        .route(
            "/tasks/{id}/comments/{comment_id}",
            put(update_comment::<Task>).delete(delete_comment::<Task>),
        )
}

/// GET /comment-types
async fn list_comment_types(State(state): State<AppState>) -> Json<Vec<CommentType>> {
    Json(state.backend.registry.list())
}

/// POST /{kind}/{id}/comments
///
/// Multipart body: a `comment` part `{ "user_id": .., "message": .. }` and
/// optional `files` parts attached to the new comment.
async fn create_comment<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<CommentCreated>, StatusCode> {
    let form = MultipartForm::read(multipart).await?;
    let new: NewComment = form.json(COMMENT_PART)?;

    let (comment, documents) = state
        .backend
        .add_comment(E::KIND, id, new.user_id, &new.message, form.files)
        .await
        .map_err(into_status)?;
    Ok(Json(CommentCreated { comment, documents }))
}

/// GET /{kind}/{id}/comments
async fn list_comments<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<AuditRecord>>, StatusCode> {
    let exists = state
        .backend
        .repository::<E>()
        .get(id)
        .await
        .map_err(into_status)?
        .is_some();
    if !exists {
        return Err(StatusCode::NOT_FOUND);
    }

    let comments = state.backend.audit.list(E::KIND, id).await.map_err(into_status)?;
    Ok(Json(comments))
}

/// PUT /{kind}/{id}/comments/{comment_id}
async fn update_comment<E: Entity>(
    State(state): State<AppState>,
    Path((id, comment_id)): Path<(i64, Uuid)>,
    Json(edit): Json<EditComment>,
) -> Result<Json<AuditRecord>, StatusCode> {
    let comment = state
        .backend
        .audit
        .update_user_comment(E::KIND, id, comment_id, &edit.message)
        .await
        .map_err(into_status)?;
    Ok(Json(comment))
}

/// DELETE /{kind}/{id}/comments/{comment_id}
async fn delete_comment<E: Entity>(
    State(state): State<AppState>,
    Path((id, comment_id)): Path<(i64, Uuid)>,
) -> Result<Json<AuditRecord>, StatusCode> {
    let removed = state
        .backend
        .delete_comment(E::KIND, id, comment_id)
        .await
        .map_err(into_status)?;
    Ok(Json(removed))
}

/// Document endpoints
///
/// Uploads attach to an entity and optionally to one of its comments.

use crate::{
    api::{into_status, AppState, MultipartForm},
    attachment::{Attachment, AttachmentTarget},
    entity::{Entity, Project, Task},
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct DocumentQuery {
    #[serde(default)]
    pub comment_id: Option<Uuid>,
}

/// Create document routes for both entity kinds
pub fn create_document_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{id}/documents",
            get(list_documents::<Project>).post(upload_documents::<Project>),
        )
        .route(
            "/projects/{id}/documents/{document_id}",
            get(get_document::<Project>).delete(delete_document::<Project>),
        )
        .route(
            "/tasks/{id}/documents",
            get(list_documents::<Task>).post(upload_documents::<Task>),
        )
        .route(
            "/tasks/{id}/documents/{document_id}",
            get(get_document::<Task>).delete(delete_document::<Task>),
        )
}

fn parse_uuid(form: &MultipartForm, name: &str) -> Result<Option<Uuid>, StatusCode> {
    form.fields
        .get(name)
        .map(|raw| raw.trim())
        .filter(|raw| !raw.is_empty())
        .map(|raw| {
            Uuid::parse_str(raw).map_err(|_| {
                tracing::warn!("❌ Part '{}' is not a UUID: {}", name, raw);
                StatusCode::UNPROCESSABLE_ENTITY
            })
        })
        .transpose()
}

/// POST /{kind}/{id}/documents
///
/// Multipart body: `user_id`, optional `comment_id`, and `files` parts.
/// Returns the stored documents; unsupported files are left out.
async fn upload_documents<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<Vec<Attachment>>, StatusCode> {
    let form = MultipartForm::read(multipart).await?;
    let actor_id = parse_uuid(&form, "user_id")?.ok_or(StatusCode::UNPROCESSABLE_ENTITY)?;
    let comment_id = parse_uuid(&form, "comment_id")?;

    let target = AttachmentTarget {
        kind: E::KIND,
        entity_id: id,
        comment_id,
        actor_id,
    };
    let stored = state
        .backend
        .attachments
        .store_batch(&target, form.files)
        .await
        .map_err(into_status)?;
    Ok(Json(stored))
}

/// GET /{kind}/{id}/documents?comment_id=..
async fn list_documents<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<Vec<Attachment>>, StatusCode> {
    let documents = state
        .backend
        .attachments
        .list(E::KIND, id, query.comment_id)
        .await
        .map_err(into_status)?;
    Ok(Json(documents))
}

/// GET /{kind}/{id}/documents/{document_id}
async fn get_document<E: Entity>(
    State(state): State<AppState>,
    Path((id, document_id)): Path<(i64, i64)>,
) -> Result<Json<Attachment>, StatusCode> {
    match state.backend.attachments.get(E::KIND, id, document_id).await {
        Ok(Some(document)) => Ok(Json(document)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => Err(into_status(e)),
    }
}

/// DELETE /{kind}/{id}/documents/{document_id}
async fn delete_document<E: Entity>(
    State(state): State<AppState>,
    Path((id, document_id)): Path<(i64, i64)>,
) -> Result<Json<Attachment>, StatusCode> {
    let removed = state
        .backend
        .attachments
        .remove(E::KIND, id, document_id)
        .await
        .map_err(into_status)?;
    Ok(Json(removed))
}

/// HTTP API Layer
///
/// Thin axum routers over the service layer:
/// - Project and task CRUD with audited full/partial updates
/// - User comments with attachments
/// - Document upload, listing and removal

// Project/task endpoints (POST/GET/PUT/PATCH/DELETE)
pub mod entities;

// Comment trail endpoints
pub mod comments;

// Attachment endpoints
pub mod documents;

pub use comments::create_comment_routes;
pub use documents::create_document_routes;
pub use entities::create_entity_routes;

use crate::attachment::{SweepScheduler, Upload};
use crate::error::Error;
use crate::service::Backend;
use axum::extract::Multipart;
use axum::http::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;

/// Multipart part name carrying uploaded files
const FILES_PART: &str = "files";

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub backend: Backend,
    /// Orphan sweep job, absent when no schedule is configured
    pub sweep: Option<Arc<SweepScheduler>>,
}

/// Map a domain error onto a response status, logging server-side failures
pub fn into_status(err: Error) -> StatusCode {
    match err {
        Error::NotFound(what) => {
            tracing::debug!("🔍 Not found: {}", what);
            StatusCode::NOT_FOUND
        }
        Error::Validation(reason) => {
            tracing::warn!("❌ Rejected request: {}", reason);
            StatusCode::UNPROCESSABLE_ENTITY
        }
        Error::ConflictRace => {
            tracing::warn!("⚠️ Update lost the write race twice");
            StatusCode::SERVICE_UNAVAILABLE
        }
        other => {
            tracing::error!("❌ Request failed: {}", other);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Text fields and file parts of a multipart request
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<Upload>,
}

impl MultipartForm {
    /// Drain a multipart body; parts named `files` are uploads, the rest text
    pub async fn read(mut multipart: Multipart) -> Result<Self, StatusCode> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            tracing::warn!("❌ Malformed multipart body: {}", e);
            StatusCode::BAD_REQUEST
        })? {
            let name = field.name().unwrap_or_default().to_string();

            if name == FILES_PART {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let media_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let content = field.bytes().await.map_err(|e| {
                    tracing::warn!("❌ Failed to read file part '{}': {}", file_name, e);
                    StatusCode::BAD_REQUEST
                })?;
                form.files.push(Upload {
                    file_name,
                    media_type,
                    content: content.to_vec(),
                });
            } else {
                let text = field.text().await.map_err(|e| {
                    tracing::warn!("❌ Failed to read part '{}': {}", name, e);
                    StatusCode::BAD_REQUEST
                })?;
                form.fields.insert(name, text);
            }
        }

        tracing::debug!(
            "📦 Multipart body: {} fields, {} files",
            form.fields.len(),
            form.files.len()
        );
        Ok(form)
    }

    /// Parse a JSON text part into `T`
    pub fn json<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T, StatusCode> {
        let raw = self.fields.get(name).ok_or_else(|| {
            tracing::warn!("❌ Missing multipart part '{}'", name);
            StatusCode::UNPROCESSABLE_ENTITY
        })?;
        serde_json::from_str(raw).map_err(|e| {
            tracing::warn!("❌ Invalid JSON in part '{}': {}", name, e);
            StatusCode::UNPROCESSABLE_ENTITY
        })
    }
}

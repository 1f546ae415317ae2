//! REST API module.
//!
//! Every route answers with the same envelope: `{ success, data, revisionId }`
//! on success, `{ success: false, error, revisionId }` otherwise. The revision is
//! the one the task mirror has applied.

mod photos;
mod session;
mod spreadsheet;
mod sync;
mod tasks;

pub use photos::*;
pub use session::*;
pub use spreadsheet::*;
pub use sync::*;
pub use tasks::*;

use axum::{
    body::Bytes,
    extract::Multipart,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::{AppError, AppErrorWithRevision};
use crate::AppState;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision_id: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, revision_id: i64) -> Self {
        Self {
            success: true,
            data,
            revision_id,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppErrorWithRevision>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, revision_id: i64) -> ApiResult<T> {
    Ok(ApiResponse::new(data, revision_id))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: AppError, revision_id: i64) -> ApiResult<T> {
    Err(AppErrorWithRevision {
        error: err,
        revision_id,
    })
}

/// Revision after a write, once the mirror has caught up with it.
pub(crate) async fn settled_revision(state: &AppState) -> i64 {
    match state.store.revision().await {
        Ok(revision) => state.mirror.wait_for_revision(revision).await.revision,
        Err(e) => {
            tracing::warn!("Could not read store revision: {}", e);
            state.mirror.revision()
        }
    }
}

/// A multipart part kept in memory.
pub(crate) struct Part {
    pub name: String,
    pub data: Bytes,
}

/// Drain a multipart body, keeping parts in arrival order.
pub(crate) async fn read_parts(mut multipart: Multipart) -> Result<Vec<Part>, AppError> {
    let mut parts = Vec::new();
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Formulaire invalide: {}", e)))?;
        let Some(field) = field else {
            break;
        };
        let name = field.name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Formulaire invalide: {}", e)))?;
        parts.push(Part { name, data });
    }
    Ok(parts)
}

/// Contents of every part named `name`, in order.
pub(crate) fn files_named(parts: &[Part], name: &str) -> Vec<Vec<u8>> {
    parts
        .iter()
        .filter(|p| p.name == name && !p.data.is_empty())
        .map(|p| p.data.to_vec())
        .collect()
}

//! Spreadsheet endpoints.

use axum::{
    extract::{Multipart, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Extension,
};
use chrono::Utc;
use serde::Serialize;

use super::{error, read_parts, settled_revision, success, ApiResult};
use crate::dates::today_iso;
use crate::errors::{AppError, AppErrorWithRevision};
use crate::filter::visible_tasks;
use crate::models::{FilterState, Identity};
use crate::spreadsheet::{
    export_file_name, import_rows, import_success_message, read_rows, write_workbook,
    XLSX_CONTENT_TYPE,
};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub message: String,
}

/// GET /api/tasks/export - Visible tasks as an xlsx download.
pub async fn export_tasks(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(filters): Query<FilterState>,
) -> Result<Response, AppErrorWithRevision> {
    let view = state.mirror.view();
    let visible = visible_tasks(&view.tasks, &identity, &filters, Utc::now());

    let bytes = write_workbook(&visible).map_err(|error| AppErrorWithRevision {
        error,
        revision_id: view.revision,
    })?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_file_name(&today_iso())
    );

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// POST /api/tasks/import - Create one task per row of the uploaded `file`.
pub async fn import_tasks(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    multipart: Multipart,
) -> ApiResult<ImportSummary> {
    let revision_id = state.mirror.revision();

    if !identity.can_create_tasks() {
        return error(
            AppError::Forbidden("Action non autorisée pour ce profil".to_string()),
            revision_id,
        );
    }

    let parts = match read_parts(multipart).await {
        Ok(parts) => parts,
        Err(e) => return error(e, revision_id),
    };
    let Some(file) = parts.into_iter().find(|p| p.name == "file") else {
        return error(
            AppError::BadRequest("Fichier manquant".to_string()),
            revision_id,
        );
    };

    let rows = match tokio::task::spawn_blocking(move || read_rows(&file.data)).await {
        Ok(Ok(rows)) => rows,
        Ok(Err(e)) => return error(e, revision_id),
        Err(e) => {
            return error(
                AppError::Internal(format!("Lecture du fichier interrompue: {}", e)),
                revision_id,
            )
        }
    };

    match import_rows(state.store.as_ref(), &identity, rows).await {
        Ok(imported) => success(
            ImportSummary {
                imported,
                message: import_success_message(imported),
            },
            settled_revision(&state).await,
        ),
        // Rows before the failure stay imported.
        Err(e) => error(e, settled_revision(&state).await),
    }
}

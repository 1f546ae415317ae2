//! Photo endpoints.

use axum::{
    extract::{Multipart, Path, State},
    Extension, Json,
};
use serde::Deserialize;

use super::{error, files_named, read_parts, settled_revision, success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateTaskRequest, Identity, PhotoKind, Task};
use crate::photos::{self, Compression};
use crate::tasks;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DetachPhotoRequest {
    pub url: String,
}

/// JSON carried in the `task` part of a create-with-photos form.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedTaskRequest {
    #[serde(flatten)]
    pub task: CreateTaskRequest,
    #[serde(default)]
    pub all_stores: bool,
    #[serde(default)]
    pub confirm: bool,
}

/// POST /api/tasks/{id}/photos/{kind} - Upload `file` parts and attach them.
pub async fn upload_photos(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((id, kind)): Path<(String, PhotoKind)>,
    multipart: Multipart,
) -> ApiResult<Task> {
    let revision_id = state.mirror.revision();

    let parts = match read_parts(multipart).await {
        Ok(parts) => parts,
        Err(e) => return error(e, revision_id),
    };
    let files = files_named(&parts, "file");

    let result = photos::attach_photos(
        state.store.as_ref(),
        state.images.as_ref(),
        &identity,
        &id,
        kind,
        files,
        Compression::from(state.config.as_ref()),
    )
    .await;

    match result {
        Ok(task) => success(task, settled_revision(&state).await),
        // Files before the failure stay attached.
        Err(e) => error(e, settled_revision(&state).await),
    }
}

/// DELETE /api/tasks/{id}/photos/{kind} - Detach one URL.
pub async fn detach_photo(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((id, kind)): Path<(String, PhotoKind)>,
    Json(request): Json<DetachPhotoRequest>,
) -> ApiResult<Task> {
    let revision_id = state.mirror.revision();

    match photos::detach_photo(state.store.as_ref(), &identity, &id, kind, &request.url).await {
        Ok(task) => success(task, settled_revision(&state).await),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/tasks/with-photos - Upload staged guide photos, then create the task
/// (or one per store) with their URLs.
pub async fn create_with_photos(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    multipart: Multipart,
) -> ApiResult<Vec<Task>> {
    let revision_id = state.mirror.revision();

    let parts = match read_parts(multipart).await {
        Ok(parts) => parts,
        Err(e) => return error(e, revision_id),
    };
    let Some(task_part) = parts.iter().find(|p| p.name == "task") else {
        return error(
            AppError::BadRequest("Champ 'task' manquant".to_string()),
            revision_id,
        );
    };
    let mut staged: StagedTaskRequest = match serde_json::from_slice(&task_part.data) {
        Ok(staged) => staged,
        Err(e) => return error(e.into(), revision_id),
    };

    // Nothing is uploaded for a request that would be refused anyway.
    if let Err(e) = tasks::check_create(&identity, &staged.task, !staged.all_stores) {
        return error(e, revision_id);
    }
    if staged.all_stores && !staged.confirm {
        let count = state.config.stores.len();
        return error(
            AppError::ConfirmationRequired {
                prompt: tasks::bulk_create_prompt(count),
                store_count: Some(count),
            },
            revision_id,
        );
    }

    let files = files_named(&parts, "photo");
    let urls = match photos::upload_staged(
        state.images.as_ref(),
        files,
        Compression::from(state.config.as_ref()),
    )
    .await
    {
        Ok(urls) => urls,
        Err(e) => return error(e, revision_id),
    };
    staged.task.guide_photos.extend(urls);

    let result = if staged.all_stores {
        tasks::create_for_all_stores(
            state.store.as_ref(),
            &identity,
            &state.config.stores,
            staged.task,
            true,
        )
        .await
    } else {
        tasks::create_task(state.store.as_ref(), &identity, staged.task)
            .await
            .map(|task| vec![task])
    };

    match result {
        Ok(created) => success(created, settled_revision(&state).await),
        Err(e) => error(e, settled_revision(&state).await),
    }
}

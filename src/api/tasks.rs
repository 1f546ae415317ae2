//! Task API endpoints.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{error, settled_revision, success, ApiResult};
use crate::errors::AppError;
use crate::filter::{is_overdue, visible_tasks};
use crate::models::{CreateTaskRequest, FilterState, Identity, Task, UpdateTaskRequest};
use crate::tasks;
use crate::AppState;

/// A task as listed, with its overdue badge.
#[derive(Debug, Serialize)]
pub struct TaskRow {
    #[serde(flatten)]
    pub task: Task,
    pub overdue: bool,
}

#[derive(Debug, Serialize)]
pub struct TaskList {
    pub tasks: Vec<TaskRow>,
    pub loading: bool,
    pub stale: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreateRequest {
    #[serde(flatten)]
    pub task: CreateTaskRequest,
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmQuery {
    #[serde(default)]
    pub confirm: bool,
}

/// GET /api/tasks - Visible tasks matching the query filters.
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(filters): Query<FilterState>,
) -> ApiResult<TaskList> {
    let view = state.mirror.view();
    let now = Utc::now();

    let tasks = visible_tasks(&view.tasks, &identity, &filters, now)
        .into_iter()
        .map(|task| TaskRow {
            overdue: is_overdue(task, now),
            task: task.clone(),
        })
        .collect();

    success(
        TaskList {
            tasks,
            loading: view.loading,
            stale: view.stale,
        },
        view.revision,
    )
}

/// GET /api/tasks/{id} - One task from the mirror.
pub async fn get_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Task> {
    let view = state.mirror.view();

    match view.tasks.iter().find(|t| t.id == id) {
        Some(task) if identity.can_see(task) => success(task.clone(), view.revision),
        Some(_) => error(
            AppError::Forbidden("Cette tâche appartient à un autre magasin".to_string()),
            view.revision,
        ),
        None => error(
            AppError::NotFound(format!("Tâche {} introuvable", id)),
            view.revision,
        ),
    }
}

/// POST /api/tasks - Create a task for one store.
pub async fn create_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<CreateTaskRequest>,
) -> ApiResult<Task> {
    let revision_id = state.mirror.revision();

    match tasks::create_task(state.store.as_ref(), &identity, request).await {
        Ok(task) => success(task, settled_revision(&state).await),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/tasks/all-stores - Create the same task for every configured store.
pub async fn create_for_all_stores(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<BulkCreateRequest>,
) -> ApiResult<Vec<Task>> {
    let result = tasks::create_for_all_stores(
        state.store.as_ref(),
        &identity,
        &state.config.stores,
        request.task,
        request.confirm,
    )
    .await;

    match result {
        Ok(created) => success(created, settled_revision(&state).await),
        // Partial inserts may have landed.
        Err(e) => error(e, settled_revision(&state).await),
    }
}

/// PATCH /api/tasks/{id} - Write only the fields present in the body.
pub async fn update_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(patch): Json<UpdateTaskRequest>,
) -> ApiResult<Task> {
    let revision_id = state.mirror.revision();

    match tasks::update_task(state.store.as_ref(), &identity, &id, &patch).await {
        Ok(task) => success(task, settled_revision(&state).await),
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/tasks/{id}?confirm=true - Remove a task for good.
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Query(query): Query<ConfirmQuery>,
) -> ApiResult<()> {
    let revision_id = state.mirror.revision();

    match tasks::delete_task(state.store.as_ref(), &identity, &id, query.confirm).await {
        Ok(()) => success((), settled_revision(&state).await),
        Err(e) => error(e, revision_id),
    }
}

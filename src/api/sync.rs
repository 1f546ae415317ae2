//! Store list and mirror status endpoints.

use axum::{extract::State, Extension};

use super::{error, settled_revision, success, ApiResult};
use crate::errors::AppError;
use crate::models::{Identity, Role};
use crate::sync::SyncStatus;
use crate::AppState;

/// GET /api/stores - Configured stores, in display order.
pub async fn list_stores(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    success(state.config.stores.clone(), state.mirror.revision())
}

/// GET /api/sync/status - Whether the mirror is loading, live or stale.
pub async fn sync_status(State(state): State<AppState>) -> ApiResult<SyncStatus> {
    let view = state.mirror.view();
    success(SyncStatus::from(&view), view.revision)
}

/// POST /api/sync/remount - Subscribe to the store again.
pub async fn remount(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<SyncStatus> {
    let revision_id = state.mirror.revision();
    if identity.role != Role::Admin {
        return error(
            AppError::Forbidden("Action non autorisée pour ce profil".to_string()),
            revision_id,
        );
    }

    if let Err(e) = state.mirror.remount().await {
        return error(e, revision_id);
    }
    let revision_id = settled_revision(&state).await;
    success(SyncStatus::from(&state.mirror.view()), revision_id)
}

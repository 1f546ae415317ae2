//! Session endpoints.
//!
//! Logging in only checks the code; clients keep sending it with every request.

use axum::{extract::State, Extension, Json};
use serde::Deserialize;

use super::{error, success, ApiResult};
use crate::auth::resolve_access_code;
use crate::models::Identity;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub code: String,
}

/// POST /api/session - Resolve an access code.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Identity> {
    let revision_id = state.mirror.revision();

    match resolve_access_code(&request.code) {
        Ok(identity) => {
            tracing::info!(role = ?identity.role, name = %identity.name, "Session opened");
            success(identity, revision_id)
        }
        Err(e) => {
            tracing::info!("Login refused");
            error(e, revision_id)
        }
    }
}

/// GET /api/session/me - Identity behind the code sent with the request.
pub async fn whoami(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Identity> {
    success(identity, state.mirror.revision())
}

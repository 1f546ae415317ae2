//! Access-code gate.
//!
//! A shared, compiled-in table maps each code to one identity. There is no
//! session, token or expiry: the code is resolved again on every request.

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use once_cell::sync::Lazy;
use subtle::ConstantTimeEq;

use crate::errors::{AppError, AppErrorWithRevision};
use crate::models::{Identity, Role};

/// Header carrying the access code.
pub const ACCESS_CODE_HEADER: &str = "x-access-code";

pub const INVALID_CODE_MESSAGE: &str = "Code d'accès invalide";

fn identity(role: Role, store: Option<&str>, name: &str) -> Identity {
    Identity {
        role,
        store: store.map(str::to_string),
        name: name.to_string(),
    }
}

fn store_identity(store: &str) -> Identity {
    identity(Role::Store, Some(store), store)
}

static ACCESS_CODES: Lazy<Vec<(&'static str, Identity)>> = Lazy::new(|| {
    vec![
        (
            "ADMIN-VOGUE-2025",
            identity(Role::Admin, None, "Administrateur"),
        ),
        (
            "VM-VOGUE-2025",
            identity(Role::Vm, None, "Visiteur Merchandising"),
        ),
        ("LEPORT-2025", store_identity("Vogue Le Port")),
        ("STBENOIT-2025", store_identity("Vogue Saint-Benoît")),
        ("STDENIS-2025", store_identity("Vogue Saint-Denis")),
        ("STANDRE-2025", store_identity("Vogue Saint-André")),
        ("TAMPON-2025", store_identity("Vogue Tampon")),
        ("TAMPON400-2025", store_identity("Vogue Tampon-400")),
        ("DUPARC-2025", store_identity("Vogue Duparc")),
    ]
});

/// Resolve a submitted access code to its identity.
pub fn resolve_access_code(submitted: &str) -> Result<Identity, AppError> {
    let code = submitted.trim();

    // Every entry is compared so the lookup time does not depend on the match position.
    let mut found: Option<&Identity> = None;
    for (entry_code, identity) in ACCESS_CODES.iter() {
        if constant_time_compare(code, entry_code) {
            found = Some(identity);
        }
    }

    found
        .cloned()
        .ok_or_else(|| AppError::InvalidAccessCode(INVALID_CODE_MESSAGE.to_string()))
}

/// Middleware resolving the caller's identity and attaching it to the request.
pub async fn access_code_layer(mut request: Request, next: Next) -> Response {
    let provided = request
        .headers()
        .get(ACCESS_CODE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| {
            request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .map(|s| s.to_string())
        });

    let Some(code) = provided else {
        return unauthorized_response(AppError::InvalidAccessCode(
            "Code d'accès manquant".to_string(),
        ));
    };

    match resolve_access_code(&code) {
        Ok(identity) => {
            tracing::debug!(role = ?identity.role, name = %identity.name, "Access code accepted");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => {
            tracing::info!("Rejected access code on {}", request.uri().path());
            unauthorized_response(e)
        }
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    a_bytes.ct_eq(b_bytes).into()
}

fn unauthorized_response(error: AppError) -> Response {
    AppErrorWithRevision {
        error,
        revision_id: 0,
    }
    .into_response()
}

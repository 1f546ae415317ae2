//! Task mutations: create, create for every store, partial update, delete.
//!
//! Each operation checks the caller's role, performs its store calls in order
//! and reports the first failure under the alert text of the action. Nothing is
//! retried and nothing is rolled back.

use crate::dates::{now_rfc3339, today_iso};
use crate::db::TaskStore;
use crate::errors::AppError;
use crate::models::{CreateTaskRequest, Identity, Task, UpdateTaskRequest};
use crate::photos::{MAX_COMPLIANCE_PHOTOS, PHOTO_LIMIT_MESSAGE};

pub const CREATE_ALERT: &str = "Erreur lors de l'ajout de la tâche";
pub const UPDATE_ALERT: &str = "Erreur lors de la mise à jour";
pub const DELETE_ALERT: &str = "Erreur lors de la suppression";

pub const DELETE_PROMPT: &str = "Supprimer cette tâche ?";

const NOT_ALLOWED: &str = "Action non autorisée pour ce profil";

pub fn bulk_create_prompt(store_count: usize) -> String {
    format!("Créer cette tâche pour les {} magasins ?", store_count)
}

/// Fetch a task the identity is allowed to see.
pub async fn load_task_for(
    store: &dyn TaskStore,
    identity: &Identity,
    id: &str,
) -> Result<Task, AppError> {
    let task = store
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Tâche {} introuvable", id)))?;

    if !identity.can_see(&task) {
        tracing::info!(task_id = %id, who = %identity.name, "Task belongs to another store");
        return Err(AppError::Forbidden(
            "Cette tâche appartient à un autre magasin".to_string(),
        ));
    }
    Ok(task)
}

fn require_creator(identity: &Identity) -> Result<(), AppError> {
    if identity.can_create_tasks() {
        Ok(())
    } else {
        Err(AppError::Forbidden(NOT_ALLOWED.to_string()))
    }
}

/// Compliance lists never hold more than five URLs, whichever path writes them.
fn check_compliance_limit(urls: &[String]) -> Result<(), AppError> {
    if urls.len() > MAX_COMPLIANCE_PHOTOS {
        return Err(AppError::PhotoLimit(PHOTO_LIMIT_MESSAGE.to_string()));
    }
    Ok(())
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |s| s.trim().is_empty())
}

/// Role and required-field checks shared by every create path. The store name
/// is only required when the task targets a single store.
pub fn check_create(
    identity: &Identity,
    request: &CreateTaskRequest,
    single_store: bool,
) -> Result<(), AppError> {
    require_creator(identity)?;
    if is_blank(request.title.as_deref()) {
        return Err(AppError::Validation(
            "Renseignez au minimum la tâche.".to_string(),
        ));
    }
    if single_store && is_blank(request.store.as_deref()) {
        return Err(AppError::Validation("Renseignez le magasin.".to_string()));
    }
    check_compliance_limit(&request.compliance_photos)
}

/// Insert one task for one store.
pub async fn create_task(
    store: &dyn TaskStore,
    identity: &Identity,
    request: CreateTaskRequest,
) -> Result<Task, AppError> {
    check_create(identity, &request, true)?;

    let new_task = request.into_new_task(now_rfc3339(), today_iso());
    let task = store
        .insert(new_task)
        .await
        .map_err(|e| e.for_action(CREATE_ALERT))?;

    tracing::info!(task_id = %task.id, store = %task.store, who = %identity.name, "Task created");
    Ok(task)
}

/// Insert one copy of the task per configured store, in list order.
///
/// The store manager is cleared on every copy. Without `confirmed` nothing is
/// written and the confirmation prompt is returned as the error. A failing
/// insert stops the loop; copies already inserted stay.
pub async fn create_for_all_stores(
    store: &dyn TaskStore,
    identity: &Identity,
    stores: &[String],
    request: CreateTaskRequest,
    confirmed: bool,
) -> Result<Vec<Task>, AppError> {
    check_create(identity, &request, false)?;
    if stores.is_empty() {
        return Err(AppError::Validation(
            "Aucun magasin n'est configuré".to_string(),
        ));
    }
    if !confirmed {
        return Err(AppError::ConfirmationRequired {
            prompt: bulk_create_prompt(stores.len()),
            store_count: Some(stores.len()),
        });
    }

    let created_at = now_rfc3339();
    let today = today_iso();
    let mut created = Vec::with_capacity(stores.len());

    for store_name in stores {
        let new_task = CreateTaskRequest {
            store: Some(store_name.clone()),
            store_manager: None,
            ..request.clone()
        }
        .into_new_task(created_at.clone(), today.clone());

        match store.insert(new_task).await {
            Ok(task) => created.push(task),
            Err(e) => {
                tracing::error!(
                    store = %store_name,
                    created = created.len(),
                    total = stores.len(),
                    "{}: {}",
                    CREATE_ALERT,
                    e
                );
                return Err(AppError::Store(format!(
                    "{} ({} tâche(s) créée(s) sur {})",
                    CREATE_ALERT,
                    created.len(),
                    stores.len()
                )));
            }
        }
    }

    tracing::info!(count = created.len(), who = %identity.name, "Task created for every store");
    Ok(created)
}

/// Write the fields present in `patch` and return the task as stored afterwards.
pub async fn update_task(
    store: &dyn TaskStore,
    identity: &Identity,
    id: &str,
    patch: &UpdateTaskRequest,
) -> Result<Task, AppError> {
    if patch.is_empty() {
        return Err(AppError::Validation("Aucune modification".to_string()));
    }

    let forbidden = identity.forbidden_fields(patch);
    if !forbidden.is_empty() {
        return Err(AppError::Forbidden(format!(
            "Modification non autorisée: {}",
            forbidden.join(", ")
        )));
    }
    if patch.guide_photos.is_some() && !identity.can_create_tasks() {
        return Err(AppError::Forbidden(NOT_ALLOWED.to_string()));
    }
    if let Some(urls) = &patch.compliance_photos {
        check_compliance_limit(urls)?;
    }

    load_task_for(store, identity, id)
        .await
        .map_err(|e| e.for_action(UPDATE_ALERT))?;

    store
        .update(id, patch)
        .await
        .map_err(|e| e.for_action(UPDATE_ALERT))?;
    tracing::info!(task_id = %id, fields = ?patch.touched_fields(), who = %identity.name, "Task updated");

    store
        .get(id)
        .await
        .map_err(|e| e.for_action(UPDATE_ALERT))?
        .ok_or_else(|| AppError::NotFound(format!("Tâche {} introuvable", id)))
}

/// Permanently remove a task. Admin only, and only once confirmed.
pub async fn delete_task(
    store: &dyn TaskStore,
    identity: &Identity,
    id: &str,
    confirmed: bool,
) -> Result<(), AppError> {
    if !identity.can_delete() {
        return Err(AppError::Forbidden(NOT_ALLOWED.to_string()));
    }
    if !confirmed {
        return Err(AppError::ConfirmationRequired {
            prompt: DELETE_PROMPT.to_string(),
            store_count: None,
        });
    }

    store
        .delete(id)
        .await
        .map_err(|e| e.for_action(DELETE_ALERT))?;
    tracing::info!(task_id = %id, who = %identity.name, "Task deleted");
    Ok(())
}

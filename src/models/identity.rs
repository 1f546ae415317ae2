//! Identity resolved from an access code.

use serde::{Deserialize, Serialize};

use super::{PhotoKind, Task, UpdateTaskRequest};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full control, including deletion
    Admin,
    /// Visiting merchandiser: creates and validates tasks, manages guide photos
    Vm,
    /// A single store: status, feedback and compliance photos of its own tasks
    Store,
}

/// Who is acting. Recomputed from the code table on every request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub role: Role,
    /// Bound store name, only set for the store role
    pub store: Option<String>,
    pub name: String,
}

/// Fields a store identity is allowed to patch.
const STORE_EDITABLE_FIELDS: [&str; 3] = ["status", "feedbackMagasin", "compliancePhotos"];

impl Identity {
    pub fn is_store(&self) -> bool {
        self.role == Role::Store
    }

    pub fn can_create_tasks(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Vm)
    }

    pub fn can_delete(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn can_manage_photos(&self, kind: PhotoKind) -> bool {
        match kind {
            PhotoKind::Guide => self.can_create_tasks(),
            PhotoKind::Compliance => true,
        }
    }

    /// Store identities never see another store's tasks.
    pub fn can_see(&self, task: &Task) -> bool {
        match self.role {
            Role::Store => self.store.as_deref() == Some(task.store.as_str()),
            Role::Admin | Role::Vm => true,
        }
    }

    /// Fields of `patch` this identity may not write.
    pub fn forbidden_fields(&self, patch: &UpdateTaskRequest) -> Vec<&'static str> {
        if !self.is_store() {
            return Vec::new();
        }
        patch
            .touched_fields()
            .into_iter()
            .filter(|field| !STORE_EDITABLE_FIELDS.contains(field))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;

    fn store_identity(store: &str) -> Identity {
        Identity {
            role: Role::Store,
            store: Some(store.to_string()),
            name: store.to_string(),
        }
    }

    #[test]
    fn test_store_role_is_limited_to_its_fields() {
        let identity = store_identity("Vogue Tampon");
        let patch = UpdateTaskRequest {
            status: Some(TaskStatus::Done),
            validation: Some(crate::models::Validation::Validated),
            deadline: Some("2025-01-01".to_string()),
            ..UpdateTaskRequest::default()
        };
        assert_eq!(identity.forbidden_fields(&patch), vec!["validation", "deadline"]);
        assert!(!identity.can_manage_photos(PhotoKind::Guide));
        assert!(identity.can_manage_photos(PhotoKind::Compliance));
    }

    #[test]
    fn test_role_serialization() {
        let identity = Identity {
            role: Role::Vm,
            store: None,
            name: "Visiteur Merchandising".to_string(),
        };
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["role"], "vm");
        assert!(json["store"].is_null());
        assert!(identity.can_create_tasks());
        assert!(!identity.can_delete());
    }
}

//! Task model, the single tracked unit of work assigned to a store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Progress of a task as reported by the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "Non conforme", alias = "À faire")]
    NonCompliant,
    #[serde(rename = "En cours")]
    InProgress,
    #[serde(rename = "Fait")]
    Done,
    #[serde(rename = "Non fait")]
    NotDone,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::NonCompliant,
        TaskStatus::InProgress,
        TaskStatus::Done,
        TaskStatus::NotDone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NonCompliant => "Non conforme",
            TaskStatus::InProgress => "En cours",
            TaskStatus::Done => "Fait",
            TaskStatus::NotDone => "Non fait",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim() {
            "Non conforme" | "À faire" => Some(TaskStatus::NonCompliant),
            "En cours" => Some(TaskStatus::InProgress),
            "Fait" => Some(TaskStatus::Done),
            "Non fait" => Some(TaskStatus::NotDone),
            _ => None,
        }
    }

    /// Overdue tracking stops once a task reaches this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::from_label(s).ok_or_else(|| format!("Statut inconnu: {}", s))
    }
}

/// Controller verdict on a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Validation {
    #[default]
    #[serde(rename = "Non contrôlé")]
    Pending,
    #[serde(rename = "Validé")]
    Validated,
    #[serde(rename = "Non validé")]
    Rejected,
}

impl Validation {
    pub const ALL: [Validation; 3] = [
        Validation::Pending,
        Validation::Validated,
        Validation::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Validation::Pending => "Non contrôlé",
            Validation::Validated => "Validé",
            Validation::Rejected => "Non validé",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim() {
            "Non contrôlé" => Some(Validation::Pending),
            "Validé" => Some(Validation::Validated),
            "Non validé" => Some(Validation::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Validation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Validation::from_label(s).ok_or_else(|| format!("Validation inconnue: {}", s))
    }
}

/// The two photo lists carried by a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PhotoKind {
    /// Reference images set by admin/VM showing the expected result
    Guide,
    /// Evidence uploaded by the store
    Compliance,
}

impl FromStr for PhotoKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guide" => Ok(PhotoKind::Guide),
            "compliance" => Ok(PhotoKind::Compliance),
            other => Err(format!("Type de photo inconnu: {}", other)),
        }
    }
}

/// A task document as mirrored from the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub store: String,
    #[serde(default)]
    pub store_manager: String,
    #[serde(default)]
    pub controller: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default, rename = "feedbackMagasin")]
    pub feedback: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub validation: Validation,
    /// Date of visit, `YYYY-MM-DD`
    #[serde(default)]
    pub date: String,
    /// Empty when the task has no deadline
    #[serde(default)]
    pub deadline: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, deserialize_with = "photo_list")]
    pub guide_photos: Vec<String>,
    #[serde(default, deserialize_with = "photo_list")]
    pub compliance_photos: Vec<String>,
}

impl Task {
    pub fn photos(&self, kind: PhotoKind) -> &[String] {
        match kind {
            PhotoKind::Guide => &self.guide_photos,
            PhotoKind::Compliance => &self.compliance_photos,
        }
    }
}

/// A fully defaulted task document, ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub store: String,
    pub store_manager: String,
    pub controller: String,
    pub title: String,
    pub notes: String,
    pub feedback: String,
    pub status: TaskStatus,
    pub validation: Validation,
    pub date: String,
    pub deadline: String,
    pub created_at: String,
    pub guide_photos: Vec<String>,
    pub compliance_photos: Vec<String>,
}

impl NewTask {
    pub fn with_id(self, id: String) -> Task {
        Task {
            id,
            store: self.store,
            store_manager: self.store_manager,
            controller: self.controller,
            title: self.title,
            notes: self.notes,
            feedback: self.feedback,
            status: self.status,
            validation: self.validation,
            date: self.date,
            deadline: self.deadline,
            created_at: self.created_at,
            guide_photos: self.guide_photos,
            compliance_photos: self.compliance_photos,
        }
    }
}

/// Request body for creating a new task. Every field is optional; defaults are
/// applied by [`CreateTaskRequest::into_new_task`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub store: Option<String>,
    #[serde(default)]
    pub store_manager: Option<String>,
    #[serde(default)]
    pub controller: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, rename = "feedbackMagasin")]
    pub feedback: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub validation: Option<Validation>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "photo_list")]
    pub guide_photos: Vec<String>,
    #[serde(default, deserialize_with = "photo_list")]
    pub compliance_photos: Vec<String>,
}

impl CreateTaskRequest {
    /// Apply creation defaults: timestamp now, pending validation, initial
    /// status, empty feedback, visit date today.
    pub fn into_new_task(self, created_at: String, today: String) -> NewTask {
        NewTask {
            store: self.store.unwrap_or_default(),
            store_manager: self.store_manager.unwrap_or_default(),
            controller: self.controller.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            notes: self.notes.unwrap_or_default(),
            feedback: self.feedback.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            validation: self.validation.unwrap_or_default(),
            date: self.date.filter(|d| !d.trim().is_empty()).unwrap_or(today),
            deadline: self.deadline.unwrap_or_default(),
            created_at: self
                .created_at
                .filter(|c| !c.trim().is_empty())
                .unwrap_or(created_at),
            guide_photos: self.guide_photos,
            compliance_photos: self.compliance_photos,
        }
    }
}

/// Request body for a partial update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_manager: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(
        default,
        rename = "feedbackMagasin",
        skip_serializing_if = "Option::is_none"
    )]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_photo_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub guide_photos: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "optional_photo_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub compliance_photos: Option<Vec<String>>,
}

impl UpdateTaskRequest {
    /// Patch replacing one photo list.
    pub fn photos(kind: PhotoKind, urls: Vec<String>) -> Self {
        match kind {
            PhotoKind::Guide => Self {
                guide_photos: Some(urls),
                ..Self::default()
            },
            PhotoKind::Compliance => Self {
                compliance_photos: Some(urls),
                ..Self::default()
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.touched_fields().is_empty()
    }

    /// JSON names of the fields present in the patch.
    pub fn touched_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.store.is_some() {
            fields.push("store");
        }
        if self.store_manager.is_some() {
            fields.push("storeManager");
        }
        if self.controller.is_some() {
            fields.push("controller");
        }
        if self.title.is_some() {
            fields.push("title");
        }
        if self.notes.is_some() {
            fields.push("notes");
        }
        if self.feedback.is_some() {
            fields.push("feedbackMagasin");
        }
        if self.status.is_some() {
            fields.push("status");
        }
        if self.validation.is_some() {
            fields.push("validation");
        }
        if self.date.is_some() {
            fields.push("date");
        }
        if self.deadline.is_some() {
            fields.push("deadline");
        }
        if self.guide_photos.is_some() {
            fields.push("guidePhotos");
        }
        if self.compliance_photos.is_some() {
            fields.push("compliancePhotos");
        }
        fields
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<String>),
    One(String),
}

impl OneOrMany {
    fn into_list(self) -> Vec<String> {
        match self {
            OneOrMany::Many(urls) => urls,
            OneOrMany::One(url) if url.trim().is_empty() => Vec::new(),
            OneOrMany::One(url) => vec![url],
        }
    }
}

/// Photo fields of legacy documents may hold a single URL instead of a list.
fn photo_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<OneOrMany>::deserialize(deserializer)?;
    Ok(value.map(OneOrMany::into_list).unwrap_or_default())
}

fn optional_photo_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<OneOrMany>::deserialize(deserializer)?;
    Ok(value.map(OneOrMany::into_list))
}

/// Read a photo column as stored: a JSON array, a JSON string, or a bare URL.
pub fn parse_stored_photos(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str::<OneOrMany>(raw) {
        Ok(value) => value.into_list(),
        Err(_) => vec![raw.to_string()],
    }
}

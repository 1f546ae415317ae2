//! SQLite-backed task collection.
//!
//! Every write bumps the revision and publishes the whole collection, ordered by
//! creation time (newest first, ties in insertion order), to subscribers.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tokio::sync::{watch, Mutex};

use super::{StoreEvent, TaskSnapshot, TaskStore};
use crate::errors::AppError;
use crate::models::{
    parse_stored_photos, NewTask, Task, TaskStatus, UpdateTaskRequest, Validation,
};

const TASK_COLUMNS: &str = "id, store, store_manager, controller, title, notes, feedback_magasin, status, validation, date, deadline, created_at, guide_photos, compliance_photos";

/// Database repository for the task collection.
pub struct Repository {
    pool: SqlitePool,
    events: watch::Sender<StoreEvent>,
    /// Serializes revision bumps with the snapshot that follows them
    publish_lock: Mutex<()>,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        let (events, _) = watch::channel(StoreEvent::Pending);
        Self {
            pool,
            events,
            publish_lock: Mutex::new(()),
        }
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// List every task, newest first.
    pub async fn list_tasks(&self) -> Result<Vec<Task>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tasks ORDER BY created_at DESC, rowid ASC",
            TASK_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(task_from_row).collect())
    }

    /// Bump the revision and publish the resulting snapshot.
    async fn commit_change(&self) {
        let _guard = self.publish_lock.lock().await;
        let now = Utc::now().to_rfc3339();
        let bumped = sqlx::query(
            "UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1",
        )
        .bind(&now)
        .execute(&self.pool)
        .await;

        if let Err(e) = bumped {
            tracing::error!("Failed to bump revision: {}", e);
            self.events.send_replace(StoreEvent::Error(e.to_string()));
            return;
        }
        self.publish_locked().await;
    }

    async fn publish_locked(&self) {
        let event = match self.load_snapshot().await {
            Ok(snapshot) => {
                tracing::debug!(
                    revision = snapshot.revision,
                    tasks = snapshot.tasks.len(),
                    "Publishing task snapshot"
                );
                StoreEvent::Snapshot(snapshot)
            }
            Err(e) => {
                tracing::error!("Failed to load task snapshot: {}", e);
                StoreEvent::Error(e.message())
            }
        };
        self.events.send_replace(event);
    }

    async fn load_snapshot(&self) -> Result<TaskSnapshot, AppError> {
        let revision = self.get_revision_id().await?;
        let tasks = self.list_tasks().await?;
        Ok(TaskSnapshot {
            revision,
            tasks: Arc::new(tasks),
        })
    }
}

#[async_trait]
impl TaskStore for Repository {
    async fn subscribe(&self) -> Result<watch::Receiver<StoreEvent>, AppError> {
        let _guard = self.publish_lock.lock().await;
        let snapshot = self.load_snapshot().await?;
        self.events.send_replace(StoreEvent::Snapshot(snapshot));
        Ok(self.events.subscribe())
    }

    async fn revision(&self) -> Result<i64, AppError> {
        self.get_revision_id().await
    }

    async fn get(&self, id: &str) -> Result<Option<Task>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(task_from_row))
    }

    async fn insert(&self, task: NewTask) -> Result<Task, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let guide_json = serde_json::to_string(&task.guide_photos)?;
        let compliance_json = serde_json::to_string(&task.compliance_photos)?;

        sqlx::query(
            r#"INSERT INTO tasks (id, store, store_manager, controller, title, notes, feedback_magasin,
                status, validation, date, deadline, created_at, guide_photos, compliance_photos)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&task.store)
        .bind(&task.store_manager)
        .bind(&task.controller)
        .bind(&task.title)
        .bind(&task.notes)
        .bind(&task.feedback)
        .bind(task.status.as_str())
        .bind(task.validation.as_str())
        .bind(&task.date)
        .bind(&task.deadline)
        .bind(&task.created_at)
        .bind(&guide_json)
        .bind(&compliance_json)
        .execute(&self.pool)
        .await?;

        self.commit_change().await;

        Ok(task.with_id(id))
    }

    async fn update(&self, id: &str, patch: &UpdateTaskRequest) -> Result<(), AppError> {
        if patch.is_empty() {
            return match self.get(id).await? {
                Some(_) => Ok(()),
                None => Err(AppError::NotFound(format!("Tâche {} introuvable", id))),
            };
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE tasks SET ");
        {
            let mut fields = query.separated(", ");
            if let Some(v) = &patch.store {
                fields.push("store = ").push_bind_unseparated(v.clone());
            }
            if let Some(v) = &patch.store_manager {
                fields.push("store_manager = ").push_bind_unseparated(v.clone());
            }
            if let Some(v) = &patch.controller {
                fields.push("controller = ").push_bind_unseparated(v.clone());
            }
            if let Some(v) = &patch.title {
                fields.push("title = ").push_bind_unseparated(v.clone());
            }
            if let Some(v) = &patch.notes {
                fields.push("notes = ").push_bind_unseparated(v.clone());
            }
            if let Some(v) = &patch.feedback {
                fields.push("feedback_magasin = ").push_bind_unseparated(v.clone());
            }
            if let Some(v) = patch.status {
                fields.push("status = ").push_bind_unseparated(v.as_str());
            }
            if let Some(v) = patch.validation {
                fields.push("validation = ").push_bind_unseparated(v.as_str());
            }
            if let Some(v) = &patch.date {
                fields.push("date = ").push_bind_unseparated(v.clone());
            }
            if let Some(v) = &patch.deadline {
                fields.push("deadline = ").push_bind_unseparated(v.clone());
            }
            if let Some(v) = &patch.guide_photos {
                fields
                    .push("guide_photos = ")
                    .push_bind_unseparated(serde_json::to_string(v)?);
            }
            if let Some(v) = &patch.compliance_photos {
                fields
                    .push("compliance_photos = ")
                    .push_bind_unseparated(serde_json::to_string(v)?);
            }
        }
        query.push(" WHERE id = ").push_bind(id.to_string());

        let result = query.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Tâche {} introuvable", id)));
        }

        self.commit_change().await;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Tâche {} introuvable", id)));
        }

        self.commit_change().await;
        Ok(())
    }
}

// Helper functions for row conversion

fn task_from_row(row: &sqlx::sqlite::SqliteRow) -> Task {
    let status: String = row.get("status");
    let validation: String = row.get("validation");
    let guide_photos: Option<String> = row.get("guide_photos");
    let compliance_photos: Option<String> = row.get("compliance_photos");

    Task {
        id: row.get("id"),
        store: row.get("store"),
        store_manager: row.get("store_manager"),
        controller: row.get("controller"),
        title: row.get("title"),
        notes: row.get("notes"),
        feedback: row.get("feedback_magasin"),
        status: TaskStatus::from_label(&status).unwrap_or_default(),
        validation: Validation::from_label(&validation).unwrap_or_default(),
        date: row.get("date"),
        deadline: row.get("deadline"),
        created_at: row.get("created_at"),
        guide_photos: parse_stored_photos(guide_photos.as_deref()),
        compliance_photos: parse_stored_photos(compliance_photos.as_deref()),
    }
}

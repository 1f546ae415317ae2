//! Task store.
//!
//! The task collection sits behind the [`TaskStore`] trait: subscribe, insert,
//! partial update and delete. [`Repository`] keeps it in SQLite and publishes
//! the full ordered collection to subscribers after every change.

mod repository;

pub use repository::*;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::sync::watch;

use crate::errors::AppError;
use crate::models::{NewTask, Task, UpdateTaskRequest};

/// The whole collection at one revision, newest task first.
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub revision: i64,
    pub tasks: Arc<Vec<Task>>,
}

/// What a subscription delivers.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// Nothing published yet
    Pending,
    Snapshot(TaskSnapshot),
    /// The store could not produce a snapshot; subscribers stop here
    Error(String),
}

/// The document collection holding every task.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Start a subscription. The receiver holds a fresh full snapshot and is
    /// notified with a new one after every change.
    async fn subscribe(&self) -> Result<watch::Receiver<StoreEvent>, AppError>;

    /// Current revision, bumped once per change.
    async fn revision(&self) -> Result<i64, AppError>;

    async fn get(&self, id: &str) -> Result<Option<Task>, AppError>;

    /// Insert a document; the store assigns the identifier.
    async fn insert(&self, task: NewTask) -> Result<Task, AppError>;

    /// Write only the fields present in `patch`.
    async fn update(&self, id: &str, patch: &UpdateTaskRequest) -> Result<(), AppError>;

    async fn delete(&self, id: &str) -> Result<(), AppError>;
}

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL DEFAULT 1,
            revision_id INTEGER NOT NULL DEFAULT 0,
            generated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT OR IGNORE INTO meta (id, schema_version, revision_id, generated_at)
        VALUES (1, 1, 0, datetime('now'));
        "#,
    )
    .execute(pool)
    .await?;

    // Photo columns hold a JSON array; older rows may hold a bare URL.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            store TEXT NOT NULL DEFAULT '',
            store_manager TEXT NOT NULL DEFAULT '',
            controller TEXT NOT NULL DEFAULT '',
            title TEXT NOT NULL DEFAULT '',
            notes TEXT NOT NULL DEFAULT '',
            feedback_magasin TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL,
            validation TEXT NOT NULL,
            date TEXT NOT NULL DEFAULT '',
            deadline TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            guide_photos TEXT,
            compliance_photos TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at);
        CREATE INDEX IF NOT EXISTS idx_tasks_store ON tasks(store);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

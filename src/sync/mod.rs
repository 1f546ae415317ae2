//! Local mirror of the task collection.
//!
//! A [`TaskMirror`] holds one standing subscription to the store and replaces its
//! whole task list on every snapshot. A subscription error is logged and leaves
//! the mirror stale until [`TaskMirror::remount`] is called; nothing is retried.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::db::{StoreEvent, TaskStore};
use crate::errors::AppError;
use crate::models::Task;

/// How long a writer waits for its own change to show up in the mirror.
const CATCH_UP_TIMEOUT: Duration = Duration::from_secs(2);

/// Read-only view of the mirror at one point in time.
#[derive(Debug, Clone, Default)]
pub struct MirrorView {
    pub tasks: Arc<Vec<Task>>,
    pub revision: i64,
    /// No snapshot received since the last (re)mount
    pub loading: bool,
    /// The subscription ended; the list no longer follows the store
    pub stale: bool,
}

/// Status payload for the sync endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub loading: bool,
    pub stale: bool,
    pub revision: i64,
    pub task_count: usize,
}

impl From<&MirrorView> for SyncStatus {
    fn from(view: &MirrorView) -> Self {
        Self {
            loading: view.loading,
            stale: view.stale,
            revision: view.revision,
            task_count: view.tasks.len(),
        }
    }
}

pub struct TaskMirror {
    store: Arc<dyn TaskStore>,
    view: Arc<watch::Sender<MirrorView>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TaskMirror {
    /// Subscribe to the store and start following it.
    pub async fn mount(store: Arc<dyn TaskStore>) -> Result<Self, AppError> {
        let (view, _) = watch::channel(MirrorView {
            loading: true,
            ..MirrorView::default()
        });
        let mirror = Self {
            store,
            view: Arc::new(view),
            worker: Mutex::new(None),
        };
        mirror.start().await?;
        Ok(mirror)
    }

    /// Drop the current subscription, if any, and subscribe again.
    pub async fn remount(&self) -> Result<(), AppError> {
        tracing::info!("Remounting task subscription");
        self.view.send_modify(|v| {
            v.loading = true;
            v.stale = false;
        });
        self.start().await
    }

    /// Cancel the subscription. The last mirrored list stays readable.
    pub fn shutdown(&self) {
        if let Some(handle) = self.take_worker() {
            handle.abort();
            tracing::debug!("Task subscription cancelled");
        }
        self.view.send_modify(|v| v.stale = true);
    }

    pub fn view(&self) -> MirrorView {
        self.view.borrow().clone()
    }

    pub fn revision(&self) -> i64 {
        self.view.borrow().revision
    }

    /// Wait until the mirror has applied `revision`, the mirror goes stale, or
    /// the catch-up timeout elapses. Returns the view at that point.
    pub async fn wait_for_revision(&self, revision: i64) -> MirrorView {
        let mut rx = self.view.subscribe();
        let timed_out = tokio::time::timeout(
            CATCH_UP_TIMEOUT,
            rx.wait_for(|v| (v.revision >= revision && !v.loading) || v.stale),
        )
        .await
        .is_err();
        if timed_out {
            tracing::warn!(revision, "Mirror did not catch up in time");
        }
        self.view()
    }

    async fn start(&self) -> Result<(), AppError> {
        if let Some(previous) = self.take_worker() {
            previous.abort();
        }

        let events = match self.store.subscribe().await {
            Ok(events) => events,
            Err(e) => {
                tracing::error!("Erreur de synchronisation: {}", e);
                self.view.send_modify(|v| {
                    v.loading = false;
                    v.stale = true;
                });
                return Err(e);
            }
        };

        let handle = tokio::spawn(follow(events, self.view.clone()));
        if let Ok(mut worker) = self.worker.lock() {
            *worker = Some(handle);
        }
        Ok(())
    }

    fn take_worker(&self) -> Option<JoinHandle<()>> {
        self.worker.lock().ok().and_then(|mut w| w.take())
    }
}

impl Drop for TaskMirror {
    fn drop(&mut self) {
        if let Some(handle) = self.take_worker() {
            handle.abort();
        }
    }
}

async fn follow(mut events: watch::Receiver<StoreEvent>, view: Arc<watch::Sender<MirrorView>>) {
    loop {
        let event = events.borrow_and_update().clone();
        match event {
            StoreEvent::Pending => {}
            StoreEvent::Snapshot(snapshot) => {
                view.send_modify(|v| {
                    v.tasks = snapshot.tasks;
                    v.revision = snapshot.revision;
                    v.loading = false;
                    v.stale = false;
                });
            }
            StoreEvent::Error(message) => {
                tracing::error!("Erreur de synchronisation: {}", message);
                view.send_modify(|v| {
                    v.loading = false;
                    v.stale = true;
                });
                return;
            }
        }

        if events.changed().await.is_err() {
            tracing::warn!("Task store closed the subscription");
            view.send_modify(|v| {
                v.loading = false;
                v.stale = true;
            });
            return;
        }
    }
}

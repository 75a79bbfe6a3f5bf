//! Operation poller.
//!
//! Tracks one long-running push/pull-multiple operation: records it in the
//! operation store and, while it is not done, polls the status endpoint on a
//! fixed interval. The first poll observing `done` pushes the final state
//! into the store, marks both sync views stale (exactly once), and stops.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use trellis_api::{OperationApi, OperationRun};
use trellis_types::Result;

use crate::state::SyncAction;
use crate::store::{OperationAction, OperationStore, SyncStore};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct OperationPoller {
    namespace: String,
    api: Arc<dyn OperationApi>,
    store: Arc<OperationStore>,
    push: Arc<SyncStore>,
    pull: Arc<SyncStore>,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl OperationPoller {
    pub fn new(
        namespace: impl Into<String>,
        api: Arc<dyn OperationApi>,
        store: Arc<OperationStore>,
        push: Arc<SyncStore>,
        pull: Arc<SyncStore>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            api,
            store,
            push,
            pull,
            interval: DEFAULT_POLL_INTERVAL,
            task: Mutex::new(None),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Records `operation` as the latest run and begins polling it if it is
    /// not yet done. Only one operation is tracked at a time: tracking a new
    /// one replaces the previous poll task. No mutual exclusion is enforced
    /// here; callers are expected to gate concurrent submission.
    pub async fn track(&self, operation: OperationRun) {
        self.store
            .dispatch(OperationAction::SetLatest(operation.clone()))
            .await;
        if operation.done {
            return;
        }

        let mut slot = self.task.lock().await;
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        let namespace = self.namespace.clone();
        let api = self.api.clone();
        let store = self.store.clone();
        let push = self.push.clone();
        let pull = self.pull.clone();
        let every = self.interval;
        let operation_id = operation.id.clone();

        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                match api.status(&namespace, &operation_id).await {
                    Ok(run) if run.done => {
                        info!(operation = %operation_id, "operation completed");
                        store.dispatch(OperationAction::SetLatest(run)).await;
                        push.dispatch(SyncAction::MarkStale).await;
                        pull.dispatch(SyncAction::MarkStale).await;
                        break;
                    }
                    Ok(_) => {
                        debug!(operation = %operation_id, "operation still running");
                    }
                    Err(err) => {
                        // Timeout/retry policy belongs to the HTTP client;
                        // here the loop just keeps polling.
                        warn!(operation = %operation_id, error = %err, "operation poll failed");
                    }
                }
            }
        }));
    }

    /// Fire-and-forget stop request. Actual termination is confirmed only by
    /// a later poll tick observing `done`.
    pub async fn stop(&self, operation: &OperationRun) {
        if let Err(err) = self.api.stop(&self.namespace, &operation.id).await {
            warn!(operation = %operation.id, error = %err, "stop request failed");
        }
    }

    /// Queries the newest pull and push operations and adopts whichever is
    /// newer than the currently tracked run, if any.
    pub async fn fetch_latest(&self) -> Result<()> {
        let mut newest: Option<OperationRun> = None;
        for runs in [
            self.api.latest_pull(&self.namespace).await?,
            self.api.latest_push(&self.namespace).await?,
        ] {
            if let Some(candidate) = runs.into_iter().next() {
                if is_newer(&candidate, newest.as_ref()) {
                    newest = Some(candidate);
                }
            }
        }

        let Some(candidate) = newest else {
            return Ok(());
        };
        let current = self.store.snapshot().await.operation;
        if is_newer(&candidate, current.as_ref()) {
            self.track(candidate).await;
        }
        Ok(())
    }

    /// True while a poll task is alive.
    pub async fn is_polling(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

fn create_time(operation: &OperationRun) -> Option<DateTime<Utc>> {
    operation.metadata.create_time
}

fn is_newer(candidate: &OperationRun, current: Option<&OperationRun>) -> bool {
    let Some(current) = current else {
        return true;
    };
    match (create_time(candidate), create_time(current)) {
        (Some(a), Some(b)) => a > b,
        (Some(_), None) => true,
        _ => false,
    }
}

//! Store wrappers: atomic dispatch over the reducers plus a broadcast feed of
//! snapshots for subscribers.

use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::BroadcastStream;

use trellis_api::OperationRun;

use crate::state::{reduce, SyncAction, SyncViewState};

const EVENT_CAPACITY: usize = 256;

/// One sync view (push or pull) behind a lock, with snapshot subscribers.
pub struct SyncStore {
    inner: RwLock<SyncViewState>,
    events: broadcast::Sender<Arc<SyncViewState>>,
}

impl SyncStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: RwLock::new(SyncViewState::default()),
            events,
        }
    }

    pub async fn snapshot(&self) -> SyncViewState {
        self.inner.read().await.clone()
    }

    /// Applies one action atomically and publishes the resulting snapshot.
    pub async fn dispatch(&self, action: SyncAction) -> SyncViewState {
        let mut inner = self.inner.write().await;
        let next = reduce(&inner, &action);
        *inner = next.clone();
        drop(inner);
        let _ = self.events.send(Arc::new(next.clone()));
        next
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SyncViewState>> {
        self.events.subscribe()
    }

    /// Snapshot feed as a stream, for `while let` consumers.
    pub fn watch(&self) -> BroadcastStream<Arc<SyncViewState>> {
        BroadcastStream::new(self.events.subscribe())
    }
}

impl Default for SyncStore {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Operation-run store
// ---------------------------------------------------------------------------

/// State of the most recent long-running push/pull operation.
#[derive(Debug, Clone)]
pub struct OperationState {
    pub running: bool,
    pub operation: Option<OperationRun>,
    pub show_last_operation_info: bool,
}

impl Default for OperationState {
    fn default() -> Self {
        Self {
            running: false,
            operation: None,
            show_last_operation_info: true,
        }
    }
}

#[derive(Debug, Clone)]
pub enum OperationAction {
    SetLatest(OperationRun),
    Unset,
    SetShowInfo(bool),
}

fn reduce_operation(state: &OperationState, action: &OperationAction) -> OperationState {
    let mut next = state.clone();
    match action {
        OperationAction::SetLatest(operation) => {
            next.running = !operation.done;
            next.operation = Some(operation.clone());
            next.show_last_operation_info = true;
        }
        OperationAction::Unset => {
            next.running = false;
            next.show_last_operation_info = false;
        }
        OperationAction::SetShowInfo(show) => next.show_last_operation_info = *show,
    }
    next
}

pub struct OperationStore {
    inner: RwLock<OperationState>,
    events: broadcast::Sender<Arc<OperationState>>,
}

impl OperationStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: RwLock::new(OperationState::default()),
            events,
        }
    }

    pub async fn snapshot(&self) -> OperationState {
        self.inner.read().await.clone()
    }

    pub async fn dispatch(&self, action: OperationAction) -> OperationState {
        let mut inner = self.inner.write().await;
        let next = reduce_operation(&inner, &action);
        *inner = next.clone();
        drop(inner);
        let _ = self.events.send(Arc::new(next.clone()));
        next
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<OperationState>> {
        self.events.subscribe()
    }
}

impl Default for OperationStore {
    fn default() -> Self {
        Self::new()
    }
}

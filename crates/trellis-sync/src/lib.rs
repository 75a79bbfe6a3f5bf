//! Source-control sync state for the studio: push/pull view stores, batch
//! push/pull execution, debounced filter refetch, and the long-running
//! operation poller.
//!
//! Each view (push = local to remote, pull = remote to local) is an isolated
//! reducer-driven state machine over immutable snapshots; the service layer
//! wires the stores to the backend collaborators.

pub mod debounce;
pub mod poller;
pub mod service;
pub mod state;
pub mod store;
pub mod types;

pub use debounce::Debouncer;
pub use poller::{OperationPoller, DEFAULT_POLL_INTERVAL};
pub use service::{make_sync_filter, SyncService, SyncView, SEARCH_DEBOUNCE};
pub use state::{reduce, SyncAction, SyncViewState, DEFAULT_PAGE_SIZE};
pub use store::{OperationAction, OperationState, OperationStore, SyncStore};
pub use types::{RepositoryPipeline, RowStatus};

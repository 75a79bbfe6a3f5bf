//! The sync service: action creators over the push/pull stores.
//!
//! Wires the stores to the backend collaborators: paged listing refresh,
//! debounced filter changes, sequential single-pipeline batches, and the
//! batch-multiple operations handed off to the poller.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use trellis_api::{
    CommitMeta, ListQuery, OperationApi, PipelineApi, SourceControlApi, SyncAck, SyncStatusFilter,
};
use trellis_types::Result;

use crate::debounce::Debouncer;
use crate::poller::OperationPoller;
use crate::state::{SyncAction, SyncViewState};
use crate::store::{OperationStore, SyncStore};
use crate::types::{RepositoryPipeline, RowStatus};

/// Quiet period before a changed name filter triggers a refetch.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

const FILTER_SPLITTER: &str = "AND";
const NAME_FILTER_KEY: &str = "NAME_CONTAINS";
const SYNC_STATUS_FILTER_KEY: &str = "IS_SYNCED";

/// Builds the server-side filter expression from the view's filters.
pub fn make_sync_filter(
    name_filter: &str,
    sync_status_filter: Option<SyncStatusFilter>,
) -> Option<String> {
    let mut filters = Vec::new();
    if !name_filter.is_empty() {
        filters.push(format!("\"{NAME_FILTER_KEY}={name_filter}\""));
    }
    if let Some(filter) = sync_status_filter {
        let synced = filter == SyncStatusFilter::Synced;
        filters.push(format!("\"{SYNC_STATUS_FILTER_KEY}={synced}\""));
    }
    if filters.is_empty() {
        None
    } else {
        Some(filters.join(FILTER_SPLITTER))
    }
}

fn list_query(namespace: &str, state: &SyncViewState) -> ListQuery {
    ListQuery {
        namespace: namespace.to_string(),
        page_size: state.page_size,
        page_token: state.page_token(),
        sort_on: state.sort_by,
        sort_order: state.sort_order,
        filter: make_sync_filter(&state.name_filter, state.sync_status_filter),
    }
}

/// Which of the two isolated views an update addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncView {
    Push,
    Pull,
}

pub struct SyncService {
    namespace: String,
    pipelines: Arc<dyn PipelineApi>,
    source_control: Arc<dyn SourceControlApi>,
    pub push: Arc<SyncStore>,
    pub pull: Arc<SyncStore>,
    pub operation: Arc<OperationStore>,
    pub poller: OperationPoller,
    push_search: Debouncer,
    pull_search: Debouncer,
}

impl SyncService {
    pub fn new(
        namespace: impl Into<String>,
        pipelines: Arc<dyn PipelineApi>,
        source_control: Arc<dyn SourceControlApi>,
        operations: Arc<dyn OperationApi>,
    ) -> Self {
        let namespace = namespace.into();
        let push = Arc::new(SyncStore::new());
        let pull = Arc::new(SyncStore::new());
        let operation = Arc::new(OperationStore::new());
        let poller = OperationPoller::new(
            namespace.clone(),
            operations,
            operation.clone(),
            push.clone(),
            pull.clone(),
        );
        Self {
            namespace,
            pipelines,
            source_control,
            push,
            pull,
            operation,
            poller,
            push_search: Debouncer::new(SEARCH_DEBOUNCE),
            pull_search: Debouncer::new(SEARCH_DEBOUNCE),
        }
    }

    fn store(&self, view: SyncView) -> &Arc<SyncStore> {
        match view {
            SyncView::Push => &self.push,
            SyncView::Pull => &self.pull,
        }
    }

    // --- listing ---

    /// Refreshes the local (push) listing for the current page and filters.
    pub async fn refresh_local(&self) {
        let state = self.push.snapshot().await;
        let query = list_query(&self.namespace, &state);
        match self.pipelines.list(&query).await {
            Ok(page) => {
                let rows: Vec<_> = page
                    .apps
                    .into_iter()
                    .map(RepositoryPipeline::from_summary)
                    .collect();
                self.push.dispatch(SyncAction::SetErrorMsg(None)).await;
                self.push.dispatch(SyncAction::SetPipelines(rows)).await;
                self.push
                    .dispatch(SyncAction::SetPageToken {
                        page: state.current_page,
                        token: page.next_page_token,
                    })
                    .await;
                self.push
                    .dispatch(SyncAction::SetLastRefreshTime(page.last_refresh_time))
                    .await;
            }
            Err(err) => {
                error!(error = %err, "listing local pipelines failed");
                self.push.dispatch(SyncAction::SetPipelines(Vec::new())).await;
                self.push
                    .dispatch(SyncAction::SetErrorMsg(Some(err.to_string())))
                    .await;
            }
        }
    }

    /// Refreshes the remote (pull) listing for the current page and filters.
    pub async fn refresh_remote(&self) {
        let state = self.pull.snapshot().await;
        let query = list_query(&self.namespace, &state);
        match self.source_control.list(&query).await {
            Ok(page) => {
                let rows: Vec<_> = page
                    .apps
                    .into_iter()
                    .map(RepositoryPipeline::from_summary)
                    .collect();
                self.pull.dispatch(SyncAction::SetErrorMsg(None)).await;
                self.pull.dispatch(SyncAction::SetPipelines(rows)).await;
                self.pull
                    .dispatch(SyncAction::SetPageToken {
                        page: state.current_page,
                        token: page.next_page_token,
                    })
                    .await;
                self.pull
                    .dispatch(SyncAction::SetLastRefreshTime(page.last_refresh_time))
                    .await;
            }
            Err(err) => {
                error!(error = %err, "listing remote pipelines failed");
                self.pull.dispatch(SyncAction::SetPipelines(Vec::new())).await;
                self.pull
                    .dispatch(SyncAction::SetErrorMsg(Some(err.to_string())))
                    .await;
            }
        }
    }

    // --- filters, paging, sorting ---

    /// Records the typed filter immediately; the search reset (and the
    /// refetch it forces) fires after the debounce delay.
    pub async fn set_name_filter(&self, view: SyncView, filter: impl Into<String>) {
        let store = self.store(view).clone();
        store
            .dispatch(SyncAction::SetNameFilter(filter.into()))
            .await;
        let debouncer = match view {
            SyncView::Push => &self.push_search,
            SyncView::Pull => &self.pull_search,
        };
        debouncer
            .call(async move {
                store.dispatch(SyncAction::ApplySearch).await;
            })
            .await;
    }

    pub async fn set_sync_status_filter(
        &self,
        view: SyncView,
        filter: Option<SyncStatusFilter>,
    ) {
        let store = self.store(view);
        store.dispatch(SyncAction::SetSyncStatusFilter(filter)).await;
        store.dispatch(SyncAction::ApplySearch).await;
    }

    pub async fn set_page_size(&self, view: SyncView, page_size: usize) {
        self.store(view)
            .dispatch(SyncAction::SetPageSize(page_size))
            .await;
    }

    pub async fn set_current_page(&self, view: SyncView, page: usize) {
        self.store(view)
            .dispatch(SyncAction::SetCurrentPage(page))
            .await;
    }

    pub async fn set_sort_config(
        &self,
        view: SyncView,
        sort_by: trellis_api::SortBy,
        sort_order: trellis_api::SortOrder,
    ) {
        self.store(view)
            .dispatch(SyncAction::SetSortConfig {
                sort_by,
                sort_order,
            })
            .await;
    }

    // --- batches ---

    /// Pushes the given pipelines one at a time, recording each row's outcome
    /// as it lands. A failed row never aborts the rest of the batch.
    pub async fn push_selected(&self, apps: &[String], commit: &CommitMeta) {
        self.run_batch(SyncView::Push, apps, |app| {
            let app = app.to_string();
            async move { self.source_control.push(&self.namespace, &app, commit).await }
        })
        .await;
    }

    /// Pulls the given pipelines one at a time; same per-row semantics as
    /// [`push_selected`](Self::push_selected).
    pub async fn pull_selected(&self, apps: &[String]) {
        self.run_batch(SyncView::Pull, apps, |app| {
            let app = app.to_string();
            async move { self.source_control.pull(&self.namespace, &app).await }
        })
        .await;
    }

    async fn run_batch<'a, F, Fut>(&'a self, view: SyncView, apps: &[String], mut call: F)
    where
        F: FnMut(&str) -> Fut,
        Fut: std::future::Future<Output = Result<SyncAck>> + 'a,
    {
        let store = self.store(view);
        let verb = match view {
            SyncView::Push => "Pushing",
            SyncView::Pull => "Pulling",
        };
        store.dispatch(SyncAction::ResetRowStatuses).await;

        for app in apps {
            store
                .dispatch(SyncAction::SetLoadingMessage(Some(format!(
                    "{verb} pipeline {app}"
                ))))
                .await;
            store
                .dispatch(SyncAction::SetRowStatus {
                    name: app.clone(),
                    status: Some(RowStatus::Pending),
                    error: None,
                    file_hash: None,
                })
                .await;

            let (status, error, file_hash) = match call(app).await {
                Ok(SyncAck::Applied { file_hash }) => (RowStatus::Success, None, file_hash),
                Ok(SyncAck::Notice(notice)) => (RowStatus::Partial, Some(notice), None),
                Err(err) => (RowStatus::Failure, Some(err.to_string()), None),
            };
            store
                .dispatch(SyncAction::SetRowStatus {
                    name: app.clone(),
                    status: Some(status),
                    error,
                    file_hash,
                })
                .await;
        }

        store.dispatch(SyncAction::SetLoadingMessage(None)).await;
        info!(count = apps.len(), view = ?view, "batch finished");
    }

    /// Starts a server-side push of several pipelines and hands the returned
    /// operation to the poller. On failure a single message is surfaced and
    /// no row is touched.
    pub async fn push_many(&self, apps: &[String], commit: &CommitMeta) -> Result<()> {
        self.push
            .dispatch(SyncAction::SetLoadingMessage(Some(format!(
                "Pushing {} pipelines",
                apps.len()
            ))))
            .await;
        let outcome = self
            .source_control
            .push_many(&self.namespace, apps, commit)
            .await;
        self.push.dispatch(SyncAction::SetLoadingMessage(None)).await;
        match outcome {
            Ok(operation) => {
                self.poller.track(operation).await;
                Ok(())
            }
            Err(err) => {
                self.push
                    .dispatch(SyncAction::SetErrorMsg(Some(err.to_string())))
                    .await;
                Err(err)
            }
        }
    }

    /// Starts a server-side pull of several pipelines; see
    /// [`push_many`](Self::push_many).
    pub async fn pull_many(&self, apps: &[String]) -> Result<()> {
        self.pull
            .dispatch(SyncAction::SetLoadingMessage(Some(format!(
                "Pulling {} pipelines",
                apps.len()
            ))))
            .await;
        let outcome = self.source_control.pull_many(&self.namespace, apps).await;
        self.pull.dispatch(SyncAction::SetLoadingMessage(None)).await;
        match outcome {
            Ok(operation) => {
                self.poller.track(operation).await;
                Ok(())
            }
            Err(err) => {
                self.pull
                    .dispatch(SyncAction::SetErrorMsg(Some(err.to_string())))
                    .await;
                Err(err)
            }
        }
    }

    // --- operations ---

    pub async fn stop_operation(&self, operation: &trellis_api::OperationRun) {
        self.poller.stop(operation).await;
    }

    pub async fn fetch_latest_operation(&self) -> Result<()> {
        self.poller.fetch_latest().await
    }

    pub async fn dismiss_operation_alert(&self) {
        self.operation
            .dispatch(crate::store::OperationAction::SetShowInfo(false))
            .await;
    }
}

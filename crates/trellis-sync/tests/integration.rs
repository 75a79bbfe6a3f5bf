//! End-to-end tests of the sync service against in-memory collaborators.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use trellis_api::{
    CommitMeta, ListQuery, OperationApi, OperationRun, PipelineApi, PipelineListPage,
    PipelineSummary, SourceControlApi, SyncAck,
};
use trellis_sync::{RowStatus, SyncAction, SyncService, SyncView};
use trellis_types::{Result, TrellisError};

// ---------------------------------------------------------------------------
// In-memory collaborators
// ---------------------------------------------------------------------------

fn page(names: &[&str], next_token: Option<&str>) -> PipelineListPage {
    PipelineListPage {
        apps: names
            .iter()
            .map(|n| PipelineSummary {
                name: (*n).to_string(),
                ..Default::default()
            })
            .collect(),
        next_page_token: next_token.map(String::from),
        last_refresh_time: None,
    }
}

fn api_error(message: &str) -> TrellisError {
    TrellisError::Api {
        endpoint: "repository/apps".into(),
        status: 500,
        message: message.into(),
    }
}

#[derive(Default)]
struct FakePipelineApi {
    responses: Mutex<VecDeque<Result<PipelineListPage>>>,
}

impl FakePipelineApi {
    async fn enqueue(&self, response: Result<PipelineListPage>) {
        self.responses.lock().await.push_back(response);
    }
}

#[async_trait]
impl PipelineApi for FakePipelineApi {
    async fn list(&self, _query: &ListQuery) -> Result<PipelineListPage> {
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(PipelineListPage::default()))
    }
}

#[derive(Default)]
struct FakeSourceControl {
    list_responses: Mutex<VecDeque<Result<PipelineListPage>>>,
    fail: HashSet<String>,
    notice: HashSet<String>,
    fail_many: bool,
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl SourceControlApi for FakeSourceControl {
    async fn list(&self, _query: &ListQuery) -> Result<PipelineListPage> {
        self.list_responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(PipelineListPage::default()))
    }

    async fn push(&self, _namespace: &str, app: &str, _commit: &CommitMeta) -> Result<SyncAck> {
        self.calls.lock().await.push(format!("push:{app}"));
        if self.fail.contains(app) {
            return Err(api_error(&format!("{app} rejected by remote")));
        }
        if self.notice.contains(app) {
            return Ok(SyncAck::Notice(format!("{app} is already up to date")));
        }
        Ok(SyncAck::Applied {
            file_hash: Some(format!("hash-{app}")),
        })
    }

    async fn pull(&self, _namespace: &str, app: &str) -> Result<SyncAck> {
        self.calls.lock().await.push(format!("pull:{app}"));
        if self.fail.contains(app) {
            return Err(api_error(&format!("{app} not found in repository")));
        }
        Ok(SyncAck::Applied { file_hash: None })
    }

    async fn push_many(
        &self,
        _namespace: &str,
        apps: &[String],
        _commit: &CommitMeta,
    ) -> Result<OperationRun> {
        if self.fail_many {
            return Err(api_error("batch push rejected"));
        }
        self.calls
            .lock()
            .await
            .push(format!("push_many:{}", apps.len()));
        Ok(OperationRun {
            id: uuid::Uuid::new_v4().to_string(),
            done: false,
            ..Default::default()
        })
    }

    async fn pull_many(&self, _namespace: &str, apps: &[String]) -> Result<OperationRun> {
        if self.fail_many {
            return Err(api_error("batch pull rejected"));
        }
        self.calls
            .lock()
            .await
            .push(format!("pull_many:{}", apps.len()));
        Ok(OperationRun {
            id: uuid::Uuid::new_v4().to_string(),
            done: false,
            ..Default::default()
        })
    }
}

/// Answers every status poll with `done = true`.
#[derive(Default)]
struct CompletingOperationApi;

#[async_trait]
impl OperationApi for CompletingOperationApi {
    async fn status(&self, _namespace: &str, operation_id: &str) -> Result<OperationRun> {
        Ok(OperationRun {
            id: operation_id.into(),
            done: true,
            ..Default::default()
        })
    }

    async fn latest_push(&self, _namespace: &str) -> Result<Vec<OperationRun>> {
        Ok(Vec::new())
    }

    async fn latest_pull(&self, _namespace: &str) -> Result<Vec<OperationRun>> {
        Ok(Vec::new())
    }

    async fn stop(&self, _namespace: &str, _operation_id: &str) -> Result<()> {
        Ok(())
    }
}

struct Fixture {
    service: SyncService,
    pipelines: Arc<FakePipelineApi>,
    source_control: Arc<FakeSourceControl>,
}

fn fixture(source_control: FakeSourceControl) -> Fixture {
    let pipelines = Arc::new(FakePipelineApi::default());
    let source_control = Arc::new(source_control);
    let service = SyncService::new(
        "default",
        pipelines.clone(),
        source_control.clone(),
        Arc::new(CompletingOperationApi::default()),
    );
    Fixture {
        service,
        pipelines,
        source_control,
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn local_listing_loads_rows_and_page_token() {
    let fx = fixture(FakeSourceControl::default());
    fx.pipelines
        .enqueue(Ok(page(&["orders", "fraud"], Some("tok-0"))))
        .await;

    fx.service.refresh_local().await;

    let state = fx.service.push.snapshot().await;
    assert!(state.ready);
    assert_eq!(state.pipelines.len(), 2);
    assert_eq!(state.pipelines[0].name, "orders");
    assert_eq!(state.next_page_tokens, vec![Some("tok-0".to_string())]);
    assert!(!state.is_last_page());
    assert!(state.error_msg.is_none());
}

#[tokio::test]
async fn listing_failure_clears_list_and_surfaces_message() {
    let fx = fixture(FakeSourceControl::default());
    fx.source_control
        .list_responses
        .lock()
        .await
        .push_back(Err(api_error("repository unreachable")));

    fx.service.refresh_remote().await;

    let state = fx.service.pull.snapshot().await;
    assert!(state.pipelines.is_empty());
    assert!(state
        .error_msg
        .as_deref()
        .unwrap()
        .contains("repository unreachable"));
}

#[tokio::test]
async fn successful_refresh_clears_previous_error() {
    let fx = fixture(FakeSourceControl::default());
    fx.source_control
        .list_responses
        .lock()
        .await
        .push_back(Err(api_error("blip")));
    fx.service.refresh_remote().await;
    assert!(fx.service.pull.snapshot().await.error_msg.is_some());

    fx.source_control
        .list_responses
        .lock()
        .await
        .push_back(Ok(page(&["orders"], None)));
    fx.service.refresh_remote().await;
    let state = fx.service.pull.snapshot().await;
    assert!(state.error_msg.is_none());
    assert_eq!(state.pipelines.len(), 1);
}

// ---------------------------------------------------------------------------
// Sequential batches
// ---------------------------------------------------------------------------

#[tokio::test]
async fn batch_pull_records_per_row_outcomes_in_order() {
    let mut backend = FakeSourceControl::default();
    backend.fail.insert("B".into());
    let fx = fixture(backend);

    fx.source_control
        .list_responses
        .lock()
        .await
        .push_back(Ok(page(&["A", "B", "C"], None)));
    fx.service.refresh_remote().await;

    let apps: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
    fx.service.pull_selected(&apps).await;

    let state = fx.service.pull.snapshot().await;
    let rows = &state.pipelines;
    assert_eq!(rows[0].name, "A");
    assert_eq!(rows[0].status, Some(RowStatus::Success));
    assert!(rows[0].error.is_none());
    assert_eq!(rows[1].status, Some(RowStatus::Failure));
    assert!(rows[1].error.as_deref().unwrap().contains("B"));
    assert_eq!(rows[2].status, Some(RowStatus::Success));
    assert!(rows[2].error.is_none());
    assert!(state.loading_message.is_none());

    // Calls were issued strictly one at a time, in row order.
    let calls = fx.source_control.calls.lock().await.clone();
    assert_eq!(calls, vec!["pull:A", "pull:B", "pull:C"]);
}

#[tokio::test]
async fn batch_push_maps_notice_to_partial() {
    let mut backend = FakeSourceControl::default();
    backend.notice.insert("stale".into());
    let fx = fixture(backend);

    fx.pipelines
        .enqueue(Ok(page(&["stale", "fresh"], None)))
        .await;
    fx.service.refresh_local().await;

    let apps: Vec<String> = ["stale", "fresh"].iter().map(|s| s.to_string()).collect();
    fx.service
        .push_selected(&apps, &CommitMeta::new("sync pipelines"))
        .await;

    let state = fx.service.push.snapshot().await;
    assert_eq!(state.pipelines[0].status, Some(RowStatus::Partial));
    assert!(state.pipelines[0]
        .error
        .as_deref()
        .unwrap()
        .contains("up to date"));
    assert_eq!(state.pipelines[1].status, Some(RowStatus::Success));
    assert_eq!(
        state.pipelines[1].file_hash.as_deref(),
        Some("hash-fresh")
    );
}

#[tokio::test]
async fn batch_start_resets_previous_row_statuses() {
    let fx = fixture(FakeSourceControl::default());
    fx.pipelines.enqueue(Ok(page(&["A", "B"], None))).await;
    fx.service.refresh_local().await;

    // Leave a stale failure on B from an earlier batch.
    fx.service
        .push
        .dispatch(SyncAction::SetRowStatus {
            name: "B".into(),
            status: Some(RowStatus::Failure),
            error: Some("old failure".into()),
            file_hash: None,
        })
        .await;

    let apps = vec!["A".to_string()];
    fx.service
        .push_selected(&apps, &CommitMeta::new("retry"))
        .await;

    let state = fx.service.push.snapshot().await;
    assert_eq!(state.pipelines[0].status, Some(RowStatus::Success));
    // B was not part of this batch; its stale status is cleared, not replayed.
    assert!(state.pipelines[1].status.is_none());
    assert!(state.pipelines[1].error.is_none());
}

// ---------------------------------------------------------------------------
// Batch-multiple operations
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn push_many_tracks_operation_and_marks_views_stale() {
    let fx = fixture(FakeSourceControl::default());
    fx.pipelines.enqueue(Ok(page(&["A", "B"], None))).await;
    fx.service.refresh_local().await;
    fx.source_control
        .list_responses
        .lock()
        .await
        .push_back(Ok(page(&["A", "B"], None)));
    fx.service.refresh_remote().await;
    assert!(fx.service.push.snapshot().await.ready);
    assert!(fx.service.pull.snapshot().await.ready);

    let apps: Vec<String> = ["A", "B"].iter().map(|s| s.to_string()).collect();
    fx.service
        .push_many(&apps, &CommitMeta::new("batch"))
        .await
        .unwrap();

    while fx.service.poller.is_polling().await {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let operation = fx.service.operation.snapshot().await;
    assert!(!operation.running);
    assert!(operation.operation.as_ref().unwrap().done);
    assert!(!fx.service.push.snapshot().await.ready);
    assert!(!fx.service.pull.snapshot().await.ready);
    // Rows are untouched by a batch-multiple push.
    assert!(fx.service.push.snapshot().await.pipelines[0].status.is_none());
}

#[tokio::test]
async fn push_many_failure_surfaces_single_message_and_leaves_rows_unset() {
    let mut backend = FakeSourceControl::default();
    backend.fail_many = true;
    let fx = fixture(backend);
    fx.pipelines.enqueue(Ok(page(&["A", "B"], None))).await;
    fx.service.refresh_local().await;

    let apps: Vec<String> = ["A", "B"].iter().map(|s| s.to_string()).collect();
    let result = fx
        .service
        .push_many(&apps, &CommitMeta::new("batch"))
        .await;
    assert!(result.is_err());

    let state = fx.service.push.snapshot().await;
    assert!(state
        .error_msg
        .as_deref()
        .unwrap()
        .contains("batch push rejected"));
    assert!(state.pipelines.iter().all(|p| p.status.is_none()));
    assert!(fx.service.operation.snapshot().await.operation.is_none());
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn typing_a_filter_applies_search_once_after_the_quiet_period() {
    let fx = fixture(FakeSourceControl::default());
    // Park the view on page 2 so the ApplySearch reset is observable.
    fx.service
        .pull
        .dispatch(SyncAction::SetCurrentPage(2))
        .await;
    let mut rx = fx.service.pull.subscribe();

    for text in ["f", "fr", "fraud"] {
        fx.service.set_name_filter(SyncView::Pull, text).await;
    }
    tokio::time::sleep(Duration::from_millis(500)).await;

    let mut applied = 0;
    let mut snapshots = 0;
    while let Ok(snapshot) = rx.try_recv() {
        if snapshot.current_page == 0 {
            // Only the ApplySearch reset returns to page 0.
            applied += 1;
            assert_eq!(snapshot.name_filter, "fraud");
        }
        snapshots += 1;
    }
    // Three SetNameFilter snapshots plus exactly one ApplySearch.
    assert_eq!(snapshots, 4);
    assert_eq!(applied, 1);

    let state = fx.service.pull.snapshot().await;
    assert_eq!(state.name_filter, "fraud");
    assert!(!state.ready);
}

#[tokio::test]
async fn sync_status_filter_applies_search_immediately() {
    let fx = fixture(FakeSourceControl::default());
    fx.service
        .pull
        .dispatch(SyncAction::SetCurrentPage(3))
        .await;

    fx.service
        .set_sync_status_filter(
            SyncView::Pull,
            Some(trellis_api::SyncStatusFilter::Unsynced),
        )
        .await;

    let state = fx.service.pull.snapshot().await;
    assert_eq!(state.current_page, 0);
    assert_eq!(
        state.sync_status_filter,
        Some(trellis_api::SyncStatusFilter::Unsynced)
    );
}

#[tokio::test]
async fn page_size_change_resets_page_and_tokens_through_the_service() {
    let fx = fixture(FakeSourceControl::default());
    fx.pipelines.enqueue(Ok(page(&["A"], Some("tok-0")))).await;
    fx.service.refresh_local().await;
    fx.service.set_current_page(SyncView::Push, 1).await;

    fx.service.set_page_size(SyncView::Push, 25).await;

    let state = fx.service.push.snapshot().await;
    assert_eq!(state.page_size, 25);
    assert_eq!(state.current_page, 0);
    assert!(state.next_page_tokens.is_empty());
    assert!(!state.ready);
}

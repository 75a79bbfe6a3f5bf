//! Reducer state machines for the push and pull sync views.
//!
//! Both views run the same machine: `ready` flips to true when a listing
//! lands and back to false whenever page, sort, or filter changes require a
//! refetch. The pipeline list itself is an `Arc<Vec<_>>` swapped wholesale on
//! every change, so concurrent readers never observe a half-updated list.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use trellis_api::{SortBy, SortOrder, SyncStatusFilter};

use crate::types::{RepositoryPipeline, RowStatus};

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Snapshot of one sync view.
#[derive(Debug, Clone)]
pub struct SyncViewState {
    pub ready: bool,
    pub pipelines: Arc<Vec<RepositoryPipeline>>,
    pub name_filter: String,
    pub sync_status_filter: Option<SyncStatusFilter>,
    pub page_size: usize,
    /// `next_page_tokens[n]` is the token the backend returned for page `n`;
    /// the token to request page `n` with is the one recorded for `n - 1`.
    pub next_page_tokens: Vec<Option<String>>,
    pub current_page: usize,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub selected: Vec<String>,
    pub commit_modal_open: bool,
    pub loading_message: Option<String>,
    pub show_failed_only: bool,
    pub error_msg: Option<String>,
    pub last_refresh_time: Option<DateTime<Utc>>,
}

impl Default for SyncViewState {
    fn default() -> Self {
        Self {
            ready: false,
            pipelines: Arc::new(Vec::new()),
            name_filter: String::new(),
            sync_status_filter: None,
            page_size: DEFAULT_PAGE_SIZE,
            next_page_tokens: Vec::new(),
            current_page: 0,
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
            selected: Vec::new(),
            commit_modal_open: false,
            loading_message: None,
            show_failed_only: false,
            error_msg: None,
            last_refresh_time: None,
        }
    }
}

impl SyncViewState {
    /// Token to request the current page with. Page 0 never has one.
    pub fn page_token(&self) -> Option<String> {
        if self.current_page == 0 {
            return None;
        }
        self.next_page_tokens
            .get(self.current_page - 1)
            .cloned()
            .flatten()
    }

    /// True when the backend reported no further page after the current one.
    pub fn is_last_page(&self) -> bool {
        self.next_page_tokens
            .get(self.current_page)
            .cloned()
            .flatten()
            .is_none()
    }

    pub fn count_failed(&self) -> usize {
        self.pipelines.iter().filter(|p| p.error.is_some()).count()
    }

    /// Rows the view shows, honoring the failed-only toggle.
    pub fn visible_pipelines(&self) -> Vec<&RepositoryPipeline> {
        self.pipelines
            .iter()
            .filter(|p| !self.show_failed_only || p.error.is_some())
            .collect()
    }
}

/// One transition of a sync view.
#[derive(Debug, Clone)]
pub enum SyncAction {
    SetPipelines(Vec<RepositoryPipeline>),
    SetNameFilter(String),
    /// Reset for a changed search; keeps filters and selection.
    ApplySearch,
    SetSelected(Vec<String>),
    ToggleCommitModal,
    SetLoadingMessage(Option<String>),
    ToggleShowFailedOnly,
    SetSyncStatusFilter(Option<SyncStatusFilter>),
    SetPageSize(usize),
    SetCurrentPage(usize),
    SetPageToken {
        page: usize,
        token: Option<String>,
    },
    SetSortConfig {
        sort_by: SortBy,
        sort_order: SortOrder,
    },
    SetRowStatus {
        name: String,
        status: Option<RowStatus>,
        error: Option<String>,
        file_hash: Option<String>,
    },
    ResetRowStatuses,
    SetErrorMsg(Option<String>),
    SetLastRefreshTime(Option<DateTime<Utc>>),
    MarkStale,
    Reset,
}

/// Pure reducer for one sync view.
pub fn reduce(state: &SyncViewState, action: &SyncAction) -> SyncViewState {
    let mut next = state.clone();
    match action {
        SyncAction::SetPipelines(pipelines) => {
            next.pipelines = Arc::new(pipelines.clone());
            next.ready = true;
        }
        SyncAction::SetNameFilter(filter) => next.name_filter = filter.clone(),
        SyncAction::ApplySearch => {
            next = SyncViewState {
                name_filter: state.name_filter.clone(),
                sync_status_filter: state.sync_status_filter,
                selected: state.selected.clone(),
                ..SyncViewState::default()
            };
        }
        SyncAction::SetSelected(selected) => next.selected = selected.clone(),
        SyncAction::ToggleCommitModal => next.commit_modal_open = !next.commit_modal_open,
        SyncAction::SetLoadingMessage(message) => next.loading_message = message.clone(),
        SyncAction::ToggleShowFailedOnly => next.show_failed_only = !next.show_failed_only,
        SyncAction::SetSyncStatusFilter(filter) => next.sync_status_filter = *filter,
        SyncAction::SetPageSize(size) => {
            // Page size changes would make every cached token point into the
            // wrong offsets; move back to page 0 and refetch.
            next.page_size = *size;
            next.current_page = 0;
            next.next_page_tokens.clear();
            next.ready = false;
        }
        SyncAction::SetCurrentPage(page) => {
            next.current_page = *page;
            next.ready = false;
        }
        SyncAction::SetPageToken { page, token } => {
            if next.next_page_tokens.len() <= *page {
                next.next_page_tokens.resize(*page + 1, None);
            }
            next.next_page_tokens[*page] = token.clone();
            next.current_page = *page;
        }
        SyncAction::SetSortConfig {
            sort_by,
            sort_order,
        } => {
            next.sort_by = *sort_by;
            next.sort_order = *sort_order;
            next.current_page = 0;
            next.next_page_tokens.clear();
            next.ready = false;
        }
        SyncAction::SetRowStatus {
            name,
            status,
            error,
            file_hash,
        } => {
            let mut pipelines = (*next.pipelines).clone();
            if let Some(row) = pipelines.iter_mut().find(|p| p.name == *name) {
                row.status = *status;
                row.error = error.clone();
                if file_hash.is_some() {
                    row.file_hash = file_hash.clone();
                }
            }
            next.pipelines = Arc::new(pipelines);
        }
        SyncAction::ResetRowStatuses => {
            let mut pipelines = (*next.pipelines).clone();
            for row in &mut pipelines {
                row.status = None;
                row.error = None;
            }
            next.pipelines = Arc::new(pipelines);
        }
        SyncAction::SetErrorMsg(message) => next.error_msg = message.clone(),
        SyncAction::SetLastRefreshTime(time) => next.last_refresh_time = *time,
        SyncAction::MarkStale => next.ready = false,
        SyncAction::Reset => next = SyncViewState::default(),
    }
    next
}

//! Row types of the push/pull sync views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trellis_api::PipelineSummary;

/// Per-row outcome of a push or pull within a batch.
///
/// Rows start unset, move to `Pending` when their turn in the batch comes,
/// and end in one of the three terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Pending,
    Success,
    Partial,
    Failure,
}

/// One row in a push or pull listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryPipeline {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RowStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RepositoryPipeline {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Maps one listing response row into view state; batch status fields
    /// start unset.
    pub fn from_summary(summary: PipelineSummary) -> Self {
        Self {
            name: summary.name,
            file_hash: summary.file_hash,
            last_sync_date: summary.last_synced_at,
            sync_status: summary.is_synced,
            status: None,
            error: None,
        }
    }
}

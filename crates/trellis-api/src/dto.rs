//! Wire DTOs and query parameter types for the backend collaborators.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trellis_types::{ArtifactSummary, PropertyDescriptor};

// ---------------------------------------------------------------------------
// List queries
// ---------------------------------------------------------------------------

/// Sort key for repository pipeline listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortBy {
    #[default]
    Name,
    LastSyncedAt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Filter on whether a pipeline is in sync with its repository copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatusFilter {
    Synced,
    Unsynced,
}

/// Parameters of one paged listing call.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub namespace: String,
    pub page_size: usize,
    pub page_token: Option<String>,
    pub sort_on: SortBy,
    pub sort_order: SortOrder,
    pub filter: Option<String>,
}

// ---------------------------------------------------------------------------
// Pipeline listings
// ---------------------------------------------------------------------------

/// One row of a local or remote pipeline listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_synced: Option<bool>,
}

/// One page of a pipeline listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineListPage {
    #[serde(default)]
    pub apps: Vec<PipelineSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refresh_time: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Push / pull
// ---------------------------------------------------------------------------

/// Commit metadata attached to a push.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitMeta {
    pub message: String,
}

impl CommitMeta {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Acknowledgement of a single-pipeline push or pull.
///
/// The backend answers either with the applied pipeline's metadata or with a
/// bare human-readable notice (e.g. "no changes to push"), which the sync
/// views surface as a partial result.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncAck {
    Applied { file_hash: Option<String> },
    Notice(String),
}

// ---------------------------------------------------------------------------
// Long-running operations
// ---------------------------------------------------------------------------

/// A resource touched by a long-running operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResource {
    pub resource_type: String,
    pub resource_uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationMeta {
    #[serde(default)]
    pub resources: Vec<OperationResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
}

/// One long-running push/pull-multiple job, polled until `done`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRun {
    pub id: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub metadata: OperationMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Plugin metadata
// ---------------------------------------------------------------------------

/// One plugin row as returned by the artifact/plugin metadata API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    pub name: String,
    #[serde(rename = "type")]
    pub plugin_type: String,
    #[serde(default)]
    pub description: String,
    pub artifact: ArtifactSummary,
}

/// Backend-resolved property metadata for one plugin, keyed by property name.
pub type BackendProperties = BTreeMap<String, PropertyDescriptor>;

//! Async client traits for the backend collaborators.
//!
//! The stores and services in this workspace hold these as `Arc<dyn Trait>`;
//! production wires in an HTTP transport, tests wire in in-memory doubles.

use async_trait::async_trait;

use trellis_types::{PluginSpec, Result};

use crate::dto::{
    BackendProperties, CommitMeta, ListQuery, OperationRun, PipelineListPage, PluginManifest,
    SyncAck,
};

/// Listing of pipelines deployed in a namespace (the push view's source).
#[async_trait]
pub trait PipelineApi: Send + Sync {
    async fn list(&self, query: &ListQuery) -> Result<PipelineListPage>;
}

/// Repository-side pipeline listing and push/pull (single and batch).
#[async_trait]
pub trait SourceControlApi: Send + Sync {
    async fn list(&self, query: &ListQuery) -> Result<PipelineListPage>;

    async fn push(&self, namespace: &str, app: &str, commit: &CommitMeta) -> Result<SyncAck>;

    async fn pull(&self, namespace: &str, app: &str) -> Result<SyncAck>;

    /// Starts a server-side push of several pipelines; returns the tracking
    /// operation, usually with `done == false`.
    async fn push_many(
        &self,
        namespace: &str,
        apps: &[String],
        commit: &CommitMeta,
    ) -> Result<OperationRun>;

    async fn pull_many(&self, namespace: &str, apps: &[String]) -> Result<OperationRun>;
}

/// Status, history, and stop endpoints for long-running operations.
#[async_trait]
pub trait OperationApi: Send + Sync {
    async fn status(&self, namespace: &str, operation_id: &str) -> Result<OperationRun>;

    /// Most recent push operations, newest first.
    async fn latest_push(&self, namespace: &str) -> Result<Vec<OperationRun>>;

    /// Most recent pull operations, newest first.
    async fn latest_pull(&self, namespace: &str) -> Result<Vec<OperationRun>>;

    /// Requests termination. Fire-and-forget: actual completion is only
    /// confirmed by a later status poll observing `done`.
    async fn stop(&self, namespace: &str, operation_id: &str) -> Result<()>;
}

/// Artifact/plugin metadata: available extensions, their plugins, and
/// backend-resolved property descriptors.
#[async_trait]
pub trait PluginMetadataApi: Send + Sync {
    async fn extensions(&self, namespace: &str, pipeline_type: &str) -> Result<Vec<String>>;

    async fn plugins(
        &self,
        namespace: &str,
        pipeline_type: &str,
        extension: &str,
    ) -> Result<Vec<PluginManifest>>;

    async fn plugin_properties(
        &self,
        namespace: &str,
        plugin: &PluginSpec,
    ) -> Result<BackendProperties>;
}

/// Per-user settings persistence.
#[async_trait]
pub trait SettingsApi: Send + Sync {
    async fn fetch(&self, namespace: &str) -> Result<serde_json::Value>;

    async fn update(&self, namespace: &str, settings: &serde_json::Value) -> Result<()>;
}

//! Collaborator seams for the Trellis state layer.
//!
//! This crate owns the boundary to the backend service: the wire DTOs shared
//! by the listing/push/pull endpoints, the `async_trait` client traits the
//! stores are written against, and a small caching wrapper for the
//! user-settings endpoint. The concrete HTTP transport lives behind these
//! traits and is not part of this workspace.

pub mod client;
pub mod dto;
pub mod settings;

pub use client::{OperationApi, PipelineApi, PluginMetadataApi, SettingsApi, SourceControlApi};
pub use dto::{
    BackendProperties, CommitMeta, ListQuery, OperationMeta, OperationResource, OperationRun,
    PipelineListPage, PipelineSummary, PluginManifest, SortBy, SortOrder, SyncAck,
    SyncStatusFilter,
};
pub use settings::UserSettings;

//! The pipeline draft data model: the in-progress, unsaved configuration the
//! studio edits, plus derived queries over it (adjacency, category counts,
//! dirty comparison scrubbing).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use trellis_api::BackendProperties;
use trellis_catalog::{classify, PluginCategory};
use trellis_types::{ArtifactSummary, PluginSpec, Resources};

use crate::visibility::{ConfigGroup, VisibilityFilter};

/// Artifact name of the batch pipeline type.
pub const BATCH_PIPELINE_ARTIFACT: &str = "data-pipeline";
/// Artifact name of the streaming pipeline type.
pub const STREAMING_PIPELINE_ARTIFACT: &str = "data-streams";

/// Kind of pipeline a draft's artifact denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Batch,
    Streaming,
}

impl ArtifactKind {
    pub fn from_artifact_name(name: &str) -> Self {
        if name == STREAMING_PIPELINE_ARTIFACT {
            ArtifactKind::Streaming
        } else {
            ArtifactKind::Batch
        }
    }
}

/// Execution engine of a batch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Spark,
    Mapreduce,
}

// ---------------------------------------------------------------------------
// Stages and connections
// ---------------------------------------------------------------------------

/// One stage on the canvas.
///
/// `backend_properties`, `config_groups`, and `filters` are hydrated from the
/// plugin metadata API after load; `visibility_map`, `error_count`, `warning`,
/// and `error` are recomputed by every validation pass and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageNode {
    pub name: String,
    pub plugin: PluginSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<String>,
    #[serde(skip)]
    pub backend_properties: Option<BackendProperties>,
    #[serde(skip)]
    pub config_groups: Vec<ConfigGroup>,
    #[serde(skip)]
    pub filters: Vec<VisibilityFilter>,
    #[serde(skip)]
    pub visibility_map: BTreeMap<String, bool>,
    #[serde(skip)]
    pub error_count: usize,
    #[serde(skip)]
    pub warning: Option<String>,
    #[serde(skip)]
    pub error: Option<String>,
}

impl StageNode {
    pub fn new(name: impl Into<String>, plugin: PluginSpec) -> Self {
        Self {
            name: name.into(),
            plugin,
            ..Self::default()
        }
    }

    pub fn category(&self) -> PluginCategory {
        classify(&self.plugin.plugin_type)
    }

    /// Drops every transient annotation (used before dirty comparison).
    pub fn clear_annotations(&mut self) {
        self.visibility_map.clear();
        self.error_count = 0;
        self.warning = None;
        self.error = None;
    }
}

/// A directed connection between two stages, by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from: String,
    pub to: String,
}

impl Connection {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Draft config and document
// ---------------------------------------------------------------------------

/// The editable body of a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DraftConfig {
    #[serde(rename = "stages")]
    pub nodes: Vec<StageNode>,
    pub connections: Vec<Connection>,
    pub properties: BTreeMap<String, String>,
    pub resources: Resources,
    pub driver_resources: Resources,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_resources: Option<Resources>,
    pub comments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<Engine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_of_records_preview: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_runs: Option<u32>,
    pub stage_logging_enabled: bool,
    pub process_timing_enabled: bool,
    pub disable_checkpoints: bool,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            connections: Vec::new(),
            properties: BTreeMap::new(),
            resources: Resources::default(),
            driver_resources: Resources::default(),
            client_resources: None,
            comments: Vec::new(),
            schedule: None,
            batch_interval: None,
            engine: None,
            num_of_records_preview: None,
            max_concurrent_runs: None,
            stage_logging_enabled: true,
            process_timing_enabled: true,
            disable_checkpoints: false,
        }
    }
}

/// Per-category stage counts used by the structural validation rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub sources: usize,
    pub sinks: usize,
    pub actions: usize,
    pub total: usize,
}

/// The in-progress pipeline configuration: both the studio's working state
/// and the persisted draft document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineDraft {
    pub artifact: ArtifactSummary,
    pub name: String,
    pub description: String,
    pub config: DraftConfig,
}

impl PipelineDraft {
    pub fn new(artifact: ArtifactSummary) -> Self {
        Self {
            artifact,
            ..Self::default()
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        ArtifactKind::from_artifact_name(&self.artifact.name)
    }

    pub fn node(&self, name: &str) -> Option<&StageNode> {
        self.config.nodes.iter().find(|n| n.name == name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut StageNode> {
        self.config.nodes.iter_mut().find(|n| n.name == name)
    }

    /// Names of every stage that participates in at least one connection.
    pub fn connected_names(&self) -> BTreeSet<&str> {
        self.config
            .connections
            .iter()
            .flat_map(|c| [c.from.as_str(), c.to.as_str()])
            .collect()
    }

    pub fn category_counts(&self) -> CategoryCounts {
        let mut counts = CategoryCounts::default();
        for node in &self.config.nodes {
            counts.total += 1;
            match node.category() {
                PluginCategory::Source => counts.sources += 1,
                PluginCategory::Sink => counts.sinks += 1,
                PluginCategory::Action => counts.actions += 1,
                _ => {}
            }
        }
        counts
    }

    /// A copy with every transient stage annotation cleared, so that dirty
    /// comparison only sees user-editable content.
    pub fn scrubbed(&self) -> PipelineDraft {
        let mut copy = self.clone();
        for node in &mut copy.config.nodes {
            node.clear_annotations();
            node.backend_properties = None;
            node.config_groups.clear();
            node.filters.clear();
        }
        copy
    }
}

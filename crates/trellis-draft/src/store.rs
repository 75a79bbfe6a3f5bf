//! The draft store: immutable state snapshots driven through a single
//! reducer, with undo/redo history, a dirty baseline, and an event feed.
//!
//! Every update goes through [`DraftStore::dispatch`]: the reducer produces a
//! fresh snapshot which is swapped in atomically, so readers never observe a
//! partially applied edit. Validation and backend-property hydration write
//! their results back through the same path, but bypass the undo history
//! because they carry no user intent.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use trellis_api::{BackendProperties, PluginMetadataApi};
use trellis_types::{ArtifactSummary, Resources, Result};

use crate::draft::{ArtifactKind, Connection, Engine, PipelineDraft, StageNode};
use crate::events::{ConsoleLevel, ConsoleMessage, DraftEvent, EventEmitter};
use crate::validation::{
    validate_draft, Severity, ValidationOptions, ValidationReport,
};
use crate::visibility::{compute_visibility, ConfigGroup, VisibilityFilter};

const HISTORY_LIMIT: usize = 50;

const DEFAULT_BATCH_INTERVAL: &str = "10s";
const DEFAULT_PREVIEW_RECORDS: u32 = 100;
const DEFAULT_MAX_CONCURRENT_RUNS: u32 = 1;

// ---------------------------------------------------------------------------
// Actions and reducer
// ---------------------------------------------------------------------------

/// One edit to the draft. Applied by [`reduce`]; never mutates in place.
#[derive(Debug, Clone)]
pub enum DraftAction {
    SetName(String),
    SetDescription(String),
    AddNode(StageNode),
    RemoveNode(String),
    AddConnection(Connection),
    RemoveConnection(Connection),
    SetConnections(Vec<Connection>),
    SetPluginProperty {
        node: String,
        key: String,
        value: String,
    },
    SetBackendProperties {
        node: String,
        properties: BackendProperties,
    },
    SetNodeWidgets {
        node: String,
        config_groups: Vec<ConfigGroup>,
        filters: Vec<VisibilityFilter>,
    },
    SetOutputSchema {
        node: String,
        schema: String,
    },
    SetResources(Resources),
    SetDriverResources(Resources),
    SetClientResources(Resources),
    SetProperties(BTreeMap<String, String>),
    SetComments(Vec<String>),
    SetEngine(Engine),
    SetBatchInterval(String),
    SetNumRecordsPreview(u32),
    SetMaxConcurrentRuns(u32),
    SetStageLogging(bool),
    SetProcessTiming(bool),
}

/// Pure reducer: applies one action to a snapshot and returns the next one.
pub fn reduce(state: &PipelineDraft, action: &DraftAction) -> PipelineDraft {
    let mut next = state.clone();
    match action {
        DraftAction::SetName(name) => next.name = name.clone(),
        DraftAction::SetDescription(description) => next.description = description.clone(),
        DraftAction::AddNode(node) => next.config.nodes.push(node.clone()),
        DraftAction::RemoveNode(name) => {
            next.config.nodes.retain(|n| n.name != *name);
            // Connections referencing a removed stage go with it.
            next.config
                .connections
                .retain(|c| c.from != *name && c.to != *name);
        }
        DraftAction::AddConnection(connection) => {
            if !next.config.connections.contains(connection) {
                next.config.connections.push(connection.clone());
            }
        }
        DraftAction::RemoveConnection(connection) => {
            next.config.connections.retain(|c| c != connection);
        }
        DraftAction::SetConnections(connections) => {
            next.config.connections = connections.clone();
        }
        DraftAction::SetPluginProperty { node, key, value } => {
            if let Some(node) = next.node_mut(node) {
                node.plugin.properties.insert(key.clone(), value.clone());
            }
        }
        DraftAction::SetBackendProperties { node, properties } => {
            if let Some(node) = next.node_mut(node) {
                node.backend_properties = Some(properties.clone());
            }
        }
        DraftAction::SetNodeWidgets {
            node,
            config_groups,
            filters,
        } => {
            if let Some(node) = next.node_mut(node) {
                node.config_groups = config_groups.clone();
                node.filters = filters.clone();
            }
        }
        DraftAction::SetOutputSchema { node, schema } => {
            if let Some(node) = next.node_mut(node) {
                node.output_schema = Some(schema.clone());
            }
        }
        DraftAction::SetResources(resources) => next.config.resources = *resources,
        DraftAction::SetDriverResources(resources) => next.config.driver_resources = *resources,
        DraftAction::SetClientResources(resources) => {
            next.config.client_resources = Some(*resources)
        }
        DraftAction::SetProperties(properties) => next.config.properties = properties.clone(),
        DraftAction::SetComments(comments) => next.config.comments = comments.clone(),
        DraftAction::SetEngine(engine) => next.config.engine = Some(*engine),
        DraftAction::SetBatchInterval(interval) => {
            next.config.batch_interval = Some(interval.clone())
        }
        DraftAction::SetNumRecordsPreview(n) => next.config.num_of_records_preview = Some(*n),
        DraftAction::SetMaxConcurrentRuns(n) => next.config.max_concurrent_runs = Some(*n),
        DraftAction::SetStageLogging(enabled) => next.config.stage_logging_enabled = *enabled,
        DraftAction::SetProcessTiming(enabled) => next.config.process_timing_enabled = *enabled,
    }
    next
}

/// Fills the artifact-kind defaults a freshly loaded config may omit.
fn normalize(mut draft: PipelineDraft) -> PipelineDraft {
    match draft.kind() {
        ArtifactKind::Streaming => {
            draft
                .config
                .client_resources
                .get_or_insert_with(Resources::default);
            draft
                .config
                .batch_interval
                .get_or_insert_with(|| DEFAULT_BATCH_INTERVAL.to_string());
        }
        ArtifactKind::Batch => {
            draft.config.engine.get_or_insert(Engine::Spark);
            draft
                .config
                .num_of_records_preview
                .get_or_insert(DEFAULT_PREVIEW_RECORDS);
            draft
                .config
                .max_concurrent_runs
                .get_or_insert(DEFAULT_MAX_CONCURRENT_RUNS);
        }
    }
    draft
}

// ---------------------------------------------------------------------------
// DraftStore
// ---------------------------------------------------------------------------

struct StoreInner {
    state: Arc<PipelineDraft>,
    baseline: Arc<PipelineDraft>,
    past: Vec<Arc<PipelineDraft>>,
    future: Vec<Arc<PipelineDraft>>,
}

pub struct DraftStore {
    inner: RwLock<StoreInner>,
    events: EventEmitter,
}

impl DraftStore {
    /// An empty draft for a fresh studio session.
    pub fn new(artifact: ArtifactSummary) -> Self {
        Self::from_draft(PipelineDraft::new(artifact))
    }

    /// Opens an existing draft (or a deployed pipeline's config), applying
    /// the artifact-kind defaults and capturing the dirty baseline.
    pub fn from_draft(draft: PipelineDraft) -> Self {
        let normalized = Arc::new(normalize(draft));
        Self {
            inner: RwLock::new(StoreInner {
                state: normalized.clone(),
                baseline: normalized,
                past: Vec::new(),
                future: Vec::new(),
            }),
            events: EventEmitter::default(),
        }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<DraftEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> Arc<PipelineDraft> {
        self.inner.read().await.state.clone()
    }

    /// Applies a user edit: records undo history, clears the redo stack, and
    /// swaps in the new snapshot.
    pub async fn dispatch(&self, action: DraftAction) {
        let mut inner = self.inner.write().await;
        let next = Arc::new(reduce(&inner.state, &action));
        let prev = inner.state.clone();
        inner.past.push(prev);
        if inner.past.len() > HISTORY_LIMIT {
            inner.past.remove(0);
        }
        inner.future.clear();
        inner.state = next;
        drop(inner);
        self.events.emit(DraftEvent::StateReplaced);
    }

    /// Applies a non-edit update (validation results, hydration) without
    /// touching the undo history.
    async fn apply_silent(&self, update: impl FnOnce(&PipelineDraft) -> PipelineDraft) {
        let mut inner = self.inner.write().await;
        inner.state = Arc::new(update(&inner.state));
        drop(inner);
        self.events.emit(DraftEvent::StateReplaced);
    }

    pub async fn undo(&self) -> bool {
        let mut inner = self.inner.write().await;
        let Some(previous) = inner.past.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut inner.state, previous);
        inner.future.push(current);
        drop(inner);
        self.events.emit(DraftEvent::StateReplaced);
        true
    }

    pub async fn redo(&self) -> bool {
        let mut inner = self.inner.write().await;
        let Some(next) = inner.future.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut inner.state, next);
        inner.past.push(current);
        drop(inner);
        self.events.emit(DraftEvent::StateReplaced);
        true
    }

    /// True once the draft differs from the snapshot captured at open.
    /// Transient annotations do not count.
    pub async fn is_dirty(&self) -> bool {
        let inner = self.inner.read().await;
        inner.state.scrubbed() != inner.baseline.scrubbed()
    }

    /// Discards all edits and history, returning to the opening snapshot.
    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        inner.state = inner.baseline.clone();
        inner.past.clear();
        inner.future.clear();
        drop(inner);
        self.events.emit(DraftEvent::StateReplaced);
    }

    /// Replaces the whole draft (navigation away, artifact change). The new
    /// draft becomes the baseline; history is discarded.
    pub async fn replace(&self, draft: PipelineDraft) {
        let normalized = Arc::new(normalize(draft));
        let mut inner = self.inner.write().await;
        inner.state = normalized.clone();
        inner.baseline = normalized;
        inner.past.clear();
        inner.future.clear();
        drop(inner);
        self.events.emit(DraftEvent::StateReplaced);
    }

    /// Runs the draft validator, writes the per-stage annotations back into
    /// the snapshot, and emits the outcome (plus console messages when strict
    /// reporting is on). Returns the full report.
    pub async fn validate(&self, opts: &ValidationOptions) -> ValidationReport {
        let report = validate_draft(&*self.snapshot().await, opts);

        let issues = report.node_issues.clone();
        self.apply_silent(|state| {
            let mut next = state.clone();
            for node in &mut next.config.nodes {
                node.visibility_map =
                    compute_visibility(&node.config_groups, &node.filters, &node.plugin);
                match issues.get(&node.name) {
                    Some(found) => {
                        node.error_count = found.error_count;
                        node.error = found.error.clone();
                        node.warning = found.warning.clone();
                    }
                    None => {
                        node.error_count = 0;
                        node.error = None;
                        node.warning = None;
                    }
                }
            }
            next
        })
        .await;

        let error_count = report
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        if opts.strict_console {
            for diagnostic in &report.diagnostics {
                self.events.emit(DraftEvent::Console(ConsoleMessage {
                    level: match diagnostic.severity {
                        Severity::Error => ConsoleLevel::Error,
                        Severity::Warning => ConsoleLevel::Warn,
                    },
                    origin: diagnostic.node.clone(),
                    text: diagnostic.message.clone(),
                }));
            }
        }
        self.events.emit(DraftEvent::ValidationCompleted {
            valid: report.valid,
            error_count,
        });
        report
    }

    /// Fetches backend properties for every stage that is missing them, one
    /// call at a time. Failures are recoverable: the stage is left without
    /// properties (the validator flags it) and hydration continues.
    pub async fn resolve_backend_properties(
        &self,
        api: &dyn PluginMetadataApi,
        namespace: &str,
    ) -> Result<()> {
        let snapshot = self.snapshot().await;
        let missing: Vec<_> = snapshot
            .config
            .nodes
            .iter()
            .filter(|n| n.backend_properties.is_none())
            .map(|n| (n.name.clone(), n.plugin.clone()))
            .collect();

        for (name, plugin) in missing {
            match api.plugin_properties(namespace, &plugin).await {
                Ok(properties) => {
                    debug!(stage = %name, count = properties.len(), "resolved backend properties");
                    let update_name = name.clone();
                    self.apply_silent(move |state| {
                        let mut next = state.clone();
                        if let Some(node) = next.node_mut(&update_name) {
                            node.backend_properties = Some(properties);
                        }
                        next
                    })
                    .await;
                }
                Err(err) => {
                    warn!(stage = %name, error = %err, "failed to resolve backend properties");
                    self.events.emit(DraftEvent::Console(ConsoleMessage {
                        level: ConsoleLevel::Warn,
                        origin: Some(name),
                        text: format!("Could not resolve plugin properties: {err}"),
                    }));
                }
            }
        }
        Ok(())
    }
}

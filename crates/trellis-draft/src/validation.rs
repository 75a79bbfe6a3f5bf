//! Draft validation: structural and field-level rules with diagnostics.
//!
//! Provides the 8 built-in rules that decide whether a draft can be saved,
//! previewed, or deployed. Call [`validate_draft`] for the full report; every
//! rule runs and every failure is collected, nothing short-circuits, and
//! validation itself never fails.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use trellis_types::Resources;

use crate::draft::{ArtifactKind, Connection, PipelineDraft};
use crate::visibility::compute_visibility;

// ---------------------------------------------------------------------------
// Diagnostic types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub node: Option<String>,
    pub connection: Option<Connection>,
}

/// Transient annotations for one stage, written back into the draft after a
/// validation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeIssues {
    pub error_count: usize,
    pub error: Option<String>,
    pub warning: Option<String>,
}

/// The outcome of one validation pass.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub diagnostics: Vec<Diagnostic>,
    pub node_issues: BTreeMap<String, NodeIssues>,
    pub invalid_connections: Vec<Connection>,
    pub valid: bool,
}

/// Bounds a resource request must stay within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceBounds {
    pub min_virtual_cores: u32,
    pub max_virtual_cores: u32,
    pub min_memory_mb: u32,
    pub max_memory_mb: u32,
}

impl Default for ResourceBounds {
    fn default() -> Self {
        Self {
            min_virtual_cores: 1,
            max_virtual_cores: 128,
            min_memory_mb: 512,
            max_memory_mb: 1_048_576,
        }
    }
}

impl ResourceBounds {
    fn violations(&self, resources: &Resources, role: &str) -> Vec<String> {
        let mut out = Vec::new();
        if resources.virtual_cores < self.min_virtual_cores
            || resources.virtual_cores > self.max_virtual_cores
        {
            out.push(format!(
                "{role} virtual cores must be between {} and {}, got {}",
                self.min_virtual_cores, self.max_virtual_cores, resources.virtual_cores
            ));
        }
        if resources.memory_mb < self.min_memory_mb || resources.memory_mb > self.max_memory_mb {
            out.push(format!(
                "{role} memory must be between {} MB and {} MB, got {} MB",
                self.min_memory_mb, self.max_memory_mb, resources.memory_mb
            ));
        }
        out
    }
}

/// Caller-chosen validation behavior.
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    /// Pre-preview passes skip the pipeline name check.
    pub pre_preview: bool,
    /// Strict console reporting: malformed state (e.g. a stage without plugin
    /// artifact information) is reported at error severity instead of
    /// degrading to a warning, and diagnostics feed the console.
    pub strict_console: bool,
    pub bounds: ResourceBounds,
}

impl ValidationOptions {
    fn degraded_severity(&self) -> Severity {
        if self.strict_console {
            Severity::Error
        } else {
            Severity::Warning
        }
    }
}

// ---------------------------------------------------------------------------
// DraftRule trait
// ---------------------------------------------------------------------------

pub trait DraftRule: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, draft: &PipelineDraft, opts: &ValidationOptions) -> Vec<Diagnostic>;
}

fn error(rule: &str, message: String, node: Option<String>) -> Diagnostic {
    Diagnostic {
        rule: rule.into(),
        severity: Severity::Error,
        message,
        node,
        connection: None,
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

struct SourceSinkRule;
impl DraftRule for SourceSinkRule {
    fn name(&self) -> &str {
        "source_sink"
    }
    fn apply(&self, draft: &PipelineDraft, _opts: &ValidationOptions) -> Vec<Diagnostic> {
        let counts = draft.category_counts();
        // Empty drafts and pure action pipelines are exempt.
        if counts.total == 0 || counts.actions == counts.total {
            return Vec::new();
        }
        let mut diags = Vec::new();
        if counts.sources == 0 {
            diags.push(error(
                self.name(),
                "Pipeline must contain at least one source stage".into(),
                None,
            ));
        }
        if counts.sinks == 0 {
            diags.push(error(
                self.name(),
                "Pipeline must contain at least one sink stage".into(),
                None,
            ));
        }
        diags
    }
}

struct PipelineNameRule;
impl DraftRule for PipelineNameRule {
    fn name(&self) -> &str {
        "pipeline_name"
    }
    fn apply(&self, draft: &PipelineDraft, opts: &ValidationOptions) -> Vec<Diagnostic> {
        if opts.pre_preview {
            return Vec::new();
        }
        if name_pattern().is_match(&draft.name) {
            return Vec::new();
        }
        let message = if draft.name.is_empty() {
            "Pipeline name is missing".to_string()
        } else {
            format!(
                "Invalid pipeline name '{}': only letters, numbers, underscores and dashes are allowed",
                draft.name
            )
        };
        vec![error(self.name(), message, None)]
    }
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[\w][\w-]*$").expect("name pattern compiles"))
}

struct BackendPropertiesRule;
impl DraftRule for BackendPropertiesRule {
    fn name(&self) -> &str {
        "backend_properties"
    }
    fn apply(&self, draft: &PipelineDraft, opts: &ValidationOptions) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for node in &draft.config.nodes {
            if node.plugin.artifact.is_none() {
                // Recoverable: pipelines deployed without artifact info still
                // open in the editor.
                diags.push(Diagnostic {
                    rule: self.name().into(),
                    severity: opts.degraded_severity(),
                    message: format!(
                        "Stage '{}' has no plugin artifact information",
                        node.name
                    ),
                    node: Some(node.name.clone()),
                    connection: None,
                });
            }
            if node.backend_properties.is_none() {
                diags.push(error(
                    self.name(),
                    format!("Stage '{}' is missing its resolved plugin properties", node.name),
                    Some(node.name.clone()),
                ));
            }
        }
        diags
    }
}

struct RequiredFieldsRule;
impl DraftRule for RequiredFieldsRule {
    fn name(&self) -> &str {
        "required_fields"
    }
    fn apply(&self, draft: &PipelineDraft, _opts: &ValidationOptions) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for node in &draft.config.nodes {
            let Some(properties) = &node.backend_properties else {
                // BackendPropertiesRule already flags this stage.
                continue;
            };
            let visibility =
                compute_visibility(&node.config_groups, &node.filters, &node.plugin);
            for descriptor in properties.values() {
                if !descriptor.required {
                    continue;
                }
                if visibility.get(&descriptor.name) == Some(&false) {
                    continue;
                }
                if node.plugin.property(&descriptor.name).is_none() {
                    diags.push(error(
                        self.name(),
                        format!(
                            "Required property '{}' of stage '{}' is not set",
                            descriptor.name, node.name
                        ),
                        Some(node.name.clone()),
                    ));
                }
            }
        }
        diags
    }
}

struct UniqueNodeNamesRule;
impl DraftRule for UniqueNodeNamesRule {
    fn name(&self) -> &str {
        "unique_node_names"
    }
    fn apply(&self, draft: &PipelineDraft, _opts: &ValidationOptions) -> Vec<Diagnostic> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for node in &draft.config.nodes {
            *counts.entry(node.name.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, count)| {
                error(
                    self.name(),
                    format!("Stage name '{name}' is used by {count} stages"),
                    Some(name.to_string()),
                )
            })
            .collect()
    }
}

struct StrayNodesRule;
impl DraftRule for StrayNodesRule {
    fn name(&self) -> &str {
        "stray_nodes"
    }
    fn apply(&self, draft: &PipelineDraft, _opts: &ValidationOptions) -> Vec<Diagnostic> {
        if draft.config.nodes.len() <= 1 {
            return Vec::new();
        }
        let connected = draft.connected_names();
        draft
            .config
            .nodes
            .iter()
            .filter(|n| !connected.contains(n.name.as_str()))
            .map(|n| {
                error(
                    self.name(),
                    format!("Stage '{}' is not connected to any other stage", n.name),
                    Some(n.name.clone()),
                )
            })
            .collect()
    }
}

struct ConnectionEndpointsRule;
impl DraftRule for ConnectionEndpointsRule {
    fn name(&self) -> &str {
        "connection_endpoints"
    }
    fn apply(&self, draft: &PipelineDraft, _opts: &ValidationOptions) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for connection in &draft.config.connections {
            let mut missing = Vec::new();
            if draft.node(&connection.from).is_none() {
                missing.push(connection.from.as_str());
            }
            if draft.node(&connection.to).is_none() {
                missing.push(connection.to.as_str());
            }
            if missing.is_empty() {
                continue;
            }
            diags.push(Diagnostic {
                rule: self.name().into(),
                severity: Severity::Error,
                message: format!(
                    "Connection from '{}' to '{}' references missing stage(s): {}",
                    connection.from,
                    connection.to,
                    missing.join(", ")
                ),
                node: None,
                connection: Some(connection.clone()),
            });
        }
        diags
    }
}

struct ResourceBoundsRule;
impl DraftRule for ResourceBoundsRule {
    fn name(&self) -> &str {
        "resource_bounds"
    }
    fn apply(&self, draft: &PipelineDraft, opts: &ValidationOptions) -> Vec<Diagnostic> {
        let mut requests = vec![
            (&draft.config.resources, "Executor"),
            (&draft.config.driver_resources, "Driver"),
        ];
        let client = draft.config.client_resources.as_ref();
        if draft.kind() == ArtifactKind::Streaming {
            if let Some(client) = client {
                requests.push((client, "Client"));
            }
        }

        requests
            .into_iter()
            .flat_map(|(resources, role)| opts.bounds.violations(resources, role))
            .map(|message| error(self.name(), message, None))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

fn built_in_rules() -> Vec<Box<dyn DraftRule>> {
    vec![
        Box::new(SourceSinkRule),
        Box::new(PipelineNameRule),
        Box::new(BackendPropertiesRule),
        Box::new(RequiredFieldsRule),
        Box::new(UniqueNodeNamesRule),
        Box::new(StrayNodesRule),
        Box::new(ConnectionEndpointsRule),
        Box::new(ResourceBoundsRule),
    ]
}

/// Run every rule in fixed order and aggregate the results.
///
/// Per-stage issues are folded into `node_issues` (the error count is the
/// number of error-severity diagnostics attached to the stage); connection
/// diagnostics populate `invalid_connections`. `valid` is true when no
/// error-severity diagnostic was produced.
pub fn validate_draft(draft: &PipelineDraft, opts: &ValidationOptions) -> ValidationReport {
    let mut report = ValidationReport::default();
    for rule in built_in_rules() {
        report.diagnostics.extend(rule.apply(draft, opts));
    }

    for diagnostic in &report.diagnostics {
        if let Some(connection) = &diagnostic.connection {
            report.invalid_connections.push(connection.clone());
        }
        let Some(node) = &diagnostic.node else {
            continue;
        };
        let issues = report.node_issues.entry(node.clone()).or_default();
        match diagnostic.severity {
            Severity::Error => {
                issues.error_count += 1;
                if issues.error.is_none() {
                    issues.error = Some(diagnostic.message.clone());
                }
            }
            Severity::Warning => {
                if issues.warning.is_none() {
                    issues.warning = Some(diagnostic.message.clone());
                }
            }
        }
    }

    report.valid = !report
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Error);
    report
}

//! Pipeline draft store, field visibility, validation, and the console feed.
//!
//! This crate implements the studio's editing core: the in-progress draft as
//! immutable snapshots driven through a reducer, conditional visibility of
//! plugin configuration fields, the 8 built-in validation rules, and the
//! broadcast event/console feed the panels subscribe to.

pub mod draft;
pub mod events;
pub mod store;
pub mod validation;
pub mod visibility;

pub use draft::{
    ArtifactKind, CategoryCounts, Connection, DraftConfig, Engine, PipelineDraft, StageNode,
    BATCH_PIPELINE_ARTIFACT, STREAMING_PIPELINE_ARTIFACT,
};
pub use events::{ConsoleLevel, ConsoleMessage, DraftEvent, EventEmitter};
pub use store::{reduce, DraftAction, DraftStore};
pub use validation::{
    validate_draft, Diagnostic, DraftRule, NodeIssues, ResourceBounds, Severity,
    ValidationOptions, ValidationReport,
};
pub use visibility::{
    compute_visibility, evaluate_expression, parse_expression, CompareOp, ConfigGroup,
    FieldClause, FieldExpr, FilterCondition, ShowTarget, VisibilityFilter, WidgetProperty,
};

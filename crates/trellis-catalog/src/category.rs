//! Plugin type classification and palette ordering.

use serde::{Deserialize, Serialize};

/// The fixed palette categories, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginCategory {
    Source,
    Transform,
    Analytics,
    Sink,
    Action,
    ErrorHandler,
}

impl PluginCategory {
    /// Human-readable label used by the palette.
    pub fn display_name(&self) -> &'static str {
        match self {
            PluginCategory::Source => "Source",
            PluginCategory::Transform => "Transform",
            PluginCategory::Analytics => "Analytics",
            PluginCategory::Sink => "Sink",
            PluginCategory::Action => "Conditions and Actions",
            PluginCategory::ErrorHandler => "Error Handlers and Alerts",
        }
    }
}

impl std::fmt::Display for PluginCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Palette ordering: source, transform, analytics, sink, action, error handler.
pub fn ordered_categories() -> [PluginCategory; 6] {
    [
        PluginCategory::Source,
        PluginCategory::Transform,
        PluginCategory::Analytics,
        PluginCategory::Sink,
        PluginCategory::Action,
        PluginCategory::ErrorHandler,
    ]
}

/// Classify an extension type string into its palette category.
///
/// Unknown types fall back to `Transform`: they take part in the pipeline
/// body but never satisfy the source/sink/action structural rules.
pub fn classify(plugin_type: &str) -> PluginCategory {
    match plugin_type {
        "batchsource" | "streamingsource" | "realtimesource" => PluginCategory::Source,
        "batchsink" | "realtimesink" | "sparksink" => PluginCategory::Sink,
        "batchaggregator" | "batchjoiner" | "sparkcompute" | "windower" => {
            PluginCategory::Analytics
        }
        "action" | "sparkprogram" | "condition" => PluginCategory::Action,
        "errortransform" | "alertpublisher" => PluginCategory::ErrorHandler,
        _ => PluginCategory::Transform,
    }
}

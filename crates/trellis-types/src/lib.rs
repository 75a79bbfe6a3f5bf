//! Shared types and errors for the Trellis pipeline-studio state layer.
//!
//! This crate provides the foundational types used across all other Trellis crates:
//! - `TrellisError`: unified error taxonomy
//! - `ArtifactSummary` / `ArtifactVersion`: versioned, scoped deployable units
//! - `PluginSpec` / `PropertyDescriptor`: plugin identity and field metadata
//! - `Resources`: executor/driver/client resource requests

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unified error type for all Trellis subsystems.
#[derive(Debug, thiserror::Error)]
pub enum TrellisError {
    #[error("API call to {endpoint} returned HTTP {status}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Draft validation failed: {0}")]
    Validation(String),

    #[error("Operation {operation_id} failed: {message}")]
    OperationFailed {
        operation_id: String,
        message: String,
    },

    #[error("Malformed metadata for plugin '{plugin}': {message}")]
    PluginMetadata { plugin: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl TrellisError {
    /// Returns `true` for failures that may clear on a later attempt
    /// (server errors and throttling). Listing calls are still never retried
    /// automatically; this only informs callers that choose to poll again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TrellisError::Api { status, .. } if *status == 429 || (500..=599).contains(status)
        )
    }
}

/// A convenience alias for `Result<T, TrellisError>`.
pub type Result<T> = std::result::Result<T, TrellisError>;

// ---------------------------------------------------------------------------
// Artifact identity
// ---------------------------------------------------------------------------

/// Scope an artifact is published under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactScope {
    #[default]
    System,
    User,
}

/// A versioned, scoped deployable unit identifying a plugin or pipeline type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub name: String,
    pub version: String,
    pub scope: ArtifactScope,
}

impl ArtifactSummary {
    pub fn new(name: impl Into<String>, version: impl Into<String>, scope: ArtifactScope) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            scope,
        }
    }
}

/// A parsed artifact version: `major.minor.patch` with an optional
/// `-SNAPSHOT` suffix. Snapshots order below the release with the same
/// number triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub snapshot: bool,
}

impl FromStr for ArtifactVersion {
    type Err = TrellisError;

    fn from_str(s: &str) -> Result<Self> {
        let (number, suffix) = match s.split_once('-') {
            Some((n, rest)) => (n, Some(rest)),
            None => (s, None),
        };
        let snapshot = match suffix {
            None => false,
            Some("SNAPSHOT") => true,
            Some(other) => {
                return Err(TrellisError::Other(format!(
                    "invalid artifact version suffix '-{other}' in '{s}'"
                )))
            }
        };

        if number.is_empty() {
            return Err(TrellisError::Other(format!("empty artifact version '{s}'")));
        }

        let mut parts = number.split('.');
        let mut next_part = |label: &str| -> Result<u32> {
            match parts.next() {
                None => Ok(0),
                Some(p) => p.parse::<u32>().map_err(|_| {
                    TrellisError::Other(format!("invalid {label} component in version '{s}'"))
                }),
            }
        };

        let major = next_part("major")?;
        let minor = next_part("minor")?;
        let patch = next_part("patch")?;
        if parts.next().is_some() {
            return Err(TrellisError::Other(format!(
                "too many components in version '{s}'"
            )));
        }

        Ok(Self {
            major,
            minor,
            patch,
            snapshot,
        })
    }
}

impl Ord for ArtifactVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch, !self.snapshot).cmp(&(
            other.major,
            other.minor,
            other.patch,
            !other.snapshot,
        ))
    }
}

impl PartialOrd for ArtifactVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for ArtifactVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.snapshot {
            write!(f, "-SNAPSHOT")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Plugin identity and field metadata
// ---------------------------------------------------------------------------

/// A named, versioned extension pluggable into a pipeline stage.
///
/// `artifact` may be absent when a pipeline was deployed without artifact
/// information (e.g. via the REST surface); consumers treat that as a
/// recoverable condition, never a fatal one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub plugin_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactSummary>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl PluginSpec {
    pub fn new(name: impl Into<String>, plugin_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            plugin_type: plugin_type.into(),
            artifact: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_artifact(mut self, artifact: ArtifactSummary) -> Self {
        self.artifact = Some(artifact);
        self
    }

    /// Returns the configured value of a property, treating a blank string
    /// the same as an absent one.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

/// Backend-resolved metadata for one plugin property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default)]
    pub macro_supported: bool,
}

impl PropertyDescriptor {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            ..Self::default()
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Resource requests
// ---------------------------------------------------------------------------

/// A resource request for one role of a pipeline run (executor, driver, or
/// client for streaming artifacts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    pub virtual_cores: u32,
    #[serde(rename = "memoryMB")]
    pub memory_mb: u32,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            virtual_cores: 1,
            memory_mb: 2048,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_api() {
        let err = TrellisError::Api {
            endpoint: "repository/apps".into(),
            status: 502,
            message: "bad gateway".into(),
        };
        assert_eq!(
            err.to_string(),
            "API call to repository/apps returned HTTP 502: bad gateway"
        );
    }

    #[test]
    fn error_display_validation() {
        let err = TrellisError::Validation("missing sink".into());
        assert_eq!(err.to_string(), "Draft validation failed: missing sink");
    }

    #[test]
    fn error_display_operation_failed() {
        let err = TrellisError::OperationFailed {
            operation_id: "op-17".into(),
            message: "remote rejected".into(),
        };
        assert_eq!(err.to_string(), "Operation op-17 failed: remote rejected");
    }

    #[test]
    fn transient_server_errors() {
        let err = TrellisError::Api {
            endpoint: "e".into(),
            status: 503,
            message: "m".into(),
        };
        assert!(err.is_transient());

        let err = TrellisError::Api {
            endpoint: "e".into(),
            status: 429,
            message: "m".into(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn not_transient_client_errors() {
        let err = TrellisError::Api {
            endpoint: "e".into(),
            status: 404,
            message: "m".into(),
        };
        assert!(!err.is_transient());
        assert!(!TrellisError::Validation("v".into()).is_transient());
    }

    #[test]
    fn from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: TrellisError = json_err.into();
        assert!(matches!(err, TrellisError::Json(_)));
    }

    // --- ArtifactVersion ---

    #[test]
    fn version_parses_full_triple() {
        let v: ArtifactVersion = "6.10.1".parse().unwrap();
        assert_eq!((v.major, v.minor, v.patch), (6, 10, 1));
        assert!(!v.snapshot);
    }

    #[test]
    fn version_parses_snapshot() {
        let v: ArtifactVersion = "2.0.0-SNAPSHOT".parse().unwrap();
        assert!(v.snapshot);
        assert_eq!(v.to_string(), "2.0.0-SNAPSHOT");
    }

    #[test]
    fn version_missing_components_default_to_zero() {
        let v: ArtifactVersion = "3.1".parse().unwrap();
        assert_eq!((v.major, v.minor, v.patch), (3, 1, 0));
    }

    #[test]
    fn version_rejects_garbage() {
        assert!("".parse::<ArtifactVersion>().is_err());
        assert!("1.x.0".parse::<ArtifactVersion>().is_err());
        assert!("1.0.0-beta".parse::<ArtifactVersion>().is_err());
        assert!("1.2.3.4".parse::<ArtifactVersion>().is_err());
    }

    #[test]
    fn version_ordering() {
        let parse = |s: &str| s.parse::<ArtifactVersion>().unwrap();
        assert!(parse("2.0.0") > parse("1.9.9"));
        assert!(parse("1.10.0") > parse("1.9.0"));
        // A snapshot sorts below the release with the same triple.
        assert!(parse("2.0.0-SNAPSHOT") < parse("2.0.0"));
        assert!(parse("2.0.0-SNAPSHOT") > parse("1.9.9"));
        assert_eq!(parse("1.2.3"), parse("1.2.3"));
    }

    // --- serde wire formats ---

    #[test]
    fn artifact_scope_wire_format() {
        assert_eq!(
            serde_json::to_string(&ArtifactScope::System).unwrap(),
            "\"SYSTEM\""
        );
        let scope: ArtifactScope = serde_json::from_str("\"USER\"").unwrap();
        assert_eq!(scope, ArtifactScope::User);
    }

    #[test]
    fn plugin_spec_round_trip() {
        let plugin = PluginSpec::new("Projection", "transform").with_artifact(ArtifactSummary::new(
            "core-plugins",
            "2.3.0",
            ArtifactScope::System,
        ));
        let json = serde_json::to_string(&plugin).unwrap();
        assert!(json.contains("\"type\":\"transform\""));
        let back: PluginSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plugin);
    }

    #[test]
    fn plugin_spec_property_treats_blank_as_absent() {
        let mut plugin = PluginSpec::new("File", "batchsource");
        plugin.properties.insert("path".into(), "  ".into());
        plugin.properties.insert("format".into(), "csv".into());
        assert_eq!(plugin.property("path"), None);
        assert_eq!(plugin.property("format"), Some("csv"));
        assert_eq!(plugin.property("missing"), None);
    }

    #[test]
    fn property_descriptor_deserializes_wire_names() {
        let json = r#"{"name":"path","required":true,"type":"string","macroSupported":true}"#;
        let desc: PropertyDescriptor = serde_json::from_str(json).unwrap();
        assert!(desc.required);
        assert!(desc.macro_supported);
        assert_eq!(desc.value_type.as_deref(), Some("string"));
    }

    #[test]
    fn resources_wire_format_uses_memory_mb() {
        let res = Resources {
            virtual_cores: 2,
            memory_mb: 4096,
        };
        let json = serde_json::to_string(&res).unwrap();
        assert_eq!(json, r#"{"virtualCores":2,"memoryMB":4096}"#);
    }

    #[test]
    fn resources_default_matches_studio_defaults() {
        let res = Resources::default();
        assert_eq!(res.virtual_cores, 1);
        assert_eq!(res.memory_mb, 2048);
    }
}

//! The plugin catalog and default-artifact resolution.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use trellis_api::{PluginManifest, PluginMetadataApi, UserSettings};
use trellis_types::{ArtifactSummary, ArtifactVersion, Result};

/// Settings key under which the per-user default plugin versions live.
pub const DEFAULT_VERSION_SETTINGS_KEY: &str = "plugin-default-version";

/// Persisted choice of default artifact per plugin, keyed
/// `"{pluginName}-{pluginType}-{artifactName}"`.
pub type DefaultVersionMap = BTreeMap<String, ArtifactSummary>;

/// One plugin in the palette: its identity plus every artifact version the
/// backend currently serves for it.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginEntry {
    pub name: String,
    pub plugin_type: String,
    pub description: String,
    pub artifact: ArtifactSummary,
    pub all_artifacts: Vec<ArtifactSummary>,
}

impl PluginEntry {
    /// Key into the persisted default-version map.
    pub fn default_version_key(&self) -> String {
        format!("{}-{}-{}", self.name, self.plugin_type, self.artifact.name)
    }
}

/// Available plugins keyed by extension type. Replaced wholesale on refresh,
/// never patched in place.
#[derive(Debug, Clone, Default)]
pub struct PluginCatalog {
    extensions: BTreeMap<String, Vec<PluginEntry>>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the plugin list for one extension type with the grouped form
    /// of `manifests` (one entry per plugin name, artifacts collected in
    /// arrival order).
    pub fn set_plugins(&mut self, extension: impl Into<String>, manifests: Vec<PluginManifest>) {
        let extension = extension.into();
        let mut entries: Vec<PluginEntry> = Vec::new();
        for manifest in manifests {
            match entries.iter().position(|e| e.name == manifest.name) {
                Some(index) => entries[index].all_artifacts.push(manifest.artifact),
                None => entries.push(PluginEntry {
                    name: manifest.name,
                    plugin_type: manifest.plugin_type,
                    description: manifest.description,
                    all_artifacts: vec![manifest.artifact.clone()],
                    artifact: manifest.artifact,
                }),
            }
        }
        debug!(extension = %extension, plugins = entries.len(), "catalog extension updated");
        self.extensions.insert(extension, entries);
    }

    pub fn reset(&mut self) {
        self.extensions.clear();
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.keys().map(String::as_str)
    }

    pub fn plugins(&self, extension: &str) -> &[PluginEntry] {
        self.extensions
            .get(extension)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Resolves the artifact to instantiate for a plugin: the persisted
    /// default if it still exists in the fetched set, otherwise the highest
    /// available version.
    pub fn default_artifact(
        &self,
        entry: &PluginEntry,
        defaults: &DefaultVersionMap,
    ) -> Option<ArtifactSummary> {
        if let Some(preferred) = defaults.get(&entry.default_version_key()) {
            if entry.all_artifacts.contains(preferred) {
                return Some(preferred.clone());
            }
        }
        highest_artifact(&entry.all_artifacts)
    }
}

/// Picks the artifact with the highest parseable version; artifacts with
/// unparseable versions sort below every parseable one.
pub fn highest_artifact(artifacts: &[ArtifactSummary]) -> Option<ArtifactSummary> {
    artifacts
        .iter()
        .max_by_key(|a| a.version.parse::<ArtifactVersion>().ok())
        .cloned()
}

/// Groups plugin manifests by plugin name, preserving arrival order within
/// each group.
pub fn plugin_to_artifact_map(
    manifests: &[PluginManifest],
) -> BTreeMap<String, Vec<PluginManifest>> {
    let mut map: BTreeMap<String, Vec<PluginManifest>> = BTreeMap::new();
    for manifest in manifests {
        map.entry(manifest.name.clone())
            .or_default()
            .push(manifest.clone());
    }
    map
}

/// Loads the persisted default-version map; a missing or malformed setting
/// yields an empty map.
pub async fn load_default_versions(settings: &UserSettings) -> DefaultVersionMap {
    let Some(value) = settings.get(DEFAULT_VERSION_SETTINGS_KEY).await else {
        return DefaultVersionMap::new();
    };
    match serde_json::from_value(value) {
        Ok(map) => map,
        Err(err) => {
            warn!(error = %err, "ignoring malformed default-version settings");
            DefaultVersionMap::new()
        }
    }
}

/// Records one plugin's default artifact and persists the whole map.
pub async fn save_default_version(
    settings: &UserSettings,
    key: impl Into<String>,
    artifact: ArtifactSummary,
) -> Result<()> {
    let mut map = load_default_versions(settings).await;
    map.insert(key.into(), artifact);
    settings
        .set(DEFAULT_VERSION_SETTINGS_KEY, serde_json::to_value(&map)?)
        .await
}

/// Builds a catalog for one pipeline type by listing extensions and fetching
/// each extension's plugins, one call at a time.
pub async fn fetch_catalog(
    api: &dyn PluginMetadataApi,
    namespace: &str,
    pipeline_type: &str,
) -> Result<PluginCatalog> {
    let mut catalog = PluginCatalog::new();
    for extension in api.extensions(namespace, pipeline_type).await? {
        let manifests = api.plugins(namespace, pipeline_type, &extension).await?;
        catalog.set_plugins(extension, manifests);
    }
    Ok(catalog)
}

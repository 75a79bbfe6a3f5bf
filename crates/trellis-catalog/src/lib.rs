//! Plugin catalog for the studio palette.
//!
//! Maps extension types to the plugins available in a namespace, groups their
//! artifact versions, resolves the default artifact for a plugin (persisted
//! default-version map with a highest-version fallback), and classifies
//! plugin types into the fixed palette categories.

pub mod catalog;
pub mod category;

pub use catalog::{
    fetch_catalog, load_default_versions, save_default_version, DefaultVersionMap, PluginCatalog,
    PluginEntry, DEFAULT_VERSION_SETTINGS_KEY,
};
pub use category::{classify, ordered_categories, PluginCategory};

//! Caching wrapper over the user-settings endpoint.
//!
//! Settings are a small JSON tree persisted per user. Reads are served from an
//! in-memory cache that is populated at most once; concurrent first reads
//! share a single fetch. Writes go through to the backend and update the
//! cache. Fetch failures resolve to `None` so the editor stays usable.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use trellis_types::Result;

use crate::client::SettingsApi;

pub struct UserSettings {
    namespace: String,
    api: Arc<dyn SettingsApi>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    data: serde_json::Value,
    loaded: bool,
}

impl UserSettings {
    pub fn new(namespace: impl Into<String>, api: Arc<dyn SettingsApi>) -> Self {
        Self {
            namespace: namespace.into(),
            api,
            inner: Mutex::new(Inner {
                data: serde_json::Value::Object(Default::default()),
                loaded: false,
            }),
        }
    }

    /// Reads a value by dotted path. Values already in the cache (from a
    /// prior fetch or a local `set`) are served directly; otherwise the
    /// settings tree is fetched at most once. Holding the cache lock across
    /// the fetch means concurrent first reads wait for one request instead of
    /// issuing their own.
    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut inner = self.inner.lock().await;
        if let Some(value) = lookup(&inner.data, key) {
            return Some(value.clone());
        }
        if inner.loaded {
            return None;
        }
        match self.api.fetch(&self.namespace).await {
            Ok(data) => {
                inner.data = data;
                inner.loaded = true;
            }
            Err(err) => {
                warn!(namespace = %self.namespace, error = %err, "failed to fetch user settings");
                return None;
            }
        }
        lookup(&inner.data, key).cloned()
    }

    /// Drops the cache; the next `get` fetches again.
    pub async fn invalidate(&self) {
        let mut inner = self.inner.lock().await;
        inner.data = serde_json::Value::Object(Default::default());
        inner.loaded = false;
    }

    /// Writes a value by dotted path and persists the whole tree.
    pub async fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let mut inner = self.inner.lock().await;
        insert(&mut inner.data, key, value);
        self.api.update(&self.namespace, &inner.data).await
    }
}

fn lookup<'a>(root: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn insert(root: &mut serde_json::Value, path: &str, value: serde_json::Value) {
    let mut current = root;
    let segments: Vec<&str> = path.split('.').collect();
    for (i, segment) in segments.iter().enumerate() {
        if !current.is_object() {
            *current = serde_json::Value::Object(Default::default());
        }
        let Some(map) = current.as_object_mut() else {
            return;
        };
        if i == segments.len() - 1 {
            map.insert((*segment).to_string(), value);
            return;
        }
        current = map
            .entry((*segment).to_string())
            .or_insert_with(|| serde_json::Value::Object(Default::default()));
    }
}

//! Name directory: the label <-> stable ID mapping the codec reads.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

/// Read access to the project's variable name directory.
///
/// A missing mapping is a normal answer, not an error.
pub trait NameDirectory {
    /// Stable ID for a human-readable label.
    fn stable_id(&self, label: &str) -> Option<String>;
    /// Human-readable label for a stable ID.
    fn label(&self, id: &str) -> Option<String>;
    /// Every label the directory knows, in a stable order.
    fn labels(&self) -> Vec<String>;
}

/// In-memory, append-only [`NameDirectory`].
///
/// Once a label or an ID is mapped it is never remapped; later inserts that
/// would collide are ignored.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    by_label: HashMap<String, String>,
    by_id: HashMap<String, String>,
    order: Vec<String>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from `(label, id)` pairs.
    pub fn from_pairs<L, I>(pairs: impl IntoIterator<Item = (L, I)>) -> Self
    where
        L: Into<String>,
        I: Into<String>,
    {
        let mut dir = Self::new();
        for (label, id) in pairs {
            dir.insert(label, id);
        }
        dir
    }

    /// Load a directory from a JSON object of `{ "label": "id" }` pairs.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)?;
        let mut dir = Self::new();
        for (label, id) in map {
            let Some(id) = id.as_str() else {
                return Err(ConfigError::Invalid(format!("directory entry '{label}' is not a string")));
            };
            dir.insert(label, id);
        }
        Ok(dir)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_json(&text)
    }

    /// Map `label` to `id`. Returns false when either side was already mapped.
    pub fn insert(&mut self, label: impl Into<String>, id: impl Into<String>) -> bool {
        let label = label.into();
        let id = id.into();
        if self.by_label.contains_key(&label) || self.by_id.contains_key(&id) {
            return false;
        }
        self.by_label.insert(label.clone(), id.clone());
        self.by_id.insert(id, label.clone());
        self.order.push(label);
        true
    }

    /// Return the ID for `label`, minting a fresh v4 UUID if it has none.
    pub fn register(&mut self, label: &str) -> String {
        if let Some(id) = self.by_label.get(label) {
            return id.clone();
        }
        let id = Uuid::new_v4().to_string();
        self.insert(label, id.clone());
        id
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl NameDirectory for MemoryDirectory {
    fn stable_id(&self, label: &str) -> Option<String> {
        self.by_label.get(label).cloned()
    }

    fn label(&self, id: &str) -> Option<String> {
        self.by_id.get(id).cloned()
    }

    fn labels(&self) -> Vec<String> {
        self.order.clone()
    }
}

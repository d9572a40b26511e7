//! Persisted event → remote id mapping
//!
//! Stored as a single JSON object, `{ "<event>": "<remote-id>", ... }`.

use crate::PersistenceError;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Event name → remote registration id
pub type IdMap = BTreeMap<String, String>;

/// JSON file backed id store.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the mapping.
    ///
    /// Never fails: an absent, unreadable or non-object file yields an empty
    /// mapping so a first run needs no special casing.
    pub async fn load(&self) -> IdMap {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No id store yet, starting empty");
                return IdMap::new();
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to read id store, starting empty"
                );
                return IdMap::new();
            }
        };

        let value: serde_json::Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Id store is not valid JSON, starting empty"
                );
                return IdMap::new();
            }
        };

        let serde_json::Value::Object(entries) = value else {
            warn!(path = %self.path.display(), "Id store is not a JSON object, starting empty");
            return IdMap::new();
        };

        entries
            .into_iter()
            .filter_map(|(event, id)| match id {
                serde_json::Value::String(id) if !id.is_empty() => Some((event, id)),
                other => {
                    warn!(event = %event, value = %other, "Skipping non-string remote id");
                    None
                }
            })
            .collect()
    }

    /// Overwrite the whole document.
    pub async fn save(&self, ids: &IdMap) -> Result<(), PersistenceError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| PersistenceError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        let content = serde_json::to_string_pretty(ids)?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|source| PersistenceError::Io {
                path: self.path.clone(),
                source,
            })?;

        debug!(path = %self.path.display(), entries = ids.len(), "Saved id store");
        Ok(())
    }
}

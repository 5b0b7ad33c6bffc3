// Favorites and the last committed filters, persisted as one small JSON file.
//
// Document shape:
//   { "favorites": ["101", "205"],
//     "lastFilters": { "filters": { "make": ["Ford"] }, "savedAt": "2025-03-01T12:00:00Z" } }

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::filters::FilterSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedFilters {
    pub filters: FilterSet,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Preferences {
    #[serde(default)]
    favorites: Vec<String>,
    #[serde(default)]
    last_filters: Option<SavedFilters>,
}

#[derive(Debug)]
pub struct PreferenceStore {
    path: PathBuf,
    prefs: Preferences,
}

impl PreferenceStore {
    // Never fails on a missing or unreadable document; the store starts empty
    // and the next write replaces the file.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let prefs = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Preferences>(&content) {
                Ok(prefs) => prefs,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Preference file is corrupt, starting empty");
                    Preferences::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No preference file yet, starting empty");
                Preferences::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read preference file, starting empty");
                Preferences::default()
            }
        };
        Self { path, prefs }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn favorites(&self) -> &[String] {
        &self.prefs.favorites
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.prefs.favorites.iter().any(|f| f == id)
    }

    // Returns whether `id` is a favorite after the toggle
    pub fn toggle_favorite(&mut self, id: &str) -> Result<bool, StoreError> {
        let now_favorite = match self.prefs.favorites.iter().position(|f| f == id) {
            Some(pos) => {
                self.prefs.favorites.remove(pos);
                false
            }
            None => {
                self.prefs.favorites.push(id.to_string());
                true
            }
        };
        self.persist()?;
        Ok(now_favorite)
    }

    pub fn last_filters(&self) -> Option<&SavedFilters> {
        self.prefs.last_filters.as_ref()
    }

    pub fn save_last_filters(&mut self, filters: FilterSet) -> Result<SavedFilters, StoreError> {
        let saved = SavedFilters { filters, saved_at: Utc::now() };
        self.prefs.last_filters = Some(saved.clone());
        self.persist()?;
        tracing::debug!(saved_at = %saved.saved_at, "Saved last filters");
        Ok(saved)
    }

    // Write to a sibling temp file, then rename over the document
    fn persist(&self) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io { path: self.path.display().to_string(), source };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = serde_json::to_string_pretty(&self.prefs)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

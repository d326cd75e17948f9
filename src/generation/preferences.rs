//! Best-effort persistence of UI preferences.
//!
//! Reads fall back to defaults and writes log a warning on failure; neither
//! ever surfaces an error to the caller. File access goes through
//! `tokio::fs` so handlers never block a runtime worker.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::generation::core::errors::GenerationResult;

/// How the review dashboard runs AI reviews.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewMode {
    /// One task at a time.
    #[default]
    Single,
    /// Whole task selections at once.
    Batch,
}

/// Persisted preference document.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// Last-used review mode.
    #[serde(default)]
    pub review_mode: ReviewMode,
}

/// JSON-file preference store.
#[derive(Clone, Debug)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    /// Store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last-used review mode, or the default if the file is missing or
    /// unreadable.
    pub async fn load_review_mode(&self) -> ReviewMode {
        match self.read().await {
            Ok(preferences) => preferences.review_mode,
            Err(err) => {
                debug!(path = %self.path.display(), %err, "Using default preferences");
                ReviewMode::default()
            }
        }
    }

    /// Remember the review mode. Failures are logged and swallowed.
    pub async fn save_review_mode(&self, mode: ReviewMode) {
        let mut preferences = self.read().await.unwrap_or_default();
        preferences.review_mode = mode;
        if let Err(err) = self.write(&preferences).await {
            warn!(path = %self.path.display(), %err, "Failed to persist review mode");
        }
    }

    async fn read(&self) -> GenerationResult<Preferences> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn write(&self, preferences: &Preferences) -> GenerationResult<()> {
        let raw = serde_json::to_string_pretty(preferences)?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }
}

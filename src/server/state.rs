//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::generation::core::config::StudioConfig;
use crate::generation::core::errors::GenerationResult;
use crate::generation::preferences::PreferenceStore;
use crate::generation::service::{GenerationService, HttpGenerationService};
use crate::generation::session::GenerationSession;

/// Shared application state.
pub struct AppState {
    /// Chat-panel session driving generation jobs.
    pub session: GenerationSession,
    /// UI preference file.
    pub preferences: PreferenceStore,
}

impl AppState {
    /// Create state backed by the HTTP generation service.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &StudioConfig) -> GenerationResult<Arc<Self>> {
        let service = HttpGenerationService::new(&config.service)?;
        Self::with_service(config, Arc::new(service))
    }

    /// Create state backed by any generation service.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn with_service(
        config: &StudioConfig,
        service: Arc<dyn GenerationService>,
    ) -> GenerationResult<Arc<Self>> {
        let session = GenerationSession::new(config, service)?;
        let preferences = PreferenceStore::new(config.preferences.path.clone());
        Ok(Arc::new(Self {
            session,
            preferences,
        }))
    }
}

//! Configuration for the generation studio.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::generation::core::errors::{GenerationError, GenerationResult};
use crate::generation::core::ids::ProjectId;
use crate::generation::core::settings::{MAX_IMAGES, MAX_NEGATIVE_PROMPT_CHARS};

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StudioConfig {
    /// Remote generation service settings.
    pub service: ServiceConfig,
    /// Job timing settings.
    pub jobs: JobConfig,
    /// Input limits.
    pub limits: LimitConfig,
    /// HTTP surface settings.
    pub server: ServerConfig,
    /// Preference file settings.
    pub preferences: PreferenceConfig,
    /// Project selected at startup, if any.
    pub project_id: Option<ProjectId>,
}

impl StudioConfig {
    /// Create a config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `STUDIO_*` environment variables.
    ///
    /// Unparseable values are ignored and the default is kept.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("STUDIO_SERVICE_URL") {
            config.service.base_url = url;
        }
        if let Ok(key) = std::env::var("STUDIO_API_KEY") {
            config.service.api_key = Some(key);
        }
        if let Some(port) = std::env::var("STUDIO_PORT").ok().and_then(|p| p.parse().ok()) {
            config.server.port = port;
        }
        if let Ok(path) = std::env::var("STUDIO_PREFERENCES_PATH") {
            config.preferences.path = PathBuf::from(path);
        }
        config.project_id = std::env::var("STUDIO_PROJECT_ID")
            .ok()
            .and_then(|id| id.parse().ok());
        config
    }

    /// Set the generation service base URL.
    #[must_use]
    pub fn with_service_url(mut self, url: impl Into<String>) -> Self {
        self.service.base_url = url.into();
        self
    }

    /// Set the startup project.
    #[must_use]
    pub const fn with_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// Set the job timing section.
    #[must_use]
    pub const fn with_jobs(mut self, jobs: JobConfig) -> Self {
        self.jobs = jobs;
        self
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> GenerationResult<()> {
        Url::parse(&self.service.base_url)?;

        if self.jobs.per_image_duration_ms == 0 {
            return Err(GenerationError::InvalidConfig(
                "jobs.per_image_duration_ms must be > 0".to_string(),
            ));
        }

        if self.jobs.progress_tick_ms == 0 {
            return Err(GenerationError::InvalidConfig(
                "jobs.progress_tick_ms must be > 0".to_string(),
            ));
        }

        if !(0.0..100.0).contains(&self.jobs.progress_cap) {
            return Err(GenerationError::InvalidConfig(
                "jobs.progress_cap must be within [0, 100)".to_string(),
            ));
        }

        if self.limits.max_prompt_chars == 0 {
            return Err(GenerationError::InvalidConfig(
                "limits.max_prompt_chars must be > 0".to_string(),
            ));
        }

        if self.limits.max_images == 0 || self.limits.max_images > MAX_IMAGES {
            return Err(GenerationError::InvalidConfig(format!(
                "limits.max_images must be within 1..={MAX_IMAGES}"
            )));
        }

        if self.limits.max_negative_prompt_chars > MAX_NEGATIVE_PROMPT_CHARS {
            return Err(GenerationError::InvalidConfig(format!(
                "limits.max_negative_prompt_chars must be <= {MAX_NEGATIVE_PROMPT_CHARS}"
            )));
        }

        Ok(())
    }
}

/// Remote generation service settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the REST backend.
    pub base_url: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            api_key: None,
            request_timeout_secs: 300,
            connect_timeout_secs: 10,
        }
    }
}

impl ServiceConfig {
    /// Request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Connect timeout as a `Duration`.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Job timing settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobConfig {
    /// Estimated milliseconds per requested image.
    pub per_image_duration_ms: u64,
    /// Progress estimator period.
    pub progress_tick_ms: u64,
    /// Highest value the estimator may report.
    pub progress_cap: f32,
    /// Delay before a settled job leaves the registry.
    pub cleanup_delay_ms: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            per_image_duration_ms: 15_000,
            progress_tick_ms: 1_000,
            progress_cap: 95.0,
            cleanup_delay_ms: 5_000,
        }
    }
}

impl JobConfig {
    /// Estimator period as a `Duration`.
    #[must_use]
    pub const fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_ms)
    }

    /// Registry grace window as a `Duration`.
    #[must_use]
    pub const fn cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_delay_ms)
    }
}

/// Input limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitConfig {
    /// Maximum user prompt length in characters.
    pub max_prompt_chars: usize,
    /// Maximum images per request.
    pub max_images: u8,
    /// Maximum negative prompt length.
    pub max_negative_prompt_chars: usize,
    /// Maximum staged attachments.
    pub max_attachments: usize,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_prompt_chars: 2_000,
            max_images: MAX_IMAGES,
            max_negative_prompt_chars: MAX_NEGATIVE_PROMPT_CHARS,
            max_attachments: 4,
        }
    }
}

/// HTTP surface settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

/// Preference file settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PreferenceConfig {
    /// JSON file holding UI preferences.
    pub path: PathBuf,
}

impl Default for PreferenceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("studio_preferences.json"),
        }
    }
}

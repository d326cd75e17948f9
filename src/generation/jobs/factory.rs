//! Builds job records at submission time.

use chrono::Utc;

use crate::generation::core::config::JobConfig;
use crate::generation::core::errors::GenerationResult;
use crate::generation::core::ids::JobId;
use crate::generation::core::job::{GenerationJob, JobEvent, JobState};
use crate::generation::core::settings::DetailedSettings;

/// Creates [`GenerationJob`] records already in the generating state.
#[derive(Clone, Debug)]
pub struct JobFactory {
    per_image_duration_ms: u64,
}

impl JobFactory {
    /// Factory using the configured per-image estimate.
    #[must_use]
    pub const fn new(config: &JobConfig) -> Self {
        Self {
            per_image_duration_ms: config.per_image_duration_ms,
        }
    }

    /// Expected duration for a settings snapshot.
    #[must_use]
    pub fn estimated_duration_ms(&self, settings: &DetailedSettings) -> u64 {
        u64::from(settings.number_of_images) * self.per_image_duration_ms
    }

    /// Create a job for an assembled prompt. `settings` is copied so later
    /// edits do not reach the in-flight job.
    ///
    /// # Errors
    /// Returns an error if the submit transition is rejected.
    pub fn create(
        &self,
        prompt: impl Into<String>,
        settings: &DetailedSettings,
    ) -> GenerationResult<GenerationJob> {
        Ok(GenerationJob {
            id: JobId::new(),
            prompt: prompt.into(),
            settings: settings.clone(),
            state: JobState::Idle.transition(JobEvent::Submit)?,
            progress: None,
            start_time: Utc::now(),
            estimated_duration_ms: self.estimated_duration_ms(settings),
            finished_at: None,
        })
    }
}

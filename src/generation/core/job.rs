//! Generation job record and its lifecycle state machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::generation::core::errors::{GenerationError, GenerationResult};
use crate::generation::core::ids::JobId;
use crate::generation::core::settings::DetailedSettings;

/// Lifecycle state of a generation job.
///
/// `Idle` is the pre-creation state; stored jobs are never idle.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Not yet submitted.
    Idle,
    /// Request in flight.
    Generating,
    /// Service returned results.
    Completed,
    /// Cancelled or failed.
    Failed,
}

/// Events that drive [`JobState`] transitions.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEvent {
    /// User submitted a prompt.
    Submit,
    /// Service returned results.
    Succeed,
    /// User cancelled the in-flight request.
    Abort,
    /// Service or network failure.
    Fail,
}

impl JobState {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether the job has settled.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Apply an event.
    ///
    /// # Errors
    /// Returns `InvalidTransition` for any pair outside the table:
    ///
    /// | from         | event   | to           |
    /// |--------------|---------|--------------|
    /// | `idle`       | submit  | `generating` |
    /// | `generating` | succeed | `completed`  |
    /// | `generating` | abort   | `failed`     |
    /// | `generating` | fail    | `failed`     |
    pub fn transition(self, event: JobEvent) -> GenerationResult<Self> {
        match (self, event) {
            (Self::Idle, JobEvent::Submit) => Ok(Self::Generating),
            (Self::Generating, JobEvent::Succeed) => Ok(Self::Completed),
            (Self::Generating, JobEvent::Abort | JobEvent::Fail) => Ok(Self::Failed),
            (from, event) => Err(GenerationError::InvalidTransition { from, event }),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked generation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJob {
    /// Job identifier.
    pub id: JobId,
    /// Fully assembled prompt sent to the service.
    pub prompt: String,
    /// Settings snapshot taken at submission.
    pub settings: DetailedSettings,
    /// Current lifecycle state.
    pub state: JobState,
    /// Estimated progress in percent; `None` until the first tick.
    pub progress: Option<f32>,
    /// Creation timestamp.
    pub start_time: DateTime<Utc>,
    /// Expected duration used by the progress estimator.
    pub estimated_duration_ms: u64,
    /// When the job settled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl GenerationJob {
    /// Apply a state event and stamp `finished_at` on settlement.
    ///
    /// # Errors
    /// Returns `InvalidTransition` if the event is not allowed.
    pub fn apply(&mut self, event: JobEvent, now: DateTime<Utc>) -> GenerationResult<JobState> {
        let next = self.state.transition(event)?;
        self.state = next;
        if next.is_terminal() {
            self.finished_at = Some(now);
            if next == JobState::Completed {
                self.progress = Some(100.0);
            }
        }
        Ok(next)
    }

    /// Record an estimator tick. Ignored unless generating, and never lowers
    /// the stored value. Returns whether the value changed.
    pub fn record_progress(&mut self, value: f32) -> bool {
        if self.state != JobState::Generating {
            return false;
        }
        match self.progress {
            Some(current) if current >= value => false,
            _ => {
                self.progress = Some(value);
                true
            }
        }
    }

    /// Elapsed milliseconds between start and settlement.
    #[must_use]
    pub fn elapsed_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| end.signed_duration_since(self.start_time).num_milliseconds())
    }
}

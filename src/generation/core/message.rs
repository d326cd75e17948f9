//! Conversation message model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::generation::core::ids::{JobId, MessageId};
use crate::generation::core::job::GenerationJob;
use crate::generation::core::settings::{AspectRatio, DetailedSettings};
use crate::generation::service::types::GeneratedReference;

/// Neutral text appended when the user cancels a request.
pub const CANCELLED_TEXT: &str = "生成がキャンセルされました。";
/// Generic text appended when the service fails.
pub const FAILURE_TEXT: &str = "画像の生成に失敗しました。しばらくしてから再度お試しください。";

/// Kind of conversation entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Submitted by the user.
    Prompt,
    /// Produced when a job settles, including errors.
    Response,
}

/// Classification of a failed job.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The user aborted the request.
    Cancelled,
    /// The service or network failed.
    Service,
}

/// Error details kept for diagnostics, never shown verbatim.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ErrorAnnotation {
    /// Error classification.
    pub kind: ErrorKind,
    /// Underlying error text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Free-form message metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    /// Job that produced or was produced by this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Settings snapshot of the job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<DetailedSettings>,
    /// Prompt actually sent to the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembled_prompt: Option<String>,
    /// Wall-clock generation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_time_ms: Option<u64>,
    /// Full result records for detail views.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<GeneratedReference>,
    /// Set on cancelled or failed jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorAnnotation>,
}

/// One conversation entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message identifier.
    pub id: MessageId,
    /// Prompt or response.
    pub kind: MessageKind,
    /// Display text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Image URLs (attachments on prompts, results on responses).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    /// Aspect ratio used to lay out the images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
    /// Extra data.
    pub metadata: MessageMetadata,
}

impl Message {
    /// Prompt entry for a freshly created job, carrying the staged
    /// attachment handles.
    #[must_use]
    pub fn prompt(user_text: impl Into<String>, job: &GenerationJob, attachments: Vec<String>) -> Self {
        Self {
            id: MessageId::new(),
            kind: MessageKind::Prompt,
            text: Some(user_text.into()),
            images: attachments,
            aspect_ratio: Some(job.settings.aspect_ratio),
            metadata: MessageMetadata {
                job_id: Some(job.id),
                timestamp: job.start_time,
                settings: Some(job.settings.clone()),
                assembled_prompt: Some(job.prompt.clone()),
                ..MessageMetadata::default()
            },
        }
    }

    /// Successful response embedding every result record.
    #[must_use]
    pub fn response(
        job: &GenerationJob,
        images: Vec<String>,
        results: Vec<GeneratedReference>,
        generation_time_ms: u64,
    ) -> Self {
        Self {
            id: MessageId::new(),
            kind: MessageKind::Response,
            text: Some(format!("{}枚の画像を生成しました。", images.len())),
            images,
            aspect_ratio: Some(job.settings.aspect_ratio),
            metadata: MessageMetadata {
                job_id: Some(job.id),
                timestamp: Utc::now(),
                settings: Some(job.settings.clone()),
                generation_time_ms: Some(generation_time_ms),
                results,
                ..MessageMetadata::default()
            },
        }
    }

    /// Neutral entry for a user-cancelled job.
    #[must_use]
    pub fn cancelled(job: &GenerationJob) -> Self {
        Self::settled_without_images(
            job,
            CANCELLED_TEXT,
            ErrorAnnotation {
                kind: ErrorKind::Cancelled,
                detail: None,
            },
        )
    }

    /// Generic failure entry; `detail` stays in metadata.
    #[must_use]
    pub fn failure(job: &GenerationJob, detail: impl Into<String>) -> Self {
        Self::settled_without_images(
            job,
            FAILURE_TEXT,
            ErrorAnnotation {
                kind: ErrorKind::Service,
                detail: Some(detail.into()),
            },
        )
    }

    fn settled_without_images(job: &GenerationJob, text: &str, error: ErrorAnnotation) -> Self {
        Self {
            id: MessageId::new(),
            kind: MessageKind::Response,
            text: Some(text.to_string()),
            images: Vec::new(),
            aspect_ratio: None,
            metadata: MessageMetadata {
                job_id: Some(job.id),
                timestamp: Utc::now(),
                settings: Some(job.settings.clone()),
                error: Some(error),
                ..MessageMetadata::default()
            },
        }
    }

    /// Whether this is an error response.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.metadata.error.is_some()
    }
}

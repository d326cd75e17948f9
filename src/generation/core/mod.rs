//! Core generation types and identifiers.

pub mod config;
pub mod errors;
pub mod ids;
pub mod job;
pub mod message;
pub mod settings;

pub use config::{
    JobConfig, LimitConfig, PreferenceConfig, ServerConfig, ServiceConfig, StudioConfig,
};
pub use errors::{GenerationError, GenerationResult};
pub use ids::{BlobId, JobId, MessageId, ProjectId};
pub use job::{GenerationJob, JobEvent, JobState};
pub use message::{ErrorAnnotation, ErrorKind, Message, MessageKind, MessageMetadata};
pub use settings::{AspectRatio, DetailedSettings};

//! Reference-image generation: job lifecycle, conversation log, attachments,
//! and the remote service client.

pub mod attachments;
pub mod conversation;
pub mod core;
pub mod jobs;
pub mod preferences;
pub mod selection;
pub mod service;
pub mod session;

pub use attachments::{AttachmentStore, DisplayHandle, HandleArena};
pub use conversation::{ConversationLog, GenerationStats};
pub use self::core::{
    AspectRatio, DetailedSettings, GenerationError, GenerationJob, GenerationResult, JobId,
    JobState, Message, MessageId, MessageKind, ProjectId, StudioConfig,
};
pub use preferences::{PreferenceStore, ReviewMode};
pub use selection::{GenerationTags, StructuredSelections, map_selections};
pub use service::{GenerationService, HttpGenerationService};
pub use session::{GenerationSession, SubmitOutcome, SubmitRefusal};

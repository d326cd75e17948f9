//! Chat-panel session: shared state plus the job orchestrator.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{GenerationSession, PendingGeneration, SubmitOutcome, SubmitRefusal};
pub use state::{SessionSnapshot, SessionState};

//! Conversation log and statistics.

pub mod log;
pub mod stats;

pub use log::ConversationLog;
pub use stats::GenerationStats;

//! Staged image attachments and their display handles.

pub mod arena;
pub mod store;

pub use arena::{DisplayHandle, HandleArena, LOCAL_HANDLE_PREFIX, Ownership};
pub use store::AttachmentStore;

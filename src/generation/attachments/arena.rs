//! Arena of locally allocated blob handles.
//!
//! A handle is owned by the staging area until submission, then archived
//! with the prompt message that references it. Only staging handles are
//! ever released.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::generation::core::ids::BlobId;

/// Prefix marking a handle allocated by this process.
pub const LOCAL_HANDLE_PREFIX: &str = "blob:";

/// Displayable reference to an attachment.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayHandle(String);

impl DisplayHandle {
    /// Handle to an externally hosted image.
    #[must_use]
    pub fn hosted(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Wrap a handle string taken from a rendered message.
    #[must_use]
    pub fn parse(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    fn local(id: BlobId) -> Self {
        Self(format!("{LOCAL_HANDLE_PREFIX}{id}"))
    }

    /// Whether this handle was allocated locally.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_HANDLE_PREFIX)
    }

    /// Blob id of a local handle.
    #[must_use]
    pub fn blob_id(&self) -> Option<BlobId> {
        self.0.strip_prefix(LOCAL_HANDLE_PREFIX)?.parse().ok()
    }

    /// Borrow as `&str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<DisplayHandle> for String {
    fn from(value: DisplayHandle) -> Self {
        value.0
    }
}

/// Who currently owns a blob.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Ownership {
    /// Held by the attachment store; may be released.
    Staging,
    /// Referenced by a conversation message; never released here.
    Archived,
}

#[derive(Clone, Debug)]
struct BlobEntry {
    mime_type: String,
    bytes: Arc<[u8]>,
    ownership: Ownership,
}

/// Thread-safe blob arena shared by the store and the HTTP surface.
#[derive(Debug, Default)]
pub struct HandleArena {
    blobs: DashMap<BlobId, BlobEntry>,
}

impl HandleArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bytes under a fresh staging handle.
    pub fn allocate(&self, mime_type: impl Into<String>, bytes: &[u8]) -> DisplayHandle {
        let id = BlobId::new();
        self.blobs.insert(
            id,
            BlobEntry {
                mime_type: mime_type.into(),
                bytes: Arc::from(bytes),
                ownership: Ownership::Staging,
            },
        );
        DisplayHandle::local(id)
    }

    /// Release a staging handle. Returns `false` for hosted, archived, or
    /// already released handles.
    pub fn release(&self, handle: &DisplayHandle) -> bool {
        let Some(id) = handle.blob_id() else {
            return false;
        };
        self.blobs
            .remove_if(&id, |_, entry| entry.ownership == Ownership::Staging)
            .is_some()
    }

    /// Transfer a handle to the conversation. Returns whether it was live.
    pub fn archive(&self, handle: &DisplayHandle) -> bool {
        let Some(id) = handle.blob_id() else {
            return false;
        };
        self.blobs
            .get_mut(&id)
            .map(|mut entry| entry.ownership = Ownership::Archived)
            .is_some()
    }

    /// Drop an archived blob once no message references it. Staging blobs
    /// go through [`release`](Self::release) instead.
    pub fn discard(&self, handle: &DisplayHandle) -> bool {
        let Some(id) = handle.blob_id() else {
            return false;
        };
        self.blobs
            .remove_if(&id, |_, entry| entry.ownership == Ownership::Archived)
            .is_some()
    }

    /// MIME type and bytes of a live blob.
    #[must_use]
    pub fn resolve(&self, id: BlobId) -> Option<(String, Arc<[u8]>)> {
        self.blobs
            .get(&id)
            .map(|entry| (entry.mime_type.clone(), Arc::clone(&entry.bytes)))
    }

    /// Ownership of a live blob.
    #[must_use]
    pub fn ownership(&self, handle: &DisplayHandle) -> Option<Ownership> {
        let id = handle.blob_id()?;
        self.blobs.get(&id).map(|entry| entry.ownership)
    }

    /// Number of live blobs.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.blobs.len()
    }
}

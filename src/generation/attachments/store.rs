//! Staging area for images that accompany the next prompt.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::generation::attachments::arena::{DisplayHandle, HandleArena};
use crate::generation::service::types::AttachmentPayload;

/// Attachments staged for the next submission.
///
/// `handles` and `files` are parallel: same length, same order.
#[derive(Debug)]
pub struct AttachmentStore {
    arena: Arc<HandleArena>,
    handles: Vec<DisplayHandle>,
    files: Vec<AttachmentPayload>,
    capacity: usize,
}

impl AttachmentStore {
    /// Create an empty store holding at most `capacity` attachments.
    #[must_use]
    pub const fn new(arena: Arc<HandleArena>, capacity: usize) -> Self {
        Self {
            arena,
            handles: Vec::new(),
            files: Vec::new(),
            capacity,
        }
    }

    /// Stage files, allocating one local handle each. Files beyond the
    /// capacity are dropped. Returns the new handles.
    pub fn add(&mut self, files: Vec<AttachmentPayload>) -> Vec<DisplayHandle> {
        let room = self.capacity.saturating_sub(self.files.len());
        if files.len() > room {
            warn!(
                offered = files.len(),
                accepted = room,
                "Attachment capacity reached, dropping extra files"
            );
        }
        let mut added = Vec::new();
        for file in files.into_iter().take(room) {
            let handle = self.arena.allocate(file.mime_type.clone(), &file.bytes);
            self.handles.push(handle.clone());
            self.files.push(file);
            added.push(handle);
        }
        added
    }

    /// Stage a file already hosted elsewhere; no local handle is allocated.
    /// Returns `None` when the store is full.
    pub fn add_hosted(
        &mut self,
        url: impl Into<String>,
        file: AttachmentPayload,
    ) -> Option<DisplayHandle> {
        if self.files.len() >= self.capacity {
            warn!(file = %file.file_name, "Attachment capacity reached, dropping hosted file");
            return None;
        }
        let handle = DisplayHandle::hosted(url);
        self.handles.push(handle.clone());
        self.files.push(file);
        Some(handle)
    }

    /// Remove the attachment at `index`, releasing its handle if local.
    /// Out-of-range indices leave the store unchanged.
    pub fn remove(&mut self, index: usize) -> bool {
        if index >= self.handles.len() {
            return false;
        }
        let handle = self.handles.remove(index);
        self.files.remove(index);
        if handle.is_local() {
            self.arena.release(&handle);
        }
        true
    }

    /// Release every local handle and empty the store.
    pub fn clear(&mut self) {
        for handle in self.handles.drain(..) {
            if handle.is_local() {
                self.arena.release(&handle);
            }
        }
        self.files.clear();
    }

    /// Hand the staged attachments to a submission. Handles are archived
    /// rather than released so rendered messages keep resolving them.
    pub fn take_for_submission(&mut self) -> (Vec<DisplayHandle>, Vec<AttachmentPayload>) {
        for handle in &self.handles {
            self.arena.archive(handle);
        }
        debug!(count = self.handles.len(), "Archived staged attachments");
        (
            std::mem::take(&mut self.handles),
            std::mem::take(&mut self.files),
        )
    }

    /// Staged handles in order.
    #[must_use]
    pub fn handles(&self) -> &[DisplayHandle] {
        &self.handles
    }

    /// Staged files in order.
    #[must_use]
    pub fn files(&self) -> &[AttachmentPayload] {
        &self.files
    }

    /// Number of staged attachments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

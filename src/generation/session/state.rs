//! Session state shared by every orchestrator operation.

use std::sync::Arc;

use serde::Serialize;

use crate::generation::attachments::{AttachmentStore, DisplayHandle, HandleArena};
use crate::generation::conversation::ConversationLog;
use crate::generation::core::ids::ProjectId;
use crate::generation::core::settings::DetailedSettings;
use crate::generation::jobs::{CancellationController, JobRegistry};
use crate::generation::selection::StructuredSelections;

/// Everything one chat panel owns.
#[derive(Debug)]
pub struct SessionState {
    /// Draft prompt text.
    pub prompt: String,
    /// Settings applied to the next submission.
    pub settings: DetailedSettings,
    /// Structured selections applied to the next submission.
    pub selections: StructuredSelections,
    /// Selected project; submissions are refused without one.
    pub project_id: Option<ProjectId>,
    /// A request is in flight.
    pub is_loading: bool,
    pub(crate) conversation: ConversationLog,
    pub(crate) registry: JobRegistry,
    pub(crate) attachments: AttachmentStore,
    pub(crate) cancellation: CancellationController,
}

impl SessionState {
    /// Fresh state with attachments backed by `arena`.
    #[must_use]
    pub fn new(arena: Arc<HandleArena>, max_attachments: usize, project_id: Option<ProjectId>) -> Self {
        Self {
            prompt: String::new(),
            settings: DetailedSettings::default(),
            selections: StructuredSelections::new(),
            project_id,
            is_loading: false,
            conversation: ConversationLog::new(),
            registry: JobRegistry::new(),
            attachments: AttachmentStore::new(arena, max_attachments),
            cancellation: CancellationController::new(),
        }
    }

    /// Serializable view for a UI.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            prompt: self.prompt.clone(),
            settings: self.settings.clone(),
            selections: self.selections.clone(),
            project_id: self.project_id,
            is_loading: self.is_loading,
            attachments: self.attachments.handles().to_vec(),
        }
    }
}

/// Read-only copy of the editable session fields.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Draft prompt text.
    pub prompt: String,
    /// Detailed settings.
    pub settings: DetailedSettings,
    /// Structured selections.
    pub selections: StructuredSelections,
    /// Selected project.
    pub project_id: Option<ProjectId>,
    /// A request is in flight.
    pub is_loading: bool,
    /// Staged attachment handles.
    pub attachments: Vec<DisplayHandle>,
}

//! Append-only conversation log and generation history.

use crate::generation::core::ids::MessageId;
use crate::generation::core::message::{Message, MessageKind};

/// Time-ordered conversation shown to the user, plus the separate history
/// of successful generations used for statistics.
#[derive(Clone, Debug, Default)]
pub struct ConversationLog {
    messages: Vec<Message>,
    history: Vec<Message>,
}

impl ConversationLog {
    /// Create an empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Append a message to the conversation.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append a successful response to both the conversation and history.
    pub fn append_result(&mut self, message: Message) {
        self.history.push(message.clone());
        self.messages.push(message);
    }

    /// Replace the conversation with an empty one; optionally drop history.
    /// Returns the removed conversation entries.
    pub fn clear(&mut self, clear_history: bool) -> Vec<Message> {
        if clear_history {
            self.history.clear();
        }
        std::mem::take(&mut self.messages)
    }

    /// Most recent prompt message with this id.
    #[must_use]
    pub fn find_prompt(&self, id: MessageId) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.id == id && message.kind == MessageKind::Prompt)
    }

    /// Conversation in display order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Successful generations in completion order.
    #[must_use]
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Number of conversation entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the conversation is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

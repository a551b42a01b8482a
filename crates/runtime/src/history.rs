//! Conversation history and the bounded window submitted to the model.

use crate::model::{Message, Role};

/// Full, append-only conversation history.
#[derive(Debug, Clone, Default)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recent `size` messages.
    ///
    /// If the cut would land on a tool message, the window grows backwards
    /// until it starts at the assistant message that requested it, so it
    /// never opens with an unanswered tool result.
    pub fn window(&self, size: usize) -> &[Message] {
        if size == 0 {
            return &[];
        }

        let len = self.messages.len();
        let mut start = len.saturating_sub(size);
        while start > 0 && start < len && self.messages[start].role() == Role::Tool {
            start -= 1;
        }
        &self.messages[start..]
    }
}

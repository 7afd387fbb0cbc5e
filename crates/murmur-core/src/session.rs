//! Session identity and the ordered message log.

use tracing::info;

use crate::types::{Message, MessageId, SessionId};

/// Progress of the opening exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    /// Nothing sent yet
    Pending,
    /// Greeting request in flight
    InFlight,
    /// Greeting completed or failed; either way it is not retried
    Done,
}

/// One logical conversation with the backend
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    messages: Vec<Message>,
    init: InitState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create a session with a random id and an empty log
    pub fn new() -> Self {
        Self::with_id(SessionId::random())
    }

    pub fn with_id(id: SessionId) -> Self {
        Self {
            id,
            messages: Vec::new(),
            init: InitState::Pending,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn init_state(&self) -> InitState {
        self.init
    }

    /// True once an opening exchange has been attempted
    pub fn is_initialized(&self) -> bool {
        self.init != InitState::Pending
    }

    /// Claim the opening exchange. Returns false when it was already claimed,
    /// so concurrent triggers collapse into one request.
    pub fn begin_initialization(&mut self) -> bool {
        if self.is_initialized() {
            return false;
        }
        self.init = InitState::InFlight;
        true
    }

    pub fn finish_initialization(&mut self) {
        self.init = InitState::Done;
    }

    /// Replace the session wholesale: new id, empty log, initialization cleared.
    pub fn reset(&mut self) {
        let previous = self.id;
        *self = Self::with_id(SessionId::random_except(previous));
        info!("Session reset: {} -> {}", previous, self.id);
    }

    fn next_id(&self) -> MessageId {
        self.messages.len() as MessageId + 1
    }

    /// Append a user message. Blank or whitespace-only text is ignored.
    pub fn append_user_message(&mut self, text: &str) -> Option<MessageId> {
        if text.trim().is_empty() {
            return None;
        }
        let id = self.next_id();
        self.messages.push(Message::user(id, text));
        Some(id)
    }

    /// Append an empty assistant message to serve as a reveal target
    pub fn append_assistant_placeholder(&mut self) -> MessageId {
        let id = self.next_id();
        self.messages.push(Message::placeholder(id));
        id
    }

    /// Append an already complete assistant message, dropping any empty
    /// placeholder it supersedes.
    pub fn commit_assistant_message(&mut self, text: impl Into<String>) -> MessageId {
        while matches!(
            self.messages.last(),
            Some(last) if !last.is_user() && last.text.is_empty()
        ) {
            self.messages.pop();
        }
        let id = self.next_id();
        self.messages.push(Message::assistant(id, text));
        id
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn message_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Id of the message currently marked as revealing, if any
    pub fn revealing_message(&self) -> Option<MessageId> {
        self.messages.iter().find(|m| m.revealing).map(|m| m.id)
    }

    /// Clear every `revealing` flag without touching text
    pub fn settle_reveals(&mut self) {
        for msg in self.messages.iter_mut().filter(|m| m.revealing) {
            msg.revealing = false;
        }
    }
}

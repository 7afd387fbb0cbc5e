use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Position-derived message identifier, 1-based within a session.
pub type MessageId = u64;

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Assistant,
}

impl std::fmt::Display for Author {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Author::User => write!(f, "user"),
            Author::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry of the visible transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub author: Author,
    /// Visible content. While `revealing` this is a prefix of the final reply.
    pub text: String,
    pub created_at: DateTime<Local>,
    pub revealing: bool,
}

impl Message {
    /// Create a fully formed user message
    pub fn user(id: MessageId, text: impl Into<String>) -> Self {
        Self {
            id,
            author: Author::User,
            text: text.into(),
            created_at: Local::now(),
            revealing: false,
        }
    }

    /// Create a completed assistant message
    pub fn assistant(id: MessageId, text: impl Into<String>) -> Self {
        Self {
            id,
            author: Author::Assistant,
            text: text.into(),
            created_at: Local::now(),
            revealing: false,
        }
    }

    /// Create an empty assistant message that a reveal run will fill in
    pub fn placeholder(id: MessageId) -> Self {
        Self::assistant(id, String::new())
    }

    pub fn is_user(&self) -> bool {
        self.author == Author::User
    }

    /// Timestamp as shown in the transcript
    pub fn time_label(&self) -> String {
        self.created_at.format("%H:%M").to_string()
    }
}

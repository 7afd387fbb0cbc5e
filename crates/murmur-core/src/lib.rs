pub mod types;
pub mod session;
pub mod reveal;
pub mod normalize;
pub mod client;
pub mod notice;
pub mod conversation;

pub use types::{Author, Message, MessageId, SessionId};

pub use session::{InitState, Session};

pub use reveal::{RevealCursor, RevealEngine, RevealSettings, RevealSink, RunId, MIN_TICK};

pub use normalize::{normalize_reply, NormalizedReply, ReplySource};

pub use client::{BackendError, BackendResult, ChatBackend, ChatRequest, HttpBackend};

pub use notice::{Notice, Severity};

pub use conversation::{
    ChatEvent,
    ChatSettings,
    ChatSnapshot,
    Conversation,
    InitOutcome,
    SubmitError,
    TurnOutcome,
};

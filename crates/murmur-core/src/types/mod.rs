pub mod message;
pub mod session_id;

pub use message::{Author, Message, MessageId};
pub use session_id::SessionId;

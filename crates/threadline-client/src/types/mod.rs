pub mod chat;
pub mod message;
pub mod thread;

pub use chat::{ChatStreamRequest, ChatTurn, NewMessage};
pub use message::{Attachment, Message, MessageId, MessageKey, PendingId, Role};
pub use thread::{Thread, ThreadId, DEFAULT_THREAD_TITLE};

//! Client side of Threadline: domain types, the HTTP gateway to the thread
//! backend, and the incremental chat stream parser.

pub mod config;
pub mod error;
pub mod gateway;
pub mod stream;
pub mod types;

pub use config::ClientConfig;
pub use error::{GatewayError, Result, StreamError};
pub use gateway::{ApiClient, ByteStream, ChatGateway};
pub use stream::{
    cancellable, consume_stream, observe_fn, CancelHandle, CancelRegistration, Frame,
    StreamObserver, StreamOutcome, StreamParser, WireFormat,
};
pub use types::{
    Attachment, ChatStreamRequest, ChatTurn, Message, MessageId, MessageKey, NewMessage, PendingId,
    Role, Thread, ThreadId, DEFAULT_THREAD_TITLE,
};

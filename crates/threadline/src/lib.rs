//! # Threadline
//!
//! Thread-based chat conversations against a remote thread/message backend,
//! with replies streamed token by token.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use threadline::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = ThreadlineBuilder::new()
//!         .base_url("http://localhost:8000")
//!         .build()
//!         .await?;
//!
//!     let reply = store.send_message("What's the weather in SF?", Vec::new(), None).await?;
//!     println!("{}", reply.content);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Watching a reply stream in
//!
//! ```rust,no_run
//! use threadline::prelude::*;
//!
//! # async fn example(store: ConversationStore) -> anyhow::Result<()> {
//! let mut updates = store.subscribe();
//! tokio::spawn(async move {
//!     while updates.changed().await.is_ok() {
//!         let state = updates.borrow_and_update().clone();
//!         if let Some(message) = state.current_thread_id.as_ref().and_then(|id| state.streaming_message(id)) {
//!             println!("{}", message.content);
//!         }
//!     }
//! });
//!
//! store.send_message("Explain Rust ownership", Vec::new(), None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! - **threadline-client**: domain types, the HTTP gateway and the chat stream parser
//! - **threadline-store**: conversation state, send/cancel orchestration
//!
//! The `threadline-api` binary in the repository is the same-origin chat
//! proxy that the default chat path points at.

pub use threadline_client as client;
pub use threadline_store as store;

pub use threadline_client::{
    ApiClient, ChatGateway, ClientConfig, Message, MessageId, Role, Thread, ThreadId, WireFormat,
};
pub use threadline_store::{ConversationState, ConversationStore, StoreConfig, StoreError};

/// High-level builder wiring an [`ApiClient`] into a [`ConversationStore`]
pub mod builder;

/// Convenient prelude with commonly used types
pub mod prelude {
    pub use crate::builder::ThreadlineBuilder;
    pub use crate::client::{Attachment, ChatGateway, Message, Role, Thread, ThreadId, WireFormat};
    pub use crate::store::{ConversationState, ConversationStore, StoreError};
}

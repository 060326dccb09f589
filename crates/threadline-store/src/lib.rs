//! Conversation state for Threadline.
//!
//! [`ConversationStore`] owns the thread list, the per-thread message cache
//! and the in-flight reply streams. State changes go through the pure
//! [`reduce`] function; consumers read [`ConversationState`] snapshots.

pub mod error;
pub mod reducer;
pub mod state;
pub mod store;

pub use error::{Result, StoreError};
pub use reducer::{reduce, Action};
pub use state::ConversationState;
pub use store::{ConversationStore, ConversationStoreBuilder, StoreConfig};

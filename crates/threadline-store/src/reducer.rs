//! Pure state transitions.
//!
//! [`reduce`] never performs I/O and never reads the clock; timestamps travel
//! inside the actions.

use chrono::{DateTime, Utc};
use threadline_client::{Message, MessageId, MessageKey, Thread, ThreadId};

use crate::state::ConversationState;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Replace the thread list
    ThreadsLoaded(Vec<Thread>),

    /// Insert at the head of the list and select it
    ThreadCreated(Thread),

    /// Insert or replace a thread fetched on demand, leaving selection alone
    ThreadFetched(Thread),

    ThreadSelected(Option<ThreadId>),

    /// Drop a thread and its messages; selection moves to the first remaining thread
    ThreadDeleted(ThreadId),

    ThreadTitleUpdated {
        thread_id: ThreadId,
        title: String,
        at: DateTime<Utc>,
    },

    /// Replace the cached messages of one thread. Records belonging to other
    /// threads are discarded; pending messages of the thread survive.
    MessagesLoaded {
        thread_id: ThreadId,
        messages: Vec<Message>,
    },

    MessageAppended {
        message: Message,
        at: DateTime<Utc>,
    },

    MessageContentUpdated {
        key: MessageKey,
        content: String,
    },

    /// Stream is over: set final content, stop streaming, adopt the server id if any
    MessageFinalized {
        key: MessageKey,
        id: Option<MessageId>,
        content: String,
    },

    MessagesCleared(ThreadId),

    LoadingSet(bool),
    ThreadsLoadingSet(bool),
    SendStarted(ThreadId),
    SendFinished(ThreadId),
    ErrorRecorded(String),
    ErrorCleared,
}

pub fn reduce(state: &ConversationState, action: Action) -> ConversationState {
    let mut next = state.clone();

    match action {
        Action::ThreadsLoaded(threads) => {
            next.threads = threads;
        }

        Action::ThreadCreated(thread) => {
            next.threads.retain(|t| t.id != thread.id);
            next.current_thread_id = Some(thread.id.clone());
            next.threads.insert(0, thread);
        }

        Action::ThreadFetched(thread) => match next.threads.iter_mut().find(|t| t.id == thread.id) {
            Some(existing) => *existing = thread,
            None => next.threads.push(thread),
        },

        Action::ThreadSelected(thread_id) => {
            next.current_thread_id = thread_id;
        }

        Action::ThreadDeleted(thread_id) => {
            next.threads.retain(|t| t.id != thread_id);
            next.messages.retain(|m| m.thread_id != thread_id);
            next.sending.remove(&thread_id);

            if next.current_thread_id.as_ref() == Some(&thread_id) {
                next.current_thread_id = next.threads.first().map(|t| t.id.clone());
            }
        }

        Action::ThreadTitleUpdated { thread_id, title, at } => {
            if let Some(thread) = next.threads.iter_mut().find(|t| t.id == thread_id) {
                thread.title = title;
                thread.touch(at);
            }
        }

        Action::MessagesLoaded { thread_id, messages } => {
            let mut kept_pending = Vec::new();
            next.messages.retain(|m| {
                if m.thread_id != thread_id {
                    return true;
                }
                if m.key.is_pending() || m.is_streaming {
                    kept_pending.push(m.clone());
                }
                false
            });

            next.messages
                .extend(messages.into_iter().filter(|m| m.thread_id == thread_id));
            next.messages.extend(kept_pending);
        }

        Action::MessageAppended { message, at } => {
            // Messages only live in known threads
            let known = next.threads.iter().any(|t| t.id == message.thread_id);
            if !known {
                return next;
            }

            if message.is_streaming {
                for other in next
                    .messages
                    .iter_mut()
                    .filter(|m| m.thread_id == message.thread_id && m.is_streaming)
                {
                    other.is_streaming = false;
                }
            }

            if let Some(thread) = next.threads.iter_mut().find(|t| t.id == message.thread_id) {
                thread.touch(at);
            }
            next.messages.push(message);
        }

        Action::MessageContentUpdated { key, content } => {
            if let Some(message) = next.messages.iter_mut().find(|m| m.key == key) {
                message.content = content;
            }
        }

        Action::MessageFinalized { key, id, content } => {
            if let Some(message) = next.messages.iter_mut().find(|m| m.key == key) {
                message.content = content;
                message.is_streaming = false;
                if let Some(id) = id {
                    message.key = MessageKey::Persisted(id);
                }
            }
        }

        Action::MessagesCleared(thread_id) => {
            next.messages.retain(|m| m.thread_id != thread_id);
        }

        Action::LoadingSet(value) => next.is_loading = value,
        Action::ThreadsLoadingSet(value) => next.is_loading_threads = value,

        Action::SendStarted(thread_id) => {
            next.sending.insert(thread_id);
        }
        Action::SendFinished(thread_id) => {
            next.sending.remove(&thread_id);
        }

        Action::ErrorRecorded(message) => next.last_error = Some(message),
        Action::ErrorCleared => next.last_error = None,
    }

    next
}

use std::collections::HashSet;

use threadline_client::{Message, MessageId, Thread, ThreadId};

/// Immutable snapshot of everything the conversation UI renders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    /// Most recently created first
    pub threads: Vec<Thread>,

    /// Cached messages of every loaded thread, in arrival order
    pub messages: Vec<Message>,

    pub current_thread_id: Option<ThreadId>,
    pub is_loading: bool,
    pub is_loading_threads: bool,

    /// Threads with a `send_message` in flight
    pub sending: HashSet<ThreadId>,

    pub last_error: Option<String>,
}

impl ConversationState {
    pub fn thread(&self, thread_id: &ThreadId) -> Option<&Thread> {
        self.threads.iter().find(|t| &t.id == thread_id)
    }

    pub fn current_thread(&self) -> Option<&Thread> {
        self.current_thread_id.as_ref().and_then(|id| self.thread(id))
    }

    pub fn messages_in<'a>(&'a self, thread_id: &'a ThreadId) -> impl Iterator<Item = &'a Message> + 'a {
        self.messages.iter().filter(move |m| &m.thread_id == thread_id)
    }

    /// Messages of the current thread; empty when nothing is selected
    pub fn current_messages(&self) -> Vec<Message> {
        match &self.current_thread_id {
            Some(id) => self.messages_in(id).cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn streaming_message(&self, thread_id: &ThreadId) -> Option<&Message> {
        self.messages
            .iter()
            .find(|m| &m.thread_id == thread_id && m.is_streaming)
    }

    pub fn is_sending(&self, thread_id: &ThreadId) -> bool {
        self.sending.contains(thread_id)
    }

    /// Parent for the next message appended to `thread_id`
    pub fn last_persisted_id(&self, thread_id: &ThreadId) -> Option<&MessageId> {
        self.messages
            .iter()
            .filter(|m| &m.thread_id == thread_id)
            .filter_map(Message::id)
            .last()
    }
}

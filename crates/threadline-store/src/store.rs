use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use threadline_client::{
    consume_stream, observe_fn, Attachment, CancelHandle, CancelRegistration, ChatGateway,
    ChatStreamRequest, ChatTurn, Message, MessageId, MessageKey, NewMessage, Role, StreamError,
    StreamOutcome, StreamParser, Thread, ThreadId,
};

use crate::error::{Result, StoreError};
use crate::reducer::{reduce, Action};
use crate::state::ConversationState;

/// Behaviour switches for [`ConversationStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Abort the reply stream of the thread being left on `switch_thread`
    pub cancel_on_switch: bool,

    /// Ask the backend for a title after the first exchange of an untitled thread
    pub auto_title: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cancel_on_switch: true,
            auto_title: true,
        }
    }
}

pub struct ConversationStoreBuilder {
    gateway: Arc<dyn ChatGateway>,
    config: StoreConfig,
    initial_state: ConversationState,
}

impl ConversationStoreBuilder {
    pub fn cancel_on_switch(mut self, enabled: bool) -> Self {
        self.config.cancel_on_switch = enabled;
        self
    }

    pub fn auto_title(mut self, enabled: bool) -> Self {
        self.config.auto_title = enabled;
        self
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Start from a previously captured snapshot instead of an empty state
    pub fn initial_state(mut self, state: ConversationState) -> Self {
        self.initial_state = state;
        self
    }

    pub fn build(self) -> ConversationStore {
        let (state, _) = watch::channel(Arc::new(self.initial_state));

        ConversationStore {
            inner: Arc::new(StoreInner {
                gateway: self.gateway,
                config: self.config,
                state,
                streams: Mutex::new(HashMap::new()),
            }),
        }
    }
}

struct StoreInner {
    gateway: Arc<dyn ChatGateway>,
    config: StoreConfig,
    state: watch::Sender<Arc<ConversationState>>,
    streams: Mutex<HashMap<ThreadId, CancelHandle>>,
}

/// Single writer of [`ConversationState`]
///
/// Every action runs its remote calls through the [`ChatGateway`] and applies
/// the results with [`reduce`]. Readers get immutable snapshots through
/// [`ConversationStore::snapshot`] or a [`watch::Receiver`].
///
/// Failures are recorded in `last_error` and also returned, except
/// [`StoreError::NoActiveThread`] and [`StoreError::Cancelled`], which leave
/// the error field alone.
#[derive(Clone)]
pub struct ConversationStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStore").finish_non_exhaustive()
    }
}

impl ConversationStore {
    pub fn new(gateway: Arc<dyn ChatGateway>) -> Self {
        Self::builder(gateway).build()
    }

    pub fn builder(gateway: Arc<dyn ChatGateway>) -> ConversationStoreBuilder {
        ConversationStoreBuilder {
            gateway,
            config: StoreConfig::default(),
            initial_state: ConversationState::default(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    // ========================================================================
    // READ SIDE
    // ========================================================================

    pub fn subscribe(&self) -> watch::Receiver<Arc<ConversationState>> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> Arc<ConversationState> {
        self.inner.state.borrow().clone()
    }

    pub fn current_thread(&self) -> Option<Thread> {
        self.snapshot().current_thread().cloned()
    }

    pub fn current_messages(&self) -> Vec<Message> {
        self.snapshot().current_messages()
    }

    // ========================================================================
    // DISPATCH
    // ========================================================================

    fn dispatch(&self, action: Action) {
        self.inner.state.send_modify(|state| {
            let next = reduce(state, action);
            *state = Arc::new(next);
        });
    }

    /// Mark `thread_id` as sending unless a send is already in flight there
    fn begin_send(&self, thread_id: &ThreadId) -> bool {
        self.inner.state.send_if_modified(|state| {
            if state.is_sending(thread_id) {
                return false;
            }
            let next = reduce(state, Action::SendStarted(thread_id.clone()));
            *state = Arc::new(next);
            true
        })
    }

    fn record_error(&self, error: &StoreError) {
        if error.is_recorded() {
            tracing::error!(error = %error, "conversation action failed");
            self.dispatch(Action::ErrorRecorded(error.to_string()));
        }
    }

    fn fail<T>(&self, error: impl Into<StoreError>) -> Result<T> {
        let error = error.into();
        self.record_error(&error);
        Err(error)
    }

    pub fn clear_error(&self) {
        self.dispatch(Action::ErrorCleared);
    }

    // ========================================================================
    // THREADS
    // ========================================================================

    /// Create a thread remotely, put it at the head of the list and select it
    pub async fn create_thread(&self, title: Option<&str>) -> Result<ThreadId> {
        let previous = self.snapshot().current_thread_id.clone();

        self.dispatch(Action::LoadingSet(true));
        let created = self.inner.gateway.create_thread(title).await;
        self.dispatch(Action::LoadingSet(false));

        match created {
            Ok(thread) => {
                let thread_id = thread.id.clone();
                tracing::info!(thread_id = %thread_id, "thread created");

                if let Some(previous) = previous {
                    self.leave_thread(&previous).await;
                }
                self.dispatch(Action::ThreadCreated(thread));
                Ok(thread_id)
            }
            Err(e) => self.fail(e),
        }
    }

    pub async fn load_threads(&self) -> Result<()> {
        self.dispatch(Action::ThreadsLoadingSet(true));
        let listed = self.inner.gateway.list_threads().await;
        self.dispatch(Action::ThreadsLoadingSet(false));

        match listed {
            Ok(threads) => {
                tracing::debug!(count = threads.len(), "threads loaded");
                self.dispatch(Action::ThreadsLoaded(threads));
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    /// Select `thread_id` and load its messages. Threads missing locally are
    /// fetched first; an unknown thread changes nothing.
    pub async fn switch_thread(&self, thread_id: &ThreadId) -> Result<()> {
        let snapshot = self.snapshot();
        if snapshot.current_thread_id.as_ref() == Some(thread_id) {
            return Ok(());
        }

        if snapshot.thread(thread_id).is_none() {
            match self.inner.gateway.get_thread(thread_id).await {
                Ok(Some(thread)) => self.dispatch(Action::ThreadFetched(thread)),
                Ok(None) => {
                    tracing::warn!(thread_id = %thread_id, "cannot switch to unknown thread");
                    return Err(StoreError::ThreadNotFound(thread_id.clone()));
                }
                Err(e) => return self.fail(e),
            }
        }

        if let Some(previous) = &snapshot.current_thread_id {
            self.leave_thread(previous).await;
        }

        self.dispatch(Action::ThreadSelected(Some(thread_id.clone())));
        self.load_messages(thread_id).await
    }

    async fn leave_thread(&self, thread_id: &ThreadId) {
        if self.inner.config.cancel_on_switch && self.cancel_stream(thread_id).await {
            tracing::debug!(thread_id = %thread_id, "cancelled reply stream of the thread left behind");
        }
    }

    /// Local removal of a thread and its messages
    pub async fn delete_thread(&self, thread_id: &ThreadId) {
        self.cancel_stream(thread_id).await;
        self.dispatch(Action::ThreadDeleted(thread_id.clone()));
        tracing::info!(thread_id = %thread_id, "thread deleted");
    }

    /// Local title edit; other threads are left untouched
    pub fn update_thread_title(&self, thread_id: &ThreadId, title: &str) {
        self.dispatch(Action::ThreadTitleUpdated {
            thread_id: thread_id.clone(),
            title: title.trim().to_string(),
            at: Utc::now(),
        });
    }

    // ========================================================================
    // MESSAGES
    // ========================================================================

    pub async fn load_messages(&self, thread_id: &ThreadId) -> Result<()> {
        self.dispatch(Action::LoadingSet(true));
        let listed = self.inner.gateway.list_messages(thread_id).await;
        self.dispatch(Action::LoadingSet(false));

        match listed {
            Ok(messages) => {
                tracing::debug!(thread_id = %thread_id, count = messages.len(), "messages loaded");
                self.dispatch(Action::MessagesLoaded {
                    thread_id: thread_id.clone(),
                    messages,
                });
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    pub fn clear_messages(&self, thread_id: &ThreadId) {
        self.dispatch(Action::MessagesCleared(thread_id.clone()));
    }

    /// Send `content` to `thread_id` (or the current thread) and stream the
    /// assistant reply into state. Returns the finalized reply.
    pub async fn send_message(
        &self,
        content: &str,
        attachments: Vec<Attachment>,
        thread_id: Option<ThreadId>,
    ) -> Result<Message> {
        let thread_id = match thread_id.or_else(|| self.snapshot().current_thread_id.clone()) {
            Some(thread_id) => thread_id,
            None => return Err(StoreError::NoActiveThread),
        };

        if self.snapshot().thread(&thread_id).is_none() {
            tracing::warn!(thread_id = %thread_id, "cannot send to unknown thread");
            return Err(StoreError::ThreadNotFound(thread_id));
        }

        if !self.begin_send(&thread_id) {
            return self.fail(StoreError::SendInFlight(thread_id));
        }

        // Armed before the first remote call so delete/switch can stop the send at any step
        let (cancel, registration) = CancelHandle::new_pair();
        self.inner
            .streams
            .lock()
            .await
            .insert(thread_id.clone(), cancel.clone());

        if !attachments.is_empty() {
            // TODO: upload attachments once the backend exposes a files endpoint
            tracing::warn!(
                thread_id = %thread_id,
                count = attachments.len(),
                "attachments are not uploaded yet and were ignored"
            );
        }

        self.dispatch(Action::LoadingSet(true));
        let sent = self.exchange(&thread_id, content, &cancel, registration).await;
        self.inner.streams.lock().await.remove(&thread_id);
        self.dispatch(Action::LoadingSet(false));
        self.dispatch(Action::SendFinished(thread_id.clone()));

        match sent {
            Ok(reply) => {
                if self.inner.config.auto_title {
                    self.generate_title(&thread_id).await;
                }
                Ok(reply)
            }
            Err(error) => {
                self.record_error(&error);
                Err(error)
            }
        }
    }

    /// Create a thread and send the first message into it
    pub async fn start_conversation(
        &self,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> Result<(ThreadId, Message)> {
        let thread_id = self.create_thread(None).await?;
        let reply = self
            .send_message(content, attachments, Some(thread_id.clone()))
            .await?;
        Ok((thread_id, reply))
    }

    /// Stop the exchange when its send was cancelled or its thread is gone
    fn ensure_live(&self, thread_id: &ThreadId, cancel: &CancelHandle) -> Result<()> {
        if cancel.is_cancelled() || self.snapshot().thread(thread_id).is_none() {
            tracing::info!(thread_id = %thread_id, "send cancelled");
            return Err(StoreError::Cancelled);
        }
        Ok(())
    }

    async fn exchange(
        &self,
        thread_id: &ThreadId,
        content: &str,
        cancel: &CancelHandle,
        registration: CancelRegistration,
    ) -> Result<Message> {
        self.ensure_live(thread_id, cancel)?;

        let gateway = &self.inner.gateway;
        let parent = self
            .snapshot()
            .last_persisted_id(thread_id)
            .cloned()
            .unwrap_or_else(MessageId::root);

        let user_id = gateway
            .create_message(
                thread_id,
                NewMessage::new(Role::User, content).with_parent(parent.clone()),
            )
            .await?;

        let now = Utc::now();
        let user_message = Message::persisted(user_id.clone(), thread_id.clone(), Role::User, content, now)
            .with_parent(parent);
        self.dispatch(Action::MessageAppended {
            message: user_message,
            at: now,
        });
        self.ensure_live(thread_id, cancel)?;

        let history: Vec<ChatTurn> = self
            .snapshot()
            .messages_in(thread_id)
            .filter(|m| !m.is_streaming)
            .map(ChatTurn::from)
            .collect();

        let now = Utc::now();
        let mut reply = Message::streaming_placeholder(thread_id.clone(), Some(user_id.clone()), now);
        let pending_key = reply.key.clone();
        self.dispatch(Action::MessageAppended {
            message: reply.clone(),
            at: now,
        });

        let request = ChatStreamRequest::new(history).with_origin(thread_id.clone(), user_id.clone());
        let outcome = match self.stream_reply(&pending_key, request, registration).await {
            Ok(outcome) => outcome,
            Err(error) => {
                let partial = self.content_of(&pending_key);
                self.finalize(&mut reply, None, partial);
                if matches!(error, StoreError::Cancelled) {
                    tracing::info!(thread_id = %thread_id, "reply stream cancelled");
                }
                return Err(error);
            }
        };

        let stored = gateway
            .create_message(
                thread_id,
                NewMessage::new(Role::Assistant, outcome.text.clone()).with_parent(user_id),
            )
            .await;

        match stored {
            Ok(assistant_id) => {
                self.finalize(&mut reply, Some(assistant_id), outcome.text);
                self.ensure_live(thread_id, cancel)?;
                Ok(reply)
            }
            Err(e) => {
                self.finalize(&mut reply, None, outcome.text);
                Err(e.into())
            }
        }
    }

    async fn stream_reply(
        &self,
        key: &MessageKey,
        request: ChatStreamRequest,
        registration: CancelRegistration,
    ) -> Result<StreamOutcome> {
        let body = self.inner.gateway.open_chat_stream(request).await?;
        let body = registration.wrap(body);

        let store = self.clone();
        let key = key.clone();
        let mut observer = observe_fn(move |text: &str| {
            store.dispatch(Action::MessageContentUpdated {
                key: key.clone(),
                content: text.to_string(),
            });
        });

        let parser = StreamParser::new(self.inner.gateway.wire_format());
        consume_stream(body, parser, &mut observer)
            .await
            .map_err(|error| match error {
                StreamError::Cancelled => StoreError::Cancelled,
                other => StoreError::Stream(other),
            })
    }

    fn content_of(&self, key: &MessageKey) -> String {
        self.snapshot()
            .messages
            .iter()
            .find(|m| &m.key == key)
            .map(|m| m.content.trim().to_string())
            .unwrap_or_default()
    }

    fn finalize(&self, reply: &mut Message, id: Option<MessageId>, content: String) {
        self.dispatch(Action::MessageFinalized {
            key: reply.key.clone(),
            id: id.clone(),
            content: content.clone(),
        });

        reply.content = content;
        reply.is_streaming = false;
        if let Some(id) = id {
            reply.key = MessageKey::Persisted(id);
        }
    }

    async fn generate_title(&self, thread_id: &ThreadId) {
        let turns: Vec<ChatTurn> = {
            let snapshot = self.snapshot();
            match snapshot.thread(thread_id) {
                Some(thread) if thread.has_default_title() => {}
                _ => return,
            }
            snapshot
                .messages_in(thread_id)
                .filter(|m| !m.is_streaming)
                .map(ChatTurn::from)
                .collect()
        };

        // Only the opening exchange
        if turns.len() != 2 {
            return;
        }

        match self.inner.gateway.generate_title(thread_id, &turns).await {
            Ok(title) if !title.trim().is_empty() => {
                tracing::debug!(thread_id = %thread_id, title = %title, "thread titled");
                self.update_thread_title(thread_id, &title);
            }
            Ok(_) => tracing::debug!(thread_id = %thread_id, "backend returned an empty title"),
            Err(e) => tracing::warn!(thread_id = %thread_id, error = %e, "title generation failed"),
        }
    }

    // ========================================================================
    // CANCELLATION
    // ========================================================================

    /// Abort the reply stream of `thread_id`. Returns whether one was running.
    pub async fn cancel_stream(&self, thread_id: &ThreadId) -> bool {
        match self.inner.streams.lock().await.remove(thread_id) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Abort every running reply stream
    pub async fn shutdown(&self) {
        let handles: Vec<CancelHandle> = self
            .inner
            .streams
            .lock()
            .await
            .drain()
            .map(|(_, handle)| handle)
            .collect();

        tracing::info!(count = handles.len(), "cancelling reply streams");
        for handle in handles {
            handle.cancel();
        }
    }
}

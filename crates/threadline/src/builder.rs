use anyhow::{Context, Result};
use std::sync::Arc;

use crate::{ApiClient, ClientConfig, ConversationStore, StoreConfig, WireFormat};

/// Builds a [`ConversationStore`] backed by the HTTP gateway
///
/// # Example
///
/// ```rust,no_run
/// use threadline::prelude::*;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let store = ThreadlineBuilder::new()
///     .base_url("http://localhost:8000")
///     .wire_format(WireFormat::EventStream)
///     .cancel_on_switch(false)
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ThreadlineBuilder {
    base_url: Option<String>,
    chat_path: Option<String>,
    wire_format: WireFormat,
    timeout_secs: Option<u64>,
    session_token: Option<String>,
    store: StoreConfig,
}

impl ThreadlineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base URL of the thread backend (required)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Chat endpoint, relative to the base URL or absolute (default: /api/chat)
    pub fn chat_path(mut self, path: impl Into<String>) -> Self {
        self.chat_path = Some(path.into());
        self
    }

    pub fn wire_format(mut self, format: WireFormat) -> Self {
        self.wire_format = format;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Bearer token sent with every backend request
    pub fn session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Cancel a thread's reply stream when leaving it (default: true)
    pub fn cancel_on_switch(mut self, enabled: bool) -> Self {
        self.store.cancel_on_switch = enabled;
        self
    }

    /// Ask the backend for a title after the first exchange (default: true)
    pub fn auto_title(mut self, enabled: bool) -> Self {
        self.store.auto_title = enabled;
        self
    }

    fn client_config(&self) -> Result<ClientConfig> {
        let base_url = self
            .base_url
            .clone()
            .context("Backend URL is required. Call .base_url(url)")?;

        let mut config = ClientConfig::new(base_url).with_wire_format(self.wire_format);
        if let Some(path) = &self.chat_path {
            config = config.with_chat_path(path.clone());
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout_secs(secs);
        }
        Ok(config)
    }

    /// Build the store
    ///
    /// # Errors
    ///
    /// Fails when no base URL was given or the HTTP client cannot be created.
    pub async fn build(self) -> Result<ConversationStore> {
        let client = ApiClient::new(self.client_config()?).context("Failed to create API client")?;

        if let Some(token) = self.session_token {
            client.set_session_token(Some(token)).await;
        }

        Ok(ConversationStore::builder(Arc::new(client))
            .config(self.store)
            .build())
    }
}

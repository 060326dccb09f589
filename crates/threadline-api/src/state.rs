use std::sync::Arc;

use crate::config::Config;
use crate::error::ApiResult;
use crate::provider::ProviderClient;

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub provider: Arc<ProviderClient>,
}

impl AppState {
    pub fn new(config: Config) -> ApiResult<Self> {
        let provider = ProviderClient::new(config.llm.clone(), &config.llm_api_key)?;

        Ok(Self {
            config: Arc::new(config),
            provider: Arc::new(provider),
        })
    }
}

use std::sync::Arc;

use crate::auth::{PasswordService, TokenManager};
use crate::config::AppConfig;
use crate::database::{open_store, Store};
use crate::services::UploadStore;

/// Everything a request handler needs, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub tokens: TokenManager,
    pub passwords: PasswordService,
    pub uploads: UploadStore,
}

impl AppState {
    /// Open the configured store and build the rest around it
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let store = open_store(&config.database).await?;
        Self::with_store(config, store)
    }

    pub fn with_store(config: AppConfig, store: Arc<dyn Store>) -> anyhow::Result<Self> {
        let tokens = TokenManager::new(&config.security)?;
        let uploads = UploadStore::new(&config.uploads)?;
        Ok(Self {
            config: Arc::new(config),
            store,
            tokens,
            passwords: PasswordService::new(),
            uploads,
        })
    }
}

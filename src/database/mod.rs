pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{Store, StoreResult};

use std::sync::Arc;
use tracing::info;

use crate::config::{DatabaseConfig, StoreBackend};

/// Build the store selected by configuration
pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn Store>, DatabaseError> {
    match config.backend {
        StoreBackend::Postgres => {
            let db = DatabaseManager::connect(config).await?;
            Ok(Arc::new(PgStore::new(db)))
        }
        StoreBackend::Memory => {
            info!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

pub mod store;

use std::sync::Arc;

use shared_config::AppConfig;

pub use store::{ClinicStore, StoreError};

/// Shared application state handed to every cell router and service.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<ClinicStore>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            store: Arc::new(ClinicStore::new()),
        }
    }
}

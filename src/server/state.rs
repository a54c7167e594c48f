use crate::config::cli::LocalStorage;
use crate::config::toml_config::TomlConfig;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TomlConfig>,
    pub storage: LocalStorage,
}

impl AppState {
    pub fn new(config: TomlConfig) -> Self {
        let storage = LocalStorage::new(config.output.root.clone());
        Self {
            config: Arc::new(config),
            storage,
        }
    }
}

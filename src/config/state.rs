// Application state module
// Shared runtime state handed to every connection

use crate::counter::Dispatcher;
use crate::store::SharedStore;

use super::types::Config;

/// Application state
pub struct AppState {
    pub config: Config,
    pub dispatcher: Dispatcher,
}

impl AppState {
    /// Bind the configured counter key to an opened store
    pub fn new(config: &Config, store: SharedStore) -> Self {
        Self {
            config: config.clone(),
            dispatcher: Dispatcher::new(store, config.store.key.clone()),
        }
    }
}

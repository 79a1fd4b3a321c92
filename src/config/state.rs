// Application state module
// Shared by every connection for the lifetime of the process

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use super::types::Config;
use crate::predictor::Predictor;

/// Application state
pub struct AppState {
    pub config: Config,
    /// Built once at startup and never replaced
    pub predictor: Arc<dyn Predictor>,
    pub active_connections: AtomicUsize,
}

impl AppState {
    pub fn new(config: Config, predictor: Arc<dyn Predictor>) -> Self {
        Self {
            config,
            predictor,
            active_connections: AtomicUsize::new(0),
        }
    }
}

//! Application state shared across all request handlers

use std::sync::Arc;

use crate::config::Config;
use crate::database::Database;
use crate::metrics::HitCounter;

/// Cheap to clone: every field is reference counted, so all handlers see the
/// same store, config and counter.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub hits: Arc<HitCounter>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
            hits: Arc::new(HitCounter::default()),
        }
    }
}

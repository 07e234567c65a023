//! Shared application state for all routes.

use crate::config::AppConfig;
use crate::service::SampleService;
use crate::store::RecordController;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub samples: Arc<SampleService>,
    /// Probed by `/ready`.
    pub store: Arc<dyn RecordController>,
    pub config: Arc<AppConfig>,
}

//! Startup wiring: tracing, store selection and service construction.

use crate::config::{AppConfig, StoreBackend};
use crate::error::BootstrapError;
use crate::events::{spawn_event_logger, EventBus};
use crate::service::{sample, ResponseNormalizer, SampleService};
use crate::state::AppState;
use crate::store::{
    connect, ensure_collection_tables, ensure_database_exists, MemoryRecordController, PgRecordController,
    RecordController,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. `RUST_LOG` wins over `default_directive`.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

async fn sample_store(config: &AppConfig) -> Result<Arc<dyn RecordController>, BootstrapError> {
    match config.store_backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryRecordController::new(sample::COLLECTION))),
        StoreBackend::Postgres => {
            ensure_database_exists(&config.database_url).await?;
            let pool = connect(&config.database_url, config.database_max_connections).await?;
            ensure_collection_tables(&pool, &config.data_schema, &[sample::COLLECTION]).await?;
            Ok(Arc::new(PgRecordController::new(pool, &config.data_schema, sample::COLLECTION)))
        }
    }
}

/// Build the store, the event bus (with its logger) and the services for `config`.
pub async fn build_state(config: AppConfig) -> Result<AppState, BootstrapError> {
    let store = sample_store(&config).await?;
    let events = EventBus::default();
    spawn_event_logger(&events);

    let normalizer = ResponseNormalizer::new(config.normalizer_policy(), events);
    let samples = Arc::new(SampleService::new(store.clone(), normalizer));
    tracing::info!(
        app = %config.app_name,
        backend = %config.store_backend,
        collection = store.collection(),
        development = config.is_development(),
        "application state ready"
    );
    Ok(AppState {
        samples,
        store,
        config: Arc::new(config),
    })
}

//! crud-scaffold: generic CRUD-over-HTTP scaffold. Client query options become bounded,
//! storage-agnostic query descriptors; store results become uniform response envelopes.

pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod query;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use app::{build_state, init_tracing};
pub use config::{AppConfig, StoreBackend};
pub use error::{BootstrapError, ConfigError, ControllerError, ServiceError};
pub use events::{AppEvent, EventBus};
pub use query::{build_query, build_wildcard_options, QueryDescriptor, QueryLimits, QueryOptions};
pub use response::ResponseEnvelope;
pub use routes::build_router;
pub use service::{ResponseNormalizer, SampleService};
pub use state::AppState;
pub use store::{MemoryRecordController, PgRecordController, RecordController};

//! Safe SQL for JSONB document collections: table names from configuration only,
//! field names and values always bound as parameters.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;

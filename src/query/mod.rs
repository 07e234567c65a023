//! Query building: client options in, storage-agnostic query descriptor out.

mod builder;
mod descriptor;
mod options;
mod wildcard;

pub use builder::build_query;
pub use descriptor::*;
pub use options::{QueryLimits, QueryOptions, CONTROL_KEYS};
pub use wildcard::build_wildcard_options;

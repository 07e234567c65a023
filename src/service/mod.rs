//! Service layer: generic response normalization plus entity services built on it.

pub mod root;
pub mod sample;
mod validation;

pub use root::{ErrorVerbosity, FormattedError, NormalizerPolicy, ResponseNormalizer};
pub use sample::SampleService;
pub use validation::{FieldFormat, RequestValidator, Schema, ValidationRule};

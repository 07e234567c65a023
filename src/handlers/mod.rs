//! HTTP handlers.

pub mod sample;

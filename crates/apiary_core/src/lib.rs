//! Core infrastructure for Apiary.
//!
//! - [`tracing_setup`] - Subscriber configuration for the `tracing` ecosystem

/// Tracing subscriber configuration.
pub mod tracing_setup;

pub use tracing_setup::{TracingError, TracingFormat, TracingSetup};

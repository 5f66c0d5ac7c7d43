//! Logging setup and span helpers shared by the reqtrace crates.

pub mod spans;
pub mod tracing_setup;

pub use tracing_setup::{TIME_LOG_TARGET, init_tracing};

//! Built-in report hooks.

mod tracing;

pub use self::tracing::TracingReportHook;

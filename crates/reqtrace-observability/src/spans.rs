//! Span helpers for reqtrace.
//!
//! All span names use the `reqtrace.` namespace prefix for low cardinality.

use reqtrace_core::correlation::current_correlation_id;
use tracing::Span;

/// Create span for one inbound request.
///
/// Every event emitted while the request's downstream future runs carries
/// the correlation id through this span.
#[inline]
pub fn request(correlation_id: &str) -> Span {
    tracing::info_span!("reqtrace.request", correlation_id = correlation_id)
}

/// Create span for an execution-like statement operation.
///
/// Parent: request
#[inline]
pub fn statement_execution(method: &str, correlation_key: &str) -> Span {
    let correlation_id = current_correlation_id(correlation_key)
        .map(|id| id.into_string())
        .unwrap_or_else(|| "none".to_string());
    tracing::debug_span!(
        "reqtrace.statement_execution",
        method = method,
        correlation_id = correlation_id,
    )
}

/// Create span for a statement-producing call on a pooled connection.
///
/// Parent: request
#[inline]
pub fn statement_request(kind: &str) -> Span {
    tracing::trace_span!("reqtrace.statement_request", kind = kind)
}

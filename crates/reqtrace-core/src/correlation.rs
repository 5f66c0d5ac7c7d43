//! Correlation ID access on top of the diagnostic context.

use crate::context;
use crate::ids::CorrelationId;
use serde::{Deserialize, Deserializer};

/// Context key holding the primary correlation value unless configured otherwise.
pub const DEFAULT_CORRELATION_KEY: &str = "Correlation-ID";

/// `key`, or [`DEFAULT_CORRELATION_KEY`] when `key` is blank.
pub fn key_or_default(key: &str) -> &str {
    if key.trim().is_empty() {
        DEFAULT_CORRELATION_KEY
    } else {
        key
    }
}

/// Serde helper for configured context keys; blank keys fall back to
/// [`DEFAULT_CORRELATION_KEY`].
pub fn deserialize_key<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let key = String::deserialize(deserializer)?;
    Ok(key_or_default(&key).to_string())
}

/// Correlation value stored under `key` in the current context.
pub fn current_correlation_id(key: &str) -> Option<CorrelationId> {
    context::get(key)
        .filter(|value| !value.is_empty())
        .map(CorrelationId::from)
}

/// Correlation value for `key`, or a fresh one when nothing is in scope.
pub fn current_or_new(key: &str) -> CorrelationId {
    current_correlation_id(key).unwrap_or_else(CorrelationId::generate)
}

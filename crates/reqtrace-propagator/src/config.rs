//! Propagator configuration.

use reqtrace_core::DEFAULT_CORRELATION_KEY;
use reqtrace_core::correlation::deserialize_key;
use serde::{Deserialize, Serialize};

pub const HEADER_MAPPING_VAR: &str = "REQTRACE_HEADER_MAPPING";
pub const QUERY_MAPPING_VAR: &str = "REQTRACE_QUERY_MAPPING";
pub const CORRELATION_KEY_VAR: &str = "REQTRACE_CORRELATION_KEY";
pub const RESPONSE_HEADER_VAR: &str = "REQTRACE_RESPONSE_HEADER";

/// Configuration for a [`CorrelationPropagator`](crate::CorrelationPropagator).
///
/// Mappings are kept as raw JSON object text, exactly as they appear in a
/// server's configuration, and parsed when the propagator is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagatorConfig {
    /// Header name to context key mapping, e.g. `{"activityid": "Correlation-ID"}`
    pub header_mapping: Option<String>,

    /// Query parameter name to context key mapping
    pub query_mapping: Option<String>,

    /// Context key holding the primary correlation value; blank means
    /// `Correlation-ID`
    #[serde(deserialize_with = "deserialize_key")]
    pub correlation_key: String,

    /// Response header that echoes the correlation id (None = don't echo)
    pub response_header: Option<String>,
}

impl Default for PropagatorConfig {
    fn default() -> Self {
        Self {
            header_mapping: None,
            query_mapping: None,
            correlation_key: DEFAULT_CORRELATION_KEY.to_string(),
            response_header: None,
        }
    }
}

impl PropagatorConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from `REQTRACE_*` environment variables.
    ///
    /// Unset or blank variables keep their defaults.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let mut config = Self::default();
        config.header_mapping = var(HEADER_MAPPING_VAR);
        config.query_mapping = var(QUERY_MAPPING_VAR);
        if let Some(key) = var(CORRELATION_KEY_VAR) {
            config.correlation_key = key;
        }
        config.response_header = var(RESPONSE_HEADER_VAR);
        config
    }

    /// Set the header mapping text
    pub fn with_header_mapping(mut self, mapping: impl Into<String>) -> Self {
        self.header_mapping = Some(mapping.into());
        self
    }

    /// Set the query parameter mapping text
    pub fn with_query_mapping(mut self, mapping: impl Into<String>) -> Self {
        self.query_mapping = Some(mapping.into());
        self
    }

    /// Set the correlation key; blank keys are ignored
    pub fn with_correlation_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        if !key.trim().is_empty() {
            self.correlation_key = key;
        }
        self
    }

    /// Echo the correlation id on responses under this header
    pub fn with_response_header(mut self, header: impl Into<String>) -> Self {
        self.response_header = Some(header.into());
        self
    }
}

//! Combined configuration for both halves of the pipeline.

use reqtrace_core::Result;
use reqtrace_core::correlation::key_or_default;
use reqtrace_interceptor::{InstrumentorConfig, StatementInstrumentor};
use reqtrace_propagator::{CorrelationPropagator, PropagatorConfig};
use serde::{Deserialize, Serialize};

/// Propagator and instrumentor settings.
///
/// The instrumentor must read the context key the propagator writes;
/// [`ReqtraceConfig::from_env`] and [`ReqtraceConfig::from_json`] keep the
/// two aligned when only the propagator names a key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReqtraceConfig {
    pub propagator: PropagatorConfig,
    pub instrumentor: InstrumentorConfig,
}

impl ReqtraceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Propagator settings from `REQTRACE_*` variables; instrumentation is
    /// switched by the variable named in the default toggle.
    pub fn from_env() -> Self {
        Self::aligned(PropagatorConfig::from_env(), InstrumentorConfig::default())
    }

    /// Parse a JSON document with optional `propagator` and `instrumentor`
    /// sections.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let raw: serde_json::Value = serde_json::from_str(text)?;
        let instrumentor_names_key = raw
            .get("instrumentor")
            .and_then(|section| section.get("correlation_key"))
            .is_some();
        let config: Self = serde_json::from_value(raw)?;
        if instrumentor_names_key {
            return Ok(config);
        }
        Ok(Self::aligned(config.propagator, config.instrumentor))
    }

    fn aligned(propagator: PropagatorConfig, instrumentor: InstrumentorConfig) -> Self {
        let key = key_or_default(&propagator.correlation_key).to_string();
        let instrumentor = instrumentor.with_correlation_key(key);
        Self {
            propagator,
            instrumentor,
        }
    }

    pub fn with_propagator(mut self, propagator: PropagatorConfig) -> Self {
        self.propagator = propagator;
        self
    }

    pub fn with_instrumentor(mut self, instrumentor: InstrumentorConfig) -> Self {
        self.instrumentor = instrumentor;
        self
    }

    /// Build the propagator, validating its mappings.
    pub fn propagator(&self) -> Result<CorrelationPropagator> {
        let propagator = CorrelationPropagator::new(&self.propagator)?;
        tracing::info!(
            correlation_key = propagator.correlation_key(),
            "Correlation propagator configured"
        );
        Ok(propagator)
    }

    /// Build an instrumentor logging through tracing.
    pub fn instrumentor(&self) -> StatementInstrumentor {
        StatementInstrumentor::new(self.instrumentor.clone())
    }
}

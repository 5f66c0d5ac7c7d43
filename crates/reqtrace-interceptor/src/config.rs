//! Instrumentor configuration.

use crate::record::{RECORD_FIELDS, millis};
use crate::statement::StatementKind;
use reqtrace_core::DEFAULT_CORRELATION_KEY;
use reqtrace_core::correlation::{deserialize_key, key_or_default};
use reqtrace_core::toggle::{DEFAULT_REFRESH_INTERVAL, ToggleSource};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which producing calls get an instrumented statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapPolicy {
    /// `createStatement`, `prepareStatement` and `prepareCall`
    #[default]
    AllStatements,

    /// Only `prepareStatement` and `prepareCall`
    ParameterizedOnly,
}

impl WrapPolicy {
    pub fn wraps(self, kind: &StatementKind) -> bool {
        match kind {
            StatementKind::CreateStatement => self == WrapPolicy::AllStatements,
            StatementKind::PrepareStatement { .. } | StatementKind::PrepareCall { .. } => true,
            StatementKind::Other(_) => false,
        }
    }
}

/// Rendering of statement records on the `time_log` target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Structured event fields
    #[default]
    Plain,

    /// One JSON object per record as the event message
    CorrelationLine,
}

/// Configuration for a [`StatementInstrumentor`](crate::StatementInstrumentor).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentorConfig {
    /// Runtime on/off switch
    pub toggle: ToggleSource,

    /// How often the switch is re-read, in milliseconds
    pub refresh_interval_ms: u64,

    pub wrap_policy: WrapPolicy,

    pub log_format: LogFormat,

    /// Context key holding the correlation id; blank means `Correlation-ID`
    #[serde(deserialize_with = "deserialize_key")]
    pub correlation_key: String,

    /// Extra context keys copied into every record. Keys that name a record
    /// field (`query`, `delta`, ...) are not copied.
    pub context_fields: Vec<String>,

    /// Value of the record's `callType` field
    pub call_type: String,
}

impl Default for InstrumentorConfig {
    fn default() -> Self {
        Self {
            toggle: ToggleSource::default(),
            refresh_interval_ms: millis(DEFAULT_REFRESH_INTERVAL),
            wrap_policy: WrapPolicy::default(),
            log_format: LogFormat::default(),
            correlation_key: DEFAULT_CORRELATION_KEY.to_string(),
            context_fields: Vec::new(),
            call_type: "jdbc".to_string(),
        }
    }
}

impl InstrumentorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_toggle(mut self, toggle: ToggleSource) -> Self {
        self.toggle = toggle;
        self
    }

    /// Always on, no refresh
    pub fn enabled(self) -> Self {
        self.with_toggle(ToggleSource::Fixed { enabled: true })
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval_ms = millis(interval);
        self
    }

    pub fn with_wrap_policy(mut self, policy: WrapPolicy) -> Self {
        self.wrap_policy = policy;
        self
    }

    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    pub fn with_correlation_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        if !key.trim().is_empty() {
            self.correlation_key = key;
        }
        self
    }

    pub fn with_context_field(mut self, key: impl Into<String>) -> Self {
        self.context_fields.push(key.into());
        self
    }

    pub fn with_call_type(mut self, call_type: impl Into<String>) -> Self {
        self.call_type = call_type.into();
        self
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Context key the correlation id is read from.
    pub fn context_key(&self) -> &str {
        key_or_default(&self.correlation_key)
    }

    /// Context keys copied into records: the correlation key first, then
    /// the extra fields, without duplicates or names of record fields.
    pub fn record_keys(&self) -> Vec<&str> {
        let mut keys = Vec::with_capacity(self.context_fields.len() + 1);
        let configured = self.context_fields.iter().map(String::as_str);
        for key in std::iter::once(self.context_key()).chain(configured) {
            if !keys.contains(&key) && !RECORD_FIELDS.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Configured context keys that collide with record fields.
    pub fn shadowed_keys(&self) -> Vec<&str> {
        std::iter::once(self.context_key())
            .chain(self.context_fields.iter().map(String::as_str))
            .filter(|key| RECORD_FIELDS.contains(key))
            .collect()
    }
}

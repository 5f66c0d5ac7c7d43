//! Destinations for statement records.

use crate::config::LogFormat;
use crate::record::StatementRecord;
use reqtrace_observability::TIME_LOG_TARGET;
use tracing::Level;

/// Receives one record per timed execution.
pub trait RecordSink: Send + Sync {
    /// Whether records would be kept. When `false` the instrumented
    /// statement skips building records and resolving connection metadata.
    fn is_enabled(&self) -> bool;

    fn emit(&self, record: &StatementRecord);
}

/// Emits records as DEBUG events on the `time_log` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRecordSink {
    format: LogFormat,
}

impl TracingRecordSink {
    pub fn new(format: LogFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }
}

impl RecordSink for TracingRecordSink {
    fn is_enabled(&self) -> bool {
        tracing::enabled!(target: TIME_LOG_TARGET, Level::DEBUG)
    }

    fn emit(&self, record: &StatementRecord) {
        match self.format {
            LogFormat::Plain => {
                let context = record
                    .context
                    .iter()
                    .map(|(key, value)| format!("{key}={value}"))
                    .collect::<Vec<_>>()
                    .join(",");
                tracing::debug!(
                    target: TIME_LOG_TARGET,
                    query = record.query.as_deref().unwrap_or("null"),
                    method_name = %record.method_name,
                    start_time = record.start_time,
                    delta_ms = record.delta.unwrap_or_default(),
                    connection_url = record.connection_url.as_deref().unwrap_or("null"),
                    call_type = %record.call_type,
                    context = %context,
                    "Statement executed"
                );
            }
            LogFormat::CorrelationLine => match serde_json::to_string(record) {
                Ok(line) => tracing::debug!(target: TIME_LOG_TARGET, "{}", line),
                Err(e) => {
                    tracing::error!(target: TIME_LOG_TARGET, error = %e, "Failed to serialize statement record")
                }
            },
        }
    }
}

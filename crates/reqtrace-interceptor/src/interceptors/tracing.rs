//! Tracing hook for statement lifecycle events
//!
//! Emits structured tracing events for prepared statements, failed
//! executions and closes. Successful executions are already logged by the
//! record sink, so they only produce a TRACE event here.

use crate::error::Result;
use crate::hooks::{PrepareContext, QueryReportHook};
use crate::record::{FailedQuery, StatementRecord, millis};
use async_trait::async_trait;
use reqtrace_core::DEFAULT_CORRELATION_KEY;
use reqtrace_core::correlation::key_or_default;
use reqtrace_observability::TIME_LOG_TARGET;
use tracing::{Level, debug, span, trace, warn};

/// Tracing hook for statement lifecycle events.
#[derive(Debug, Clone)]
pub struct TracingReportHook {
    correlation_key: String,
}

impl TracingReportHook {
    pub fn new() -> Self {
        Self {
            correlation_key: DEFAULT_CORRELATION_KEY.to_string(),
        }
    }

    /// Context key whose value is attached to failure events
    pub fn with_correlation_key(mut self, key: impl Into<String>) -> Self {
        self.correlation_key = key_or_default(&key.into()).to_string();
        self
    }
}

impl Default for TracingReportHook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryReportHook for TracingReportHook {
    async fn on_prepare_statement(&self, context: &PrepareContext) -> Result<()> {
        debug!(
            sql = context.sql.as_deref().unwrap_or("null"),
            since_acquire_ms = millis(context.since_acquire),
            "Statement prepared"
        );
        Ok(())
    }

    async fn on_prepare_call(&self, context: &PrepareContext) -> Result<()> {
        debug!(
            sql = context.sql.as_deref().unwrap_or("null"),
            since_acquire_ms = millis(context.since_acquire),
            "Call prepared"
        );
        Ok(())
    }

    async fn on_query_complete(&self, record: &StatementRecord) {
        trace!(
            method = %record.method_name,
            delta_ms = record.delta.unwrap_or_default(),
            "Query completed"
        );
    }

    async fn on_query_failed(&self, failure: &FailedQuery) {
        let span = span!(
            Level::DEBUG,
            "query_failed",
            method = %failure.method_name,
            correlation_id = failure.context_value(&self.correlation_key).unwrap_or("none"),
        );
        let _guard = span.enter();

        // Use structured fields - no string interpolation in log messages
        warn!(
            target: TIME_LOG_TARGET,
            query = failure.query.as_deref().unwrap_or("null"),
            start_time = failure.start_time,
            elapsed_ms = failure.elapsed,
            error = %failure.error,
            "Query failed"
        );
    }

    async fn on_close(&self, query: Option<&str>) {
        trace!(query = query.unwrap_or("null"), "Statement closed");
    }
}

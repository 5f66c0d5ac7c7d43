//! The statement wrapper handed out in place of a driver's statement.

use crate::config::InstrumentorConfig;
use crate::hooks::HookPipeline;
use crate::record::{FailedQuery, StatementRecord, epoch_millis, millis};
use crate::sink::RecordSink;
use crate::statement::{Statement, StatementMethod};
use async_trait::async_trait;
use reqtrace_core::StatementClosedError;
use reqtrace_core::context;
use reqtrace_observability::{TIME_LOG_TARGET, spans};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{Instrument, Span};

/// State shared by every statement an instrumentor produces.
pub(crate) struct Shared {
    pub(crate) config: InstrumentorConfig,
    pub(crate) sink: Arc<dyn RecordSink>,
    pub(crate) hooks: HookPipeline,
}

struct Timing {
    started_at: SystemTime,
    started: Instant,
}

impl Timing {
    fn start() -> Self {
        Self {
            started_at: SystemTime::now(),
            started: Instant::now(),
        }
    }
}

/// Runs one operation on the delegate. Execution-like operations are timed
/// inside a span and reported once they finish.
macro_rules! intercept {
    ($self:ident, $method:expr, |$delegate:ident| $call:expr) => {{
        let method: StatementMethod = $method;
        let (timing, span) = if method.is_execute() {
            (
                Some(Timing::start()),
                spans::statement_execution(method.name(), $self.shared.config.context_key()),
            )
        } else {
            (None, Span::none())
        };
        let result = {
            let $delegate = $self.delegate_mut()?;
            $call.instrument(span).await
        };
        if let Some(timing) = timing {
            $self
                .report(method, timing, result.as_ref().map(|_| ()))
                .await;
        }
        result
    }};
}

/// A driver statement wrapped for timing and correlation.
///
/// Execution-like operations (`execute`, `executeQuery`, `executeUpdate`,
/// `executeBatch`) produce a [`StatementRecord`]; everything else is
/// forwarded as is. Once closed, every operation except `close` and
/// `is_closed` fails with [`StatementClosedError`] without reaching the
/// driver.
pub struct InstrumentedStatement<S> {
    delegate: Option<S>,
    query: Option<String>,
    shared: Arc<Shared>,
}

impl<S> InstrumentedStatement<S> {
    pub(crate) fn new(delegate: S, query: Option<String>, shared: Arc<Shared>) -> Self {
        Self {
            delegate: Some(delegate),
            query,
            shared,
        }
    }

    /// SQL fixed at prepare time.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// The driver statement, until this statement is closed.
    pub fn inner(&self) -> Option<&S> {
        self.delegate.as_ref()
    }

    /// Mutable access to the driver statement for operations outside the
    /// [`Statement`] surface. Calls made through it are not recorded.
    pub fn inner_mut(&mut self) -> Option<&mut S> {
        self.delegate.as_mut()
    }

    /// Unwrap into the driver statement, if not yet closed.
    pub fn into_inner(self) -> Option<S> {
        self.delegate
    }
}

impl<S> InstrumentedStatement<S>
where
    S: Statement,
    S::Error: From<StatementClosedError>,
{
    fn delegate_mut(&mut self) -> Result<&mut S, S::Error> {
        self.delegate
            .as_mut()
            .ok_or_else(|| S::Error::from(StatementClosedError))
    }

    async fn report(
        &mut self,
        method: StatementMethod,
        timing: Timing,
        outcome: Result<(), &S::Error>,
    ) {
        let elapsed = timing.started.elapsed();
        match outcome {
            Ok(()) => self.report_success(method, &timing, elapsed).await,
            Err(e) => {
                let failure = FailedQuery {
                    query: self.query.clone(),
                    method_name: method.name().to_string(),
                    start_time: epoch_millis(timing.started_at),
                    elapsed: millis(elapsed),
                    error: e.to_string(),
                    context: self.record_context(),
                };
                self.shared.hooks.notify_query_failed(&failure).await;
            }
        }
    }

    async fn report_success(&mut self, method: StatementMethod, timing: &Timing, elapsed: Duration) {
        let sink_enabled = self.shared.sink.is_enabled();
        if !sink_enabled && self.shared.hooks.is_empty() {
            return;
        }

        let connection_url = if sink_enabled {
            self.resolve_connection_url().await
        } else {
            None
        };
        let record = StatementRecord {
            query: self.query.clone(),
            method_name: method.name().to_string(),
            start_time: epoch_millis(timing.started_at),
            delta: Some(millis(elapsed)),
            connection_url,
            call_type: self.shared.config.call_type.clone(),
            context: self.record_context(),
        };

        if sink_enabled {
            self.shared.sink.emit(&record);
        }
        self.shared.hooks.notify_query_complete(&record).await;
    }

    async fn resolve_connection_url(&mut self) -> Option<String> {
        let delegate = self.delegate.as_mut()?;
        match delegate.connection_url().await {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(target: TIME_LOG_TARGET, error = %e, "Cannot get connection string");
                None
            }
        }
    }

    fn record_context(&self) -> BTreeMap<String, String> {
        let Some(ctx) = context::current() else {
            return BTreeMap::new();
        };
        self.shared
            .config
            .record_keys()
            .into_iter()
            .filter_map(|key| ctx.get(key).map(|value| (key.to_string(), value)))
            .collect()
    }
}

#[async_trait]
impl<S> Statement for InstrumentedStatement<S>
where
    S: Statement,
    S::Error: From<StatementClosedError>,
{
    type Error = S::Error;
    type Rows = S::Rows;

    async fn execute(&mut self, sql: Option<&str>) -> Result<bool, Self::Error> {
        intercept!(self, StatementMethod::Execute, |s| s.execute(sql))
    }

    async fn execute_query(&mut self, sql: Option<&str>) -> Result<Self::Rows, Self::Error> {
        intercept!(self, StatementMethod::ExecuteQuery, |s| s.execute_query(sql))
    }

    async fn execute_update(&mut self, sql: Option<&str>) -> Result<u64, Self::Error> {
        intercept!(self, StatementMethod::ExecuteUpdate, |s| s.execute_update(sql))
    }

    async fn execute_batch(&mut self) -> Result<Vec<u64>, Self::Error> {
        intercept!(self, StatementMethod::ExecuteBatch, |s| s.execute_batch())
    }

    async fn add_batch(&mut self, sql: Option<&str>) -> Result<(), Self::Error> {
        intercept!(self, StatementMethod::AddBatch, |s| s.add_batch(sql))
    }

    async fn clear_batch(&mut self) -> Result<(), Self::Error> {
        intercept!(self, StatementMethod::ClearBatch, |s| s.clear_batch())
    }

    async fn set_max_rows(&mut self, max_rows: u64) -> Result<(), Self::Error> {
        intercept!(self, StatementMethod::SetMaxRows, |s| s.set_max_rows(max_rows))
    }

    async fn set_query_timeout(&mut self, timeout: Option<Duration>) -> Result<(), Self::Error> {
        intercept!(self, StatementMethod::SetQueryTimeout, |s| s
            .set_query_timeout(timeout))
    }

    async fn connection_url(&mut self) -> Result<Option<String>, Self::Error> {
        intercept!(self, StatementMethod::ConnectionUrl, |s| s.connection_url())
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        let Some(delegate) = self.delegate.as_mut() else {
            return Ok(());
        };
        delegate.close().await?;
        self.delegate = None;
        tracing::trace!(query = self.query.as_deref().unwrap_or("null"), "Instrumented statement closed");
        self.shared.hooks.notify_close(self.query.as_deref()).await;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.delegate.is_none()
    }
}

impl<S> std::fmt::Debug for InstrumentedStatement<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentedStatement")
            .field("query", &self.query)
            .field("closed", &self.delegate.is_none())
            .finish()
    }
}

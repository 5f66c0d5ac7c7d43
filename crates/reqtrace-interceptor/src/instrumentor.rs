//! Decides which statements get instrumented.

use crate::config::InstrumentorConfig;
use crate::hooks::{HookPipeline, PrepareContext, PrepareKind, QueryReportHook};
use crate::instrumented::{InstrumentedStatement, Shared};
use crate::sink::{RecordSink, TracingRecordSink};
use crate::statement::{Statement, StatementKind};
use async_trait::async_trait;
use reqtrace_core::StatementClosedError;
use reqtrace_core::toggle::InstrumentationToggle;
use reqtrace_observability::spans;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// What a statement-producing call hands back to the pool.
#[derive(Debug)]
pub enum Intercepted<S> {
    /// Wrapped for timing and correlation
    Instrumented(InstrumentedStatement<S>),

    /// The driver's statement, untouched
    Passthrough(S),
}

impl<S> Intercepted<S> {
    pub fn is_instrumented(&self) -> bool {
        matches!(self, Intercepted::Instrumented(_))
    }

    /// SQL fixed at prepare time, when instrumented.
    pub fn query(&self) -> Option<&str> {
        match self {
            Intercepted::Instrumented(statement) => statement.query(),
            Intercepted::Passthrough(_) => None,
        }
    }
}

/// Wraps statements produced by pooled connections.
///
/// Cheap to clone; clones share their configuration, sink, hooks and the
/// cached toggle value.
#[derive(Clone)]
pub struct StatementInstrumentor {
    shared: Arc<Shared>,
    toggle: Arc<InstrumentationToggle>,
}

impl StatementInstrumentor {
    /// Instrumentor logging records through tracing, with no hooks.
    pub fn new(config: InstrumentorConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: InstrumentorConfig) -> StatementInstrumentorBuilder {
        StatementInstrumentorBuilder {
            config,
            sink: None,
            hooks: HookPipeline::new(),
            toggle: None,
        }
    }

    pub fn config(&self) -> &InstrumentorConfig {
        &self.shared.config
    }

    pub fn hooks(&self) -> &HookPipeline {
        &self.shared.hooks
    }

    /// Current value of the runtime switch.
    pub fn is_enabled(&self) -> bool {
        self.toggle.is_enabled()
    }

    /// Handle the statement returned by a producing call.
    ///
    /// Never fails: when instrumentation is off, the call is not a
    /// statement-producing one, or a prepare hook fails, the real statement
    /// comes back as [`Intercepted::Passthrough`].
    pub async fn on_statement_request<S>(
        &self,
        kind: StatementKind,
        statement: S,
        since_acquire: Duration,
    ) -> Intercepted<S> {
        if !self.is_enabled() {
            return Intercepted::Passthrough(statement);
        }
        let span = spans::statement_request(kind.method_name());
        self.intercept(kind, statement, since_acquire)
            .instrument(span)
            .await
    }

    async fn intercept<S>(
        &self,
        kind: StatementKind,
        statement: S,
        since_acquire: Duration,
    ) -> Intercepted<S> {
        if !self.shared.config.wrap_policy.wraps(&kind) {
            tracing::trace!(kind = kind.method_name(), "Statement not wrapped");
            return Intercepted::Passthrough(statement);
        }

        let prepare = match &kind {
            StatementKind::PrepareStatement { sql: Some(sql) } => Some(PrepareContext {
                kind: PrepareKind::Statement,
                sql: Some(sql.clone()),
                since_acquire,
            }),
            StatementKind::PrepareCall { sql } => Some(PrepareContext {
                kind: PrepareKind::Call,
                sql: sql.clone(),
                since_acquire,
            }),
            _ => None,
        };
        if let Some(prepare) = prepare {
            if let Err(e) = self.shared.hooks.notify_prepare(&prepare).await {
                tracing::warn!(error = %e, kind = kind.method_name(), "Unable to create statement proxy");
                return Intercepted::Passthrough(statement);
            }
        }

        let query = match kind {
            StatementKind::PrepareStatement { sql } | StatementKind::PrepareCall { sql } => sql,
            _ => None,
        };
        Intercepted::Instrumented(InstrumentedStatement::new(
            statement,
            query,
            self.shared.clone(),
        ))
    }
}

impl std::fmt::Debug for StatementInstrumentor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementInstrumentor")
            .field("config", &self.shared.config)
            .field("hooks", &self.shared.hooks)
            .finish()
    }
}

/// Builder for [`StatementInstrumentor`].
pub struct StatementInstrumentorBuilder {
    config: InstrumentorConfig,
    sink: Option<Arc<dyn RecordSink>>,
    hooks: HookPipeline,
    toggle: Option<InstrumentationToggle>,
}

impl StatementInstrumentorBuilder {
    /// Replace the default tracing sink
    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Add a report hook
    pub fn with_hook(mut self, hook: Arc<dyn QueryReportHook>) -> Self {
        self.hooks = self.hooks.with_hook(hook);
        self
    }

    /// Add a whole hook pipeline after the hooks already added
    pub fn with_hooks(mut self, pipeline: HookPipeline) -> Self {
        for hook in pipeline.hooks() {
            self.hooks = self.hooks.with_hook(hook.clone());
        }
        self
    }

    /// Use an existing toggle instead of one built from the configuration
    pub fn with_toggle(mut self, toggle: InstrumentationToggle) -> Self {
        self.toggle = Some(toggle);
        self
    }

    pub fn build(self) -> StatementInstrumentor {
        let shadowed = self.config.shadowed_keys();
        if !shadowed.is_empty() {
            tracing::warn!(
                keys = ?shadowed,
                "Context keys named like record fields are not copied into records"
            );
        }
        let toggle = self.toggle.unwrap_or_else(|| {
            InstrumentationToggle::new(self.config.toggle.clone(), self.config.refresh_interval())
        });
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(TracingRecordSink::new(self.config.log_format)));
        StatementInstrumentor {
            shared: Arc::new(Shared {
                config: self.config,
                sink,
                hooks: self.hooks,
            }),
            toggle: Arc::new(toggle),
        }
    }
}

macro_rules! delegate {
    ($self:ident, |$s:ident| $call:expr) => {
        match $self {
            Intercepted::Instrumented($s) => $call.await,
            Intercepted::Passthrough($s) => $call.await,
        }
    };
}

#[async_trait]
impl<S> Statement for Intercepted<S>
where
    S: Statement,
    S::Error: From<StatementClosedError>,
{
    type Error = S::Error;
    type Rows = S::Rows;

    async fn execute(&mut self, sql: Option<&str>) -> Result<bool, Self::Error> {
        delegate!(self, |s| s.execute(sql))
    }

    async fn execute_query(&mut self, sql: Option<&str>) -> Result<Self::Rows, Self::Error> {
        delegate!(self, |s| s.execute_query(sql))
    }

    async fn execute_update(&mut self, sql: Option<&str>) -> Result<u64, Self::Error> {
        delegate!(self, |s| s.execute_update(sql))
    }

    async fn execute_batch(&mut self) -> Result<Vec<u64>, Self::Error> {
        delegate!(self, |s| s.execute_batch())
    }

    async fn add_batch(&mut self, sql: Option<&str>) -> Result<(), Self::Error> {
        delegate!(self, |s| s.add_batch(sql))
    }

    async fn clear_batch(&mut self) -> Result<(), Self::Error> {
        delegate!(self, |s| s.clear_batch())
    }

    async fn set_max_rows(&mut self, max_rows: u64) -> Result<(), Self::Error> {
        delegate!(self, |s| s.set_max_rows(max_rows))
    }

    async fn set_query_timeout(&mut self, timeout: Option<Duration>) -> Result<(), Self::Error> {
        delegate!(self, |s| s.set_query_timeout(timeout))
    }

    async fn connection_url(&mut self) -> Result<Option<String>, Self::Error> {
        delegate!(self, |s| s.connection_url())
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        delegate!(self, |s| s.close())
    }

    fn is_closed(&self) -> bool {
        match self {
            Intercepted::Instrumented(s) => s.is_closed(),
            Intercepted::Passthrough(s) => s.is_closed(),
        }
    }
}

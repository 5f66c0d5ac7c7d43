//! Request correlation for pooled-database services.
//!
//! This crate ties together the two halves of the system:
//! - [`CorrelationPropagator`] resolves a correlation id for every inbound
//!   request and makes it ambient for the request's downstream work.
//! - [`StatementInstrumentor`] wraps statements from pooled connections so
//!   each execution is timed and logged with that correlation id.

pub mod config;

pub use config::ReqtraceConfig;

pub use reqtrace_core::{
    ConfigError, ContextGuard, CorrelationId, CorrelationMapping, DEFAULT_CORRELATION_KEY,
    DiagnosticContext, InstrumentationToggle, MappingKind, StatementClosedError, ToggleSource,
    context,
};
pub use reqtrace_interceptor::{
    Connection, FailedQuery, HookPipeline, InstrumentedConnection, InstrumentedStatement,
    InstrumentorConfig, Intercepted, LogFormat, QueryReportHook, RecordSink, Statement,
    StatementInstrumentor, StatementKind, StatementMethod, StatementRecord, TracingRecordSink,
    TracingReportHook, WrapPolicy,
};
pub use reqtrace_observability::{TIME_LOG_TARGET, init_tracing, spans};
pub use reqtrace_propagator::{
    CorrelationLayer, CorrelationPropagator, CorrelationSource, PropagatorConfig, RequestView,
};

/// Common imports for services wiring reqtrace in.
pub mod prelude {
    pub use crate::ReqtraceConfig;
    pub use reqtrace_core::context;
    pub use reqtrace_interceptor::{
        Connection, InstrumentedConnection, Statement, StatementInstrumentor,
    };
    pub use reqtrace_propagator::{CorrelationLayer, CorrelationPropagator, RequestView};
}

//! Fixture helpers.

use crate::support::hooks::{MemorySink, RecordingHook};
use reqtrace_core::DiagnosticContext;
use reqtrace_interceptor::{InstrumentorConfig, StatementInstrumentor};
use std::sync::Arc;

/// Context holding `value` under `key`.
pub fn correlated(key: &str, value: &str) -> DiagnosticContext {
    let ctx = DiagnosticContext::new();
    ctx.set(key, value);
    ctx
}

/// Always-on instrumentor recording into `sink`.
pub fn enabled_instrumentor(sink: &MemorySink) -> StatementInstrumentor {
    instrumentor_with(InstrumentorConfig::new().enabled(), sink, None)
}

/// Instrumentor with a memory sink and an optional recording hook.
pub fn instrumentor_with(
    config: InstrumentorConfig,
    sink: &MemorySink,
    hook: Option<&RecordingHook>,
) -> StatementInstrumentor {
    let mut builder = StatementInstrumentor::builder(config).with_sink(Arc::new(sink.clone()));
    if let Some(hook) = hook {
        builder = builder.with_hook(Arc::new(hook.clone()));
    }
    builder.build()
}

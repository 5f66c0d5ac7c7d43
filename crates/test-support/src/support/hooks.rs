//! Recording sink and hook.

use async_trait::async_trait;
use reqtrace_interceptor::{
    FailedQuery, HookError, PrepareContext, QueryReportHook, RecordSink, StatementRecord,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Sink keeping records in memory. Clones share storage.
#[derive(Debug, Clone)]
pub struct MemorySink {
    enabled: Arc<AtomicBool>,
    records: Arc<Mutex<Vec<StatementRecord>>>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(true)),
            records: Arc::default(),
        }
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink reporting itself disabled.
    pub fn disabled() -> Self {
        let sink = Self::default();
        sink.set_enabled(false);
        sink
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<StatementRecord> {
        self.records.lock().expect("sink lock").clone()
    }
}

impl RecordSink for MemorySink {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn emit(&self, record: &StatementRecord) {
        self.records.lock().expect("sink lock").push(record.clone());
    }
}

/// Event seen by a [`RecordingHook`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    PrepareStatement(Option<String>),
    PrepareCall(Option<String>),
    Complete(StatementRecord),
    Failed(FailedQuery),
    Close(Option<String>),
}

/// Hook recording every event. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct RecordingHook {
    fail_prepare: bool,
    events: Arc<Mutex<Vec<HookEvent>>>,
}

impl RecordingHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hook whose prepare callbacks fail.
    pub fn failing_prepare() -> Self {
        Self {
            fail_prepare: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<HookEvent> {
        self.events.lock().expect("hook lock").clone()
    }

    fn push(&self, event: HookEvent) {
        self.events.lock().expect("hook lock").push(event);
    }

    fn prepared(&self, event: HookEvent) -> reqtrace_interceptor::Result<()> {
        self.push(event);
        if self.fail_prepare {
            return Err(HookError::Failed("recording hook refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl QueryReportHook for RecordingHook {
    async fn on_prepare_statement(&self, context: &PrepareContext) -> reqtrace_interceptor::Result<()> {
        self.prepared(HookEvent::PrepareStatement(context.sql.clone()))
    }

    async fn on_prepare_call(&self, context: &PrepareContext) -> reqtrace_interceptor::Result<()> {
        self.prepared(HookEvent::PrepareCall(context.sql.clone()))
    }

    async fn on_query_complete(&self, record: &StatementRecord) {
        self.push(HookEvent::Complete(record.clone()));
    }

    async fn on_query_failed(&self, failure: &FailedQuery) {
        self.push(HookEvent::Failed(failure.clone()));
    }

    async fn on_close(&self, query: Option<&str>) {
        self.push(HookEvent::Close(query.map(str::to_string)));
    }
}

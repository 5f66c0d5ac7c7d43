//! Report hooks for statement lifecycle events.
//!
//! Hooks observe the statements an instrumentor produces: preparation,
//! completed and failed executions, and close. Only preparation hooks can
//! fail, and a failure there makes the instrumentor hand back the driver's
//! statement unwrapped.

use crate::error::Result;
use crate::record::{FailedQuery, StatementRecord};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Which parameterized producing call prepared a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareKind {
    Statement,
    Call,
}

/// Information about a prepared statement or call.
#[derive(Debug, Clone)]
pub struct PrepareContext {
    pub kind: PrepareKind,

    /// SQL passed to the producing call
    pub sql: Option<String>,

    /// Time since the connection was acquired from the pool
    pub since_acquire: Duration,
}

/// Observer of statement lifecycle events.
#[async_trait]
pub trait QueryReportHook: Send + Sync + 'static {
    /// Called after `prepareStatement` with non-empty SQL.
    async fn on_prepare_statement(&self, _context: &PrepareContext) -> Result<()> {
        Ok(())
    }

    /// Called after every `prepareCall`.
    async fn on_prepare_call(&self, _context: &PrepareContext) -> Result<()> {
        Ok(())
    }

    /// Called after an execution-like operation succeeds.
    async fn on_query_complete(&self, _record: &StatementRecord) {}

    /// Called after an execution-like operation fails. The error still
    /// reaches the caller unchanged.
    async fn on_query_failed(&self, _failure: &FailedQuery) {}

    /// Called when an instrumented statement closes.
    async fn on_close(&self, _query: Option<&str>) {}
}

/// Ordered list of hooks.
///
/// Hooks run in the order they were added. A failing prepare hook stops the
/// remaining prepare hooks.
#[derive(Clone, Default)]
pub struct HookPipeline {
    hooks: Vec<Arc<dyn QueryReportHook>>,
}

impl HookPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hook to the end of the pipeline
    pub fn with_hook(mut self, hook: Arc<dyn QueryReportHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Register a hook by value
    pub fn register<H: QueryReportHook>(&mut self, hook: H) {
        self.hooks.push(Arc::new(hook));
    }

    pub fn hooks(&self) -> &[Arc<dyn QueryReportHook>] {
        &self.hooks
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub async fn notify_prepare(&self, context: &PrepareContext) -> Result<()> {
        for hook in &self.hooks {
            match context.kind {
                PrepareKind::Statement => hook.on_prepare_statement(context).await?,
                PrepareKind::Call => hook.on_prepare_call(context).await?,
            }
        }
        Ok(())
    }

    pub async fn notify_query_complete(&self, record: &StatementRecord) {
        for hook in &self.hooks {
            hook.on_query_complete(record).await;
        }
    }

    pub async fn notify_query_failed(&self, failure: &FailedQuery) {
        for hook in &self.hooks {
            hook.on_query_failed(failure).await;
        }
    }

    pub async fn notify_close(&self, query: Option<&str>) {
        for hook in &self.hooks {
            hook.on_close(query).await;
        }
    }
}

impl std::fmt::Debug for HookPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookPipeline")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

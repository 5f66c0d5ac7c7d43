//! Diagnostic context propagation for request-scoped execution.
//!
//! A [`DiagnosticContext`] is a small key/value map shared by everything that
//! runs on behalf of one request. It is installed as a task-local for the
//! request's future and can be re-entered on a blocking thread, so code deep
//! in the call chain (a pooled connection executing a statement, for
//! example) reads the request's correlation values without them being passed
//! through every signature.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

tokio::task_local! {
    static DIAGNOSTIC_CONTEXT: DiagnosticContext;
}

/// Key/value diagnostic state for one logical unit of execution.
///
/// Cloning is cheap and yields a handle to the same entries. Use
/// [`DiagnosticContext::fork`] for an independent copy.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticContext {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl DiagnosticContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Set `key` to `value`, returning the previous value if there was one.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.write().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copy of the current entries.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.read().clone()
    }

    /// Independent context seeded with this context's entries.
    pub fn fork(&self) -> Self {
        Self {
            entries: Arc::new(RwLock::new(self.snapshot())),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Tracks the keys one scope wrote into a context and removes them on drop.
///
/// Dropping happens on every exit path of the owning scope: normal return,
/// early return, panic unwinding, and cancellation of the owning future.
#[derive(Debug)]
pub struct ContextGuard {
    context: DiagnosticContext,
    keys: Vec<String>,
}

impl ContextGuard {
    pub fn new(context: DiagnosticContext) -> Self {
        Self {
            context,
            keys: Vec::new(),
        }
    }

    /// Set a key and remember it for removal.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.context.set(key, value);
        if !self.keys.iter().any(|k| k == key) {
            self.keys.push(key.to_string());
        }
    }

    pub fn context(&self) -> &DiagnosticContext {
        &self.context
    }

    /// Keys written through this guard, in first-write order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        for key in self.keys.drain(..) {
            self.context.remove(&key);
        }
    }
}

/// The context installed for the current task or blocking scope, if any.
pub fn current() -> Option<DiagnosticContext> {
    DIAGNOSTIC_CONTEXT.try_with(Clone::clone).ok()
}

/// Read one key from the current context.
pub fn get(key: &str) -> Option<String> {
    current().and_then(|ctx| ctx.get(key))
}

/// Run `fut` with `context` installed as the current diagnostic context.
pub async fn with_context<F, T>(context: DiagnosticContext, fut: F) -> T
where
    F: Future<Output = T>,
{
    DIAGNOSTIC_CONTEXT.scope(context, fut).await
}

/// Synchronous variant of [`with_context`] for code running on a plain thread.
pub fn with_context_sync<F, T>(context: DiagnosticContext, f: F) -> T
where
    F: FnOnce() -> T,
{
    DIAGNOSTIC_CONTEXT.sync_scope(context, f)
}

/// Run `f` on tokio's blocking pool with the caller's context re-entered.
///
/// This is the hop used when a request hands work to a synchronous driver
/// or a pooled connection living on another thread.
pub fn spawn_blocking<F, T>(f: F) -> tokio::task::JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let context = current();
    tokio::task::spawn_blocking(move || match context {
        Some(context) => with_context_sync(context, f),
        None => f(),
    })
}

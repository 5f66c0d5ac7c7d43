use thiserror::Error;

/// Failure raised by a [`QueryReportHook`](crate::QueryReportHook).
///
/// Hook failures never reach statement callers: a failed prepare hook makes
/// the instrumentor hand back the driver's statement unwrapped.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("report hook rejected statement: {0}")]
    Rejected(String),

    #[error("report hook failed: {0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, HookError>;

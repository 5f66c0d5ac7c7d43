//! Statement instrumentation for pooled database connections.
//!
//! A [`StatementInstrumentor`] sits on a connection's statement-producing
//! calls and hands back an [`InstrumentedStatement`] in place of the driver's
//! statement. Execution-like operations on it are timed and reported as a
//! [`StatementRecord`] carrying the request's correlation id; every other
//! operation is forwarded untouched.

pub mod config;
pub mod connection;
pub mod error;
pub mod hooks;
pub mod instrumented;
pub mod instrumentor;
pub mod interceptors;
pub mod record;
pub mod sink;
pub mod statement;

pub use config::{InstrumentorConfig, LogFormat, WrapPolicy};
pub use connection::InstrumentedConnection;
pub use error::{HookError, Result};
pub use hooks::{HookPipeline, PrepareContext, PrepareKind, QueryReportHook};
pub use instrumented::InstrumentedStatement;
pub use instrumentor::{Intercepted, StatementInstrumentor, StatementInstrumentorBuilder};
pub use interceptors::TracingReportHook;
pub use record::{FailedQuery, StatementRecord};
pub use sink::{RecordSink, TracingRecordSink};
pub use statement::{Connection, Statement, StatementKind, StatementMethod};

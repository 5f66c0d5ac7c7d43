//! Driver-facing statement and connection interfaces.
//!
//! [`Statement`] enumerates the statement operations the instrumentation
//! understands. Drivers implement it for their statement type; anything a
//! driver offers beyond this surface stays reachable on the real statement
//! through [`InstrumentedStatement::inner_mut`](crate::InstrumentedStatement::inner_mut).

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// A database statement.
///
/// `sql` arguments are `None` for prepared statements, whose text was fixed
/// when they were prepared, and `Some` for plain statements.
#[async_trait]
pub trait Statement: Send {
    /// Driver error type. Returned to callers exactly as produced.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Result set type.
    type Rows: Send;

    async fn execute(&mut self, sql: Option<&str>) -> Result<bool, Self::Error>;

    async fn execute_query(&mut self, sql: Option<&str>) -> Result<Self::Rows, Self::Error>;

    async fn execute_update(&mut self, sql: Option<&str>) -> Result<u64, Self::Error>;

    async fn execute_batch(&mut self) -> Result<Vec<u64>, Self::Error>;

    async fn add_batch(&mut self, sql: Option<&str>) -> Result<(), Self::Error>;

    async fn clear_batch(&mut self) -> Result<(), Self::Error>;

    async fn set_max_rows(&mut self, max_rows: u64) -> Result<(), Self::Error>;

    async fn set_query_timeout(&mut self, timeout: Option<Duration>) -> Result<(), Self::Error>;

    /// URL of the connection this statement belongs to, from its metadata.
    async fn connection_url(&mut self) -> Result<Option<String>, Self::Error>;

    async fn close(&mut self) -> Result<(), Self::Error>;

    fn is_closed(&self) -> bool;
}

/// A pooled connection's statement-producing calls.
#[async_trait]
pub trait Connection: Send {
    type Error: std::error::Error + Send + Sync + 'static;
    type Statement: Statement<Error = Self::Error>;

    async fn create_statement(&mut self) -> Result<Self::Statement, Self::Error>;

    async fn prepare_statement(&mut self, sql: &str) -> Result<Self::Statement, Self::Error>;

    async fn prepare_call(&mut self, sql: &str) -> Result<Self::Statement, Self::Error>;
}

/// Operations of the [`Statement`] surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementMethod {
    Execute,
    ExecuteQuery,
    ExecuteUpdate,
    ExecuteBatch,
    AddBatch,
    ClearBatch,
    SetMaxRows,
    SetQueryTimeout,
    ConnectionUrl,
    Close,
    IsClosed,
}

impl StatementMethod {
    /// Name used in statement records.
    pub fn name(self) -> &'static str {
        match self {
            StatementMethod::Execute => "execute",
            StatementMethod::ExecuteQuery => "executeQuery",
            StatementMethod::ExecuteUpdate => "executeUpdate",
            StatementMethod::ExecuteBatch => "executeBatch",
            StatementMethod::AddBatch => "addBatch",
            StatementMethod::ClearBatch => "clearBatch",
            StatementMethod::SetMaxRows => "setMaxRows",
            StatementMethod::SetQueryTimeout => "setQueryTimeout",
            StatementMethod::ConnectionUrl => "getConnectionUrl",
            StatementMethod::Close => "close",
            StatementMethod::IsClosed => "isClosed",
        }
    }

    /// Whether the operation runs a query against the database.
    pub fn is_execute(self) -> bool {
        matches!(
            self,
            StatementMethod::Execute
                | StatementMethod::ExecuteQuery
                | StatementMethod::ExecuteUpdate
                | StatementMethod::ExecuteBatch
        )
    }
}

impl fmt::Display for StatementMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The statement-producing call a connection received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    CreateStatement,
    PrepareStatement { sql: Option<String> },
    PrepareCall { sql: Option<String> },
    /// Any other producing call; never wrapped.
    Other(String),
}

impl StatementKind {
    /// Classify a call by method name and first argument.
    pub fn from_call(method_name: &str, first_arg: Option<&str>) -> Self {
        let sql = first_arg.map(str::to_string);
        match method_name {
            "createStatement" => StatementKind::CreateStatement,
            "prepareStatement" => StatementKind::PrepareStatement { sql },
            "prepareCall" => StatementKind::PrepareCall { sql },
            other => StatementKind::Other(other.to_string()),
        }
    }

    pub fn method_name(&self) -> &str {
        match self {
            StatementKind::CreateStatement => "createStatement",
            StatementKind::PrepareStatement { .. } => "prepareStatement",
            StatementKind::PrepareCall { .. } => "prepareCall",
            StatementKind::Other(name) => name,
        }
    }

    pub fn sql(&self) -> Option<&str> {
        match self {
            StatementKind::PrepareStatement { sql } | StatementKind::PrepareCall { sql } => {
                sql.as_deref()
            }
            _ => None,
        }
    }
}

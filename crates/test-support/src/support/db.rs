//! Scriptable in-memory driver.

use async_trait::async_trait;
use reqtrace_core::StatementClosedError;
use reqtrace_interceptor::{Connection, Statement};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

pub const FAKE_URL: &str = "jdbc:fake://localhost:5432/identity";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FakeDriverError {
    #[error(transparent)]
    Closed(#[from] StatementClosedError),

    #[error("driver error: {0}")]
    Driver(String),
}

/// Names of the operations that reached the driver. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct CallJournal {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallJournal {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("journal lock").clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls
            .lock()
            .expect("journal lock")
            .iter()
            .filter(|call| *call == name)
            .count()
    }

    fn record(&self, name: &str) {
        self.calls.lock().expect("journal lock").push(name.to_string());
    }
}

/// Statement of the fake driver.
#[derive(Debug, Clone)]
pub struct FakeStatement {
    sql: Option<String>,
    latency: Duration,
    failure: Option<String>,
    url: Result<Option<String>, String>,
    closed: bool,
    max_rows: Option<u64>,
    batch: Vec<String>,
    journal: CallJournal,
}

impl Default for FakeStatement {
    fn default() -> Self {
        Self {
            sql: None,
            latency: Duration::ZERO,
            failure: None,
            url: Ok(Some(FAKE_URL.to_string())),
            closed: false,
            max_rows: None,
            batch: Vec::new(),
            journal: CallJournal::default(),
        }
    }
}

impl FakeStatement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prepared(sql: &str) -> Self {
        Self {
            sql: Some(sql.to_string()),
            ..Self::default()
        }
    }

    /// Every execution sleeps this long.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Every execution fails with this message.
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Connection metadata lookups fail with this message.
    pub fn with_broken_metadata(mut self, message: &str) -> Self {
        self.url = Err(message.to_string());
        self
    }

    pub fn with_journal(mut self, journal: CallJournal) -> Self {
        self.journal = journal;
        self
    }

    pub fn journal(&self) -> CallJournal {
        self.journal.clone()
    }

    pub fn max_rows(&self) -> Option<u64> {
        self.max_rows
    }

    fn enter(&self, name: &str) -> Result<(), FakeDriverError> {
        self.journal.record(name);
        if self.closed {
            return Err(FakeDriverError::Driver("statement already closed".to_string()));
        }
        Ok(())
    }

    async fn run(&self, name: &str) -> Result<(), FakeDriverError> {
        self.enter(name)?;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match &self.failure {
            Some(message) => Err(FakeDriverError::Driver(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Statement for FakeStatement {
    type Error = FakeDriverError;
    type Rows = Vec<String>;

    async fn execute(&mut self, _sql: Option<&str>) -> Result<bool, Self::Error> {
        self.run("execute").await?;
        Ok(true)
    }

    async fn execute_query(&mut self, _sql: Option<&str>) -> Result<Self::Rows, Self::Error> {
        self.run("executeQuery").await?;
        Ok(vec!["row-1".to_string(), "row-2".to_string()])
    }

    async fn execute_update(&mut self, _sql: Option<&str>) -> Result<u64, Self::Error> {
        self.run("executeUpdate").await?;
        Ok(1)
    }

    async fn execute_batch(&mut self) -> Result<Vec<u64>, Self::Error> {
        self.run("executeBatch").await?;
        let counts = vec![1; self.batch.len()];
        self.batch.clear();
        Ok(counts)
    }

    async fn add_batch(&mut self, sql: Option<&str>) -> Result<(), Self::Error> {
        self.enter("addBatch")?;
        let entry = sql.or(self.sql.as_deref()).unwrap_or_default().to_string();
        self.batch.push(entry);
        Ok(())
    }

    async fn clear_batch(&mut self) -> Result<(), Self::Error> {
        self.enter("clearBatch")?;
        self.batch.clear();
        Ok(())
    }

    async fn set_max_rows(&mut self, max_rows: u64) -> Result<(), Self::Error> {
        self.enter("setMaxRows")?;
        self.max_rows = Some(max_rows);
        Ok(())
    }

    async fn set_query_timeout(&mut self, _timeout: Option<Duration>) -> Result<(), Self::Error> {
        self.enter("setQueryTimeout")
    }

    async fn connection_url(&mut self) -> Result<Option<String>, Self::Error> {
        self.enter("getConnectionUrl")?;
        self.url.clone().map_err(FakeDriverError::Driver)
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.journal.record("close");
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Connection of the fake driver. Statements it produces inherit its
/// latency, failure script and journal.
#[derive(Debug, Clone, Default)]
pub struct FakeConnection {
    template: FakeStatement,
}

impl FakeConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.template = self.template.with_latency(latency);
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.template = self.template.failing(message);
        self
    }

    pub fn journal(&self) -> CallJournal {
        self.template.journal()
    }

    fn produce(&self, sql: Option<&str>) -> FakeStatement {
        FakeStatement {
            sql: sql.map(str::to_string),
            ..self.template.clone()
        }
    }
}

#[async_trait]
impl Connection for FakeConnection {
    type Error = FakeDriverError;
    type Statement = FakeStatement;

    async fn create_statement(&mut self) -> Result<Self::Statement, Self::Error> {
        Ok(self.produce(None))
    }

    async fn prepare_statement(&mut self, sql: &str) -> Result<Self::Statement, Self::Error> {
        Ok(self.produce(Some(sql)))
    }

    async fn prepare_call(&mut self, sql: &str) -> Result<Self::Statement, Self::Error> {
        Ok(self.produce(Some(sql)))
    }
}

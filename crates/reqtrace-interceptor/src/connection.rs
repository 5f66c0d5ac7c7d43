//! Pooled connection wrapper.

use crate::instrumentor::{Intercepted, StatementInstrumentor};
use crate::statement::{Connection, StatementKind};
use async_trait::async_trait;
use reqtrace_core::StatementClosedError;
use std::time::{Duration, Instant};

/// A connection checked out of a pool whose statement-producing calls go
/// through a [`StatementInstrumentor`].
pub struct InstrumentedConnection<C> {
    inner: C,
    instrumentor: StatementInstrumentor,
    acquired_at: Instant,
}

impl<C> InstrumentedConnection<C> {
    /// Wrap a connection that was just acquired.
    pub fn new(inner: C, instrumentor: StatementInstrumentor) -> Self {
        Self {
            inner,
            instrumentor,
            acquired_at: Instant::now(),
        }
    }

    /// Time since the connection was acquired.
    pub fn since_acquire(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

#[async_trait]
impl<C> Connection for InstrumentedConnection<C>
where
    C: Connection,
    C::Error: From<StatementClosedError>,
{
    type Error = C::Error;
    type Statement = Intercepted<C::Statement>;

    async fn create_statement(&mut self) -> Result<Self::Statement, Self::Error> {
        let statement = self.inner.create_statement().await?;
        Ok(self
            .instrumentor
            .on_statement_request(StatementKind::CreateStatement, statement, self.since_acquire())
            .await)
    }

    async fn prepare_statement(&mut self, sql: &str) -> Result<Self::Statement, Self::Error> {
        let statement = self.inner.prepare_statement(sql).await?;
        let kind = StatementKind::PrepareStatement {
            sql: Some(sql.to_string()),
        };
        Ok(self
            .instrumentor
            .on_statement_request(kind, statement, self.since_acquire())
            .await)
    }

    async fn prepare_call(&mut self, sql: &str) -> Result<Self::Statement, Self::Error> {
        let statement = self.inner.prepare_call(sql).await?;
        let kind = StatementKind::PrepareCall {
            sql: Some(sql.to_string()),
        };
        Ok(self
            .instrumentor
            .on_statement_request(kind, statement, self.since_acquire())
            .await)
    }
}

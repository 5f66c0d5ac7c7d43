//! Reqtrace Probe
//!
//! Sends one simulated request through the correlation propagator and runs a
//! prepared statement against an in-memory driver inside it, so the resolved
//! correlation id and the resulting `time_log` record can be inspected
//! without a server or a database.

use async_trait::async_trait;
use clap::Parser;
use reqtrace::prelude::*;
use reqtrace::{
    InstrumentorConfig, LogFormat, PropagatorConfig, StatementClosedError, init_tracing,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "reqtrace-probe")]
#[command(about = "Trace a simulated request and statement through reqtrace", long_about = None)]
#[command(version)]
struct Cli {
    /// Request header as NAME=VALUE (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Raw query string for the request URI
    #[arg(short, long)]
    query: Option<String>,

    /// Header to context key mapping (JSON object)
    #[arg(long, default_value = r#"{"X-Req-Id": "Correlation-ID"}"#)]
    header_mapping: String,

    /// Query parameter to context key mapping (JSON object)
    #[arg(long)]
    query_mapping: Option<String>,

    /// SQL to prepare and execute
    #[arg(long, default_value = "SELECT 1")]
    sql: String,

    /// Simulated execution latency in milliseconds
    #[arg(long, default_value_t = 50)]
    latency_ms: u64,

    /// Emit records as JSON lines
    #[arg(long)]
    json: bool,

    /// Make the simulated driver fail with this message
    #[arg(long)]
    fail: Option<String>,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

#[derive(Debug, Error)]
enum ProbeError {
    #[error(transparent)]
    Closed(#[from] StatementClosedError),

    #[error("simulated driver failure: {0}")]
    Driver(String),
}

/// In-memory statement that sleeps instead of talking to a database.
struct SimulatedStatement {
    latency: Duration,
    failure: Option<String>,
    closed: bool,
}

impl SimulatedStatement {
    async fn run(&self) -> Result<(), ProbeError> {
        tokio::time::sleep(self.latency).await;
        match &self.failure {
            Some(message) => Err(ProbeError::Driver(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Statement for SimulatedStatement {
    type Error = ProbeError;
    type Rows = usize;

    async fn execute(&mut self, _sql: Option<&str>) -> Result<bool, Self::Error> {
        self.run().await.map(|_| true)
    }

    async fn execute_query(&mut self, _sql: Option<&str>) -> Result<Self::Rows, Self::Error> {
        self.run().await.map(|_| 1)
    }

    async fn execute_update(&mut self, _sql: Option<&str>) -> Result<u64, Self::Error> {
        self.run().await.map(|_| 0)
    }

    async fn execute_batch(&mut self) -> Result<Vec<u64>, Self::Error> {
        self.run().await.map(|_| Vec::new())
    }

    async fn add_batch(&mut self, _sql: Option<&str>) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn clear_batch(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn set_max_rows(&mut self, _max_rows: u64) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn set_query_timeout(&mut self, _timeout: Option<Duration>) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn connection_url(&mut self) -> Result<Option<String>, Self::Error> {
        Ok(Some("jdbc:simulated:probe".to_string()))
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

struct SimulatedConnection {
    latency: Duration,
    failure: Option<String>,
}

impl SimulatedConnection {
    fn statement(&self) -> SimulatedStatement {
        SimulatedStatement {
            latency: self.latency,
            failure: self.failure.clone(),
            closed: false,
        }
    }
}

#[async_trait]
impl Connection for SimulatedConnection {
    type Error = ProbeError;
    type Statement = SimulatedStatement;

    async fn create_statement(&mut self) -> Result<Self::Statement, Self::Error> {
        Ok(self.statement())
    }

    async fn prepare_statement(&mut self, _sql: &str) -> Result<Self::Statement, Self::Error> {
        Ok(self.statement())
    }

    async fn prepare_call(&mut self, _sql: &str) -> Result<Self::Statement, Self::Error> {
        Ok(self.statement())
    }
}

fn build_request(cli: &Cli) -> anyhow::Result<http::Request<()>> {
    let uri = match &cli.query {
        Some(query) => format!("/probe?{query}"),
        None => "/probe".to_string(),
    };
    let mut builder = http::Request::builder().uri(uri);
    for (name, value) in &cli.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    Ok(builder.body(())?)
}

async fn run_statement(
    instrumentor: StatementInstrumentor,
    cli: &Cli,
) -> Result<usize, ProbeError> {
    let connection = SimulatedConnection {
        latency: Duration::from_millis(cli.latency_ms),
        failure: cli.fail.clone(),
    };
    let mut connection = InstrumentedConnection::new(connection, instrumentor);
    let mut statement = connection.prepare_statement(&cli.sql).await?;
    let rows = statement.execute_query(None).await;
    statement.close().await?;
    rows
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut propagator_config = PropagatorConfig::new().with_header_mapping(cli.header_mapping.clone());
    if let Some(mapping) = &cli.query_mapping {
        propagator_config = propagator_config.with_query_mapping(mapping.clone());
    }
    let log_format = if cli.json {
        LogFormat::CorrelationLine
    } else {
        LogFormat::Plain
    };
    let config = ReqtraceConfig::new()
        .with_propagator(propagator_config)
        .with_instrumentor(InstrumentorConfig::new().enabled().with_log_format(log_format));

    let propagator = config.propagator()?;
    let instrumentor = config.instrumentor();
    let request = build_request(&cli)?;

    let outcome = propagator
        .process(request, |_request| async {
            let correlation_id = context::get(propagator.correlation_key());
            info!(correlation_id = ?correlation_id, "Handling probe request");
            run_statement(instrumentor, &cli).await
        })
        .await;

    match outcome {
        Ok(rows) => {
            info!(rows = rows, "Probe finished");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Probe statement failed");
            Err(e.into())
        }
    }
}

//! Records reaching the `time_log` target through the tracing sink.

use reqtrace::{
    InstrumentorConfig, LogFormat, Statement, StatementInstrumentor, StatementKind,
    StatementRecord, context,
};
use std::sync::Arc;
use std::time::Duration;
use test_support::common::{FakeStatement, MemorySink, correlated, instrumentor_with};
use tokio_test::assert_ok;
use tracing_test::traced_test;

fn prepare(sql: &str) -> StatementKind {
    StatementKind::PrepareStatement {
        sql: Some(sql.to_string()),
    }
}

fn tracing_instrumentor(format: LogFormat) -> StatementInstrumentor {
    StatementInstrumentor::new(
        InstrumentorConfig::new()
            .enabled()
            .with_log_format(format),
    )
}

#[tokio::test]
#[traced_test]
async fn plain_format_logs_record_fields() {
    let instrumentor = tracing_instrumentor(LogFormat::Plain);
    let mut statement = instrumentor
        .on_statement_request(
            prepare("SELECT * FROM IDN_OAUTH_CONSUMER_APPS"),
            FakeStatement::new(),
            Duration::ZERO,
        )
        .await;

    context::with_context(correlated("Correlation-ID", "plain-1"), async {
        assert_ok!(statement.execute_query(None).await);
    })
    .await;

    assert!(logs_contain("Statement executed"));
    assert!(logs_contain("SELECT * FROM IDN_OAUTH_CONSUMER_APPS"));
    assert!(logs_contain("method_name=executeQuery"));
    assert!(logs_contain("call_type=jdbc"));
    assert!(logs_contain("jdbc:fake://localhost:5432/identity"));
    assert!(logs_contain("Correlation-ID=plain-1"));
}

#[tokio::test]
#[traced_test]
async fn correlation_line_format_logs_json_record() {
    let instrumentor = tracing_instrumentor(LogFormat::CorrelationLine);
    let mut statement = instrumentor
        .on_statement_request(prepare("SELECT 1"), FakeStatement::new(), Duration::ZERO)
        .await;

    context::with_context(correlated("Correlation-ID", "line-1"), async {
        assert_ok!(statement.execute(None).await);
    })
    .await;

    assert!(logs_contain(r#""methodName":"execute""#));
    assert!(logs_contain(r#""callType":"jdbc""#));
    assert!(logs_contain(r#""Correlation-ID":"line-1""#));
}

#[tokio::test]
#[traced_test]
async fn context_keys_named_like_record_fields_are_not_copied() {
    let instrumentor = StatementInstrumentor::new(
        InstrumentorConfig::new()
            .enabled()
            .with_log_format(LogFormat::CorrelationLine)
            .with_context_field("query")
            .with_context_field("tenant"),
    );
    assert!(logs_contain("Context keys named like record fields are not copied"));

    let mut statement = instrumentor
        .on_statement_request(prepare("SELECT 2"), FakeStatement::new(), Duration::ZERO)
        .await;
    let ctx = correlated("Correlation-ID", "line-2");
    ctx.set("query", "shadowed-query");
    ctx.set("tenant", "acme");
    context::with_context(ctx, async {
        assert_ok!(statement.execute(None).await);
    })
    .await;

    assert!(logs_contain(r#""query":"SELECT 2""#));
    assert!(logs_contain(r#""tenant":"acme""#));
    assert!(!logs_contain("shadowed-query"));
}

#[tokio::test]
#[traced_test]
async fn metadata_failure_is_logged_and_record_still_emitted() {
    let sink = MemorySink::new();
    let instrumentor = instrumentor_with(InstrumentorConfig::new().enabled(), &sink, None);
    let mut statement = instrumentor
        .on_statement_request(
            prepare("SELECT 1"),
            FakeStatement::new().with_broken_metadata("metadata unavailable"),
            Duration::ZERO,
        )
        .await;

    let rows = assert_ok!(statement.execute_query(None).await);

    assert_eq!(rows.len(), 2);
    assert!(logs_contain("Cannot get connection string"));
    assert!(logs_contain("metadata unavailable"));
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].connection_url, None);
}

#[tokio::test]
async fn disabled_sink_skips_metadata_lookup() {
    let sink = MemorySink::disabled();
    let instrumentor = instrumentor_with(InstrumentorConfig::new().enabled(), &sink, None);
    let real = FakeStatement::new();
    let journal = real.journal();
    let mut statement = instrumentor
        .on_statement_request(prepare("SELECT 1"), real, Duration::ZERO)
        .await;

    assert_ok!(statement.execute_query(None).await);

    assert!(sink.records().is_empty());
    assert_eq!(journal.count("executeQuery"), 1);
    assert_eq!(journal.count("getConnectionUrl"), 0);
}

#[tokio::test]
async fn custom_sink_receives_serializable_records() {
    let sink = MemorySink::new();
    let instrumentor = StatementInstrumentor::builder(InstrumentorConfig::new().enabled())
        .with_sink(Arc::new(sink.clone()))
        .build();
    let mut statement = instrumentor
        .on_statement_request(prepare("SELECT 1"), FakeStatement::new(), Duration::ZERO)
        .await;

    context::with_context(correlated("Correlation-ID", "json-1"), async {
        assert_ok!(statement.execute_query(None).await);
    })
    .await;

    let record = sink.records().remove(0);
    let line = serde_json::to_string(&record).expect("serialize");
    let parsed: StatementRecord = serde_json::from_str(&line).expect("parse");
    assert_eq!(parsed, record);
    assert_eq!(parsed.context_value("Correlation-ID"), Some("json-1"));
}

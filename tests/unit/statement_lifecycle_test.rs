//! Open/closed lifecycle and forwarding of instrumented statements.

use reqtrace::{InstrumentorConfig, Statement, StatementKind, context};
use std::time::Duration;
use test_support::common::{
    FakeDriverError, FakeStatement, HookEvent, MemorySink, RecordingHook, correlated,
    enabled_instrumentor, instrumentor_with,
};
use tokio_test::{assert_err, assert_ok};

fn prepare(sql: &str) -> StatementKind {
    StatementKind::PrepareStatement {
        sql: Some(sql.to_string()),
    }
}

#[tokio::test]
async fn closing_twice_reaches_the_driver_once() {
    let sink = MemorySink::new();
    let hook = RecordingHook::new();
    let instrumentor = instrumentor_with(InstrumentorConfig::new().enabled(), &sink, Some(&hook));
    let real = FakeStatement::prepared("SELECT 1");
    let journal = real.journal();

    let mut statement = instrumentor
        .on_statement_request(prepare("SELECT 1"), real, Duration::ZERO)
        .await;
    assert!(!statement.is_closed());

    assert_ok!(statement.close().await);
    assert!(statement.is_closed());
    assert_ok!(statement.close().await);

    assert!(statement.is_closed());
    assert_eq!(journal.count("close"), 1);
    let closes = hook
        .events()
        .into_iter()
        .filter(|e| matches!(e, HookEvent::Close(_)))
        .count();
    assert_eq!(closes, 1);
}

#[tokio::test]
async fn closed_statement_rejects_operations_without_reaching_driver() {
    let instrumentor = enabled_instrumentor(&MemorySink::new());
    let real = FakeStatement::prepared("SELECT 1");
    let journal = real.journal();
    let mut statement = instrumentor
        .on_statement_request(prepare("SELECT 1"), real, Duration::ZERO)
        .await;

    assert_ok!(statement.close().await);
    let before = journal.calls().len();

    assert!(matches!(
        statement.execute_query(None).await,
        Err(FakeDriverError::Closed(_))
    ));
    assert!(matches!(
        statement.set_max_rows(10).await,
        Err(FakeDriverError::Closed(_))
    ));
    assert!(matches!(
        statement.connection_url().await,
        Err(FakeDriverError::Closed(_))
    ));
    assert_eq!(journal.calls().len(), before);
}

#[tokio::test]
async fn driver_errors_are_returned_unchanged_and_reported() {
    let sink = MemorySink::new();
    let hook = RecordingHook::new();
    let instrumentor = instrumentor_with(InstrumentorConfig::new().enabled(), &sink, Some(&hook));
    let mut statement = instrumentor
        .on_statement_request(
            prepare("DELETE FROM IDN_AUTH_SESSION_STORE"),
            FakeStatement::new().failing("deadlock detected"),
            Duration::ZERO,
        )
        .await;

    let err = context::with_context(correlated("Correlation-ID", "req-err"), async {
        assert_err!(statement.execute_update(None).await)
    })
    .await;

    assert_eq!(err, FakeDriverError::Driver("deadlock detected".to_string()));
    assert!(sink.records().is_empty());
    let failure = hook
        .events()
        .into_iter()
        .find_map(|event| match event {
            HookEvent::Failed(failure) => Some(failure),
            _ => None,
        })
        .expect("failure reported");
    assert_eq!(failure.method_name, "executeUpdate");
    assert_eq!(
        failure.query.as_deref(),
        Some("DELETE FROM IDN_AUTH_SESSION_STORE")
    );
    assert_eq!(failure.error, "driver error: deadlock detected");
    assert_eq!(failure.context_value("Correlation-ID"), Some("req-err"));
}

#[tokio::test]
async fn configuration_calls_are_forwarded_without_records() {
    let sink = MemorySink::new();
    let instrumentor = enabled_instrumentor(&sink);
    let real = FakeStatement::prepared("SELECT * FROM UM_USER");
    let journal = real.journal();
    let mut statement = instrumentor
        .on_statement_request(prepare("SELECT * FROM UM_USER"), real, Duration::ZERO)
        .await;

    assert_ok!(statement.set_max_rows(25).await);
    assert_ok!(statement.set_query_timeout(Some(Duration::from_secs(3))).await);
    assert_ok!(statement.add_batch(None).await);
    assert_ok!(statement.clear_batch().await);

    assert!(sink.records().is_empty());
    assert_eq!(
        journal.calls(),
        ["setMaxRows", "setQueryTimeout", "addBatch", "clearBatch"]
    );

    let reqtrace::Intercepted::Instrumented(instrumented) = &statement else {
        panic!("statement should be instrumented");
    };
    assert_eq!(instrumented.inner().and_then(|s| s.max_rows()), Some(25));
}

#[tokio::test]
async fn every_execute_like_operation_produces_one_record() {
    let sink = MemorySink::new();
    let instrumentor = enabled_instrumentor(&sink);
    let mut statement = instrumentor
        .on_statement_request(StatementKind::CreateStatement, FakeStatement::new(), Duration::ZERO)
        .await;

    assert_ok!(statement.execute(Some("SELECT 1")).await);
    assert_ok!(statement.execute_query(Some("SELECT 2")).await);
    assert_ok!(statement.execute_update(Some("UPDATE t SET x = 1")).await);
    assert_ok!(statement.add_batch(Some("INSERT INTO t VALUES (1)")).await);
    assert_ok!(statement.execute_batch().await);

    let methods: Vec<_> = sink
        .records()
        .into_iter()
        .map(|record| record.method_name)
        .collect();
    assert_eq!(
        methods,
        ["execute", "executeQuery", "executeUpdate", "executeBatch"]
    );
    assert!(sink.records().iter().all(|record| record.query.is_none()));
}

#[tokio::test]
async fn record_without_ambient_context_has_no_correlation() {
    let sink = MemorySink::new();
    let instrumentor = enabled_instrumentor(&sink);
    let mut statement = instrumentor
        .on_statement_request(prepare("SELECT 1"), FakeStatement::new(), Duration::ZERO)
        .await;

    assert_ok!(statement.execute_query(None).await);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].context.is_empty());
}

#[tokio::test]
async fn extra_context_fields_are_copied() {
    let sink = MemorySink::new();
    let instrumentor = instrumentor_with(
        InstrumentorConfig::new()
            .enabled()
            .with_context_field("Tenant-Domain")
            .with_call_type("r2dbc"),
        &sink,
        None,
    );
    let ctx = correlated("Correlation-ID", "req-7");
    ctx.set("Tenant-Domain", "carbon.super");
    ctx.set("Unrelated", "skipped");

    let mut statement = instrumentor
        .on_statement_request(prepare("SELECT 1"), FakeStatement::new(), Duration::ZERO)
        .await;
    context::with_context(ctx, async {
        assert_ok!(statement.execute_query(None).await);
    })
    .await;

    let record = &sink.records()[0];
    assert_eq!(record.call_type, "r2dbc");
    assert_eq!(record.context_value("Correlation-ID"), Some("req-7"));
    assert_eq!(record.context_value("Tenant-Domain"), Some("carbon.super"));
    assert_eq!(record.context_value("Unrelated"), None);
}

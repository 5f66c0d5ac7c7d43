//! A request's correlation id reaches the records of statements it runs.

use reqtrace::{
    Connection, InstrumentedConnection, InstrumentorConfig, PropagatorConfig, ReqtraceConfig,
    Statement, context,
};
use std::time::Duration;
use test_support::common::{FAKE_URL, FakeConnection, MemorySink, instrumentor_with};
use tokio_test::assert_ok;

fn config() -> ReqtraceConfig {
    ReqtraceConfig::new()
        .with_propagator(
            PropagatorConfig::new()
                .with_header_mapping(r#"{"X-Req-Id": "Correlation-ID"}"#)
                .with_query_mapping(r#"{"correlation_id": "Correlation-ID"}"#),
        )
        .with_instrumentor(InstrumentorConfig::new().enabled())
}

#[tokio::test]
async fn header_id_is_carried_into_timed_query_record() {
    let config = config();
    let propagator = assert_ok!(config.propagator());
    let sink = MemorySink::new();
    let instrumentor = instrumentor_with(config.instrumentor.clone(), &sink, None);

    let request = http::Request::builder()
        .uri("/oauth2/token")
        .header("X-Req-Id", "abc-123")
        .body(())
        .expect("request");

    let rows = propagator
        .process(request, |_| async {
            let connection = FakeConnection::new().with_latency(Duration::from_millis(50));
            let mut connection = InstrumentedConnection::new(connection, instrumentor.clone());
            let mut statement = assert_ok!(
                connection
                    .prepare_statement("SELECT * FROM IDN_OAUTH2_ACCESS_TOKEN WHERE TOKEN_ID = ?")
                    .await
            );
            let rows = assert_ok!(statement.execute_query(None).await);
            assert_ok!(statement.close().await);
            rows
        })
        .await;

    assert_eq!(rows.len(), 2);
    let records = sink.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(
        record.query.as_deref(),
        Some("SELECT * FROM IDN_OAUTH2_ACCESS_TOKEN WHERE TOKEN_ID = ?")
    );
    assert_eq!(record.method_name, "executeQuery");
    assert_eq!(record.context_value("Correlation-ID"), Some("abc-123"));
    assert_eq!(record.connection_url.as_deref(), Some(FAKE_URL));
    assert_eq!(record.call_type, "jdbc");
    let delta = record.delta.expect("delta");
    assert!(delta >= 50, "delta was {delta}ms");
    assert!(record.start_time > 0);

    assert!(context::get("Correlation-ID").is_none());
}

#[tokio::test]
async fn query_parameter_id_is_used_when_header_missing() {
    let config = config();
    let propagator = assert_ok!(config.propagator());
    let sink = MemorySink::new();
    let instrumentor = instrumentor_with(config.instrumentor.clone(), &sink, None);

    let request = http::Request::builder()
        .uri("/commonauth?correlation_id=q-99&sessionDataKey=x")
        .body(())
        .expect("request");

    propagator
        .process(request, |_| async {
            let mut connection = InstrumentedConnection::new(FakeConnection::new(), instrumentor);
            let mut statement = assert_ok!(connection.create_statement().await);
            assert_ok!(statement.execute_update(Some("DELETE FROM IDN_AUTH_SESSION_STORE")).await);
        })
        .await;

    let records = sink.records();
    assert_eq!(records[0].context_value("Correlation-ID"), Some("q-99"));
    assert_eq!(records[0].query, None);
}

#[tokio::test]
async fn generated_id_is_shared_by_all_statements_of_a_request() {
    let config = config();
    let propagator = assert_ok!(config.propagator());
    let sink = MemorySink::new();
    let instrumentor = instrumentor_with(config.instrumentor.clone(), &sink, None);

    let expected = propagator
        .process(http::Request::new(()), |_| async {
            let mut connection = InstrumentedConnection::new(FakeConnection::new(), instrumentor);
            for sql in ["SELECT 1", "SELECT 2", "SELECT 3"] {
                let mut statement = assert_ok!(connection.prepare_statement(sql).await);
                assert_ok!(statement.execute_query(None).await);
            }
            context::get("Correlation-ID")
        })
        .await
        .expect("generated id");

    let records = sink.records();
    assert_eq!(records.len(), 3);
    assert!(
        records
            .iter()
            .all(|record| record.context_value("Correlation-ID") == Some(expected.as_str()))
    );
}

#[tokio::test]
async fn statements_run_on_the_blocking_pool_keep_the_id() {
    let config = config();
    let propagator = assert_ok!(config.propagator());
    let sink = MemorySink::new();
    let instrumentor = instrumentor_with(config.instrumentor.clone(), &sink, None);

    let request = http::Request::builder()
        .header("x-req-id", "blocking-7")
        .body(())
        .expect("request");

    propagator
        .process(request, |_| async {
            let handle = tokio::runtime::Handle::current();
            context::spawn_blocking(move || {
                handle.block_on(async {
                    let mut connection =
                        InstrumentedConnection::new(FakeConnection::new(), instrumentor);
                    let mut statement = assert_ok!(connection.prepare_statement("SELECT 1").await);
                    assert_ok!(statement.execute_query(None).await);
                })
            })
            .await
            .expect("blocking task");
        })
        .await;

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].context_value("Correlation-ID"), Some("blocking-7"));
}

#[tokio::test]
async fn disabled_instrumentation_leaves_statements_alone() {
    let config = config();
    let propagator = assert_ok!(config.propagator());
    let sink = MemorySink::new();
    let instrumentor = instrumentor_with(
        InstrumentorConfig::new().with_toggle(reqtrace::ToggleSource::Fixed { enabled: false }),
        &sink,
        None,
    );

    let request = http::Request::builder()
        .header("X-Req-Id", "off-1")
        .body(())
        .expect("request");

    propagator
        .process(request, |_| async {
            let mut connection = InstrumentedConnection::new(FakeConnection::new(), instrumentor);
            let mut statement = assert_ok!(connection.prepare_statement("SELECT 1").await);
            assert!(!statement.is_instrumented());
            assert_ok!(statement.execute_query(None).await);
        })
        .await;

    assert!(sink.records().is_empty());
}

#[tokio::test]
async fn blank_configured_key_still_reaches_records() {
    let config = assert_ok!(ReqtraceConfig::from_json(
        r#"{
            "propagator": {"correlation_key": ""},
            "instrumentor": {"toggle": {"source": "fixed", "enabled": true}}
        }"#
    ));
    let propagator = assert_ok!(config.propagator());
    assert_eq!(propagator.correlation_key(), "Correlation-ID");
    let sink = MemorySink::new();
    let instrumentor = instrumentor_with(config.instrumentor.clone(), &sink, None);

    let request = http::Request::builder()
        .uri("/oauth2/token")
        .body(())
        .expect("request");
    let generated = propagator
        .process(request, |_| async {
            let mut connection =
                InstrumentedConnection::new(FakeConnection::new(), instrumentor.clone());
            let mut statement = assert_ok!(connection.prepare_statement("SELECT 1").await);
            assert_ok!(statement.execute_query(None).await);
            context::get("Correlation-ID")
        })
        .await
        .expect("generated id");

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].context_value("Correlation-ID"), Some(generated.as_str()));
    assert!(records[0].context_value("").is_none());
}

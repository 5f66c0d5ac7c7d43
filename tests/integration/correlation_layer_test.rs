//! Tower middleware in front of a handler that queries the database.

use http::{Request, Response};
use reqtrace::{
    Connection, CorrelationLayer, InstrumentedConnection, InstrumentorConfig, PropagatorConfig,
    ReqtraceConfig, Statement, StatementInstrumentor,
};
use std::convert::Infallible;
use test_support::common::{FakeConnection, MemorySink, instrumentor_with};
use tower::{Service, ServiceBuilder, ServiceExt, service_fn};
use tracing_test::traced_test;

async fn lookup_user(
    instrumentor: StatementInstrumentor,
    request: Request<()>,
) -> Result<Response<String>, Infallible> {
    let mut connection = InstrumentedConnection::new(FakeConnection::new(), instrumentor);
    let user = request.uri().path().trim_start_matches("/users/").to_string();
    let body = match connection
        .prepare_statement("SELECT * FROM UM_USER WHERE UM_USER_NAME = ?")
        .await
    {
        Ok(mut statement) => match statement.execute_query(None).await {
            Ok(rows) => format!("{user}:{}", rows.len()),
            Err(e) => e.to_string(),
        },
        Err(e) => e.to_string(),
    };
    Ok(Response::new(body))
}

fn setup(sink: &MemorySink) -> (CorrelationLayer, StatementInstrumentor) {
    let config = ReqtraceConfig::new()
        .with_propagator(
            PropagatorConfig::new()
                .with_header_mapping(r#"{"X-Req-Id": "Correlation-ID"}"#)
                .with_response_header("X-Correlation-Id"),
        )
        .with_instrumentor(InstrumentorConfig::new().enabled());
    let propagator = config.propagator().expect("valid config");
    let instrumentor = instrumentor_with(config.instrumentor.clone(), sink, None);
    (CorrelationLayer::new(propagator), instrumentor)
}

#[tokio::test]
async fn handler_queries_carry_request_header_id() {
    let sink = MemorySink::new();
    let (layer, instrumentor) = setup(&sink);
    let service = ServiceBuilder::new()
        .layer(layer)
        .service(service_fn(move |req| lookup_user(instrumentor.clone(), req)));

    let request = Request::builder()
        .uri("/users/admin")
        .header("X-Req-Id", "abc-123")
        .body(())
        .expect("request");
    let response = service.oneshot(request).await.expect("response");

    assert_eq!(response.body(), "admin:2");
    assert_eq!(
        response
            .headers()
            .get("x-correlation-id")
            .and_then(|v| v.to_str().ok()),
        Some("abc-123")
    );
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].context_value("Correlation-ID"), Some("abc-123"));
}

#[tokio::test]
async fn each_request_gets_its_own_id() {
    let sink = MemorySink::new();
    let (layer, instrumentor) = setup(&sink);
    let mut service = ServiceBuilder::new()
        .layer(layer)
        .service(service_fn(move |req| lookup_user(instrumentor.clone(), req)));

    let mut echoed = Vec::new();
    for user in ["alice", "bob"] {
        let request = Request::builder()
            .uri(format!("/users/{user}"))
            .body(())
            .expect("request");
        let response = service
            .ready()
            .await
            .expect("ready")
            .call(request)
            .await
            .expect("response");
        let id = response
            .headers()
            .get("x-correlation-id")
            .and_then(|v| v.to_str().ok())
            .expect("echo header")
            .to_string();
        echoed.push(id);
    }

    assert_ne!(echoed[0], echoed[1]);
    let recorded: Vec<_> = sink
        .records()
        .iter()
        .map(|r| r.context_value("Correlation-ID").unwrap_or_default().to_string())
        .collect();
    assert_eq!(recorded, echoed);
}

#[tokio::test]
#[traced_test]
async fn handler_logs_carry_the_request_span() {
    let sink = MemorySink::new();
    let (layer, _) = setup(&sink);
    let service = ServiceBuilder::new()
        .layer(layer)
        .service(service_fn(|_req: Request<()>| async {
            tracing::info!("inside handler");
            Ok::<_, Infallible>(Response::new(String::new()))
        }));

    let request = Request::builder()
        .header("X-Req-Id", "span-1")
        .body(())
        .expect("request");
    service.oneshot(request).await.expect("response");

    assert!(logs_contain("inside handler"));
    assert!(logs_contain("reqtrace.request"));
    assert!(logs_contain("span-1"));
}

//! Serving over TCP.

use std::time::Duration;

use devserve::config::ServerOptions;
use devserve::{Address, ServeError};

mod common;

#[tokio::test]
async fn tcp_peer_is_real_client_address() {
    let server = common::spawn_server(Address::tcp("127.0.0.1", 0), common::peer_app, ServerOptions::default()).await;
    let client = common::http_client();

    let response = client.get(server.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let report: serde_json::Value = response.json().await.unwrap();

    assert_eq!(report["remote_addr"], "127.0.0.1");
    let port = report["remote_port"].as_u64().unwrap();
    assert_ne!(port, 0);
    assert_ne!(port, u64::from(server.tcp_addr().port()));
    assert_eq!(report["server_name"], "127.0.0.1");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn application_error_becomes_500() {
    let server = common::spawn_server(Address::tcp("127.0.0.1", 0), common::flaky_app, ServerOptions::default()).await;
    let client = common::http_client();

    let failed = client.get(server.url("/fail")).send().await.unwrap();
    assert_eq!(failed.status(), 500);
    assert!(failed.text().await.unwrap().contains("Internal Server Error"));

    // The server keeps serving after a failure.
    let ok = client.get(server.url("/")).send().await.unwrap();
    assert_eq!(ok.status(), 200);
    assert_eq!(ok.text().await.unwrap(), "ok");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn passthrough_error_stops_the_server() {
    let options = ServerOptions {
        passthrough_errors: true,
        ..Default::default()
    };
    let server = common::spawn_server(Address::tcp("127.0.0.1", 0), common::flaky_app, options).await;
    let client = common::http_client();

    let result = client.get(server.url("/fail")).send().await;
    assert!(result.is_err(), "connection should be aborted without a response");

    let outcome = tokio::time::timeout(Duration::from_secs(10), server.task)
        .await
        .expect("server kept running")
        .unwrap();
    match outcome {
        Err(ServeError::Application(message)) => assert!(message.contains("intentional failure")),
        other => panic!("unexpected serve result: {other:?}"),
    }
}

#[tokio::test]
async fn panics_become_500() {
    let app = |_: &devserve::Environ, _: &mut devserve::StartResponse| -> Result<devserve::Body, devserve::BoxError> {
        panic!("handler exploded");
    };
    let server = common::spawn_server(Address::tcp("127.0.0.1", 0), app, ServerOptions::default()).await;

    let response = common::http_client().get(server.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 500);
    server.stop().await.unwrap();
}

#[tokio::test]
async fn pool_mode_serves_concurrent_requests() {
    let options = ServerOptions {
        processes: 4,
        ..Default::default()
    };
    let server = common::spawn_server(
        Address::tcp("127.0.0.1", 0),
        common::slow_app(Duration::from_millis(300)),
        options,
    )
    .await;
    let client = common::http_client();

    let started = std::time::Instant::now();
    let requests = (0..4).map(|_| client.get(server.url("/")).send());
    let responses = futures_join_all(requests).await;
    for response in responses {
        assert_eq!(response.unwrap().status(), 200);
    }
    // Four 300ms handlers in parallel, well under the 1.2s a sequential server needs.
    assert!(started.elapsed() < Duration::from_millis(1100), "{:?}", started.elapsed());

    server.stop().await.unwrap();
}

#[tokio::test]
async fn sequential_mode_closes_each_connection() {
    let server = common::spawn_server(Address::tcp("127.0.0.1", 0), common::flaky_app, ServerOptions::default()).await;
    let client = common::http_client();

    // A pooled keep-alive connection would block the accept loop forever.
    for _ in 0..3 {
        let response = client.get(server.url("/")).send().await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "ok");
    }
    server.stop().await.unwrap();
}

async fn futures_join_all<F, T>(futures: impl Iterator<Item = F>) -> Vec<T>
where
    F: std::future::Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let handles: Vec<_> = futures.map(tokio::spawn).collect();
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

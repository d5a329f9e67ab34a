//! Integration tests for the readiness prober and smoke test runner
//! against a local HTTP fixture.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::net::TcpListener;

use common::FixtureServer;
use stopline_pipeline::{
    FailureKind, GateName, HealthCheckPolicy, Invocable, ProbeSpec, ProbeStatus, ReadinessProber,
    SmokeTestAction, SmokeTestRunner, StageStatus,
};

/// Always answer every path with the given status.
fn fixed(status: u16) -> common::Handler {
    Arc::new(move |_method, _path, _hit| (status, "{}".to_string()))
}

#[tokio::test]
async fn test_prober_ready_after_n_intervals() {
    // Unhealthy for the first two hits, then healthy.
    let server = FixtureServer::start(Arc::new(|_m, _p, hit| {
        if hit <= 2 {
            (503, "{}".to_string())
        } else {
            (200, "{}".to_string())
        }
    }))
    .await;

    let policy = HealthCheckPolicy::new(server.url("/health"), 100, 5_000, 200).unwrap();
    let start = Instant::now();
    let status = ReadinessProber::new().wait_until_ready(&policy).await;

    assert_eq!(status, ProbeStatus::Ready);
    // Two not-ready polls before the third succeeds: at least two intervals
    // elapsed, and well under the deadline.
    assert!(start.elapsed() >= Duration::from_millis(200));
    assert!(start.elapsed() < Duration::from_millis(2_000));
    assert_eq!(server.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_prober_times_out_when_never_ready() {
    let server = FixtureServer::start(fixed(503)).await;

    let policy = HealthCheckPolicy::new(server.url("/health"), 100, 500, 200).unwrap();
    let start = Instant::now();
    let status = ReadinessProber::new().wait_until_ready(&policy).await;

    assert_eq!(status, ProbeStatus::TimedOut);
    assert!(start.elapsed() >= Duration::from_millis(500));
    // Not substantially later than the deadline.
    assert!(start.elapsed() < Duration::from_millis(2_000));
}

#[tokio::test]
async fn test_prober_retries_through_connection_refused() {
    // Reserve a port, close it, and only start listening after a delay:
    // exactly what a freshly started service looks like.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let listener = TcpListener::bind(addr).await.expect("rebind");
        FixtureServer::start_on(listener, Arc::new(|_m, _p, _h| (200, "{}".to_string())));
        // Keep the task alive long enough for the probe to land.
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let policy =
        HealthCheckPolicy::new(format!("http://{}/health", addr), 100, 5_000, 200).unwrap();
    let status = ReadinessProber::new().wait_until_ready(&policy).await;
    assert_eq!(status, ProbeStatus::Ready);
}

#[tokio::test]
async fn test_smoke_all_probes_pass() {
    let server = FixtureServer::start(fixed(200)).await;
    let runner = SmokeTestRunner::new(server.base_url());

    let probes = vec![
        ProbeSpec::get("/health", 200),
        ProbeSpec::post("/predict", json!({"title": "Samsung Galaxy S21", "price": 699.99}), 200),
    ];
    let result = runner
        .run("smoke_test", GateName::AcceptanceGate, &probes)
        .await;

    assert_eq!(result.status, StageStatus::Passed);
    assert!(result.output.contains("GET /health -> 200"));
    assert!(result.output.contains("POST /predict -> 200"));
}

#[tokio::test]
async fn test_smoke_failure_names_offending_probe() {
    let server = FixtureServer::start(Arc::new(|_m, path, _h| {
        if path == "/health" {
            (200, "{}".to_string())
        } else {
            (500, "{}".to_string())
        }
    }))
    .await;
    let runner = SmokeTestRunner::new(server.base_url());

    let probes = vec![
        ProbeSpec::get("/health", 200),
        ProbeSpec::post("/predict", json!({"price": 1.0}), 200),
    ];
    let result = runner
        .run("smoke_test", GateName::AcceptanceGate, &probes)
        .await;

    assert_eq!(result.status, StageStatus::Failed);
    let info = result.exit_info.expect("exit info");
    assert_eq!(info.kind, FailureKind::Assertion);
    assert!(info.message.contains("/predict"));
    assert!(info.message.contains("500"));
}

#[tokio::test]
async fn test_smoke_action_waits_then_verifies() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    // Service comes up 300ms after the stage starts.
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let listener = TcpListener::bind(addr).await.expect("rebind");
        FixtureServer::start_on(listener, Arc::new(|_m, _p, _h| (200, "{}".to_string())));
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let policy =
        HealthCheckPolicy::new(format!("http://{}/health", addr), 100, 5_000, 200).unwrap();
    let action = SmokeTestAction::new(
        format!("http://{}", addr),
        policy,
        vec![ProbeSpec::get("/health", 200)],
    );

    let inv = action.invoke().await.expect("smoke action");
    assert_eq!(inv.exit_code, 0);
    assert!(inv.output.contains("GET /health -> 200"));
}

#[tokio::test]
async fn test_smoke_action_reports_timeout_when_service_never_starts() {
    // Nothing ever listens here.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let policy =
        HealthCheckPolicy::new(format!("http://{}/health", addr), 100, 400, 200).unwrap();
    let action = SmokeTestAction::new(
        format!("http://{}", addr),
        policy,
        vec![ProbeSpec::get("/health", 200)],
    );

    let err = action.invoke().await.expect_err("should time out");
    assert!(
        matches!(err, stopline_pipeline::InvokeError::Timeout(_)),
        "service never coming up must be a timeout, got: {}",
        err
    );
}

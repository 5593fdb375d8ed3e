//! Integration tests against an in-process mock decision service (axum).
//!
//! The mock mirrors the remote contract: `GET /api/get_ip`,
//! `GET /api/set_algorithm/{name}`, `POST /api/add_ip`. It always rotates
//! targets in order; the real algorithms live in the remote service.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use lbviz_client::{ADD_IP_PATH, DecisionClientConfig, DecisionService, HttpDecisionClient};
use lbviz_types::{Algorithm, TransportError};

#[derive(Debug)]
struct MockState {
    ips: Vec<String>,
    counts: HashMap<String, u64>,
    next: usize,
    algorithm: String,
}

impl Default for MockState {
    fn default() -> Self {
        let ips: Vec<String> = ["ip1", "ip2", "ip3"].iter().map(ToString::to_string).collect();
        let counts = ips.iter().map(|ip| (ip.clone(), 0)).collect();
        Self {
            ips,
            counts,
            next: 0,
            algorithm: "round_robin".to_string(),
        }
    }
}

type Shared = Arc<Mutex<MockState>>;

async fn get_ip(State(state): State<Shared>) -> Result<Json<Value>, StatusCode> {
    let mut s = state.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let ip = s.ips[s.next % s.ips.len()].clone();
    s.next += 1;
    *s.counts.entry(ip.clone()).or_default() += 1;
    Ok(Json(json!({ "ip": ip, "message": "hello", "stats": s.counts })))
}

async fn set_algorithm(
    State(state): State<Shared>,
    Path(name): Path<String>,
) -> (StatusCode, Json<Value>) {
    if name.parse::<Algorithm>().is_err() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": "unknown algorithm" })),
        );
    }
    if let Ok(mut s) = state.lock() {
        s.algorithm = name;
    }
    (StatusCode::OK, Json(json!({ "success": true })))
}

async fn add_ip(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let ip = body.get("ip").and_then(Value::as_str).unwrap_or_default();
    if ip.is_empty() {
        return Json(json!({ "success": false, "message": "Invalid IP" }));
    }
    if let Ok(mut s) = state.lock()
        && !s.ips.iter().any(|known| known == ip)
    {
        s.ips.push(ip.to_string());
        s.counts.insert(ip.to_string(), 0);
    }
    Json(json!({ "success": true, "message": format!("Added {ip}") }))
}

fn decision_router(state: Shared) -> Router {
    Router::new()
        .route("/api/get_ip", get(get_ip))
        .route("/api/set_algorithm/{name}", get(set_algorithm))
        .route("/api/add_ip", post(add_ip))
        .with_state(state)
}

struct MockServer {
    base_url: String,
    ct: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl MockServer {
    async fn start(router: Router) -> Self {
        let ct = CancellationToken::new();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local_addr");
        let handle = tokio::spawn({
            let ct = ct.clone();
            async move {
                let _ = axum::serve(listener, router)
                    .with_graceful_shutdown(async move { ct.cancelled_owned().await })
                    .await;
            }
        });
        Self {
            base_url: format!("http://{addr}"),
            ct,
            handle,
        }
    }

    fn client(&self, request_timeout_ms: u64) -> HttpDecisionClient {
        HttpDecisionClient::from_config(&DecisionClientConfig {
            base_url: self.base_url.clone(),
            request_timeout_ms,
        })
        .expect("build client")
    }

    async fn stop(self) {
        self.ct.cancel();
        let _ = self.handle.await;
    }
}

#[tokio::test]
async fn select_target_decodes_decision_and_stats() {
    let state = Shared::default();
    let server = MockServer::start(decision_router(state)).await;
    let client = server.client(2_000);

    let first = client.select_target().await.expect("select_target");
    assert_eq!(first.target_id, "ip1");
    assert_eq!(first.message, "hello");
    assert_eq!(first.counts_by_target.get("ip1"), Some(&1));
    assert_eq!(first.counts_by_target.get("ip2"), Some(&0));

    let second = client.select_target().await.expect("select_target");
    assert_eq!(second.target_id, "ip2");
    assert_eq!(second.counts_by_target.get("ip2"), Some(&1));

    server.stop().await;
}

#[tokio::test]
async fn set_algorithm_sends_wire_name() {
    let state = Shared::default();
    let server = MockServer::start(decision_router(Arc::clone(&state))).await;
    let client = server.client(2_000);

    client
        .set_algorithm(Algorithm::LeastConnections)
        .await
        .expect("set_algorithm");
    let algorithm = state.lock().expect("lock").algorithm.clone();
    assert_eq!(algorithm, "least_connections");

    server.stop().await;
}

#[tokio::test]
async fn register_target_adds_to_rotation() {
    let state = Shared::default();
    let server = MockServer::start(decision_router(Arc::clone(&state))).await;
    let client = server.client(2_000);

    client.register_target("ip4").await.expect("register_target");
    let decision = client.select_target().await.expect("select_target");
    assert_eq!(decision.counts_by_target.get("ip4"), Some(&0));
    assert_eq!(state.lock().expect("lock").ips.len(), 4);

    server.stop().await;
}

#[tokio::test]
async fn register_target_success_false_is_rejected() {
    let server = MockServer::start(decision_router(Shared::default())).await;
    let client = server.client(2_000);

    let err = client.register_target("").await.unwrap_err();
    assert_eq!(
        err,
        TransportError::Rejected {
            endpoint: ADD_IP_PATH.to_string(),
            message: "Invalid IP".to_string(),
        }
    );

    server.stop().await;
}

#[tokio::test]
async fn server_error_maps_to_status() {
    let router = Router::new().route(
        "/api/get_ip",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let server = MockServer::start(router).await;
    let client = server.client(2_000);

    let err = client.select_target().await.unwrap_err();
    match err {
        TransportError::Status { status, .. } => assert_eq!(status, 500),
        other => panic!("expected Status, got {other:?}"),
    }

    server.stop().await;
}

#[tokio::test]
async fn malformed_body_maps_to_decode() {
    let router = Router::new().route("/api/get_ip", get(|| async { "not json" }));
    let server = MockServer::start(router).await;
    let client = server.client(2_000);

    let err = client.select_target().await.unwrap_err();
    assert!(
        matches!(err, TransportError::Decode { .. }),
        "expected Decode, got {err:?}"
    );

    server.stop().await;
}

#[tokio::test]
async fn slow_service_maps_to_timeout() {
    let router = Router::new().route(
        "/api/get_ip",
        get(|| async {
            tokio::time::sleep(Duration::from_millis(1_000)).await;
            Json(json!({ "ip": "ip1", "message": "late", "stats": {} }))
        }),
    );
    let server = MockServer::start(router).await;
    let client = server.client(50);

    let err = client.select_target().await.unwrap_err();
    assert_eq!(
        err,
        TransportError::Timeout {
            endpoint: "/api/get_ip".to_string(),
            timeout_ms: 50,
        }
    );

    server.stop().await;
}

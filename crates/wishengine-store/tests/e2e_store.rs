//! End-to-end tests for the message store client.
//!
//! These tests spin up a small in-memory store on an OS-assigned ephemeral
//! port and drive the real client against it over HTTP.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State as AxumState};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use wishengine_core::State;
use wishengine_store::{MessageStore, MessageStoreClient, StoreConfig, StoreError};

// ── helpers ──────────────────────────────────────────────────────────────────

/// In-memory store: records are kept newest first.
#[derive(Default)]
struct FakeStore {
    records: Mutex<Vec<Value>>,
}

#[derive(Deserialize)]
struct FetchQuery {
    state: String,
    limit: usize,
}

async fn post_message(
    AxumState(store): AxumState<Arc<FakeStore>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let mut records = store.records.lock().unwrap();
    let id = records.len() + 1;
    let mut record = body;
    record["id"] = json!(id);
    record["created_at"] = json!("2026-10-17T12:00:00Z");
    records.insert(0, record);
    (StatusCode::CREATED, Json(json!({"ok": true, "id": id})))
}

async fn get_messages(
    AxumState(store): AxumState<Arc<FakeStore>>,
    Query(query): Query<FetchQuery>,
) -> Json<Value> {
    let records = store.records.lock().unwrap();
    let matching: Vec<Value> = records
        .iter()
        .filter(|r| r["state"] == query.state.as_str())
        .take(query.limit)
        .cloned()
        .collect();
    Json(Value::Array(matching))
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to port 0");
    let addr: SocketAddr = listener.local_addr().expect("get local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    format!("http://127.0.0.1:{}", addr.port())
}

/// Start the in-memory store and return its base URL.
async fn start_fake_store() -> (String, Arc<FakeStore>) {
    let store = Arc::new(FakeStore::default());
    let app = Router::new()
        .route("/messages", get(get_messages).post(post_message))
        .route("/health", get(|| async { "ok" }))
        .with_state(Arc::clone(&store));
    (serve(app).await, store)
}

fn client_for(endpoint: &str, timeout: Duration) -> MessageStoreClient {
    MessageStoreClient::new(StoreConfig {
        endpoint: endpoint.to_string(),
        timeout,
        connect_timeout: timeout,
    })
    .expect("client")
}

fn client(endpoint: &str) -> MessageStoreClient {
    client_for(endpoint, Duration::from_secs(5))
}

// ── store + fetch ────────────────────────────────────────────────────────────

#[tokio::test]
async fn store_then_fetch_round_trips_text_and_state() {
    let (base, _store) = start_fake_store().await;
    let client = client(&base);

    assert!(client.store("yes please", State::Positive).await.unwrap());

    let fetched = client.fetch(State::Positive, 1).await.unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].text, "yes please");
    assert_eq!(fetched[0].state, State::Positive);
    assert_eq!(fetched[0].id.as_deref(), Some("1"));
    assert!(fetched[0].created_at.is_some());
}

#[tokio::test]
async fn store_sends_state_token() {
    let (base, store) = start_fake_store().await;
    let client = client(&base);

    client.store("nope", State::Negative).await.unwrap();

    let records = store.records.lock().unwrap();
    assert_eq!(records[0]["state"], "negative");
    assert_eq!(records[0]["text"], "nope");
}

#[tokio::test]
async fn fetch_filters_by_state_in_store_order() {
    let (base, _store) = start_fake_store().await;
    let client = client(&base);

    client.store("first yes", State::Positive).await.unwrap();
    client.store("a no", State::Negative).await.unwrap();
    client.store("second yes", State::Positive).await.unwrap();

    let positives = client.fetch(State::Positive, 10).await.unwrap();
    let texts: Vec<&str> = positives.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["second yes", "first yes"]);

    let negatives = client.fetch(State::Negative, 10).await.unwrap();
    assert_eq!(negatives.len(), 1);
    assert_eq!(negatives[0].text, "a no");
}

#[tokio::test]
async fn fetch_with_zero_limit_is_empty_without_request() {
    // Nothing listens on this endpoint; a request would fail.
    let client = client("http://127.0.0.1:9");
    let fetched = client.fetch(State::Positive, 0).await.unwrap();
    assert!(fetched.is_empty());
}

// ── response validation ─────────────────────────────────────────────────────

#[tokio::test]
async fn malformed_records_are_skipped_individually() {
    let app = Router::new().route(
        "/messages",
        get(|| async {
            Json(json!([
                {"text": "good one", "state": "positive"},
                "not an object",
                {"body": "no text field"},
                {"text": "odd state", "state": "ecstatic"},
                {"text": "no state"}
            ]))
        }),
    );
    let base = serve(app).await;
    let fetched = client(&base).fetch(State::Positive, 10).await.unwrap();

    let texts: Vec<&str> = fetched.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["good one", "odd state", "no state"]);
    assert_eq!(fetched[1].state, State::Unknown);
    assert_eq!(fetched[2].state, State::Positive);
}

#[tokio::test]
async fn fetch_truncates_to_limit() {
    let app = Router::new().route(
        "/messages",
        get(|| async { Json(json!([{"text": "a"}, {"text": "b"}, {"text": "c"}])) }),
    );
    let base = serve(app).await;
    let fetched = client(&base).fetch(State::Negative, 2).await.unwrap();
    assert_eq!(fetched.len(), 2);
}

#[tokio::test]
async fn non_array_fetch_body_is_an_error() {
    let app = Router::new().route(
        "/messages",
        get(|| async { Json(json!({"messages": []})) }),
    );
    let base = serve(app).await;
    let err = client(&base).fetch(State::Positive, 1).await.unwrap_err();
    assert!(matches!(err, StoreError::MalformedResponse { .. }), "got {err:?}");
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let app = Router::new().route(
        "/messages",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "db down") })
            .post(|| async { (StatusCode::BAD_REQUEST, "bad state") }),
    );
    let base = serve(app).await;
    let client = client(&base);

    match client.store("yes", State::Positive).await.unwrap_err() {
        StoreError::Status { status, body, .. } => {
            assert_eq!(status, 400);
            assert_eq!(body, "bad state");
        }
        other => panic!("expected Status, got {other:?}"),
    }
    assert!(matches!(
        client.fetch(State::Positive, 1).await.unwrap_err(),
        StoreError::Status { status: 500, .. }
    ));
}

#[tokio::test]
async fn store_rejection_and_empty_body_are_unconfirmed() {
    let app = Router::new()
        .route(
            "/messages",
            axum::routing::post(|| async { Json(json!({"ok": false, "error": "quota"})) }),
        )
        .route("/empty/messages", axum::routing::post(|| async { StatusCode::NO_CONTENT }))
        .route("/null/messages", axum::routing::post(|| async { Json(Value::Null) }));
    let base = serve(app).await;

    assert!(!client(&base).store("yes", State::Positive).await.unwrap());
    let empty = client(&format!("{base}/empty"));
    assert!(!empty.store("yes", State::Positive).await.unwrap());
    let null = client(&format!("{base}/null"));
    assert!(!null.store("yes", State::Positive).await.unwrap());
}

#[tokio::test]
async fn non_json_store_body_is_an_error() {
    let app = Router::new().route(
        "/messages",
        axum::routing::post(|| async { "<html>proxy page</html>" }),
    );
    let base = serve(app).await;
    let err = client(&base).store("yes", State::Positive).await.unwrap_err();
    assert!(matches!(err, StoreError::MalformedResponse { .. }), "got {err:?}");
}

// ── transport failures ──────────────────────────────────────────────────────

#[tokio::test]
async fn slow_store_times_out() {
    let app = Router::new().route(
        "/messages",
        axum::routing::post(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({"ok": true}))
        }),
    );
    let base = serve(app).await;
    let client = client_for(&base, Duration::from_millis(200));

    let err = client.store("yes", State::Positive).await.unwrap_err();
    assert!(err.is_timeout(), "got {err:?}");
}

#[tokio::test]
async fn unreachable_store_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = client(&format!("http://127.0.0.1:{port}"));
    let err = client.fetch(State::Positive, 1).await.unwrap_err();
    assert!(matches!(err, StoreError::Network { .. }), "got {err:?}");
}

// ── health ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_status_and_body() {
    let (base, _store) = start_fake_store().await;
    let report = client(&base).health().await.unwrap();
    assert!(report.connected);
    assert_eq!(report.status_code, 200);
    assert_eq!(report.body, "ok");
    assert_eq!(report.endpoint, base);
}

#[tokio::test]
async fn unhealthy_status_is_a_report_not_an_error() {
    let app = Router::new().route(
        "/health",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "draining") }),
    );
    let base = serve(app).await;
    let report = client(&base).health().await.unwrap();
    assert!(!report.connected);
    assert_eq!(report.status_code, 503);
}

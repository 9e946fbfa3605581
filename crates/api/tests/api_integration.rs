//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use orders::ReconciliationConfig;
use serde_json::{Value, json};
use store::Store;
use tower::ServiceExt;

use common::WarehouseId;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn setup() -> Router {
    let store = Store::in_memory().await.unwrap();
    let state = Arc::new(api::AppState::new(
        store,
        ReconciliationConfig::delivering_to(WarehouseId::new(1)),
    ));
    api::create_app(state, get_metrics_handle())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Warehouse 1 holding ten copies of "111" through a committed inbound note.
async fn stocked(app: &Router) {
    let (status, _) = send(
        app,
        "PUT",
        "/warehouses/1",
        Some(json!({ "display_name": "Main", "discount": 10.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        app,
        "PUT",
        "/books/111",
        Some(json!({ "isbn": "111", "title": "Dune", "publisher": "Penguin", "price": 20.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, note) = send(
        app,
        "POST",
        "/notes",
        Some(json!({ "id": 1, "warehouse_id": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(note["kind"], "inbound");

    let (status, _) = send(
        app,
        "POST",
        "/notes/1/lines",
        Some(json!([{ "isbn": "111", "quantity": 10 }])),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, note) = send(app, "POST", "/notes/1/commit", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(note["state"], "Committed");
}

#[tokio::test]
async fn test_health_check() {
    let app = setup().await;

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["database"], "ok");
}

#[tokio::test]
async fn test_warehouse_roundtrip() {
    let app = setup().await;

    send(
        &app,
        "PUT",
        "/warehouses/3",
        Some(json!({ "display_name": "Back room" })),
    )
    .await;
    let (status, json) = send(&app, "GET", "/warehouses/3", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["display_name"], "Back room");
    assert_eq!(json["total_books"], 0);
}

#[tokio::test]
async fn test_missing_warehouse_returns_404() {
    let app = setup().await;

    let (status, _) = send(&app, "GET", "/warehouses/99", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_committed_inbound_note_shows_in_stock() {
    let app = setup().await;
    stocked(&app).await;

    let (status, json) = send(&app, "GET", "/stock?isbns=111", None).await;

    assert_eq!(status, StatusCode::OK);
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["quantity"], 10);
    assert_eq!(entries[0]["warehouse_id"], 1);
}

#[tokio::test]
async fn test_outbound_commit_reports_violations() {
    let app = setup().await;
    stocked(&app).await;

    let (status, note) = send(&app, "POST", "/notes", Some(json!({ "id": 2 }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(note["kind"], "outbound");

    send(
        &app,
        "POST",
        "/notes/2/lines",
        Some(json!([
            { "isbn": "111", "quantity": 12, "warehouse_id": 1 },
            { "isbn": "222", "quantity": 1 }
        ])),
    )
    .await;
    let (status, json) = send(&app, "POST", "/notes/2/commit", None).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let violations = &json["violations"];
    assert_eq!(violations["out_of_stock"][0]["isbn"], "111");
    assert_eq!(violations["out_of_stock"][0]["available"], 10);
    assert_eq!(violations["no_warehouse"][0]["isbn"], "222");

    let (_, note) = send(&app, "GET", "/notes/2", None).await;
    assert_eq!(note["state"], "Draft");
}

#[tokio::test]
async fn test_missing_note_returns_404() {
    let app = setup().await;

    let (status, json) = send(&app, "GET", "/notes/42", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_customer_books_become_possible_orders() {
    let app = setup().await;
    send(
        &app,
        "PUT",
        "/books/111",
        Some(json!({ "isbn": "111", "title": "Dune", "publisher": "Penguin", "price": 20.0 })),
    )
    .await;

    let (status, customer) = send(
        &app,
        "PUT",
        "/customers/1",
        Some(json!({ "display_id": "1", "fullname": "Ada" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(customer["fullname"], "Ada");

    let (status, json) = send(
        &app,
        "POST",
        "/customers/1/books",
        Some(json!({ "isbns": ["111", "111"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["line_ids"].as_array().unwrap().len(), 2);

    let (status, json) = send(&app, "GET", "/supplier-orders/possible", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["supplier_name"], "General");
    assert_eq!(json[0]["total_book_number"], 2);
}

#[tokio::test]
async fn test_duplicate_display_id_conflicts() {
    let app = setup().await;
    send(
        &app,
        "PUT",
        "/customers/1",
        Some(json!({ "display_id": "7" })),
    )
    .await;

    let (status, _) = send(
        &app,
        "PUT",
        "/customers/2",
        Some(json!({ "display_id": "7" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_reconciliation_flow() {
    let app = setup().await;
    send(
        &app,
        "PUT",
        "/books/111",
        Some(json!({ "isbn": "111", "title": "Dune", "publisher": "Penguin", "price": 20.0 })),
    )
    .await;
    send(
        &app,
        "PUT",
        "/customers/1",
        Some(json!({ "display_id": "1" })),
    )
    .await;
    send(
        &app,
        "POST",
        "/customers/1/books",
        Some(json!({ "isbns": ["111"] })),
    )
    .await;

    let (status, json) = send(
        &app,
        "POST",
        "/supplier-orders",
        Some(json!({ "lines": [{ "isbn": "111", "quantity": 1 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = json["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        "POST",
        "/reconciliation-orders",
        Some(json!({ "id": 1, "supplier_order_ids": [order_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    send(
        &app,
        "POST",
        "/reconciliation-orders/1/lines",
        Some(json!([{ "isbn": "111", "quantity": 1 }])),
    )
    .await;

    let (status, report) = send(&app, "GET", "/reconciliation-orders/1/delivery", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["processed_lines"][0]["delivered_quantity"], 1);
    assert!(report["unmatched_books"].as_array().unwrap().is_empty());

    let (status, finalization) =
        send(&app, "POST", "/reconciliation-orders/1/finalize", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(finalization["received_lines"].as_array().unwrap().len(), 1);
    assert!(finalization["note_id"].is_i64());

    let (_, lines) = send(&app, "GET", "/customers/1/lines", None).await;
    assert_eq!(lines[0]["status"], "Received");

    let (status, _) = send(&app, "POST", "/reconciliation-orders/1/finalize", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, stock) = send(&app, "GET", "/stock?isbns=111", None).await;
    assert_eq!(stock[0]["quantity"], 1);
    assert_eq!(stock[0]["warehouse_id"], 1);
}

#[tokio::test]
async fn test_reconciling_unknown_supplier_order_returns_404() {
    let app = setup().await;

    let (status, json) = send(
        &app,
        "POST",
        "/reconciliation-orders",
        Some(json!({ "id": 1, "supplier_order_ids": [99] })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

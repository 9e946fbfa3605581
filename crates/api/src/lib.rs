//! HTTP API server for the bookstock ledger and order pipeline.
//!
//! Exposes stock, warehouses, notes, customers, supplier orders and
//! reconciliation over REST, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use domain::{BookCatalog, NoteLedger, WarehouseService};
use metrics_exporter_prometheus::PrometheusHandle;
use orders::{CustomerService, ReconciliationConfig, ReconciliationService, SupplierService};
use projections::StockView;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub books: BookCatalog,
    pub warehouses: WarehouseService,
    pub notes: NoteLedger,
    pub stock: StockView,
    pub customers: CustomerService,
    pub suppliers: SupplierService,
    pub reconciliation: ReconciliationService,
}

impl AppState {
    /// Builds every service over one store.
    pub fn new(store: Store, reconciliation: ReconciliationConfig) -> Self {
        Self {
            books: BookCatalog::new(store.clone()),
            warehouses: WarehouseService::new(store.clone()),
            notes: NoteLedger::new(store.clone()),
            stock: StockView::new(store.clone()),
            customers: CustomerService::new(store.clone()),
            suppliers: SupplierService::new(store.clone()),
            reconciliation: ReconciliationService::new(store.clone(), reconciliation),
            store,
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/stock", get(routes::stock::get))
        .route("/books", get(routes::stock::search_books))
        .route("/books/{isbn}", get(routes::stock::get_book).put(routes::stock::upsert_book))
        .route("/publishers", get(routes::stock::publishers))
        .route("/warehouses", get(routes::warehouses::list))
        .route(
            "/warehouses/{id}",
            get(routes::warehouses::get)
                .put(routes::warehouses::upsert)
                .delete(routes::warehouses::delete),
        )
        .route("/notes", post(routes::notes::create))
        .route(
            "/notes/{id}",
            get(routes::notes::get)
                .put(routes::notes::update)
                .delete(routes::notes::delete),
        )
        .route(
            "/notes/{id}/lines",
            get(routes::notes::entries).post(routes::notes::add_lines),
        )
        .route("/notes/{id}/commit", post(routes::notes::commit))
        .route("/notes/{id}/receipt", get(routes::notes::receipt))
        .route("/customers", get(routes::customers::list))
        .route(
            "/customers/{id}",
            get(routes::customers::get).put(routes::customers::upsert),
        )
        .route(
            "/customers/{id}/books",
            post(routes::customers::add_books).delete(routes::customers::remove_books),
        )
        .route("/customers/{id}/lines", get(routes::customers::lines))
        .route("/customer-lines/collect", post(routes::customers::collect))
        .route("/suppliers", get(routes::supplier_orders::list_suppliers))
        .route("/suppliers/{id}", put(routes::supplier_orders::upsert_supplier))
        .route(
            "/suppliers/{id}/publishers",
            get(routes::supplier_orders::publishers).post(routes::supplier_orders::associate),
        )
        .route(
            "/supplier-orders",
            get(routes::supplier_orders::placed).post(routes::supplier_orders::create),
        )
        .route("/supplier-orders/possible", get(routes::supplier_orders::possible))
        .route(
            "/supplier-orders/possible/lines",
            get(routes::supplier_orders::possible_lines),
        )
        .route(
            "/reconciliation-orders",
            get(routes::reconciliation::list).post(routes::reconciliation::create),
        )
        .route(
            "/reconciliation-orders/{id}",
            get(routes::reconciliation::get).delete(routes::reconciliation::delete),
        )
        .route(
            "/reconciliation-orders/{id}/lines",
            get(routes::reconciliation::lines).post(routes::reconciliation::add_lines),
        )
        .route(
            "/reconciliation-orders/{id}/lines/{isbn}",
            delete(routes::reconciliation::remove_line),
        )
        .route(
            "/reconciliation-orders/{id}/delivery",
            get(routes::reconciliation::delivery),
        )
        .route(
            "/reconciliation-orders/{id}/finalize",
            post(routes::reconciliation::finalize),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

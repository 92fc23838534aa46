//! HTTP API Layer
//!
//! REST surface over the reconciliation service using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: balances, manual ledger entries, receipt settlement
//! - **Middleware**: tracing and an audit log keyed by the `X-Operator` header
//! - **DTOs**: request/response bodies, validated before reaching the domain
//! - **Error Handling**: `SettlementError` mapped onto status codes
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let app = create_router(store);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware as axum_middleware,
};
use tower_http::trace::TraceLayer;
use tower_http::cors::{CorsLayer, Any};

use domain_settlement::{ReconciliationService, SettlementStore};

use crate::middleware::audit_middleware;
use crate::handlers::{balances, health, ledgers, receipts};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: ReconciliationService,
}

/// Creates the main API router over the given store
pub fn create_router(store: Arc<dyn SettlementStore>) -> Router {
    let state = AppState {
        service: ReconciliationService::new(store),
    };

    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let balance_routes = Router::new()
        .route("/", get(balances::get_balances))
        .route("/receipts", get(balances::get_receipt_breakdown));

    let ledger_routes = Router::new()
        .route("/:ledger/payments", post(ledgers::record_payment))
        .route("/:ledger/charges", post(ledgers::record_charge))
        .route("/:ledger/transactions/:id/reverse", post(ledgers::reverse_transaction));

    let receipt_routes = Router::new()
        .route("/:id/settle", post(receipts::settle))
        .route("/:id/return-to-settlement", post(receipts::return_to_settlement))
        .route("/:id/return-to-active", post(receipts::return_to_active));

    let api_routes = Router::new()
        .nest("/balances", balance_routes)
        .nest("/ledgers", ledger_routes)
        .nest("/receipts", receipt_routes)
        .layer(axum_middleware::from_fn(audit_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

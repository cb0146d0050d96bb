//! Nexus ERP
//!
//! Order lifecycle and stock-ledger backend: sales orders with an approval
//! step that allocates stock, an append-only movement ledger, purchase
//! receipts and an audit trail, served over an axum JSON API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::ServiceError;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub services: handlers::AppServices,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let services = handlers::AppServices::new(db.clone(), &config);
        Self {
            db,
            config: Arc::new(config),
            services,
            started_at: Instant::now(),
        }
    }
}

// Common response wrapper
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ServiceError>;

/// Routes that require a bearer token
fn protected_routes(state: &AppState) -> Router<AppState> {
    use handlers::{audit_logs, auth as auth_handlers, inventory, orders, purchase_orders};

    Router::new()
        // Sales orders
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route(
            "/orders/:id",
            get(orders::get_order).put(orders::update_order_status),
        )
        .route("/orders/:id/approve", post(orders::approve_order))
        // Stock ledger
        .route("/stock", get(inventory::list_stock))
        .route("/stock/movements", get(inventory::list_movements))
        .route("/stock/adjust", post(inventory::adjust_stock))
        .route("/stock/transfer", post(inventory::transfer_stock))
        // Purchasing
        .route(
            "/purchase-orders",
            get(purchase_orders::list_purchase_orders)
                .post(purchase_orders::create_purchase_order),
        )
        .route(
            "/purchase-orders/:id/receive",
            post(purchase_orders::receive_purchase_order),
        )
        // Audit and identity
        .route("/audit-logs", get(audit_logs::list_audit_logs))
        .route("/auth/me", get(auth_handlers::me))
        .route_layer(middleware::from_fn_with_state(
            state.services.auth.clone(),
            auth::auth_middleware,
        ))
}

/// Builds the complete application router with its middleware stack.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Status and health endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/status", get(handlers::health::api_status))
        .route("/auth/login", post(handlers::auth::login))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .merge(protected_routes(&state))
        .fallback(route_not_found)
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(middleware_helpers::cors_layer(&state.config))
        // Ensure every request carries a request id for traceability
        .layer(middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

async fn route_not_found() -> ServiceError {
    ServiceError::NotFound("Route not found".to_string())
}

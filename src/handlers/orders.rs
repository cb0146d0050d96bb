use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::sales_order,
    errors::ServiceError,
    handlers::AppState,
    middleware_helpers::{ApiJson, ClientIp, OptionalJson},
    services::{
        order_approval::{ApprovalOutcome, ApproveOrderRequest},
        order_status::{parse_status, UpdateOrderStatusRequest},
        order_validation::NewOrder,
        orders::{CreatedOrder, OrderDetail, OrderSummary},
    },
    ApiResponse, ApiResult,
};

/// List orders
#[utoipa::path(
    get,
    path = "/orders",
    summary = "List orders",
    description = "Every order that has not been soft-deleted, newest first, with customer name and total",
    responses(
        (status = 200, description = "Orders retrieved successfully", body = ApiResponse<Vec<OrderSummary>>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    _auth_user: AuthUser,
) -> ApiResult<Vec<OrderSummary>> {
    let orders = state.services.orders.list_orders().await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// Create a new order
///
/// The body is taken as raw JSON so that every violation can be reported at
/// once instead of failing on the first field serde rejects.
#[utoipa::path(
    post,
    path = "/orders",
    summary = "Create order",
    request_body = NewOrder,
    responses(
        (status = 201, description = "Order created in DRAFT", body = ApiResponse<CreatedOrder>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid order; `details` lists every violation", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ClientIp(ip): ClientIp,
    ApiJson(payload): ApiJson<Value>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedOrder>>), ServiceError> {
    let created = state
        .services
        .orders
        .create_order(&payload, auth_user.user_id, ip)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// Get order by ID
#[utoipa::path(
    get,
    path = "/orders/{id}",
    summary = "Get order",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with its items", body = ApiResponse<OrderDetail>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _auth_user: AuthUser,
) -> ApiResult<OrderDetail> {
    let order = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Update order status
#[utoipa::path(
    put,
    path = "/orders/{id}",
    summary = "Update order status",
    description = "Moves the order along the status table. DRAFT orders are approved through the approve endpoint instead.",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated"),
        (status = 400, description = "Transition not permitted", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    ClientIp(ip): ClientIp,
    ApiJson(request): ApiJson<UpdateOrderStatusRequest>,
) -> ApiResult<sales_order::Model> {
    let next = parse_status(&request.status)?;
    let updated = state
        .services
        .order_status
        .apply_transition(id, next, auth_user.user_id, ip)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// Approve a DRAFT order and allocate its stock
#[utoipa::path(
    post,
    path = "/orders/{id}/approve",
    summary = "Approve order",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body(content = ApproveOrderRequest, description = "Optional warehouse override"),
    responses(
        (status = 200, description = "Order approved and stock deducted", body = ApiResponse<ApprovalOutcome>),
        (status = 400, description = "Order not in DRAFT or stock insufficient", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or warehouse not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn approve_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    ClientIp(ip): ClientIp,
    OptionalJson(request): OptionalJson<ApproveOrderRequest>,
) -> ApiResult<ApprovalOutcome> {
    let outcome = state
        .services
        .approvals
        .approve(id, request.warehouse_id, auth_user.user_id, ip)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

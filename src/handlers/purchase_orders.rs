use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::purchase_order,
    errors::ServiceError,
    handlers::AppState,
    middleware_helpers::{ApiJson, ClientIp, OptionalJson},
    services::purchase_orders::{
        CreatePurchaseOrderRequest, PurchaseOrderSummary, ReceiptOutcome,
        ReceivePurchaseOrderRequest,
    },
    ApiResponse, ApiResult,
};

#[utoipa::path(
    get,
    path = "/purchase-orders",
    summary = "List purchase orders",
    responses(
        (status = 200, description = "Purchase orders with item count and total", body = ApiResponse<Vec<PurchaseOrderSummary>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "purchase-orders"
)]
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    _auth_user: AuthUser,
) -> ApiResult<Vec<PurchaseOrderSummary>> {
    let orders = state.services.purchase_orders.list().await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    post,
    path = "/purchase-orders",
    summary = "Create purchase order",
    request_body = CreatePurchaseOrderRequest,
    responses(
        (status = 201, description = "Purchase order created in DRAFT"),
        (status = 400, description = "Missing supplier or items", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "purchase-orders"
)]
pub async fn create_purchase_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ClientIp(ip): ClientIp,
    ApiJson(request): ApiJson<CreatePurchaseOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<purchase_order::Model>>), ServiceError> {
    let created = state
        .services
        .purchase_orders
        .create(request, auth_user.user_id, ip)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// Receive a purchase order into a warehouse
#[utoipa::path(
    post,
    path = "/purchase-orders/{id}/receive",
    summary = "Receive purchase order",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    request_body(content = ReceivePurchaseOrderRequest, description = "Optional warehouse override"),
    responses(
        (status = 200, description = "Items booked in and purchase order completed", body = ApiResponse<ReceiptOutcome>),
        (status = 400, description = "Already received or no warehouse", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Purchase order or warehouse not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "purchase-orders"
)]
pub async fn receive_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    ClientIp(ip): ClientIp,
    OptionalJson(request): OptionalJson<ReceivePurchaseOrderRequest>,
) -> ApiResult<ReceiptOutcome> {
    let outcome = state
        .services
        .purchase_orders
        .receive(id, request.warehouse_id, auth_user.user_id, ip)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

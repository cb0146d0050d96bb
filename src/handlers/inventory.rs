use axum::{extract::State, http::StatusCode, Json};

use crate::{
    auth::AuthUser,
    entities::stock_movement,
    errors::ServiceError,
    handlers::AppState,
    middleware_helpers::{ApiJson, ClientIp},
    services::stock_ledger::{
        AdjustStockRequest, MovementView, StockLevel, TransferOutcome, TransferStockRequest,
    },
    ApiResponse, ApiResult,
};

/// Movements returned by the ledger listing
const MOVEMENT_PAGE: u64 = 100;

/// Current stock for every product and warehouse pair with movements
#[utoipa::path(
    get,
    path = "/stock",
    summary = "List stock levels",
    description = "Levels are derived from the movement ledger on every call",
    responses(
        (status = 200, description = "Stock levels", body = ApiResponse<Vec<StockLevel>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "stock"
)]
pub async fn list_stock(
    State(state): State<AppState>,
    _auth_user: AuthUser,
) -> ApiResult<Vec<StockLevel>> {
    let levels = state.services.stock.list_stock().await?;
    Ok(Json(ApiResponse::success(levels)))
}

#[utoipa::path(
    get,
    path = "/stock/movements",
    summary = "Recent stock movements",
    responses(
        (status = 200, description = "Latest 100 movements, newest first", body = ApiResponse<Vec<MovementView>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "stock"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    _auth_user: AuthUser,
) -> ApiResult<Vec<MovementView>> {
    let movements = state.services.stock.recent_movements(MOVEMENT_PAGE).await?;
    Ok(Json(ApiResponse::success(movements)))
}

/// Manual stock adjustment
#[utoipa::path(
    post,
    path = "/stock/adjust",
    summary = "Adjust stock",
    request_body = AdjustStockRequest,
    responses(
        (status = 201, description = "Adjustment movement recorded"),
        (status = 400, description = "Invalid adjustment or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product or warehouse not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "stock"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ClientIp(ip): ClientIp,
    ApiJson(request): ApiJson<AdjustStockRequest>,
) -> Result<(StatusCode, Json<ApiResponse<stock_movement::Model>>), ServiceError> {
    let movement = state
        .services
        .stock
        .adjust(request, auth_user.user_id, ip)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(movement))))
}

/// Transfer stock between two warehouses
#[utoipa::path(
    post,
    path = "/stock/transfer",
    summary = "Transfer stock",
    request_body = TransferStockRequest,
    responses(
        (status = 201, description = "Paired TRANSFER_OUT and TRANSFER_IN movements recorded", body = ApiResponse<TransferOutcome>),
        (status = 400, description = "Same warehouse, bad quantity or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product or warehouse not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "stock"
)]
pub async fn transfer_stock(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ClientIp(ip): ClientIp,
    ApiJson(request): ApiJson<TransferStockRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TransferOutcome>>), ServiceError> {
    let outcome = state
        .services
        .stock
        .transfer(request, auth_user.user_id, ip)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(outcome))))
}

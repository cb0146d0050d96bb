use axum::{extract::State, response::IntoResponse, Json};
use tracing::info;
use validator::Validate;

use crate::{
    auth::{AuthUser, LoginRequest, LoginResponse},
    errors::ServiceError,
    handlers::AppState,
    middleware_helpers::ApiJson,
    ApiResponse,
};

/// Exchange email and password for a bearer token
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = ApiResponse<LoginResponse>),
        (status = 400, description = "Malformed credentials", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unknown email or wrong password", body = crate::errors::ErrorResponse),
        (status = 403, description = "User is inactive", body = crate::errors::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, axum::response::Response> {
    request
        .validate()
        .map_err(|e| ServiceError::from(e).into_response())?;

    let response = state
        .services
        .auth
        .login(&request)
        .await
        .map_err(IntoResponse::into_response)?;

    info!(user_id = %response.user.id, "User logged in");
    Ok(Json(ApiResponse::success(response)))
}

/// Identity carried by the presented token
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Token identity", body = ApiResponse<AuthUser>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "auth"
)]
pub async fn me(auth_user: AuthUser) -> Json<ApiResponse<AuthUser>> {
    Json(ApiResponse::success(auth_user))
}

use axum::{extract::State, Json};

use crate::{auth::AuthUser, entities::audit_log, handlers::AppState, ApiResponse, ApiResult};

const AUDIT_PAGE: u64 = 100;

#[utoipa::path(
    get,
    path = "/audit-logs",
    summary = "Recent audit entries",
    responses(
        (status = 200, description = "Latest 100 entries, newest first"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "audit"
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    _auth_user: AuthUser,
) -> ApiResult<Vec<audit_log::Model>> {
    let entries = state.services.audit.recent(AUDIT_PAGE).await?;
    Ok(Json(ApiResponse::success(entries)))
}

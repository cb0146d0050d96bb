use axum::Json;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Nexus ERP API",
        version = "0.1.0",
        description = r#"
# Nexus ERP API

Sales orders, stock and purchasing for a multi-warehouse business.

## Stock ledger

Stock is never stored as a counter. Every change is an append-only movement
(IN, OUT, TRANSFER_IN, TRANSFER_OUT, COUNT_DIFF, SCRAP) and the level of a
product in a warehouse is the sum of its movements.

## Order lifecycle

Orders start in `DRAFT`. Approval checks and deducts stock for every line in
one transaction. Other status changes follow a fixed transition table.

## Authentication

Every endpoint except `/health`, `/status` and `/auth/login` requires a JWT:

```
Authorization: Bearer <token>
```

## Errors

Failures share one body shape:

```json
{
  "error": "Bad Request",
  "message": "Insufficient stock for Widget. Available: 2, Required: 5",
  "request_id": "6f1c...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    tags(
        (name = "orders", description = "Sales order lifecycle"),
        (name = "stock", description = "Stock ledger, adjustments and transfers"),
        (name = "purchase-orders", description = "Inbound purchase orders"),
        (name = "audit", description = "Audit trail"),
        (name = "auth", description = "Authentication"),
        (name = "system", description = "Health and status")
    ),
    paths(
        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::approve_order,

        // Stock
        crate::handlers::inventory::list_stock,
        crate::handlers::inventory::list_movements,
        crate::handlers::inventory::adjust_stock,
        crate::handlers::inventory::transfer_stock,

        // Purchase orders
        crate::handlers::purchase_orders::list_purchase_orders,
        crate::handlers::purchase_orders::create_purchase_order,
        crate::handlers::purchase_orders::receive_purchase_order,

        // Audit
        crate::handlers::audit_logs::list_audit_logs,

        // Auth
        crate::handlers::auth::login,
        crate::handlers::auth::me,

        // System
        crate::handlers::health::health_check,
        crate::handlers::health::api_status,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::services::order_status::OrderStatus,
    )),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Serves the generated document at `/api-docs/openapi.json`
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDocV1::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_core_paths() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Nexus ERP API"));
        assert!(json.contains("/orders/{id}/approve"));
        assert!(json.contains("/stock/transfer"));
        assert!(json.contains("/purchase-orders/{id}/receive"));
        assert!(json.contains("\"Bearer\""));
    }
}

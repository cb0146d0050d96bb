mod common;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

use common::{response_json, TestApp, ADMIN_EMAIL, ADMIN_PASSWORD, INACTIVE_EMAIL, INACTIVE_PASSWORD};

fn decimal_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/orders", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(Method::GET, "/stock", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn health_and_status_are_public() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "up");
    assert_eq!(body["database"]["status"], "up");

    let response = app.request(Method::GET, "/status", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["environment"], "test");
}

#[tokio::test]
async fn request_id_is_echoed() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health", None, None).await;
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn create_then_fetch_order() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/orders",
            Some(json!({
                "customer_id": app.customer_id.to_string(),
                "items": [
                    { "product_id": app.widget.id.to_string(), "quantity": 5, "unit_price": 10.00 },
                    { "product_id": app.gadget.id.to_string(), "quantity": 2, "unit_price": "25.50" }
                ]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "DRAFT");
    assert_eq!(decimal_text(&body["data"]["total_amount"]), "101.00");
    let order_id = body["data"]["id"].as_str().unwrap().to_string();
    let parsed = Uuid::parse_str(&order_id).expect("data.id should be a UUID");
    assert_eq!(app.order_status(parsed).await, "DRAFT");

    let response = app
        .request_authenticated(Method::GET, &format!("/orders/{}", order_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["customer_name"], "Acme Retail");
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["product_name"], "Widget");
    assert_eq!(items[0]["quantity"], 5);
    assert_eq!(items[1]["product_name"], "Gadget");

    let response = app.request_authenticated(Method::GET, "/orders", None).await;
    let body = response_json(response).await;
    let orders = body["data"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], order_id.as_str());
}

#[tokio::test]
async fn invalid_order_lists_every_violation() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/orders",
            Some(json!({
                "items": [
                    { "product_id": app.widget.id.to_string(), "quantity": 0, "unit_price": 1 },
                    { "quantity": 2, "unit_price": -3 }
                ]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    let details: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(details.contains(&"Customer ID is required"));
    assert!(details.contains(&"Item 0: Quantity must be positive"));
    assert!(details.contains(&"Item 1: Product ID is required"));
    assert!(details.contains(&"Item 1: Unit price must be non-negative"));

    let response = app
        .request_authenticated(
            Method::POST,
            "/orders",
            Some(json!({ "customer_id": app.customer_id.to_string(), "items": [] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn order_for_unknown_customer_is_rejected() {
    let app = TestApp::new().await;
    let ghost = Uuid::new_v4();

    let response = app
        .request_authenticated(
            Method::POST,
            "/orders",
            Some(json!({
                "customer_id": ghost.to_string(),
                "items": [{ "product_id": app.widget.id.to_string(), "quantity": 1, "unit_price": 1 }]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(
        body["details"][0],
        format!("Customer {} does not exist", ghost).as_str()
    );
}

#[tokio::test]
async fn missing_order_is_not_found() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(Method::GET, &format!("/orders/{}", Uuid::new_v4()), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn generic_update_reports_the_rejected_transition() {
    let app = TestApp::new().await;
    let order_id = app.create_order(&[(app.widget.id, 1, "10.00")]).await;

    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/orders/{}", order_id),
            Some(json!({ "status": "SHIPPED" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Invalid status transition from DRAFT to SHIPPED");

    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/orders/{}", order_id),
            Some(json!({ "status": "PENDING_APPROVAL" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "PENDING_APPROVAL");

    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/orders/{}", order_id),
            Some(json!({ "status": "TELEPORTED" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn approve_endpoint_deducts_stock_or_explains_why_not() {
    let app = TestApp::new().await;
    app.stock_in(app.widget.id, app.main_warehouse, 4).await;
    let order_id = app.create_order(&[(app.widget.id, 5, "10.00")]).await;
    let uri = format!("/orders/{}/approve", order_id);

    let response = app.request_authenticated(Method::POST, &uri, None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(
        body["message"],
        "Insufficient stock for Widget. Available: 4, Required: 5"
    );

    app.stock_in(app.widget.id, app.main_warehouse, 1).await;
    let response = app.request_authenticated(Method::POST, &uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "APPROVED");
    assert_eq!(app.stock_level(app.widget.id, app.main_warehouse).await, 0);

    let response = app
        .request_authenticated(Method::POST, &uri, Some(json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Cannot approve order in APPROVED status");
}

#[tokio::test]
async fn approve_with_an_unreadable_body_changes_nothing() {
    let app = TestApp::new().await;
    app.stock_in(app.widget.id, app.main_warehouse, 5).await;
    let order_id = app.create_order(&[(app.widget.id, 2, "10.00")]).await;
    let uri = format!("/orders/{}/approve", order_id);

    for (body, content_type) in [
        (r#"{"warehouse_id":"bogus"}"#, Some("application/json")),
        (r#"{"warehouse_id":42}"#, Some("application/json")),
        ("{not json", Some("application/json")),
        (r#"{"warehouse_id":"bogus"}"#, None),
    ] {
        let response = app.request_raw(Method::POST, &uri, body, content_type).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        let payload = response_json(response).await;
        assert_eq!(payload["error"], "Bad Request");
        assert!(payload["message"]
            .as_str()
            .unwrap()
            .starts_with("Validation error: Invalid JSON body"));
    }

    assert_eq!(app.order_status(order_id).await, "DRAFT");
    assert_eq!(app.stock_level(app.widget.id, app.main_warehouse).await, 5);
    assert_eq!(app.movement_count().await, 1);

    let response = app
        .request_raw(
            Method::POST,
            &uri,
            &json!({ "warehouse_id": app.main_warehouse }).to_string(),
            Some("application/json"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.stock_level(app.widget.id, app.main_warehouse).await, 3);
}

#[tokio::test]
async fn stock_endpoints_adjust_transfer_and_report() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/stock/adjust",
            Some(json!({
                "product_id": app.gadget.id,
                "warehouse_id": app.main_warehouse,
                "quantity": 12,
                "type": "IN",
                "reason": "opening balance"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request_authenticated(
            Method::POST,
            "/stock/transfer",
            Some(json!({
                "product_id": app.gadget.id,
                "from_warehouse_id": app.main_warehouse,
                "to_warehouse_id": app.overflow_warehouse,
                "quantity": 5
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request_authenticated(
            Method::POST,
            "/stock/transfer",
            Some(json!({
                "product_id": app.gadget.id,
                "from_warehouse_id": app.main_warehouse,
                "to_warehouse_id": app.overflow_warehouse,
                "quantity": 50
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.request_authenticated(Method::GET, "/stock", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let levels = body["data"].as_array().unwrap();
    let level_in = |name: &str| {
        levels
            .iter()
            .find(|l| l["warehouse_name"] == name)
            .map(|l| l["quantity"].as_i64().unwrap())
    };
    assert_eq!(level_in("Main"), Some(7));
    assert_eq!(level_in("Overflow"), Some(5));

    let response = app
        .request_authenticated(Method::GET, "/stock/movements", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn purchase_order_receipt_books_stock_in_once() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/purchase-orders",
            Some(json!({
                "supplier_id": Uuid::new_v4(),
                "items": [
                    { "product_id": app.widget.id, "quantity": 20, "price": "4.10" },
                    { "product_id": app.gadget.id, "quantity": 3, "price": "12.00" }
                ]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "DRAFT");
    let po_id = body["data"]["id"].as_str().unwrap().to_string();
    let receive = format!("/purchase-orders/{}/receive", po_id);

    let response = app
        .request_authenticated(Method::POST, &receive, Some(json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "COMPLETED");
    assert_eq!(app.stock_level(app.widget.id, app.main_warehouse).await, 20);
    assert_eq!(app.stock_level(app.gadget.id, app.main_warehouse).await, 3);

    let response = app.request_authenticated(Method::POST, &receive, None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Purchase order already received");
    assert_eq!(app.stock_level(app.widget.id, app.main_warehouse).await, 20);

    let response = app
        .request_authenticated(Method::GET, "/purchase-orders", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"][0]["item_count"], 2);
    assert_eq!(body["data"][0]["status"], "COMPLETED");
}

#[tokio::test]
async fn receipt_with_an_unreadable_body_books_nothing() {
    let app = TestApp::new().await;
    let created = app
        .state
        .services
        .purchase_orders
        .create(
            serde_json::from_value(json!({
                "supplier_id": Uuid::new_v4(),
                "items": [{ "product_id": app.widget.id, "quantity": 6, "price": "4.10" }]
            }))
            .unwrap(),
            app.admin.id,
            None,
        )
        .await
        .unwrap();
    let receive = format!("/purchase-orders/{}/receive", created.id);

    let response = app
        .request_raw(
            Method::POST,
            &receive,
            r#"{"warehouse_id":"bogus"}"#,
            Some("application/json"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap().starts_with("Validation error"));
    assert_eq!(app.stock_level(app.widget.id, app.main_warehouse).await, 0);
    assert_eq!(app.movement_count().await, 0);

    let response = app
        .request_authenticated(Method::GET, "/purchase-orders", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"][0]["status"], "DRAFT");

    // An empty body still means the default warehouse.
    let response = app.request_raw(Method::POST, &receive, "", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.stock_level(app.widget.id, app.main_warehouse).await, 6);
}

#[tokio::test]
async fn malformed_json_bodies_get_error_envelopes() {
    let app = TestApp::new().await;

    let response = app
        .request_raw(Method::POST, "/orders", "{\"customer_id\":", Some("application/json"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Bad Request");
    assert!(body["message"].as_str().unwrap().starts_with("Validation error:"));
    assert!(body["timestamp"].is_string());

    let response = app
        .request_raw(Method::POST, "/orders", "{}", Some("text/plain"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("Content-Type"));

    let response = app
        .request_raw(
            Method::POST,
            "/stock/transfer",
            r#"{"product_id":"nope"}"#,
            Some("application/json"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap().starts_with("Validation error:"));

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": ADMIN_EMAIL })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("password"));
}

#[tokio::test]
async fn purchase_order_needs_supplier_and_items() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/purchase-orders",
            Some(json!({
                "items": [{ "product_id": app.widget.id, "quantity": 1, "price": "1.00" }]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request_authenticated(
            Method::POST,
            "/purchase-orders",
            Some(json!({ "supplier_id": Uuid::new_v4(), "items": [] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn audit_log_lists_mutations_newest_first() {
    let app = TestApp::new().await;
    let order_id = app.create_order(&[(app.widget.id, 1, "10.00")]).await;
    app.request_authenticated(
        Method::PUT,
        &format!("/orders/{}", order_id),
        Some(json!({ "status": "CANCELLED" })),
    )
    .await;

    let response = app
        .request_authenticated(Method::GET, "/audit-logs", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let actions: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["action"].as_str())
        .collect();
    assert_eq!(actions.len(), 2);
    assert!(actions.contains(&"SALES_ORDER_CREATED"));
    assert!(actions.contains(&"SALES_ORDER_STATUS_UPDATED"));
}

#[tokio::test]
async fn login_issues_a_working_token() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": ADMIN_EMAIL.to_uppercase(), "password": ADMIN_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["user"]["email"], ADMIN_EMAIL);
    assert_eq!(body["data"]["token_type"], "Bearer");
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let response = app
        .request(Method::GET, "/auth/me", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["user_id"], app.admin.id.to_string().as_str());
    assert_eq!(body["data"]["role"], "admin");
}

#[tokio::test]
async fn login_rejects_bad_credentials_and_inactive_users() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": ADMIN_EMAIL, "password": "wrong" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "nobody@nexus.test", "password": ADMIN_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": INACTIVE_EMAIL, "password": INACTIVE_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_routes_and_methods() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(Method::GET, "/no-such-thing", None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Not found: Route not found");

    let response = app
        .request_authenticated(Method::DELETE, "/orders", None)
        .await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api-docs/openapi.json", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert!(body["paths"]["/orders/{id}/approve"].is_object());
}

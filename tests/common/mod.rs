#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, Response},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use nexus_erp::{
    auth::hash_password,
    build_router,
    config::AppConfig,
    db::{self, DbConfig},
    entities::{
        customer, product, sales_order, stock_movement,
        stock_movement::{MovementType, ReferenceType},
        user, warehouse,
    },
    services::stock_ledger::{self, NewMovement},
    AppState,
};

pub const ADMIN_EMAIL: &str = "ops@nexus.test";
pub const ADMIN_PASSWORD: &str = "correct-horse-battery";
pub const INACTIVE_EMAIL: &str = "former@nexus.test";
pub const INACTIVE_PASSWORD: &str = "still-remembered";

const TEST_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Application harness over a private in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    token: String,
    pub admin: user::Model,
    pub customer_id: Uuid,
    pub widget: product::Model,
    pub gadget: product::Model,
    pub main_warehouse: Uuid,
    pub overflow_warehouse: Uuid,
}

impl TestApp {
    /// Fresh app whose default warehouse is `main_warehouse`.
    pub async fn new() -> Self {
        Self::build(true).await
    }

    /// Fresh app with no default warehouse configured.
    pub async fn without_default_warehouse() -> Self {
        Self::build(false).await
    }

    async fn build(with_default_warehouse: bool) -> Self {
        let main_warehouse = Uuid::new_v4();
        let overflow_warehouse = Uuid::new_v4();

        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.default_warehouse_id = with_default_warehouse.then_some(main_warehouse);

        // A single long-lived connection keeps the in-memory database alive.
        let pool = db::establish_connection_with_config(&DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            ..DbConfig::default()
        })
        .await
        .expect("failed to open test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to migrate test database");

        let admin = insert_user(&pool, ADMIN_EMAIL, ADMIN_PASSWORD, "Ops Admin", true).await;
        insert_user(&pool, INACTIVE_EMAIL, INACTIVE_PASSWORD, "Former Clerk", false).await;

        let customer_id = Uuid::new_v4();
        customer::ActiveModel {
            id: Set(customer_id),
            name: Set("Acme Retail".to_string()),
            email: Set(Some("buyer@acme.test".to_string())),
            created_at: Set(Utc::now()),
        }
        .insert(&pool)
        .await
        .expect("failed to seed customer");

        let widget = insert_product(&pool, "Widget", "WID-001", Decimal::new(1000, 2)).await;
        let gadget = insert_product(&pool, "Gadget", "GAD-001", Decimal::new(2550, 2)).await;

        insert_warehouse(&pool, main_warehouse, "Main").await;
        insert_warehouse(&pool, overflow_warehouse, "Overflow").await;

        let state = AppState::new(Arc::new(pool), cfg);
        let token = state
            .services
            .auth
            .issue_token(admin.id, &admin.email, &admin.role)
            .expect("failed to issue test token");
        let router = build_router(state.clone());

        Self {
            router,
            state,
            token,
            admin,
            customer_id,
            widget,
            gadget,
            main_warehouse,
            overflow_warehouse,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    /// Sends one request through the full router and middleware stack.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("failed to build request"))
            .await
            .expect("router failed")
    }

    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response<Body> {
        self.request(method, uri, body, Some(&self.token)).await
    }

    /// Authenticated request carrying `body` verbatim.
    pub async fn request_raw(
        &self,
        method: Method,
        uri: &str,
        body: &str,
        content_type: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token));
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }

        self.router
            .clone()
            .oneshot(
                builder
                    .body(Body::from(body.to_string()))
                    .expect("failed to build request"),
            )
            .await
            .expect("router failed")
    }

    /// Receives `quantity` units straight into the ledger.
    pub async fn stock_in(&self, product_id: Uuid, warehouse_id: Uuid, quantity: i32) {
        stock_ledger::record_movement(
            self.db(),
            NewMovement {
                product_id,
                warehouse_id,
                quantity,
                movement_type: MovementType::In,
                reference_type: ReferenceType::ManualAdjustment,
                reference_id: None,
                reason: Some("test seed".to_string()),
                created_by: self.admin.id,
            },
        )
        .await
        .expect("failed to seed stock");
    }

    pub async fn stock_level(&self, product_id: Uuid, warehouse_id: Uuid) -> i64 {
        stock_ledger::current_stock(self.db(), product_id, warehouse_id)
            .await
            .expect("failed to read stock")
    }

    pub async fn movement_count(&self) -> u64 {
        stock_movement::Entity::find()
            .count(self.db())
            .await
            .expect("failed to count movements")
    }

    /// Creates a DRAFT order for the seeded customer from
    /// `(product, quantity, unit price)` lines.
    pub async fn create_order(&self, lines: &[(Uuid, i32, &str)]) -> Uuid {
        let items: Vec<Value> = lines
            .iter()
            .map(|(product_id, quantity, price)| {
                json!({
                    "product_id": product_id.to_string(),
                    "quantity": quantity,
                    "unit_price": price,
                })
            })
            .collect();

        self.state
            .services
            .orders
            .create_order(
                &json!({ "customer_id": self.customer_id.to_string(), "items": items }),
                self.admin.id,
                None,
            )
            .await
            .expect("failed to create order")
            .id
    }

    pub async fn order_status(&self, order_id: Uuid) -> String {
        sales_order::Entity::find_by_id(order_id)
            .one(self.db())
            .await
            .expect("failed to load order")
            .expect("order missing")
            .status
    }
}

/// Reads a response body as JSON.
pub async fn response_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    serde_json::from_slice(&bytes).expect("body is not JSON")
}

async fn insert_user(
    pool: &DatabaseConnection,
    email: &str,
    password: &str,
    full_name: &str,
    is_active: bool,
) -> user::Model {
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set(hash_password(password).expect("failed to hash password")),
        full_name: Set(full_name.to_string()),
        role: Set("admin".to_string()),
        is_active: Set(is_active),
        created_at: Set(Utc::now()),
    }
    .insert(pool)
    .await
    .expect("failed to seed user")
}

async fn insert_product(
    pool: &DatabaseConnection,
    name: &str,
    sku: &str,
    price: Decimal,
) -> product::Model {
    product::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        sku: Set(sku.to_string()),
        price: Set(price),
        is_active: Set(true),
        created_at: Set(Utc::now()),
    }
    .insert(pool)
    .await
    .expect("failed to seed product")
}

async fn insert_warehouse(pool: &DatabaseConnection, id: Uuid, name: &str) {
    warehouse::ActiveModel {
        id: Set(id),
        name: Set(name.to_string()),
        location: Set(None),
        is_deleted: Set(false),
        created_at: Set(Utc::now()),
    }
    .insert(pool)
    .await
    .expect("failed to seed warehouse");
}

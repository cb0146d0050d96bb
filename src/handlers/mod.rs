pub mod audit_logs;
pub mod auth;
pub mod health;
pub mod inventory;
pub mod orders;
pub mod purchase_orders;

use std::sync::Arc;

use crate::{
    auth::AuthService,
    config::AppConfig,
    db::DbPool,
    services::{
        audit::AuditTrail, order_approval::OrderApprovalService,
        order_status::OrderStatusService, orders::OrderService,
        purchase_orders::PurchaseOrderService, stock_ledger::StockLedger,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub order_status: Arc<OrderStatusService>,
    pub approvals: Arc<OrderApprovalService>,
    pub stock: Arc<StockLedger>,
    pub purchase_orders: Arc<PurchaseOrderService>,
    pub audit: Arc<AuditTrail>,
    pub auth: Arc<AuthService>,
}

impl AppServices {
    /// Wires every service onto one shared pool.
    pub fn new(db_pool: Arc<DbPool>, config: &AppConfig) -> Self {
        let audit = AuditTrail::new(db_pool.clone());
        let default_warehouse = config.default_warehouse_id;

        Self {
            orders: Arc::new(OrderService::new(db_pool.clone(), audit.clone())),
            order_status: Arc::new(OrderStatusService::new(db_pool.clone(), audit.clone())),
            approvals: Arc::new(OrderApprovalService::new(
                db_pool.clone(),
                audit.clone(),
                default_warehouse,
            )),
            stock: Arc::new(StockLedger::new(db_pool.clone(), audit.clone())),
            purchase_orders: Arc::new(PurchaseOrderService::new(
                db_pool.clone(),
                audit.clone(),
                default_warehouse,
            )),
            auth: Arc::new(AuthService::new(config.into(), db_pool)),
            audit: Arc::new(audit),
        }
    }
}

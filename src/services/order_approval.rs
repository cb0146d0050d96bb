//! Approval of a draft sales order.
//!
//! One transaction locks the order row, checks stock for every line against
//! the ledger, appends one OUT movement per line, flips the status to
//! APPROVED and writes the audit entry. Any failure rolls all of it back.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::commit_or_rollback,
    entities::{
        product, sales_order, sales_order_item,
        stock_movement::{self, MovementType, ReferenceType},
    },
    errors::ServiceError,
    services::{
        audit::{AuditAction, AuditEntry, AuditTrail},
        order_status::OrderStatus,
        stock_ledger::{self, NewMovement},
    },
};

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ApproveOrderRequest {
    /// Warehouse to allocate from; the configured default when absent
    pub warehouse_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApprovalOutcome {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub warehouse_id: Uuid,
    #[schema(value_type = Vec<Object>)]
    pub movements: Vec<stock_movement::Model>,
}

#[derive(Clone)]
pub struct OrderApprovalService {
    db: Arc<DatabaseConnection>,
    audit: AuditTrail,
    default_warehouse_id: Option<Uuid>,
}

impl OrderApprovalService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        audit: AuditTrail,
        default_warehouse_id: Option<Uuid>,
    ) -> Self {
        Self {
            db,
            audit,
            default_warehouse_id,
        }
    }

    fn resolve_warehouse(&self, requested: Option<Uuid>) -> Result<Uuid, ServiceError> {
        requested.or(self.default_warehouse_id).ok_or_else(|| {
            ServiceError::ValidationError(
                "warehouse_id is required when no default warehouse is configured".to_string(),
            )
        })
    }

    /// Approves a DRAFT order and allocates its stock.
    #[instrument(skip(self, ip), fields(order_id = %order_id))]
    pub async fn approve(
        &self,
        order_id: Uuid,
        warehouse_id: Option<Uuid>,
        actor_id: Uuid,
        ip: Option<String>,
    ) -> Result<ApprovalOutcome, ServiceError> {
        let warehouse_id = self.resolve_warehouse(warehouse_id)?;

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to begin approval transaction");
            ServiceError::DatabaseError(e)
        })?;
        let outcome = self
            .approve_in_txn(&txn, order_id, warehouse_id, actor_id, ip)
            .await;

        match commit_or_rollback(txn, outcome).await {
            Ok(outcome) => {
                counter!("nexus_orders.approvals", 1);
                info!(
                    warehouse_id = %warehouse_id,
                    lines = outcome.movements.len(),
                    "Order approved"
                );
                Ok(outcome)
            }
            Err(err) => {
                counter!("nexus_orders.approval_failures", 1);
                warn!(error = %err, "Order approval failed");
                Err(err)
            }
        }
    }

    async fn approve_in_txn(
        &self,
        txn: &DatabaseTransaction,
        order_id: Uuid,
        warehouse_id: Uuid,
        actor_id: Uuid,
        ip: Option<String>,
    ) -> Result<ApprovalOutcome, ServiceError> {
        // Row lock serializes concurrent approvals of the same order.
        let order = sales_order::Entity::find_by_id(order_id)
            .filter(sales_order::Column::IsDeleted.eq(false))
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let status = OrderStatus::from_str(&order.status).ok();
        if status != Some(OrderStatus::Draft) {
            return Err(ServiceError::InvalidState(format!(
                "Cannot approve order in {} status",
                order.status
            )));
        }

        stock_ledger::load_warehouse(txn, warehouse_id).await?;

        let items = sales_order_item::Entity::find()
            .filter(sales_order_item::Column::SalesOrderId.eq(order_id))
            .order_by_asc(sales_order_item::Column::LineNumber)
            .all(txn)
            .await?;
        if items.is_empty() {
            return Err(ServiceError::InvalidState(format!(
                "Order {} has no items to allocate",
                order_id
            )));
        }

        let product_names: HashMap<Uuid, String> = product::Entity::find()
            .filter(product::Column::Id.is_in(items.iter().map(|i| i.product_id)))
            .all(txn)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        // Every line is checked before anything is written. Lines sharing a
        // product draw from the same balance.
        let mut allocated: HashMap<Uuid, i64> = HashMap::new();
        for item in &items {
            let already = allocated.get(&item.product_id).copied().unwrap_or(0);
            let on_hand = stock_ledger::current_stock(txn, item.product_id, warehouse_id).await?;
            let available = on_hand - already;
            let required = i64::from(item.quantity);
            if available < required {
                return Err(ServiceError::InsufficientStock {
                    product: product_names
                        .get(&item.product_id)
                        .cloned()
                        .unwrap_or_else(|| item.product_id.to_string()),
                    available,
                    required,
                });
            }
            allocated.insert(item.product_id, already + required);
        }

        let mut movements = Vec::with_capacity(items.len());
        for item in &items {
            movements.push(
                stock_ledger::record_movement(
                    txn,
                    NewMovement {
                        product_id: item.product_id,
                        warehouse_id,
                        quantity: MovementType::Out.signed(item.quantity),
                        movement_type: MovementType::Out,
                        reference_type: ReferenceType::SalesOrder,
                        reference_id: Some(order_id),
                        reason: None,
                        created_by: actor_id,
                    },
                )
                .await?,
            );
        }

        let mut active: sales_order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Approved.to_string());
        active.updated_at = Set(Utc::now());
        active.update(txn).await?;

        self.audit
            .record(
                AuditEntry::new(
                    actor_id,
                    AuditAction::SalesOrderApproved,
                    json!({
                        "entity": "SALES_ORDER",
                        "id": order_id.to_string(),
                        "warehouse_id": warehouse_id,
                        "lines": movements.len(),
                    }),
                    ip,
                ),
                Some(txn),
            )
            .await?;

        Ok(ApprovalOutcome {
            order_id,
            status: OrderStatus::Approved,
            warehouse_id,
            movements,
        })
    }
}

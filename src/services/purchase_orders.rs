//! Purchase orders: the inbound side of the stock ledger.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use rust_decimal::Decimal;
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
        purchase_order::{self, PurchaseOrderStatus},
        purchase_order_item,
        stock_movement::{self, MovementType, ReferenceType},
    },
    errors::ServiceError,
    services::{
        audit::{AuditAction, AuditEntry, AuditTrail},
        stock_ledger::{self, NewMovement},
    },
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PurchaseOrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreatePurchaseOrderRequest {
    pub supplier_id: Option<Uuid>,
    #[serde(default)]
    pub items: Vec<PurchaseOrderItemRequest>,
    pub expected_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReceivePurchaseOrderRequest {
    pub warehouse_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PurchaseOrderSummary {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub status: String,
    pub expected_date: Option<NaiveDate>,
    pub item_count: usize,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReceiptOutcome {
    pub purchase_order_id: Uuid,
    #[schema(value_type = String, example = "COMPLETED")]
    pub status: PurchaseOrderStatus,
    pub warehouse_id: Uuid,
    #[schema(value_type = Vec<Object>)]
    pub movements: Vec<stock_movement::Model>,
}

#[derive(Clone)]
pub struct PurchaseOrderService {
    db: Arc<DatabaseConnection>,
    audit: AuditTrail,
    default_warehouse_id: Option<Uuid>,
}

impl PurchaseOrderService {
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

    #[instrument(skip(self, request, ip))]
    pub async fn create(
        &self,
        request: CreatePurchaseOrderRequest,
        actor_id: Uuid,
        ip: Option<String>,
    ) -> Result<purchase_order::Model, ServiceError> {
        let supplier_id = request.supplier_id.ok_or_else(|| {
            ServiceError::ValidationError("supplier_id is required".to_string())
        })?;
        if request.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Purchase order must contain at least one item".to_string(),
            ));
        }
        let problems: Vec<String> = request
            .items
            .iter()
            .enumerate()
            .flat_map(|(index, item)| {
                let mut found = Vec::new();
                if item.quantity <= 0 {
                    found.push(format!("Item {}: Quantity must be positive", index));
                }
                if item.price.is_sign_negative() {
                    found.push(format!("Item {}: Price must be non-negative", index));
                }
                found
            })
            .collect();
        if !problems.is_empty() {
            return Err(ServiceError::InvalidOrder(problems));
        }

        let txn = self.db.begin().await?;
        let outcome = self
            .insert_purchase_order(&txn, supplier_id, &request, actor_id, ip)
            .await;
        let created = commit_or_rollback(txn, outcome).await?;

        info!(purchase_order_id = %created.id, "Purchase order created");
        Ok(created)
    }

    async fn insert_purchase_order(
        &self,
        txn: &DatabaseTransaction,
        supplier_id: Uuid,
        request: &CreatePurchaseOrderRequest,
        actor_id: Uuid,
        ip: Option<String>,
    ) -> Result<purchase_order::Model, ServiceError> {
        for item in &request.items {
            stock_ledger::load_product(txn, item.product_id).await?;
        }

        let now = Utc::now();
        let created = purchase_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            supplier_id: Set(supplier_id),
            status: Set(PurchaseOrderStatus::Draft.to_string()),
            expected_date: Set(request.expected_date),
            created_by: Set(actor_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await?;

        for item in &request.items {
            purchase_order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                purchase_order_id: Set(created.id),
                product_id: Set(item.product_id),
                quantity: Set(item.quantity),
                unit_price: Set(item.price),
            }
            .insert(txn)
            .await?;
        }

        self.audit
            .record(
                AuditEntry::new(
                    actor_id,
                    AuditAction::PurchaseOrderCreated,
                    json!({
                        "entity": "PURCHASE_ORDER",
                        "id": created.id.to_string(),
                        "supplier_id": supplier_id,
                        "items": request.items.len(),
                    }),
                    ip,
                ),
                Some(txn),
            )
            .await?;

        Ok(created)
    }

    /// Purchase orders with item count and total, newest first
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<PurchaseOrderSummary>, ServiceError> {
        let rows = purchase_order::Entity::find()
            .order_by_desc(purchase_order::Column::CreatedAt)
            .find_with_related(purchase_order_item::Entity)
            .all(&*self.db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list purchase orders");
                ServiceError::DatabaseError(e)
            })?;

        Ok(rows
            .into_iter()
            .map(|(po, items)| PurchaseOrderSummary {
                id: po.id,
                supplier_id: po.supplier_id,
                status: po.status,
                expected_date: po.expected_date,
                item_count: items.len(),
                total: items
                    .iter()
                    .map(|i| Decimal::from(i.quantity) * i.unit_price)
                    .sum(),
                created_at: po.created_at,
            })
            .collect())
    }

    /// Books every item of a DRAFT purchase order into a warehouse.
    #[instrument(skip(self, ip), fields(purchase_order_id = %purchase_order_id))]
    pub async fn receive(
        &self,
        purchase_order_id: Uuid,
        warehouse_id: Option<Uuid>,
        actor_id: Uuid,
        ip: Option<String>,
    ) -> Result<ReceiptOutcome, ServiceError> {
        let warehouse_id = warehouse_id.or(self.default_warehouse_id).ok_or_else(|| {
            ServiceError::ValidationError(
                "warehouse_id is required when no default warehouse is configured".to_string(),
            )
        })?;

        let txn = self.db.begin().await?;
        let outcome = self
            .receive_in_txn(&txn, purchase_order_id, warehouse_id, actor_id, ip)
            .await;

        match commit_or_rollback(txn, outcome).await {
            Ok(outcome) => {
                counter!("nexus_purchase_orders.receipts", 1);
                info!(lines = outcome.movements.len(), "Purchase order received");
                Ok(outcome)
            }
            Err(err) => {
                warn!(error = %err, "Purchase order receipt failed");
                Err(err)
            }
        }
    }

    async fn receive_in_txn(
        &self,
        txn: &DatabaseTransaction,
        purchase_order_id: Uuid,
        warehouse_id: Uuid,
        actor_id: Uuid,
        ip: Option<String>,
    ) -> Result<ReceiptOutcome, ServiceError> {
        let po = purchase_order::Entity::find_by_id(purchase_order_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Purchase order {} not found", purchase_order_id))
            })?;

        if PurchaseOrderStatus::from_str(&po.status).ok() == Some(PurchaseOrderStatus::Completed) {
            return Err(ServiceError::InvalidState(
                "Purchase order already received".to_string(),
            ));
        }

        stock_ledger::load_warehouse(txn, warehouse_id).await?;

        let items = purchase_order_item::Entity::find()
            .filter(purchase_order_item::Column::PurchaseOrderId.eq(purchase_order_id))
            .all(txn)
            .await?;

        let mut received: HashMap<Uuid, i64> = HashMap::new();
        let mut movements = Vec::with_capacity(items.len());
        for item in &items {
            *received.entry(item.product_id).or_default() += i64::from(item.quantity);
            movements.push(
                stock_ledger::record_movement(
                    txn,
                    NewMovement {
                        product_id: item.product_id,
                        warehouse_id,
                        quantity: MovementType::In.signed(item.quantity),
                        movement_type: MovementType::In,
                        reference_type: ReferenceType::PurchaseOrder,
                        reference_id: Some(purchase_order_id),
                        reason: None,
                        created_by: actor_id,
                    },
                )
                .await?,
            );
        }

        let mut active: purchase_order::ActiveModel = po.into();
        active.status = Set(PurchaseOrderStatus::Completed.to_string());
        active.update(txn).await?;

        self.audit
            .record(
                AuditEntry::new(
                    actor_id,
                    AuditAction::PurchaseOrderReceived,
                    json!({
                        "entity": "PURCHASE_ORDER",
                        "id": purchase_order_id.to_string(),
                        "warehouse_id": warehouse_id,
                        "products": received.len(),
                        "units": received.values().sum::<i64>(),
                    }),
                    ip,
                ),
                Some(txn),
            )
            .await?;

        Ok(ReceiptOutcome {
            purchase_order_id,
            status: PurchaseOrderStatus::Completed,
            warehouse_id,
            movements,
        })
    }
}

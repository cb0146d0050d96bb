use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::commit_or_rollback,
    entities::{customer, product, sales_order, sales_order_item},
    errors::ServiceError,
    services::{
        audit::{AuditAction, AuditEntry, AuditTrail},
        order_status::OrderStatus,
        order_validation::{calculate_order_total, validate_order_input, NewOrder},
    },
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatedOrder {
    pub id: Uuid,
    pub status: OrderStatus,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderSummary {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub customer_name: Option<String>,
    pub status: String,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderDetail {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub customer_name: Option<String>,
    pub status: String,
    pub total_amount: Decimal,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderLine>,
}

/// Sales order creation and reads
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    audit: AuditTrail,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, audit: AuditTrail) -> Self {
        Self { db, audit }
    }

    /// Validates the payload, then writes the order, its items and the
    /// creation audit entry in one transaction.
    #[instrument(skip(self, payload, ip))]
    pub async fn create_order(
        &self,
        payload: &Value,
        actor_id: Uuid,
        ip: Option<String>,
    ) -> Result<CreatedOrder, ServiceError> {
        let order = validate_order_input(payload).map_err(|errors| {
            warn!(violations = errors.len(), "Rejected order payload");
            ServiceError::InvalidOrder(errors)
        })?;
        let total = calculate_order_total(&order.items);

        let txn = self.db.begin().await?;
        let outcome = self.insert_order(&txn, &order, total, actor_id, ip).await;
        let created = commit_or_rollback(txn, outcome).await?;

        info!(order_id = %created.id, total = %created.total_amount, "Order created");
        Ok(created)
    }

    async fn insert_order(
        &self,
        txn: &DatabaseTransaction,
        order: &NewOrder,
        total: Decimal,
        actor_id: Uuid,
        ip: Option<String>,
    ) -> Result<CreatedOrder, ServiceError> {
        if customer::Entity::find_by_id(order.customer_id)
            .one(txn)
            .await?
            .is_none()
        {
            return Err(ServiceError::InvalidOrder(vec![format!(
                "Customer {} does not exist",
                order.customer_id
            )]));
        }

        let known: HashSet<Uuid> = product::Entity::find()
            .filter(product::Column::Id.is_in(order.items.iter().map(|i| i.product_id)))
            .all(txn)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();
        let unknown: Vec<String> = order
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| !known.contains(&item.product_id))
            .map(|(index, item)| {
                format!("Item {}: Product {} does not exist", index, item.product_id)
            })
            .collect();
        if !unknown.is_empty() {
            return Err(ServiceError::InvalidOrder(unknown));
        }

        let order_id = Uuid::new_v4();
        sales_order::ActiveModel {
            id: Set(order_id),
            customer_id: Set(order.customer_id),
            status: Set(OrderStatus::Draft.to_string()),
            total_amount: Set(total),
            created_by: Set(actor_id),
            is_deleted: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to insert order");
            ServiceError::DatabaseError(e)
        })?;

        for (index, item) in order.items.iter().enumerate() {
            sales_order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                sales_order_id: Set(order_id),
                line_number: Set(index as i32),
                product_id: Set(item.product_id),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
            }
            .insert(txn)
            .await
            .map_err(|e| {
                error!(error = %e, line = index, "Failed to insert order item");
                ServiceError::DatabaseError(e)
            })?;
        }

        self.audit
            .record(
                AuditEntry::new(
                    actor_id,
                    AuditAction::SalesOrderCreated,
                    json!({
                        "entity": "SALES_ORDER",
                        "id": order_id.to_string(),
                        "customer_id": order.customer_id,
                        "total_amount": total,
                        "items": order.items.len(),
                    }),
                    ip,
                ),
                Some(txn),
            )
            .await?;

        Ok(CreatedOrder {
            id: order_id,
            status: OrderStatus::Draft,
            total_amount: total,
        })
    }

    /// Orders that are not soft-deleted, newest first
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<OrderSummary>, ServiceError> {
        let rows = sales_order::Entity::find()
            .filter(sales_order::Column::IsDeleted.eq(false))
            .order_by_desc(sales_order::Column::CreatedAt)
            .find_also_related(customer::Entity)
            .all(&*self.db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list orders");
                ServiceError::DatabaseError(e)
            })?;

        Ok(rows
            .into_iter()
            .map(|(order, customer)| OrderSummary {
                id: order.id,
                customer_id: order.customer_id,
                customer_name: customer.map(|c| c.name),
                status: order.status,
                total_amount: order.total_amount,
                created_at: order.created_at,
            })
            .collect())
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderDetail, ServiceError> {
        let db = &*self.db;

        let (order, customer) = sales_order::Entity::find_by_id(order_id)
            .filter(sales_order::Column::IsDeleted.eq(false))
            .find_also_related(customer::Entity)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = sales_order_item::Entity::find()
            .filter(sales_order_item::Column::SalesOrderId.eq(order_id))
            .order_by_asc(sales_order_item::Column::LineNumber)
            .find_also_related(product::Entity)
            .all(db)
            .await?
            .into_iter()
            .map(|(item, product)| OrderLine {
                id: item.id,
                product_id: item.product_id,
                product_name: product.map(|p| p.name),
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: Decimal::from(item.quantity) * item.unit_price,
            })
            .collect();

        Ok(OrderDetail {
            id: order.id,
            customer_id: order.customer_id,
            customer_name: customer.map(|c| c.name),
            status: order.status,
            total_amount: order.total_amount,
            created_by: order.created_by,
            created_at: order.created_at,
            updated_at: order.updated_at,
            items,
        })
    }
}

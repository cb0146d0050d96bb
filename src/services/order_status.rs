use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::sales_order,
    errors::ServiceError,
    services::audit::{AuditAction, AuditEntry, AuditTrail},
};

/// Lifecycle states of a sales order
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Draft,
    PendingApproval,
    Approved,
    Processing,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
    Rejected,
    Returned,
}

impl OrderStatus {
    /// Statuses reachable through the generic transition path.
    ///
    /// `DRAFT -> APPROVED` is deliberately absent: it only happens through
    /// the approval operation, which also deducts stock.
    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Draft => &[PendingApproval, Cancelled],
            PendingApproval => &[Approved, Rejected, Cancelled],
            Approved => &[Processing, Cancelled],
            Processing => &[Shipped, Cancelled],
            Shipped => &[Delivered, Returned],
            Delivered => &[Completed],
            Rejected => &[Draft],
            Completed | Cancelled | Returned => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

/// Generic status changes driven by the transition table. Never touches stock.
#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DatabaseConnection>,
    audit: AuditTrail,
}

impl OrderStatusService {
    pub fn new(db: Arc<DatabaseConnection>, audit: AuditTrail) -> Self {
        Self { db, audit }
    }

    /// Moves an order to `next` if the table allows it from its current status.
    ///
    /// The update is conditional on the status read, so a concurrent change
    /// makes this call fail instead of silently overwriting it.
    #[instrument(skip(self, ip), fields(order_id = %order_id, next = %next))]
    pub async fn apply_transition(
        &self,
        order_id: Uuid,
        next: OrderStatus,
        actor_id: Uuid,
        ip: Option<String>,
    ) -> Result<sales_order::Model, ServiceError> {
        let db = &*self.db;

        let order = sales_order::Entity::find_by_id(order_id)
            .filter(sales_order::Column::IsDeleted.eq(false))
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch order");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let current = OrderStatus::from_str(&order.status).map_err(|_| {
            error!(status = %order.status, "Order carries an unknown status");
            ServiceError::InternalError(format!(
                "Order {} has unknown status {}",
                order_id, order.status
            ))
        })?;

        if !current.can_transition_to(next) {
            warn!(from = %current, to = %next, "Rejected status transition");
            return Err(ServiceError::InvalidTransition {
                from: current.to_string(),
                to: next.to_string(),
            });
        }

        let now = Utc::now();
        let result = sales_order::Entity::update_many()
            .col_expr(sales_order::Column::Status, Expr::value(next.to_string()))
            .col_expr(sales_order::Column::UpdatedAt, Expr::value(now))
            .filter(sales_order::Column::Id.eq(order_id))
            .filter(sales_order::Column::Status.eq(current.as_ref()))
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to update order status");
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            warn!("Order status changed while the transition was in flight");
            return Err(ServiceError::InvalidState(format!(
                "Order {} was modified concurrently; status is no longer {}",
                order_id, current
            )));
        }

        info!(from = %current, to = %next, "Order status updated");

        self.audit
            .record(
                AuditEntry::new(
                    actor_id,
                    AuditAction::SalesOrderStatusUpdated,
                    json!({
                        "entity": "SALES_ORDER",
                        "id": order_id.to_string(),
                        "status": next.to_string(),
                        "previousStatus": current.to_string(),
                    }),
                    ip,
                ),
                None,
            )
            .await?;

        Ok(sales_order::Model {
            status: next.to_string(),
            updated_at: now,
            ..order
        })
    }
}

/// Parses a status code supplied by a client.
pub fn parse_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    OrderStatus::from_str(raw.trim())
        .map_err(|_| ServiceError::ValidationError(format!("Unknown order status: {}", raw)))
}

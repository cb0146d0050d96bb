//! Append-only stock ledger.
//!
//! Stock is never stored. The level of a (product, warehouse) pair is the
//! signed sum of its movement rows, recomputed on every read. The free
//! functions here take any connection so that callers can run them inside
//! their own transaction; [`StockLedger`] wraps the pooled operations.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::commit_or_rollback,
    entities::{
        product,
        stock_movement::{self, MovementType, ReferenceType},
        warehouse,
    },
    errors::ServiceError,
    services::audit::{AuditAction, AuditEntry, AuditTrail},
};

/// Movement kinds accepted by manual adjustments
const ADJUSTMENT_TYPES: [MovementType; 4] = [
    MovementType::In,
    MovementType::Out,
    MovementType::CountDiff,
    MovementType::Scrap,
];

/// A ledger row about to be appended
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    /// Signed quantity, stored as given
    pub quantity: i32,
    pub movement_type: MovementType,
    pub reference_type: ReferenceType,
    pub reference_id: Option<Uuid>,
    pub reason: Option<String>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AdjustStockRequest {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    /// Magnitude; the sign is taken from `type`
    pub quantity: i32,
    /// One of IN, OUT, COUNT_DIFF, SCRAP
    #[serde(rename = "type")]
    pub adjustment_type: String,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    /// Lets OUT/SCRAP take the level below zero
    #[serde(default)]
    pub allow_negative: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct TransferStockRequest {
    pub product_id: Uuid,
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
}

/// The pair of rows written by a transfer
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransferOutcome {
    #[schema(value_type = Object)]
    pub transfer_out: stock_movement::Model,
    #[schema(value_type = Object)]
    pub transfer_in: stock_movement::Model,
}

/// Derived stock level of one (product, warehouse) pair
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StockLevel {
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub warehouse_id: Uuid,
    pub warehouse_name: String,
    pub quantity: i64,
}

/// Movement row joined with display names
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MovementView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub warehouse_id: Uuid,
    pub warehouse_name: Option<String>,
    pub quantity: i32,
    pub movement_type: String,
    pub reference_type: String,
    pub reference_id: Option<Uuid>,
    pub reason: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Signed sum of all movements for the pair; zero when there are none.
pub async fn current_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    warehouse_id: Uuid,
) -> Result<i64, ServiceError> {
    let balance: Option<Option<i64>> = stock_movement::Entity::find()
        .select_only()
        .column_as(Expr::col(stock_movement::Column::Quantity).sum(), "balance")
        .filter(stock_movement::Column::ProductId.eq(product_id))
        .filter(stock_movement::Column::WarehouseId.eq(warehouse_id))
        .into_tuple()
        .one(conn)
        .await
        .map_err(|e| {
            error!(error = %e, product_id = %product_id, warehouse_id = %warehouse_id, "Failed to sum stock movements");
            ServiceError::DatabaseError(e)
        })?;

    Ok(balance.flatten().unwrap_or(0))
}

/// Appends one ledger row. Sufficiency is the caller's concern.
pub async fn record_movement<C: ConnectionTrait>(
    conn: &C,
    movement: NewMovement,
) -> Result<stock_movement::Model, ServiceError> {
    stock_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(movement.product_id),
        warehouse_id: Set(movement.warehouse_id),
        quantity: Set(movement.quantity),
        movement_type: Set(movement.movement_type.to_string()),
        reference_type: Set(movement.reference_type.to_string()),
        reference_id: Set(movement.reference_id),
        reason: Set(movement.reason),
        created_by: Set(movement.created_by),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await
    .map_err(|e| {
        error!(error = %e, product_id = %movement.product_id, "Failed to append stock movement");
        ServiceError::DatabaseError(e)
    })
}

pub(crate) async fn load_product<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<product::Model, ServiceError> {
    product::Entity::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
}

pub(crate) async fn load_warehouse<C: ConnectionTrait>(
    conn: &C,
    warehouse_id: Uuid,
) -> Result<warehouse::Model, ServiceError> {
    warehouse::Entity::find_by_id(warehouse_id)
        .filter(warehouse::Column::IsDeleted.eq(false))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Warehouse {} not found", warehouse_id)))
}

/// Stock ledger operations over the connection pool
#[derive(Clone)]
pub struct StockLedger {
    db: Arc<DatabaseConnection>,
    audit: AuditTrail,
}

impl StockLedger {
    pub fn new(db: Arc<DatabaseConnection>, audit: AuditTrail) -> Self {
        Self { db, audit }
    }

    /// Current level of one pair, read outside any transaction
    #[instrument(skip(self))]
    pub async fn stock_level(&self, product_id: Uuid, warehouse_id: Uuid) -> Result<i64, ServiceError> {
        current_stock(&*self.db, product_id, warehouse_id).await
    }

    /// Moves stock between two warehouses.
    ///
    /// The source level is read and both rows are written in one transaction.
    /// The aggregate itself is not locked, so two concurrent transfers out of
    /// the same pair can both pass the check.
    #[instrument(skip(self, request, ip), fields(product_id = %request.product_id, quantity = request.quantity))]
    pub async fn transfer(
        &self,
        request: TransferStockRequest,
        actor_id: Uuid,
        ip: Option<String>,
    ) -> Result<TransferOutcome, ServiceError> {
        request.validate()?;
        if request.from_warehouse_id == request.to_warehouse_id {
            return Err(ServiceError::ValidationError(
                "Source and destination warehouses must differ".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let outcome = self.transfer_in_txn(&txn, &request, actor_id, ip).await;
        let outcome = commit_or_rollback(txn, outcome).await?;

        counter!("nexus_stock.transfers", 1);
        info!(
            product_id = %request.product_id,
            from = %request.from_warehouse_id,
            to = %request.to_warehouse_id,
            quantity = request.quantity,
            "Stock transferred"
        );
        Ok(outcome)
    }

    async fn transfer_in_txn(
        &self,
        txn: &DatabaseTransaction,
        request: &TransferStockRequest,
        actor_id: Uuid,
        ip: Option<String>,
    ) -> Result<TransferOutcome, ServiceError> {
        let product = load_product(txn, request.product_id).await?;
        load_warehouse(txn, request.from_warehouse_id).await?;
        load_warehouse(txn, request.to_warehouse_id).await?;

        let available = current_stock(txn, request.product_id, request.from_warehouse_id).await?;
        let required = i64::from(request.quantity);
        if available < required {
            warn!(available, required, "Transfer rejected for insufficient stock");
            return Err(ServiceError::InsufficientStock {
                product: product.name,
                available,
                required,
            });
        }

        let transfer_id = Uuid::new_v4();
        let transfer_out = record_movement(
            txn,
            NewMovement {
                product_id: request.product_id,
                warehouse_id: request.from_warehouse_id,
                quantity: MovementType::TransferOut.signed(request.quantity),
                movement_type: MovementType::TransferOut,
                reference_type: ReferenceType::Transfer,
                reference_id: Some(transfer_id),
                reason: None,
                created_by: actor_id,
            },
        )
        .await?;
        let transfer_in = record_movement(
            txn,
            NewMovement {
                product_id: request.product_id,
                warehouse_id: request.to_warehouse_id,
                quantity: MovementType::TransferIn.signed(request.quantity),
                movement_type: MovementType::TransferIn,
                reference_type: ReferenceType::Transfer,
                reference_id: Some(transfer_id),
                reason: None,
                created_by: actor_id,
            },
        )
        .await?;

        self.audit
            .record(
                AuditEntry::new(
                    actor_id,
                    AuditAction::StockTransferred,
                    json!({
                        "entity": "STOCK_TRANSFER",
                        "id": transfer_id.to_string(),
                        "product_id": request.product_id,
                        "from_warehouse_id": request.from_warehouse_id,
                        "to_warehouse_id": request.to_warehouse_id,
                        "quantity": request.quantity,
                    }),
                    ip,
                ),
                Some(txn),
            )
            .await?;

        Ok(TransferOutcome {
            transfer_out,
            transfer_in,
        })
    }

    /// Manual correction of one pair.
    ///
    /// IN and COUNT_DIFF add the magnitude, OUT and SCRAP remove it. Removals
    /// that would take the level below zero are refused unless the request
    /// sets `allow_negative`.
    #[instrument(skip(self, request, ip), fields(product_id = %request.product_id, warehouse_id = %request.warehouse_id))]
    pub async fn adjust(
        &self,
        request: AdjustStockRequest,
        actor_id: Uuid,
        ip: Option<String>,
    ) -> Result<stock_movement::Model, ServiceError> {
        request.validate()?;
        let movement_type = MovementType::from_str(request.adjustment_type.trim())
            .ok()
            .filter(|t| ADJUSTMENT_TYPES.contains(t))
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Invalid adjustment type: {}. Expected one of IN, OUT, COUNT_DIFF, SCRAP",
                    request.adjustment_type
                ))
            })?;
        if request.quantity == 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must not be zero".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let outcome = self
            .adjust_in_txn(&txn, &request, movement_type, actor_id, ip)
            .await;
        let movement = commit_or_rollback(txn, outcome).await?;

        counter!("nexus_stock.adjustments", 1, "type" => movement_type.to_string());
        info!(
            movement_id = %movement.id,
            quantity = movement.quantity,
            movement_type = %movement_type,
            "Stock adjusted"
        );
        Ok(movement)
    }

    async fn adjust_in_txn(
        &self,
        txn: &DatabaseTransaction,
        request: &AdjustStockRequest,
        movement_type: MovementType,
        actor_id: Uuid,
        ip: Option<String>,
    ) -> Result<stock_movement::Model, ServiceError> {
        let product = load_product(txn, request.product_id).await?;
        load_warehouse(txn, request.warehouse_id).await?;

        let signed = movement_type.signed(request.quantity);
        if signed < 0 && !request.allow_negative {
            let available = current_stock(txn, request.product_id, request.warehouse_id).await?;
            let required = i64::from(signed).abs();
            if available < required {
                return Err(ServiceError::InsufficientStock {
                    product: product.name,
                    available,
                    required,
                });
            }
        }

        let movement = record_movement(
            txn,
            NewMovement {
                product_id: request.product_id,
                warehouse_id: request.warehouse_id,
                quantity: signed,
                movement_type,
                reference_type: ReferenceType::ManualAdjustment,
                reference_id: None,
                reason: request.reason.clone(),
                created_by: actor_id,
            },
        )
        .await?;

        self.audit
            .record(
                AuditEntry::new(
                    actor_id,
                    AuditAction::StockAdjusted,
                    json!({
                        "entity": "STOCK_MOVEMENT",
                        "id": movement.id.to_string(),
                        "product_id": request.product_id,
                        "warehouse_id": request.warehouse_id,
                        "type": movement_type.to_string(),
                        "quantity": signed,
                        "reason": request.reason,
                    }),
                    ip,
                ),
                Some(txn),
            )
            .await?;

        Ok(movement)
    }

    /// Current level of every pair that has at least one movement
    #[instrument(skip(self))]
    pub async fn list_stock(&self) -> Result<Vec<StockLevel>, ServiceError> {
        let rows: Vec<(Uuid, Uuid, Option<i64>)> = stock_movement::Entity::find()
            .select_only()
            .column(stock_movement::Column::ProductId)
            .column(stock_movement::Column::WarehouseId)
            .column_as(Expr::col(stock_movement::Column::Quantity).sum(), "quantity")
            .group_by(stock_movement::Column::ProductId)
            .group_by(stock_movement::Column::WarehouseId)
            .into_tuple()
            .all(&*self.db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to aggregate stock levels");
                ServiceError::DatabaseError(e)
            })?;

        let (products, warehouses) = self
            .name_lookups(rows.iter().map(|r| r.0), rows.iter().map(|r| r.1))
            .await?;

        let mut levels: Vec<StockLevel> = rows
            .into_iter()
            .map(|(product_id, warehouse_id, quantity)| {
                let (product_name, sku) = products
                    .get(&product_id)
                    .map(|p| (p.name.clone(), p.sku.clone()))
                    .unwrap_or_default();
                StockLevel {
                    product_id,
                    product_name,
                    sku,
                    warehouse_id,
                    warehouse_name: warehouses.get(&warehouse_id).cloned().unwrap_or_default(),
                    quantity: quantity.unwrap_or(0),
                }
            })
            .collect();
        levels.sort_by(|a, b| {
            a.product_name
                .cmp(&b.product_name)
                .then_with(|| a.warehouse_name.cmp(&b.warehouse_name))
        });

        Ok(levels)
    }

    /// Latest movements, newest first
    #[instrument(skip(self))]
    pub async fn recent_movements(&self, limit: u64) -> Result<Vec<MovementView>, ServiceError> {
        let movements = stock_movement::Entity::find()
            .order_by_desc(stock_movement::Column::CreatedAt)
            .limit(limit)
            .all(&*self.db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list stock movements");
                ServiceError::DatabaseError(e)
            })?;

        let (products, warehouses) = self
            .name_lookups(
                movements.iter().map(|m| m.product_id),
                movements.iter().map(|m| m.warehouse_id),
            )
            .await?;

        Ok(movements
            .into_iter()
            .map(|m| MovementView {
                product_name: products.get(&m.product_id).map(|p| p.name.clone()),
                warehouse_name: warehouses.get(&m.warehouse_id).cloned(),
                id: m.id,
                product_id: m.product_id,
                warehouse_id: m.warehouse_id,
                quantity: m.quantity,
                movement_type: m.movement_type,
                reference_type: m.reference_type,
                reference_id: m.reference_id,
                reason: m.reason,
                created_by: m.created_by,
                created_at: m.created_at,
            })
            .collect())
    }

    async fn name_lookups(
        &self,
        product_ids: impl Iterator<Item = Uuid>,
        warehouse_ids: impl Iterator<Item = Uuid>,
    ) -> Result<(HashMap<Uuid, product::Model>, HashMap<Uuid, String>), ServiceError> {
        let mut product_ids: Vec<Uuid> = product_ids.collect();
        product_ids.sort();
        product_ids.dedup();
        let mut warehouse_ids: Vec<Uuid> = warehouse_ids.collect();
        warehouse_ids.sort();
        warehouse_ids.dedup();

        let products = if product_ids.is_empty() {
            HashMap::new()
        } else {
            product::Entity::find()
                .filter(product::Column::Id.is_in(product_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect()
        };

        let warehouses = if warehouse_ids.is_empty() {
            HashMap::new()
        } else {
            warehouse::Entity::find()
                .filter(warehouse::Column::Id.is_in(warehouse_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|w| (w.id, w.name))
                .collect()
        };

        Ok((products, warehouses))
    }
}

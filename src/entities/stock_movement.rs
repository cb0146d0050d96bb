use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Kind of ledger entry
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    In,
    Out,
    TransferIn,
    TransferOut,
    CountDiff,
    Scrap,
}

impl MovementType {
    /// Whether entries of this kind take stock away from the warehouse
    pub fn is_outbound(&self) -> bool {
        matches!(
            self,
            MovementType::Out | MovementType::TransferOut | MovementType::Scrap
        )
    }

    /// Applies this kind's sign to a magnitude
    pub fn signed(&self, quantity: i32) -> i32 {
        let magnitude = quantity.saturating_abs();
        if self.is_outbound() {
            -magnitude
        } else {
            magnitude
        }
    }
}

/// Business event that caused a movement
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    SalesOrder,
    PurchaseOrder,
    ManualAdjustment,
    Transfer,
}

/// Append-only ledger row. Stock levels are sums over these rows.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    /// Signed: positive adds stock, negative removes it
    pub quantity: i32,
    pub movement_type: String,
    pub reference_type: String,
    pub reference_id: Option<Uuid>,
    pub reason: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::warehouse::Entity",
        from = "Column::WarehouseId",
        to = "super::warehouse::Column::Id"
    )]
    Warehouse,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::warehouse::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Warehouse.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if !insert {
            return Err(DbErr::Custom(
                "stock movements are append-only and cannot be updated".to_string(),
            ));
        }

        let mut active_model = self;
        if let ActiveValue::NotSet = active_model.created_at {
            active_model.created_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn movement_codes_round_trip_through_strings() {
        assert_eq!(MovementType::TransferOut.as_ref(), "TRANSFER_OUT");
        assert_eq!(
            MovementType::from_str("COUNT_DIFF").unwrap(),
            MovementType::CountDiff
        );
        assert_eq!(ReferenceType::ManualAdjustment.to_string(), "MANUAL_ADJUSTMENT");
    }

    #[test]
    fn sign_follows_direction() {
        assert_eq!(MovementType::In.signed(-4), 4);
        assert_eq!(MovementType::CountDiff.signed(3), 3);
        assert_eq!(MovementType::Out.signed(4), -4);
        assert_eq!(MovementType::Scrap.signed(-2), -2);
        assert_eq!(MovementType::TransferOut.signed(7), -7);
        assert_eq!(MovementType::TransferIn.signed(7), 7);
    }
}

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, QueryOrder,
    QuerySelect, Set,
};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};
use tracing::{error, instrument, warn};
use uuid::Uuid;

use crate::{entities::audit_log, errors::ServiceError};

/// Codes recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    SalesOrderCreated,
    SalesOrderStatusUpdated,
    SalesOrderApproved,
    StockAdjusted,
    StockTransferred,
    PurchaseOrderCreated,
    PurchaseOrderReceived,
}

/// One mutating action to be recorded
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub actor_id: Uuid,
    pub action: AuditAction,
    /// Free-form payload; `entity` and `id` keys name the affected record
    pub details: Value,
    pub ip: Option<String>,
}

impl AuditEntry {
    pub fn new(actor_id: Uuid, action: AuditAction, details: Value, ip: Option<String>) -> Self {
        Self {
            actor_id,
            action,
            details,
            ip,
        }
    }

    /// Entity name and id for the row, taken from the payload when present.
    fn subject(&self) -> (String, Option<String>) {
        let code = self.action.as_ref();
        let entity = self
            .details
            .get("entity")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| code.split('_').next().unwrap_or(code).to_string());

        let entity_id = ["id", "entity_id", "target_id"]
            .iter()
            .find_map(|key| self.details.get(*key))
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });

        (entity, entity_id)
    }

    fn into_active_model(self) -> audit_log::ActiveModel {
        let (entity, entity_id) = self.subject();
        audit_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(self.actor_id),
            action: Set(self.action.to_string()),
            entity: Set(entity),
            entity_id: Set(entity_id),
            metadata: Set(self.details),
            ip_address: Set(self.ip),
            created_at: Set(Utc::now()),
        }
    }
}

/// Writer and reader for the audit trail
#[derive(Clone)]
pub struct AuditTrail {
    db: Arc<DatabaseConnection>,
}

impl AuditTrail {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Records an audit entry.
    ///
    /// With a transaction the insert joins it and a failure is returned, so
    /// the caller's rollback discards the business change as well. Without
    /// one the write is best-effort: failures are logged and `Ok(None)` is
    /// returned.
    #[instrument(skip(self, entry, txn), fields(action = %entry.action, actor_id = %entry.actor_id))]
    pub async fn record(
        &self,
        entry: AuditEntry,
        txn: Option<&DatabaseTransaction>,
    ) -> Result<Option<audit_log::Model>, ServiceError> {
        let action = entry.action;
        let model = entry.into_active_model();

        match txn {
            Some(txn) => {
                let saved = model.insert(txn).await.map_err(|e| {
                    error!(error = %e, "Failed to write audit entry inside transaction");
                    ServiceError::DatabaseError(e)
                })?;
                Ok(Some(saved))
            }
            None => match model.insert(&*self.db).await {
                Ok(saved) => Ok(Some(saved)),
                Err(e) => {
                    warn!(error = %e, action = %action, "Audit write failed; continuing");
                    counter!("nexus_audit.write_failures", 1);
                    Ok(None)
                }
            },
        }
    }

    /// Latest entries, newest first
    #[instrument(skip(self))]
    pub async fn recent(&self, limit: u64) -> Result<Vec<audit_log::Model>, ServiceError> {
        audit_log::Entity::find()
            .order_by_desc(audit_log::Column::CreatedAt)
            .limit(limit)
            .all(&*self.db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list audit entries");
                ServiceError::DatabaseError(e)
            })
    }
}

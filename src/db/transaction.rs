/*!
 * Transaction Helper Utilities
 *
 * Every opened transaction ends in exactly one of commit or rollback,
 * whichever way the work inside it finished.
 */

use crate::errors::ServiceError;
use metrics::counter;
use sea_orm::DatabaseTransaction;
use tracing::{debug, error, warn};

/// Finish a transaction from the outcome of the work done inside it.
///
/// `Ok` commits and returns the value; `Err` rolls back and returns the
/// original error. A failed commit surfaces as a `DatabaseError`. A failed
/// rollback is logged and the original error still wins.
///
/// # Example
///
/// ```rust,ignore
/// let txn = db.begin().await?;
/// let outcome = insert_order_and_items(&txn, input).await;
/// let order = commit_or_rollback(txn, outcome).await?;
/// ```
pub async fn commit_or_rollback<T>(
    txn: DatabaseTransaction,
    outcome: Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    match outcome {
        Ok(value) => {
            txn.commit().await.map_err(|e| {
                error!(error = %e, "Failed to commit transaction");
                counter!("nexus_db.transaction.commit_failed", 1);
                ServiceError::DatabaseError(e)
            })?;
            debug!("Transaction committed");
            counter!("nexus_db.transaction.committed", 1);
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                error!(error = %rollback_err, "Failed to roll back transaction");
            }
            warn!(error = %err, "Transaction rolled back");
            counter!("nexus_db.transaction.rolled_back", 1);
            Err(err)
        }
    }
}

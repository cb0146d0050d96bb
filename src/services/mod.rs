// Audit trail shared by every mutating service
pub mod audit;

// Sales orders
pub mod order_approval;
pub mod order_status;
pub mod order_validation;
pub mod orders;

// Inventory
pub mod purchase_orders;
pub mod stock_ledger;

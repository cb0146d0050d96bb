pub mod audit_log;
pub mod customer;
pub mod product;
pub mod purchase_order;
pub mod purchase_order_item;
pub mod sales_order;
pub mod sales_order_item;
pub mod stock_movement;
pub mod user;
pub mod warehouse;

//! Order payload validation and total calculation.
//!
//! Validation walks the raw JSON body rather than a typed struct so that every
//! problem in the payload is reported at once instead of stopping at the first
//! field serde cannot decode.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// A line of a validated order request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// A validated order request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NewOrder {
    pub customer_id: Uuid,
    pub items: Vec<NewOrderItem>,
}

/// Checks an order payload and returns either the typed order or every
/// violation found, in payload order.
pub fn validate_order_input(data: &Value) -> Result<NewOrder, Vec<String>> {
    let mut errors = Vec::new();

    let customer_id = match data.get("customer_id") {
        None | Some(Value::Null) => {
            errors.push("Customer ID is required".to_string());
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.push("Customer ID is required".to_string());
            None
        }
        Some(raw) => match parse_uuid(raw) {
            Some(id) => Some(id),
            None => {
                errors.push("Customer ID must be a valid UUID".to_string());
                None
            }
        },
    };

    let mut items = Vec::new();
    match data.get("items").and_then(Value::as_array) {
        Some(list) if !list.is_empty() => {
            for (index, item) in list.iter().enumerate() {
                if let Some(parsed) = validate_item(index, item, &mut errors) {
                    items.push(parsed);
                }
            }
        }
        _ => errors.push("Order must contain at least one item".to_string()),
    }

    match customer_id {
        Some(customer_id) if errors.is_empty() => Ok(NewOrder { customer_id, items }),
        _ => Err(errors),
    }
}

fn validate_item(index: usize, item: &Value, errors: &mut Vec<String>) -> Option<NewOrderItem> {
    if !item.is_object() {
        errors.push(format!("Item {}: must be an object", index));
        return None;
    }

    let product_id = match item.get("product_id") {
        None | Some(Value::Null) => {
            errors.push(format!("Item {}: Product ID is required", index));
            None
        }
        Some(raw) => {
            let parsed = parse_uuid(raw);
            if parsed.is_none() {
                errors.push(format!("Item {}: Product ID must be a valid UUID", index));
            }
            parsed
        }
    };

    let quantity = match item.get("quantity").and_then(Value::as_f64) {
        Some(q) if q <= 0.0 => {
            errors.push(format!("Item {}: Quantity must be positive", index));
            None
        }
        Some(q) if q.fract() != 0.0 => {
            errors.push(format!("Item {}: Quantity must be a whole number", index));
            None
        }
        Some(q) if q > f64::from(i32::MAX) => {
            errors.push(format!("Item {}: Quantity is too large", index));
            None
        }
        Some(q) => Some(q as i32),
        None => {
            errors.push(format!("Item {}: Quantity must be positive", index));
            None
        }
    };

    let unit_price = match item.get("unit_price") {
        None | Some(Value::Null) => {
            errors.push(format!("Item {}: Unit price is required", index));
            None
        }
        Some(raw) => match parse_decimal(raw) {
            Some(price) if price.is_sign_negative() && !price.is_zero() => {
                errors.push(format!("Item {}: Unit price must be non-negative", index));
                None
            }
            Some(price) => Some(price),
            None => {
                errors.push(format!("Item {}: Unit price must be a number", index));
                None
            }
        },
    };

    Some(NewOrderItem {
        product_id: product_id?,
        quantity: quantity?,
        unit_price: unit_price?,
    })
}

fn parse_uuid(raw: &Value) -> Option<Uuid> {
    raw.as_str().and_then(|s| Uuid::parse_str(s.trim()).ok())
}

fn parse_decimal(raw: &Value) -> Option<Decimal> {
    match raw {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

/// Sum of quantity x unit price over all items, in exact decimal arithmetic.
pub fn calculate_order_total(items: &[NewOrderItem]) -> Decimal {
    items
        .iter()
        .map(|item| Decimal::from(item.quantity) * item.unit_price)
        .sum()
}

//! Order domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use milletmart_core::cart::{LineKey, PricedLine};
use milletmart_core::{Currency, Money, OrderId, OrderStatus, ShippingAddress, UserId};

/// A placed order with its priced line snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub subtotal: Money,
    pub savings: Money,
    pub shipping_fee: Money,
    pub total: Money,
    pub currency: Currency,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub failure_reason: Option<String>,
    /// Stock has been deducted for this order's items.
    pub stock_committed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Price snapshot of one cart line at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub item: LineKey,
    pub name: String,
    pub unit_list_price: Money,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

impl From<&PricedLine> for OrderItem {
    fn from(line: &PricedLine) -> Self {
        Self {
            item: line.item,
            name: line.name.clone(),
            unit_list_price: line.unit_list_price,
            unit_price: line.unit_price,
            quantity: line.quantity,
            line_total: line.line_total,
        }
    }
}

/// One row of an order's status history.
#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    /// `None` for the row recording creation.
    pub from: Option<OrderStatus>,
    pub to: OrderStatus,
    pub note: Option<String>,
    pub changed_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

//! Order model shared by the server and its clients

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Status Types
// ============================================================================

/// Fulfillment status of an order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// `completed` and `cancelled` end the fulfillment flow
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status of an order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a status string names no known value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status: {}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

// ============================================================================
// Order
// ============================================================================

/// One ordered menu item with the price captured at order time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub menu_item_id: String,
    pub quantity: i32,
    /// Unit price snapshot, never re-read from the live menu
    pub price: f64,
}

/// Persisted order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub restaurant_id: String,
    pub table_id: String,
    pub items: Vec<LineItem>,
    /// Sum of `price * quantity` at creation time
    pub total: f64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// Epoch milliseconds
    pub created_at: i64,
    /// Epoch milliseconds of the last transition
    pub updated_at: i64,
}

/// Line item with the menu item name resolved for display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLineItem {
    pub menu_item_id: String,
    /// `None` when the menu item no longer exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub quantity: i32,
    pub price: f64,
}

/// Order with table number and item names resolved
///
/// Payload of the `new_order` event and of the staff order listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedOrder {
    pub id: String,
    pub restaurant_id: String,
    pub table_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_number: Option<u32>,
    pub items: Vec<ResolvedLineItem>,
    pub total: f64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ResolvedOrder {
    /// Attach resolved references to a persisted order
    ///
    /// `item_name` is called once per line item with its menu item id.
    pub fn resolve<F>(order: Order, table_number: Option<u32>, mut item_name: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let items = order
            .items
            .into_iter()
            .map(|item| ResolvedLineItem {
                name: item_name(&item.menu_item_id),
                menu_item_id: item.menu_item_id,
                quantity: item.quantity,
                price: item.price,
            })
            .collect();

        Self {
            id: order.id,
            restaurant_id: order.restaurant_id,
            table_id: order.table_id,
            table_number,
            items,
            total: order.total,
            status: order.status,
            payment_status: order.payment_status,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

// ============================================================================
// Requests / Payloads
// ============================================================================

/// Body of `POST /api/orders`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub restaurant_id: String,
    pub table_id: String,
    #[serde(default)]
    pub items: Vec<LineItem>,
    /// Client-computed total; informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

/// Body of `PUT /api/orders/{id}`
///
/// Values stay as raw strings so unknown values surface as validation errors
/// rather than body rejections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,
}

/// Payload of the `order_status` event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusPayload {
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
}

impl From<&Order> for OrderStatusPayload {
    fn from(order: &Order) -> Self {
        Self {
            status: order.status,
            payment_status: order.payment_status,
        }
    }
}

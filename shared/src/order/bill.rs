//! Bill view: tax-inclusive summary derived from an order snapshot

use serde::{Deserialize, Serialize};

/// One printed bill line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BillLine {
    pub name: String,
    pub quantity: i32,
    pub unit_price: f64,
    pub line_total: f64,
}

/// Derived bill, computed on demand and never stored
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BillView {
    pub order_id: String,
    pub restaurant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_number: Option<u32>,
    pub created_at: i64,
    pub lines: Vec<BillLine>,
    pub subtotal: f64,
    /// Tax rate in percent (5 means 5%)
    pub tax_rate: f64,
    pub tax: f64,
    pub grand_total: f64,
}

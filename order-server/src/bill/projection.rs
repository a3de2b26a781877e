//! Bill projection: tax-inclusive summary of an order
//!
//! Pure and deterministic. Never touches the store or mutates the order.

use rust_decimal::Decimal;
use shared::order::{BillLine, BillView, ResolvedOrder};

use crate::orders::money::{round_money, to_decimal, to_f64};

/// Default tax rate in percent
pub const DEFAULT_TAX_RATE_PERCENT: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

/// Placeholder for menu items that no longer exist
pub const UNKNOWN_ITEM: &str = "Unknown Item";

/// Derive the bill for an order
///
/// Line totals and the subtotal are rounded to 2 dp, tax is
/// `subtotal * rate / 100` rounded half away from zero, and the grand total
/// is `subtotal + tax`.
pub fn project(order: &ResolvedOrder, tax_rate_percent: Decimal) -> BillView {
    let mut subtotal = Decimal::ZERO;
    let lines = order
        .items
        .iter()
        .map(|item| {
            let line_total = to_decimal(item.price) * Decimal::from(item.quantity);
            subtotal += line_total;
            BillLine {
                name: item
                    .name
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_ITEM.to_string()),
                quantity: item.quantity,
                unit_price: item.price,
                line_total: to_f64(line_total),
            }
        })
        .collect();

    let subtotal = round_money(subtotal);
    let tax = round_money(subtotal * tax_rate_percent / Decimal::ONE_HUNDRED);
    let grand_total = round_money(subtotal + tax);

    BillView {
        order_id: order.id.clone(),
        restaurant_id: order.restaurant_id.clone(),
        table_number: order.table_number,
        created_at: order.created_at,
        lines,
        subtotal: to_f64(subtotal),
        tax_rate: to_f64(tax_rate_percent),
        tax: to_f64(tax),
        grand_total: to_f64(grand_total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{OrderStatus, PaymentStatus, ResolvedLineItem};

    fn order(items: Vec<ResolvedLineItem>) -> ResolvedOrder {
        ResolvedOrder {
            id: "order-abc123".into(),
            restaurant_id: "r1".into(),
            table_id: "t1".into(),
            table_number: Some(4),
            items,
            total: 0.0,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            created_at: 1_700_000_000_000,
            updated_at: 1_700_000_000_000,
        }
    }

    fn line(name: Option<&str>, quantity: i32, price: f64) -> ResolvedLineItem {
        ResolvedLineItem {
            menu_item_id: "m1".into(),
            name: name.map(str::to_string),
            quantity,
            price,
        }
    }

    #[test]
    fn test_two_hundred_plus_five_percent() {
        let bill = project(
            &order(vec![line(Some("Burger"), 2, 100.0)]),
            DEFAULT_TAX_RATE_PERCENT,
        );
        assert_eq!(bill.subtotal, 200.0);
        assert_eq!(bill.tax, 10.0);
        assert_eq!(bill.grand_total, 210.0);
        assert_eq!(bill.tax_rate, 5.0);
        assert_eq!(bill.lines[0].line_total, 200.0);
        assert_eq!(bill.table_number, Some(4));
    }

    #[test]
    fn test_tax_rounds_half_away_from_zero() {
        // 0.10 * 5% = 0.005 -> 0.01
        let bill = project(&order(vec![line(Some("Mint"), 1, 0.10)]), DEFAULT_TAX_RATE_PERCENT);
        assert_eq!(bill.tax, 0.01);
        assert_eq!(bill.grand_total, 0.11);
    }

    #[test]
    fn test_missing_item_name() {
        let bill = project(&order(vec![line(None, 1, 3.0)]), DEFAULT_TAX_RATE_PERCENT);
        assert_eq!(bill.lines[0].name, UNKNOWN_ITEM);
    }

    #[test]
    fn test_deterministic_and_non_mutating() {
        let source = order(vec![line(Some("A"), 3, 0.1), line(Some("B"), 1, 12.35)]);
        let before = source.clone();
        let a = project(&source, DEFAULT_TAX_RATE_PERCENT);
        let b = project(&source, DEFAULT_TAX_RATE_PERCENT);
        assert_eq!(a, b);
        assert_eq!(source, before);
        assert_eq!(a.subtotal, 12.65);
        assert_eq!(a.tax, 0.63);
        assert_eq!(a.grand_total, 13.28);
    }

    #[test]
    fn test_custom_rate() {
        let bill = project(&order(vec![line(Some("A"), 1, 50.0)]), Decimal::from(10));
        assert_eq!(bill.tax, 5.0);
        assert_eq!(bill.grand_total, 55.0);
    }
}

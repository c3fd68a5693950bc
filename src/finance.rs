//! Financial derivation for work orders.
//!
//! Two deliberately separate derivations live here:
//!
//! - the order-level one, where tax is a free-form user-entered amount and
//!   nothing is rounded or clamped (a negative subtotal is surfaced as-is);
//! - the itemized costing panel one, where tax is a fixed 15% of the
//!   itemized subtotal and every step is rounded to two decimals on its own.
//!
//! They must not be unified: the order-level tax field is an input, the
//! itemized tax is always computed.

use crate::schema::CostLineItem;

/// Fixed tax rate applied by the itemized costing panel.
pub const ITEMIZED_TAX_RATE: f64 = 0.15;

/// Order-level derived figures. Pure output, recomputed on every edit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderBreakdown {
    pub subtotal: f64,
    pub total: f64,
}

/// Itemized panel figures, each stage independently rounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemizedBreakdown {
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

/// Round half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Order-level derivation: `subtotal = labor + parts + other - discount`,
/// `total = subtotal + tax`. The subtotal may go negative and is not clamped.
pub fn derive_order(labor: f64, parts: f64, other: f64, discount: f64, tax: f64) -> OrderBreakdown {
    let subtotal = labor + parts + other - discount;
    OrderBreakdown {
        subtotal,
        total: subtotal + tax,
    }
}

/// Itemized derivation: subtotal over line totals, then 15% tax, then total,
/// rounding after each stage.
pub fn derive_itemized(items: &[CostLineItem]) -> ItemizedBreakdown {
    let subtotal = round2(items.iter().map(CostLineItem::line_total).sum());
    let tax = round2(subtotal * ITEMIZED_TAX_RATE);
    let total = round2(subtotal + tax);
    ItemizedBreakdown {
        subtotal,
        tax,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: u32, unit_cost: f64) -> CostLineItem {
        CostLineItem::new("part", quantity, unit_cost).expect("valid item")
    }

    #[test]
    fn order_total_matches_identity() {
        let out = derive_order(30.0, 45.5, 4.5, 10.0, 12.0);
        assert!((out.subtotal - 70.0).abs() < 1e-9);
        assert!((out.total - (30.0 + 45.5 + 4.5 - 10.0 + 12.0)).abs() < 1e-9);
    }

    #[test]
    fn order_derivation_is_idempotent() {
        let first = derive_order(10.0, 20.0, 0.0, 5.0, 3.0);
        let second = derive_order(10.0, 20.0, 0.0, 5.0, 3.0);
        assert_eq!(first, second);
    }

    #[test]
    fn negative_subtotal_is_surfaced_not_clamped() {
        let out = derive_order(10.0, 0.0, 0.0, 25.0, 0.0);
        assert!((out.subtotal - (-15.0)).abs() < 1e-9);
        assert!((out.total - (-15.0)).abs() < 1e-9);
    }

    #[test]
    fn itemized_rounds_each_stage_independently() {
        // subtotal 99.99, tax 14.9985 -> 15.00, total 114.99
        let items = [item(3, 33.33)];
        let out = derive_itemized(&items);
        assert!((out.subtotal - 99.99).abs() < 1e-9);
        assert!((out.tax - 15.0).abs() < 1e-9);
        assert!((out.total - 114.99).abs() < 1e-9);
    }

    #[test]
    fn itemized_sums_quantities() {
        let items = [item(2, 12.5), item(1, 5.0)];
        let out = derive_itemized(&items);
        assert!((out.subtotal - 30.0).abs() < 1e-9);
        assert!((out.tax - 4.5).abs() < 1e-9);
        assert!((out.total - 34.5).abs() < 1e-9);
    }

    #[test]
    fn itemized_empty_panel_is_all_zero() {
        let out = derive_itemized(&[]);
        assert_eq!(out.subtotal, 0.0);
        assert_eq!(out.tax, 0.0);
        assert_eq!(out.total, 0.0);
    }
}

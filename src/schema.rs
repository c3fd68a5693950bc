//! Wire-level data model shared with the Order collaborator.
//!
//! `WorkOrder` is the full snapshot the collaborator reads and writes; the
//! desk never persists a partial order. Status is the canonical persisted
//! value, stage is derived from it and never stored on the wire.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical persisted status of a work order.
///
/// The four working statuses map 1:1 onto stages; `Closed` is terminal and
/// has no stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Intake,
    Diagnosis,
    Costing,
    Ready,
    Closed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Intake => "INTAKE",
            OrderStatus::Diagnosis => "DIAGNOSIS",
            OrderStatus::Costing => "COSTING",
            OrderStatus::Ready => "READY",
            OrderStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the four ordered workflow phases, always in `1..=4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Stage(u8);

impl Stage {
    pub const MIN: Stage = Stage(1);
    pub const MAX: Stage = Stage(4);

    pub fn get(self) -> u8 {
        self.0
    }

    /// Next stage, clamped at stage 4.
    pub fn next(self) -> Stage {
        Stage(self.0.saturating_add(1).min(Self::MAX.0))
    }

    /// Previous stage, clamped at stage 1.
    pub fn back(self) -> Stage {
        Stage(self.0.saturating_sub(1).max(Self::MIN.0))
    }

    /// Canonical non-terminal status for this stage.
    pub fn status(self) -> OrderStatus {
        match self.0 {
            1 => OrderStatus::Intake,
            2 => OrderStatus::Diagnosis,
            3 => OrderStatus::Costing,
            _ => OrderStatus::Ready,
        }
    }

    /// Stage for a persisted status; `None` only for `Closed`.
    pub fn from_status(status: OrderStatus) -> Option<Stage> {
        match status {
            OrderStatus::Intake => Some(Stage(1)),
            OrderStatus::Diagnosis => Some(Stage(2)),
            OrderStatus::Costing => Some(Stage(3)),
            OrderStatus::Ready => Some(Stage(4)),
            OrderStatus::Closed => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "intake",
            2 => "diagnosis",
            3 => "costing",
            _ => "closure",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/4 ({})", self.0, self.label())
    }
}

/// Full editable snapshot of a work order as stored by the Order collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: String,
    pub number: String,
    pub status: OrderStatus,

    pub client_name: String,
    pub client_cedula: String,
    pub client_email: String,
    pub equipment: String,
    pub equipment_id: String,

    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub recommendation: String,

    #[serde(default)]
    pub labor_cost: f64,
    #[serde(default)]
    pub parts_cost: f64,
    #[serde(default)]
    pub other_cost: f64,
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub tax: f64,
    #[serde(default)]
    pub subtotal: f64,
    #[serde(default)]
    pub total: f64,

    #[serde(default)]
    pub warranty: bool,
    #[serde(default)]
    pub warranty_ref: String,

    #[serde(default)]
    pub closure_reason: String,
    #[serde(default)]
    pub closed_by: String,
    #[serde(default)]
    pub otp_code: String,
    #[serde(default)]
    pub otp_validated: bool,

    #[serde(default)]
    pub intake_at: String,
    #[serde(default)]
    pub delivered_at: String,
}

impl WorkOrder {
    /// Stage derived from the persisted status; `None` once closed.
    pub fn stage(&self) -> Option<Stage> {
        Stage::from_status(self.status)
    }
}

/// One row in the itemized costing panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLineItem {
    pub description: String,
    /// Always at least 1.
    pub quantity: u32,
    pub unit_cost: f64,
}

impl CostLineItem {
    pub fn new(description: &str, quantity: u32, unit_cost: f64) -> Result<CostLineItem> {
        if quantity == 0 {
            return Err(anyhow!("line item quantity must be at least 1"));
        }
        Ok(CostLineItem {
            description: description.to_string(),
            quantity,
            unit_cost,
        })
    }

    pub fn line_total(&self) -> f64 {
        f64::from(self.quantity) * self.unit_cost
    }
}

/// Which evidence slot a signature fills; the two are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureKind {
    Conformity,
    Receipt,
}

impl SignatureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureKind::Conformity => "conformity",
            SignatureKind::Receipt => "receipt",
        }
    }
}

impl fmt::Display for SignatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-order signed flags fetched from the Signature collaborator at load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedStatus {
    #[serde(default)]
    pub conformity_signed: bool,
    #[serde(default)]
    pub receipt_signed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_status_round_trips_for_all_working_stages() {
        let working = [
            OrderStatus::Intake,
            OrderStatus::Diagnosis,
            OrderStatus::Costing,
            OrderStatus::Ready,
        ];
        for (n, status) in (1..=4u8).zip(working) {
            let stage = Stage::from_status(status).expect("working status has a stage");
            assert_eq!(stage.get(), n);
            assert_eq!(stage.status(), status);
        }
    }

    #[test]
    fn closed_has_no_stage() {
        assert_eq!(Stage::from_status(OrderStatus::Closed), None);
    }

    #[test]
    fn stage_moves_clamp_at_both_ends() {
        assert_eq!(Stage::MIN.back(), Stage::MIN);
        assert_eq!(Stage::MAX.next(), Stage::MAX);
        assert_eq!(Stage::MIN.next().get(), 2);
        assert_eq!(Stage::MAX.back().get(), 3);
    }

    #[test]
    fn status_serializes_in_canonical_form() {
        let json = serde_json::to_string(&OrderStatus::Costing).expect("serialize status");
        assert_eq!(json, "\"COSTING\"");
        let back: OrderStatus = serde_json::from_str("\"READY\"").expect("parse status");
        assert_eq!(back, OrderStatus::Ready);
    }

    #[test]
    fn line_item_rejects_zero_quantity() {
        assert!(CostLineItem::new("thermal paste", 0, 3.5).is_err());
        let item = CostLineItem::new("ram module", 2, 35.0).expect("valid item");
        assert!((item.line_total() - 70.0).abs() < f64::EPSILON);
    }
}

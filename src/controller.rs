//! Work-order lifecycle controller.
//!
//! Owns the editable draft and drives the four-stage workflow against the
//! Order collaborator. Stage moves only touch the local mirror; `save_draft`
//! persists under the stage's canonical status and never writes CLOSED;
//! `request_closure` is the only path to the terminal status and always runs
//! the closure gate first, so no network call is issued for a blocked or
//! declined closure. Transport failures propagate without mutating the
//! persisted-state mirror, leaving the draft intact for a manual retry.

use crate::collab::OrderService;
use crate::desk::{FieldGroup, OrderDraft};
use crate::finance;
use crate::gate::{self, ClosureRequest, GateVerdict, SoftCheck};
use crate::prompt::Confirm;
use crate::schema::{CostLineItem, OrderStatus, SignedStatus, Stage};
use anyhow::{anyhow, Result};

/// Result of one stage move; `from == to` means the move was clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageMove {
    pub from: Stage,
    pub to: Stage,
}

impl StageMove {
    pub fn clamped(&self) -> bool {
        self.from == self.to
    }
}

/// How a closure request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ClosureOutcome {
    /// Persisted as CLOSED; the order is terminal now.
    Closed,
    /// A hard gate predicate failed; nothing was sent.
    Blocked { message: String },
    /// The user declined a soft-check override; nothing was sent.
    Declined { check: SoftCheck },
}

/// Fetch the current snapshot and build a fresh, fully clean draft around
/// it. Repeated calls fully overwrite prior local edits.
pub fn load_order(
    orders: &dyn OrderService,
    order_id: &str,
    signed: SignedStatus,
) -> Result<OrderDraft> {
    let order = orders.fetch(order_id)?;
    tracing::info!(
        order = order.number.as_str(),
        status = order.status.as_str(),
        "loaded order snapshot"
    );
    Ok(OrderDraft::from_snapshot(order, signed))
}

pub struct Controller<'a> {
    orders: &'a dyn OrderService,
    pub draft: OrderDraft,
}

impl<'a> Controller<'a> {
    pub fn new(orders: &'a dyn OrderService, draft: OrderDraft) -> Controller<'a> {
        Controller { orders, draft }
    }

    pub fn into_draft(self) -> OrderDraft {
        self.draft
    }

    fn stage_or_closed(&self) -> Result<Stage> {
        self.draft.order.stage().ok_or_else(|| {
            anyhow!(
                "order {} is closed; no further stage transitions",
                self.draft.order.number
            )
        })
    }

    /// Move one stage forward, clamped at stage 4. Mirrors the canonical
    /// status locally; persists nothing.
    pub fn advance_stage(&mut self) -> Result<StageMove> {
        self.shift(Stage::next)
    }

    /// Move one stage back, clamped at stage 1.
    pub fn retreat_stage(&mut self) -> Result<StageMove> {
        self.shift(Stage::back)
    }

    fn shift(&mut self, step: fn(Stage) -> Stage) -> Result<StageMove> {
        let from = self.stage_or_closed()?;
        let to = step(from);
        if to != from {
            self.draft.order.status = to.status();
            self.draft.mark_dirty(FieldGroup::Stage);
        }
        Ok(StageMove { from, to })
    }

    pub fn set_diagnosis(&mut self, text: &str) {
        self.draft.order.diagnosis = text.to_string();
        self.draft.mark_dirty(FieldGroup::Diagnosis);
    }

    pub fn set_recommendation(&mut self, text: &str) {
        self.draft.order.recommendation = text.to_string();
        self.draft.mark_dirty(FieldGroup::Diagnosis);
    }

    /// Update any of the cost inputs. Derived figures are recomputed on
    /// every change; there is no cached value to go stale.
    pub fn set_costs(
        &mut self,
        labor: Option<f64>,
        parts: Option<f64>,
        other: Option<f64>,
        discount: Option<f64>,
        tax: Option<f64>,
    ) {
        let order = &mut self.draft.order;
        if let Some(labor) = labor {
            order.labor_cost = labor;
        }
        if let Some(parts) = parts {
            order.parts_cost = parts;
        }
        if let Some(other) = other {
            order.other_cost = other;
        }
        if let Some(discount) = discount {
            order.discount = discount;
        }
        if let Some(tax) = tax {
            order.tax = tax;
        }
        self.draft.mark_dirty(FieldGroup::Costing);
        self.recompute();
    }

    pub fn set_warranty(&mut self, warranty: bool, warranty_ref: Option<&str>) {
        self.draft.order.warranty = warranty;
        if let Some(reference) = warranty_ref {
            self.draft.order.warranty_ref = reference.to_string();
        }
        self.draft.mark_dirty(FieldGroup::Costing);
    }

    pub fn set_otp(&mut self, code: &str, validated: bool) {
        self.draft.order.otp_code = code.to_string();
        self.draft.order.otp_validated = validated;
        self.draft.mark_dirty(FieldGroup::Closure);
    }

    pub fn add_item(&mut self, item: CostLineItem) {
        self.draft.items.push(item);
        self.draft.mark_dirty(FieldGroup::Costing);
    }

    pub fn clear_items(&mut self) {
        self.draft.items.clear();
        self.draft.mark_dirty(FieldGroup::Costing);
    }

    fn recompute(&mut self) {
        let order = &mut self.draft.order;
        let breakdown = finance::derive_order(
            order.labor_cost,
            order.parts_cost,
            order.other_cost,
            order.discount,
            order.tax,
        );
        order.subtotal = breakdown.subtotal;
        order.total = breakdown.total;
    }

    /// Persist the full editable snapshot under the status implied by the
    /// current stage. Never writes CLOSED. On failure the draft, including
    /// its dirty flags, is left untouched for a retry.
    pub fn save_draft(&mut self) -> Result<()> {
        let stage = self.stage_or_closed()?;
        // The status mirror already tracks the stage; assert rather than
        // silently repair a divergence.
        if self.draft.order.status != stage.status() {
            return Err(anyhow!(
                "draft status {} does not match stage {}",
                self.draft.order.status,
                stage
            ));
        }
        self.orders.store(&self.draft.order, false)?;
        self.draft.clear_dirty();
        tracing::info!(
            order = self.draft.order.number.as_str(),
            status = self.draft.order.status.as_str(),
            "saved draft"
        );
        Ok(())
    }

    /// Run the closure gate and, on approval (or accepted overrides),
    /// persist the terminal snapshot. Declines and blocks send nothing.
    pub fn request_closure(
        &mut self,
        reason: &str,
        closed_by: &str,
        confirm: &mut dyn Confirm,
    ) -> Result<ClosureOutcome> {
        self.stage_or_closed()?;
        self.draft.order.closure_reason = reason.to_string();
        self.draft.order.closed_by = closed_by.to_string();
        self.draft.mark_dirty(FieldGroup::Closure);

        let request = ClosureRequest {
            diagnosis: &self.draft.order.diagnosis,
            total: self.draft.order.total,
            warranty: self.draft.order.warranty,
            closure_reason: &self.draft.order.closure_reason,
            otp_validated: self.draft.order.otp_validated,
        };
        match gate::evaluate(&request) {
            GateVerdict::Blocked { message } => {
                tracing::info!(reason = message.as_str(), "closure blocked");
                return Ok(ClosureOutcome::Blocked { message });
            }
            GateVerdict::NeedsConfirmation(checks) => {
                for check in checks {
                    if !confirm.confirm(check.prompt())? {
                        tracing::info!(check = check.as_str(), "closure override declined");
                        return Ok(ClosureOutcome::Declined { check });
                    }
                }
            }
            GateVerdict::Approved => {}
        }

        let mut candidate = self.draft.order.clone();
        candidate.status = OrderStatus::Closed;
        self.orders.store(&candidate, true)?;
        self.draft.order = candidate;
        self.draft.clear_dirty();
        tracing::info!(
            order = self.draft.order.number.as_str(),
            "order closed"
        );
        Ok(ClosureOutcome::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desk::tests_support::sample_order;
    use crate::prompt::tests_support::Scripted;
    use crate::schema::WorkOrder;
    use std::cell::RefCell;

    struct FakeOrders {
        serve: WorkOrder,
        fail_store: bool,
        stored: RefCell<Vec<(WorkOrder, bool)>>,
    }

    impl FakeOrders {
        fn new(serve: WorkOrder) -> FakeOrders {
            FakeOrders {
                serve,
                fail_store: false,
                stored: RefCell::new(Vec::new()),
            }
        }

        fn failing(serve: WorkOrder) -> FakeOrders {
            FakeOrders {
                fail_store: true,
                ..FakeOrders::new(serve)
            }
        }

        fn last_stored(&self) -> Option<(WorkOrder, bool)> {
            self.stored.borrow().last().cloned()
        }
    }

    impl OrderService for FakeOrders {
        fn fetch(&self, _order_id: &str) -> Result<WorkOrder> {
            Ok(self.serve.clone())
        }

        fn store(&self, order: &WorkOrder, close: bool) -> Result<()> {
            if self.fail_store {
                return Err(anyhow!("order save failed with http status 500"));
            }
            self.stored.borrow_mut().push((order.clone(), close));
            Ok(())
        }
    }

    fn controller(orders: &FakeOrders) -> Controller<'_> {
        let draft = load_order(orders, "o-1001", SignedStatus::default()).expect("load order");
        Controller::new(orders, draft)
    }

    #[test]
    fn load_derives_stage_from_persisted_status() {
        let orders = FakeOrders::new(sample_order());
        let ctl = controller(&orders);
        assert_eq!(ctl.draft.order.stage().map(Stage::get), Some(2));
        assert!(!ctl.draft.is_dirty());
    }

    #[test]
    fn reload_fully_overwrites_local_edits() {
        let orders = FakeOrders::new(sample_order());
        let mut ctl = controller(&orders);
        ctl.set_diagnosis("edited locally");
        assert!(ctl.draft.is_dirty());

        let reloaded = load_order(&orders, "o-1001", SignedStatus::default()).expect("reload");
        assert_eq!(reloaded.order.diagnosis, sample_order().diagnosis);
        assert!(!reloaded.is_dirty());
    }

    #[test]
    fn advance_mirrors_the_canonical_status_without_persisting() {
        let orders = FakeOrders::new(sample_order());
        let mut ctl = controller(&orders);
        let moved = ctl.advance_stage().expect("advance");
        assert_eq!(moved.from.get(), 2);
        assert_eq!(moved.to.get(), 3);
        assert_eq!(ctl.draft.order.status, OrderStatus::Costing);
        assert!(orders.last_stored().is_none());
    }

    #[test]
    fn stage_moves_clamp_without_marking_dirty() {
        let mut serve = sample_order();
        serve.status = OrderStatus::Intake;
        let orders = FakeOrders::new(serve);
        let mut ctl = controller(&orders);
        let moved = ctl.retreat_stage().expect("retreat");
        assert!(moved.clamped());
        assert!(!ctl.draft.is_dirty());
    }

    #[test]
    fn save_persists_under_the_stage_status_and_never_closes() {
        let orders = FakeOrders::new(sample_order());
        let mut ctl = controller(&orders);
        ctl.set_costs(Some(30.0), None, None, None, Some(5.0));
        ctl.save_draft().expect("save");
        let (stored, close) = orders.last_stored().expect("stored once");
        assert!(!close);
        assert_eq!(stored.status, OrderStatus::Diagnosis);
        assert!((stored.total - (30.0 + 25.5 + 5.0)).abs() < 1e-9);
        assert!(!ctl.draft.is_dirty());
    }

    #[test]
    fn failed_save_leaves_the_draft_and_its_dirty_flags_intact() {
        let orders = FakeOrders::failing(sample_order());
        let mut ctl = controller(&orders);
        ctl.set_diagnosis("new finding");
        let err = ctl.save_draft().expect_err("store fails");
        assert!(err.to_string().contains("http status 500"));
        assert_eq!(ctl.draft.order.diagnosis, "new finding");
        assert!(ctl.draft.is_dirty());
    }

    #[test]
    fn edits_recompute_derived_financials_immediately() {
        let orders = FakeOrders::new(sample_order());
        let mut ctl = controller(&orders);
        ctl.set_costs(None, None, None, Some(50.0), None);
        assert!((ctl.draft.order.subtotal - (-4.5)).abs() < 1e-9);
    }

    #[test]
    fn closure_blocked_on_empty_diagnosis_sends_nothing() {
        let mut serve = sample_order();
        serve.diagnosis = String::new();
        serve.otp_validated = true;
        let orders = FakeOrders::new(serve);
        let mut ctl = controller(&orders);
        let mut confirm = Scripted::new(&[]);
        let outcome = ctl
            .request_closure("Entregado conforme", "tech-1", &mut confirm)
            .expect("closure evaluated");
        assert!(matches!(outcome, ClosureOutcome::Blocked { .. }));
        assert!(orders.last_stored().is_none());
        assert!(confirm.asked.is_empty());
    }

    #[test]
    fn approved_closure_persists_the_terminal_snapshot() {
        let mut serve = sample_order();
        serve.otp_validated = true;
        let orders = FakeOrders::new(serve);
        let mut ctl = controller(&orders);
        let mut confirm = Scripted::new(&[]);
        let outcome = ctl
            .request_closure("Entregado conforme", "tech-1", &mut confirm)
            .expect("closure evaluated");
        assert_eq!(outcome, ClosureOutcome::Closed);
        assert!(confirm.asked.is_empty());

        let (stored, close) = orders.last_stored().expect("stored once");
        assert!(close);
        assert_eq!(stored.status, OrderStatus::Closed);
        assert_eq!(stored.closure_reason, "Entregado conforme");
        assert_eq!(stored.closed_by, "tech-1");
        assert!(ctl.advance_stage().is_err());
    }

    #[test]
    fn declined_soft_override_sends_nothing_and_keeps_the_stage() {
        let mut serve = sample_order();
        serve.labor_cost = 0.0;
        serve.parts_cost = 0.0;
        serve.subtotal = 0.0;
        serve.total = 0.0;
        serve.otp_validated = true;
        let orders = FakeOrders::new(serve);
        let mut ctl = controller(&orders);
        let mut confirm = Scripted::new(&[false]);
        let outcome = ctl
            .request_closure("Entregado conforme", "tech-1", &mut confirm)
            .expect("closure evaluated");
        assert_eq!(
            outcome,
            ClosureOutcome::Declined {
                check: SoftCheck::ZeroTotal
            }
        );
        assert!(orders.last_stored().is_none());
        assert_eq!(ctl.draft.order.status, OrderStatus::Diagnosis);
    }

    #[test]
    fn accepted_soft_overrides_close_the_order() {
        let mut serve = sample_order();
        serve.labor_cost = 0.0;
        serve.parts_cost = 0.0;
        serve.subtotal = 0.0;
        serve.total = 0.0;
        let orders = FakeOrders::new(serve);
        let mut ctl = controller(&orders);
        // Both soft checks fail: zero total and unverified OTP, each asked
        // separately and both accepted.
        let mut confirm = Scripted::new(&[true, true]);
        let outcome = ctl
            .request_closure("Garantia aplicada", "tech-2", &mut confirm)
            .expect("closure evaluated");
        assert_eq!(outcome, ClosureOutcome::Closed);
        assert_eq!(confirm.asked.len(), 2);
    }

    #[test]
    fn failed_terminal_store_keeps_the_prior_persisted_status() {
        let mut serve = sample_order();
        serve.otp_validated = true;
        let orders = FakeOrders::failing(serve);
        let mut ctl = controller(&orders);
        let mut confirm = Scripted::new(&[]);
        let err = ctl
            .request_closure("Entregado conforme", "tech-1", &mut confirm)
            .expect_err("store fails");
        assert!(err.to_string().contains("http status 500"));
        assert_eq!(ctl.draft.order.status, OrderStatus::Diagnosis);
    }
}

//! Closure policy for work orders.
//!
//! Four predicates run in fixed order before an order may move to CLOSED:
//!
//! 1. diagnosis text present (hard, halts immediately)
//! 2. total above zero, or the order is under warranty (soft)
//! 3. closure reason present (hard)
//! 4. OTP validated (soft)
//!
//! A hard failure blocks unconditionally with a message and stops evaluation.
//! Soft failures are independent: each one must be explicitly accepted by the
//! user before closure proceeds. Verdicts are data, not errors; the caller
//! decides what to do with them and no network call happens before approval.

use serde::Serialize;
use std::fmt;

/// Inputs the gate looks at. A borrowed view over the draft, so the gate
/// stays a pure function of the order's current fields.
#[derive(Debug, Clone, Copy)]
pub struct ClosureRequest<'a> {
    pub diagnosis: &'a str,
    pub total: f64,
    pub warranty: bool,
    pub closure_reason: &'a str,
    pub otp_validated: bool,
}

/// A soft predicate that failed and needs an explicit user confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoftCheck {
    ZeroTotal,
    OtpUnverified,
}

impl SoftCheck {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoftCheck::ZeroTotal => "zero_total",
            SoftCheck::OtpUnverified => "otp_unverified",
        }
    }

    /// The accept/decline question put to the user.
    pub fn prompt(&self) -> &'static str {
        match self {
            SoftCheck::ZeroTotal => {
                "Order total is zero and the order is not under warranty. Close anyway?"
            }
            SoftCheck::OtpUnverified => {
                "The delivery OTP has not been validated. Close anyway?"
            }
        }
    }
}

impl fmt::Display for SoftCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one gate evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum GateVerdict {
    /// A hard predicate failed; closure is blocked, no override exists.
    Blocked { message: String },
    /// Only soft predicates failed; each listed check needs its own
    /// confirmation before closure may proceed.
    NeedsConfirmation(Vec<SoftCheck>),
    /// Every predicate passed; close without prompting.
    Approved,
}

/// Evaluate the four predicates in order.
pub fn evaluate(req: &ClosureRequest<'_>) -> GateVerdict {
    if req.diagnosis.trim().is_empty() {
        return GateVerdict::Blocked {
            message: "diagnosis is required before closing the order".to_string(),
        };
    }

    let mut pending = Vec::new();
    if req.total <= 0.0 && !req.warranty {
        pending.push(SoftCheck::ZeroTotal);
    }

    if req.closure_reason.trim().is_empty() {
        return GateVerdict::Blocked {
            message: "a closure reason is required before closing the order".to_string(),
        };
    }

    if !req.otp_validated {
        pending.push(SoftCheck::OtpUnverified);
    }

    if pending.is_empty() {
        GateVerdict::Approved
    } else {
        GateVerdict::NeedsConfirmation(pending)
    }
}

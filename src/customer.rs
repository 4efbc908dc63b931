//! Customer profiles and credit eligibility.
//!
//! A customer must be enrolled, hold an approved credit score, and be active
//! before any plan can be assigned to them.

use serde::Serialize;
use std::fmt;

/// Lowest credit score an external bureau reports.
pub const CREDIT_SCORE_MIN: u16 = 300;

/// Highest credit score an external bureau reports.
pub const CREDIT_SCORE_MAX: u16 = 850;

/// Validation state of a customer's credit score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreStatus {
    /// Enrolled, credit check not yet decided.
    Pending,

    /// Credit check passed; the customer may be assigned plans.
    Approved,

    /// Credit check failed.
    Rejected,
}

impl fmt::Display for ScoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScoreStatus::Pending => "pending",
            ScoreStatus::Approved => "approved",
            ScoreStatus::Rejected => "rejected",
        };
        f.write_str(label)
    }
}

/// Credit profile for one enrolled customer.
///
/// The score is optional until an external credit check has run; approval
/// requires one to be on record.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerProfile {
    /// Customer identifier.
    pub customer: u32,

    /// External credit score, populated after a credit check.
    pub credit_score: Option<u16>,

    /// Current status of credit score validation.
    pub score_status: ScoreStatus,

    /// Whether this customer can use BNPL services at all.
    pub active: bool,
}

impl CustomerProfile {
    /// Enrolls a customer, optionally with an already-known credit score.
    ///
    /// Returns `None` if the score falls outside the valid bureau range.
    pub fn new(customer: u32, credit_score: Option<u16>) -> Option<Self> {
        if let Some(score) = credit_score {
            if !(CREDIT_SCORE_MIN..=CREDIT_SCORE_MAX).contains(&score) {
                return None;
            }
        }

        Some(CustomerProfile {
            customer,
            credit_score,
            score_status: ScoreStatus::Pending,
            active: true,
        })
    }

    /// Marks the credit score as validated.
    ///
    /// Approval without a recorded score is refused; returns whether the
    /// status changed to approved.
    pub fn approve(&mut self) -> bool {
        if self.credit_score.is_none() {
            return false;
        }

        self.score_status = ScoreStatus::Approved;
        true
    }

    /// Marks the credit check as failed.
    pub fn reject(&mut self) {
        self.score_status = ScoreStatus::Rejected;
    }

    /// Whether this customer may be assigned a new plan.
    pub fn is_eligible(&self) -> bool {
        self.active && self.score_status == ScoreStatus::Approved
    }
}

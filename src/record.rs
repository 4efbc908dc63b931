//! Operation records for CSV parsing and internal representation.

use crate::plan::DEFAULT_INSTALLMENT_PERIOD;
use crate::schedule;
use chrono::NaiveDate;
use serde::Deserialize;

/// Raw operation record as read from CSV.
///
/// Every column except `op` is optional; each operation kind uses the subset
/// it needs and leaves the rest empty.
#[derive(Debug, Deserialize)]
pub struct OpRecord {
    /// Operation type: enroll, approve, reject, plan, pay, overdue
    pub op: String,

    /// Plan ID (plan, pay)
    #[serde(default)]
    pub plan: Option<u32>,

    /// Merchant ID (plan)
    #[serde(default)]
    pub merchant: Option<u32>,

    /// Customer ID (enroll, approve, reject, plan, pay)
    #[serde(default)]
    pub customer: Option<u32>,

    /// Plan name (plan)
    #[serde(default)]
    pub name: Option<String>,

    /// Total amount (plan)
    #[serde(default)]
    pub total: Option<String>,

    /// Number of installments (plan)
    #[serde(default)]
    pub count: Option<u32>,

    /// Days between installments (plan; defaults to 30 when omitted)
    #[serde(default)]
    pub period: Option<u32>,

    /// Installment sequence number (pay)
    #[serde(default)]
    pub seq: Option<u32>,

    /// Credit score (enroll)
    #[serde(default)]
    pub score: Option<u16>,

    /// Reference date: plan start, payment date, or overdue cutoff
    #[serde(default)]
    pub date: Option<String>,
}

impl OpRecord {
    /// Parses the raw CSV record into a typed operation.
    ///
    /// Returns `None` if the record is invalid (unknown op, missing or
    /// malformed required fields, non-positive amount, count or period).
    pub fn parse(&self) -> Option<Operation> {
        let op = self.op.trim().to_lowercase();

        match op.as_str() {
            "enroll" => Some(Operation::Enroll {
                customer: self.customer?,
                score: self.score,
            }),
            "approve" => Some(Operation::Approve {
                customer: self.customer?,
            }),
            "reject" => Some(Operation::Reject {
                customer: self.customer?,
            }),
            "plan" => {
                let name = self.name.as_ref()?.trim().to_string();
                if name.is_empty() {
                    return None;
                }

                let total_cents = schedule::parse_amount_cents(self.total.as_ref()?)?;

                let count = self.count?;
                let period_days = self.period.unwrap_or(DEFAULT_INSTALLMENT_PERIOD);
                if count == 0 || period_days == 0 {
                    return None;
                }

                Some(Operation::CreatePlan {
                    plan: self.plan?,
                    merchant: self.merchant?,
                    customer: self.customer?,
                    name,
                    total_cents,
                    count,
                    period_days,
                    start_date: self.parse_date()?,
                })
            }
            "pay" => Some(Operation::Pay {
                plan: self.plan?,
                customer: self.customer?,
                sequence: self.seq?,
                paid_on: self.parse_date()?,
            }),
            "overdue" => Some(Operation::MarkOverdue {
                as_of: self.parse_date()?,
            }),
            _ => None,
        }
    }

    /// Parses the date field into a `NaiveDate`.
    fn parse_date(&self) -> Option<NaiveDate> {
        schedule::parse_date(self.date.as_ref()?)
    }
}

/// A parsed and validated operation ready for processing.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Register a customer profile, optionally with a known credit score.
    Enroll { customer: u32, score: Option<u16> },

    /// Mark a customer's credit score as validated.
    Approve { customer: u32 },

    /// Mark a customer's credit check as failed.
    Reject { customer: u32 },

    /// Create a plan for a customer and generate its installment schedule.
    CreatePlan {
        plan: u32,
        merchant: u32,
        customer: u32,
        name: String,
        total_cents: i64,
        count: u32,
        period_days: u32,
        start_date: NaiveDate,
    },

    /// Pay one installment of a plan.
    Pay {
        plan: u32,
        customer: u32,
        sequence: u32,
        paid_on: NaiveDate,
    },

    /// Mark every pending installment past its due date as late.
    MarkOverdue { as_of: NaiveDate },
}

//! Plan and installment lifecycle.
//!
//! A `Plan` ties one merchant, one customer and a generated installment
//! schedule together, and owns the rules for paying that schedule down:
//! installments are paid strictly in sequence order, and paying the last
//! one completes the plan.

use crate::error::PayError;
use crate::money::Money;
use crate::schedule;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// Interval in days between installments when a plan does not specify one.
pub const DEFAULT_INSTALLMENT_PERIOD: u32 = 30;

/// Lifecycle status of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    /// Accepting payments.
    Active,

    /// Every installment has been paid.
    Completed,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlanStatus::Active => "active",
            PlanStatus::Completed => "completed",
        };
        f.write_str(label)
    }
}

/// Payment status of a single installment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallmentStatus {
    /// Not yet paid, not yet overdue.
    Pending,

    /// Paid in full.
    Paid,

    /// Due date passed while still unpaid.
    Late,
}

impl fmt::Display for InstallmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InstallmentStatus::Pending => "pending",
            InstallmentStatus::Paid => "paid",
            InstallmentStatus::Late => "late",
        };
        f.write_str(label)
    }
}

/// View filter over a customer's installments.
///
/// `Upcoming` covers unpaid installments that are not yet due (including
/// ones due today); `Past` covers everything already paid plus anything
/// whose due date has passed, paid or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallmentFilter {
    Upcoming,
    Past,
}

/// A single dated payment within a plan.
#[derive(Debug, Clone, Serialize)]
pub struct Installment {
    /// 1-based position within the plan.
    pub sequence: u32,

    /// Amount due for this installment.
    pub amount: Money,

    /// Date this installment falls due.
    pub due_date: NaiveDate,

    /// Current payment status.
    pub status: InstallmentStatus,

    /// Date the installment was paid, once it has been.
    pub paid_on: Option<NaiveDate>,
}

impl Installment {
    /// Whether this installment matches the given view filter on `today`.
    pub fn matches(&self, filter: InstallmentFilter, today: NaiveDate) -> bool {
        match filter {
            InstallmentFilter::Upcoming => {
                self.status == InstallmentStatus::Pending && self.due_date >= today
            }
            InstallmentFilter::Past => {
                self.status == InstallmentStatus::Paid || self.due_date < today
            }
        }
    }
}

/// A customer's installment plan.
///
/// # Invariants
///
/// - Installments are ordered by ascending, gap-free sequence from 1.
/// - Installment amounts sum exactly to `total` in cents.
/// - `status == Completed` if and only if every installment is `Paid`.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// Unique plan identifier.
    pub id: u32,

    /// Merchant who offered the plan.
    pub merchant: u32,

    /// Customer paying the plan down.
    pub customer: u32,

    /// Descriptive plan name.
    pub name: String,

    /// Total sum across all installments.
    pub total: Money,

    /// Interval in days between installments.
    pub period_days: u32,

    /// Date the first installment is due.
    pub start_date: NaiveDate,

    /// Current lifecycle status.
    pub status: PlanStatus,

    installments: Vec<Installment>,
}

impl Plan {
    /// Creates a plan and generates its installment schedule.
    ///
    /// Returns `None` when the schedule cannot be built: a due date outside
    /// the calendar range, or a total so small that an installment would
    /// come out at zero cents (every installment amount must be positive).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u32,
        merchant: u32,
        customer: u32,
        name: String,
        total_cents: i64,
        count: u32,
        period_days: u32,
        start_date: NaiveDate,
    ) -> Option<Self> {
        let previews = schedule::generate(total_cents, count, period_days, start_date)?;

        if previews.iter().any(|p| p.amount.cents() <= 0) {
            return None;
        }

        let installments = previews
            .into_iter()
            .map(|p| Installment {
                sequence: p.sequence,
                amount: p.amount,
                due_date: p.due_date,
                status: InstallmentStatus::Pending,
                paid_on: None,
            })
            .collect();

        Some(Plan {
            id,
            merchant,
            customer,
            name,
            total: Money::from_cents(total_cents),
            period_days,
            start_date,
            status: PlanStatus::Active,
            installments,
        })
    }

    /// The plan's installments, ordered by sequence.
    pub fn installments(&self) -> &[Installment] {
        &self.installments
    }

    /// Pays the installment with the given sequence number.
    ///
    /// Payments must be made in order: every earlier installment has to be
    /// paid already, though the one being paid may itself be late. Paying
    /// the final outstanding installment completes the plan.
    pub fn pay(&mut self, sequence: u32, paid_on: NaiveDate) -> Result<(), PayError> {
        let idx = self
            .installments
            .iter()
            .position(|i| i.sequence == sequence)
            .ok_or(PayError::UnknownSequence(sequence))?;

        if self.status != PlanStatus::Active {
            return Err(PayError::PlanNotActive);
        }

        if self.installments[idx].status == InstallmentStatus::Paid {
            return Err(PayError::AlreadyPaid(sequence));
        }

        if let Some(unpaid) = self
            .installments
            .iter()
            .find(|i| i.sequence < sequence && i.status != InstallmentStatus::Paid)
        {
            return Err(PayError::PreviousUnpaid(unpaid.sequence));
        }

        let installment = &mut self.installments[idx];
        installment.status = InstallmentStatus::Paid;
        installment.paid_on = Some(paid_on);

        if self
            .installments
            .iter()
            .all(|i| i.status == InstallmentStatus::Paid)
        {
            self.status = PlanStatus::Completed;
        }

        Ok(())
    }

    /// Marks pending installments whose due date has passed as late.
    ///
    /// Strictly past due only: an installment due on `as_of` itself is not
    /// late yet. Returns how many installments changed status.
    pub fn mark_overdue(&mut self, as_of: NaiveDate) -> usize {
        let mut marked = 0;
        for installment in &mut self.installments {
            if installment.status == InstallmentStatus::Pending && installment.due_date < as_of {
                installment.status = InstallmentStatus::Late;
                marked += 1;
            }
        }
        marked
    }
}

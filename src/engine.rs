//! Core BNPL plan processing engine.
//!
//! Processes operations in the order they are received and maintains
//! customer profiles and plans in memory. The engine uses streaming CSV
//! processing; invalid records are logged and skipped so one bad row never
//! aborts a run.

use crate::customer::CustomerProfile;
use crate::error::Result;
use crate::money::Money;
use crate::plan::{Installment, InstallmentFilter, InstallmentStatus, Plan, PlanStatus};
use crate::record::{OpRecord, Operation};
use chrono::{Days, NaiveDate};
use csv::{ReaderBuilder, Trim};
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};

/// Days before an installment's due date that a payment reminder goes out.
pub const REMINDER_LEAD_DAYS: u64 = 3;

/// Per-merchant dashboard metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct MerchantDashboard {
    /// Merchant these metrics belong to.
    pub merchant: u32,

    /// Sum of all paid installment amounts across the merchant's plans.
    pub total_revenue: Money,

    /// Percentage of the merchant's installments that are paid (0 when none).
    pub success_rate: f64,

    /// Number of late installments.
    pub overdue_count: usize,

    /// Number of plans still accepting payments.
    pub active_plans: usize,
}

/// An installment matched by a reminder or view query, with its plan.
#[derive(Debug, Clone, Copy)]
pub struct InstallmentRef<'a> {
    pub plan: &'a Plan,
    pub installment: &'a Installment,
}

/// The BNPL plan processing engine.
///
/// Maintains customer profiles and plans keyed by their IDs. Operations are
/// processed in the order they are received (assumed chronological).
///
/// # Output Ordering
///
/// Final installment states are output sorted by plan ID and sequence to
/// ensure deterministic, reproducible output; dashboard rows are sorted by
/// merchant ID.
pub struct PlanEngine {
    /// Customer profiles indexed by customer ID.
    customers: HashMap<u32, CustomerProfile>,

    /// Plans indexed by plan ID.
    plans: HashMap<u32, Plan>,
}

impl PlanEngine {
    /// Creates a new empty engine.
    pub fn new() -> Self {
        PlanEngine {
            customers: HashMap::new(),
            plans: HashMap::new(),
        }
    }

    /// Processes operations from a CSV reader in streaming fashion.
    ///
    /// Records are read one at a time to minimize memory usage.
    /// Invalid records are logged at warn level and skipped.
    pub fn process_csv<R: Read>(&mut self, reader: R) -> Result<()> {
        let mut csv_reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        for (row_idx, result) in csv_reader.deserialize::<OpRecord>().enumerate() {
            let row_num = row_idx + 2; // 1-indexed, accounting for header row

            match result {
                Ok(record) => {
                    if let Some(op) = record.parse() {
                        self.process_operation(op, row_num);
                    } else {
                        warn!("Row {}: Failed to parse operation record", row_num);
                    }
                }
                Err(e) => {
                    warn!("Row {}: CSV parse error: {}", row_num, e);
                }
            }
        }

        Ok(())
    }

    /// Processes a single parsed operation.
    fn process_operation(&mut self, op: Operation, row: usize) {
        match op {
            Operation::Enroll { customer, score } => self.process_enroll(customer, score, row),
            Operation::Approve { customer } => self.process_approve(customer, row),
            Operation::Reject { customer } => self.process_reject(customer, row),
            Operation::CreatePlan {
                plan,
                merchant,
                customer,
                name,
                total_cents,
                count,
                period_days,
                start_date,
            } => self.process_create_plan(
                plan, merchant, customer, name, total_cents, count, period_days, start_date, row,
            ),
            Operation::Pay {
                plan,
                customer,
                sequence,
                paid_on,
            } => self.process_pay(plan, customer, sequence, paid_on, row),
            Operation::MarkOverdue { as_of } => self.process_mark_overdue(as_of, row),
        }
    }

    /// Enrolls a customer profile.
    fn process_enroll(&mut self, customer: u32, score: Option<u16>, row: usize) {
        if self.customers.contains_key(&customer) {
            warn!(
                "Row {}: Customer {} already enrolled, ignoring",
                row, customer
            );
            return;
        }

        match CustomerProfile::new(customer, score) {
            Some(profile) => {
                self.customers.insert(customer, profile);
                debug!("Row {}: Enrolled customer {}", row, customer);
            }
            None => {
                warn!(
                    "Row {}: Credit score {:?} out of range for customer {}, ignoring",
                    row, score, customer
                );
            }
        }
    }

    /// Approves a customer's credit score.
    fn process_approve(&mut self, customer: u32, row: usize) {
        let profile = match self.customers.get_mut(&customer) {
            Some(profile) => profile,
            None => {
                warn!(
                    "Row {}: Approve references unknown customer {}, ignoring",
                    row, customer
                );
                return;
            }
        };

        if profile.approve() {
            debug!("Row {}: Approved customer {}", row, customer);
        } else {
            warn!(
                "Row {}: Customer {} has no credit score on record, ignoring approve",
                row, customer
            );
        }
    }

    /// Rejects a customer's credit check.
    fn process_reject(&mut self, customer: u32, row: usize) {
        let profile = match self.customers.get_mut(&customer) {
            Some(profile) => profile,
            None => {
                warn!(
                    "Row {}: Reject references unknown customer {}, ignoring",
                    row, customer
                );
                return;
            }
        };

        profile.reject();
        debug!("Row {}: Rejected customer {}", row, customer);
    }

    /// Creates a plan and its installment schedule.
    #[allow(clippy::too_many_arguments)]
    fn process_create_plan(
        &mut self,
        plan_id: u32,
        merchant: u32,
        customer: u32,
        name: String,
        total_cents: i64,
        count: u32,
        period_days: u32,
        start_date: NaiveDate,
        row: usize,
    ) {
        if self.plans.contains_key(&plan_id) {
            warn!("Row {}: Duplicate plan ID {}, ignoring", row, plan_id);
            return;
        }

        let eligible = self
            .customers
            .get(&customer)
            .map(|p| p.is_eligible())
            .unwrap_or(false);
        if !eligible {
            warn!(
                "Row {}: No eligible customer {} for plan {}, ignoring",
                row, customer, plan_id
            );
            return;
        }

        match Plan::new(
            plan_id, merchant, customer, name, total_cents, count, period_days, start_date,
        ) {
            Some(plan) => {
                debug!(
                    "Row {}: Created plan {} for customer {} with {} installments",
                    row, plan_id, customer, count
                );
                self.plans.insert(plan_id, plan);
            }
            None => {
                warn!(
                    "Row {}: Could not build installment schedule for plan {}, ignoring",
                    row, plan_id
                );
            }
        }
    }

    /// Pays one installment of a plan.
    fn process_pay(
        &mut self,
        plan_id: u32,
        customer: u32,
        sequence: u32,
        paid_on: NaiveDate,
        row: usize,
    ) {
        let plan = match self.plans.get_mut(&plan_id) {
            Some(plan) => plan,
            None => {
                warn!(
                    "Row {}: Payment references unknown plan {}, ignoring",
                    row, plan_id
                );
                return;
            }
        };

        if plan.customer != customer {
            warn!(
                "Row {}: Customer {} doesn't match plan {} customer {}, ignoring",
                row, customer, plan_id, plan.customer
            );
            return;
        }

        match plan.pay(sequence, paid_on) {
            Ok(()) => {
                debug!(
                    "Row {}: Paid installment {} of plan {} on {}",
                    row, sequence, plan_id, paid_on
                );
                if plan.status == PlanStatus::Completed {
                    debug!("Row {}: Plan {} completed", row, plan_id);
                }
            }
            Err(e) => {
                warn!("Row {}: Payment on plan {} refused: {}", row, plan_id, e);
            }
        }
    }

    /// Marks overdue installments across all plans as of the given date.
    fn process_mark_overdue(&mut self, as_of: NaiveDate, row: usize) {
        let marked: usize = self
            .plans
            .values_mut()
            .map(|plan| plan.mark_overdue(as_of))
            .sum();
        debug!(
            "Row {}: Marked {} installments late as of {}",
            row, marked, as_of
        );
    }

    /// Pending installments due exactly [`REMINDER_LEAD_DAYS`] after `as_of`.
    ///
    /// Results are sorted by plan ID and sequence for deterministic output.
    pub fn due_for_reminder(&self, as_of: NaiveDate) -> Vec<InstallmentRef<'_>> {
        let target = match as_of.checked_add_days(Days::new(REMINDER_LEAD_DAYS)) {
            Some(date) => date,
            None => return Vec::new(),
        };

        let mut due: Vec<InstallmentRef<'_>> = self
            .plans
            .values()
            .flat_map(|plan| {
                plan.installments()
                    .iter()
                    .filter(|i| i.status == InstallmentStatus::Pending && i.due_date == target)
                    .map(move |installment| InstallmentRef { plan, installment })
            })
            .collect();

        due.sort_by_key(|r| (r.plan.id, r.installment.sequence));
        due
    }

    /// Installments matching a view filter on `today`, ordered by due date.
    pub fn installments_matching(
        &self,
        filter: InstallmentFilter,
        today: NaiveDate,
    ) -> Vec<InstallmentRef<'_>> {
        let mut matched: Vec<InstallmentRef<'_>> = self
            .plans
            .values()
            .flat_map(|plan| {
                plan.installments()
                    .iter()
                    .filter(move |i| i.matches(filter, today))
                    .map(move |installment| InstallmentRef { plan, installment })
            })
            .collect();

        matched.sort_by_key(|r| (r.installment.due_date, r.plan.id, r.installment.sequence));
        matched
    }

    /// Computes dashboard metrics per merchant, sorted by merchant ID.
    pub fn dashboard_metrics(&self) -> Vec<MerchantDashboard> {
        let mut by_merchant: BTreeMap<u32, Vec<&Plan>> = BTreeMap::new();
        for plan in self.plans.values() {
            by_merchant.entry(plan.merchant).or_default().push(plan);
        }

        by_merchant
            .into_iter()
            .map(|(merchant, plans)| {
                let mut total_revenue = Money::ZERO;
                let mut paid = 0usize;
                let mut total = 0usize;
                let mut overdue_count = 0usize;

                for plan in &plans {
                    for installment in plan.installments() {
                        total += 1;
                        match installment.status {
                            InstallmentStatus::Paid => {
                                paid += 1;
                                total_revenue += installment.amount;
                            }
                            InstallmentStatus::Late => overdue_count += 1,
                            InstallmentStatus::Pending => {}
                        }
                    }
                }

                let success_rate = if total > 0 {
                    paid as f64 / total as f64 * 100.0
                } else {
                    0.0
                };

                MerchantDashboard {
                    merchant,
                    total_revenue,
                    success_rate,
                    overdue_count,
                    active_plans: plans
                        .iter()
                        .filter(|p| p.status == PlanStatus::Active)
                        .count(),
                }
            })
            .collect()
    }

    /// Writes final installment states to CSV.
    ///
    /// Output is sorted by plan ID and sequence for deterministic results.
    /// All monetary values are formatted with exactly 2 decimal places.
    pub fn write_output<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "plan", "customer", "seq", "amount", "due_date", "status", "paid_on",
        ])?;

        // Sort by plan ID for deterministic output
        let mut plans: Vec<_> = self.plans.values().collect();
        plans.sort_by_key(|p| p.id);

        for plan in plans {
            for installment in plan.installments() {
                csv_writer.write_record([
                    plan.id.to_string(),
                    plan.customer.to_string(),
                    installment.sequence.to_string(),
                    installment.amount.to_string(),
                    installment.due_date.to_string(),
                    installment.status.to_string(),
                    installment
                        .paid_on
                        .map(|d| d.to_string())
                        .unwrap_or_default(),
                ])?;
            }
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Writes per-merchant dashboard metrics to CSV.
    pub fn write_dashboard<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "merchant",
            "total_revenue",
            "success_rate",
            "overdue_count",
            "active_plans",
        ])?;

        for metrics in self.dashboard_metrics() {
            csv_writer.write_record([
                metrics.merchant.to_string(),
                metrics.total_revenue.to_string(),
                format!("{:.1}", metrics.success_rate),
                metrics.overdue_count.to_string(),
                metrics.active_plans.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Returns a reference to a plan (for testing).
    #[cfg(test)]
    pub fn get_plan(&self, plan_id: u32) -> Option<&Plan> {
        self.plans.get(&plan_id)
    }

    /// Returns a reference to a customer profile (for testing).
    #[cfg(test)]
    pub fn get_customer(&self, customer: u32) -> Option<&CustomerProfile> {
        self.customers.get(&customer)
    }
}

impl Default for PlanEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customer::ScoreStatus;
    use std::io::Cursor;

    fn process_csv_str(csv: &str) -> PlanEngine {
        let mut engine = PlanEngine::new();
        engine.process_csv(Cursor::new(csv)).unwrap();
        engine
    }

    const HEADER: &str = "op,plan,merchant,customer,name,total,count,period,seq,score,date";

    fn with_header(rows: &str) -> String {
        format!("{}\n{}", HEADER, rows)
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_enroll_approve_and_create_plan() {
        let csv = with_header(
            "enroll,,,20,,,,,,700,\n\
             approve,,,20,,,,,,,\n\
             plan,1,10,20,Laptop,100.01,3,10,,,2025-06-01",
        );

        let engine = process_csv_str(&csv);

        let profile = engine.get_customer(20).unwrap();
        assert_eq!(profile.score_status, ScoreStatus::Approved);

        let plan = engine.get_plan(1).unwrap();
        assert_eq!(plan.merchant, 10);
        assert_eq!(plan.customer, 20);
        assert_eq!(plan.name, "Laptop");
        assert_eq!(plan.total.to_string(), "100.01");

        let amounts: Vec<String> = plan
            .installments()
            .iter()
            .map(|i| i.amount.to_string())
            .collect();
        assert_eq!(amounts, ["33.34", "33.34", "33.33"]);
    }

    #[test]
    fn test_plan_requires_eligible_customer() {
        // Never enrolled
        let csv = with_header("plan,1,10,20,Laptop,100.00,4,30,,,2025-01-01");
        assert!(process_csv_str(&csv).get_plan(1).is_none());

        // Enrolled but not approved
        let csv = with_header(
            "enroll,,,20,,,,,,700,\n\
             plan,1,10,20,Laptop,100.00,4,30,,,2025-01-01",
        );
        assert!(process_csv_str(&csv).get_plan(1).is_none());

        // Rejected
        let csv = with_header(
            "enroll,,,20,,,,,,700,\n\
             reject,,,20,,,,,,,\n\
             plan,1,10,20,Laptop,100.00,4,30,,,2025-01-01",
        );
        assert!(process_csv_str(&csv).get_plan(1).is_none());
    }

    #[test]
    fn test_duplicate_plan_id_ignored() {
        let csv = with_header(
            "enroll,,,20,,,,,,700,\n\
             approve,,,20,,,,,,,\n\
             plan,1,10,20,Laptop,100.00,4,30,,,2025-01-01\n\
             plan,1,10,20,Phone,50.00,2,30,,,2025-02-01",
        );

        let engine = process_csv_str(&csv);
        let plan = engine.get_plan(1).unwrap();
        assert_eq!(plan.name, "Laptop");
        assert_eq!(plan.installments().len(), 4);
    }

    #[test]
    fn test_approve_without_score_is_ignored() {
        let csv = with_header(
            "enroll,,,20,,,,,,,\n\
             approve,,,20,,,,,,,",
        );

        let engine = process_csv_str(&csv);
        assert_eq!(
            engine.get_customer(20).unwrap().score_status,
            ScoreStatus::Pending
        );
    }

    #[test]
    fn test_enroll_with_out_of_range_score_is_ignored() {
        let csv = with_header("enroll,,,20,,,,,,200,");
        assert!(process_csv_str(&csv).get_customer(20).is_none());
    }

    #[test]
    fn test_payment_flow_completes_plan() {
        let csv = with_header(
            "enroll,,,20,,,,,,700,\n\
             approve,,,20,,,,,,,\n\
             plan,1,10,20,Laptop,60.00,2,30,,,2025-01-01\n\
             pay,1,,20,,,,,1,,2025-01-01\n\
             pay,1,,20,,,,,2,,2025-01-31",
        );

        let engine = process_csv_str(&csv);
        let plan = engine.get_plan(1).unwrap();
        assert_eq!(plan.status, PlanStatus::Completed);
        assert!(plan
            .installments()
            .iter()
            .all(|i| i.status == InstallmentStatus::Paid));
    }

    #[test]
    fn test_out_of_order_payment_is_skipped() {
        let csv = with_header(
            "enroll,,,20,,,,,,700,\n\
             approve,,,20,,,,,,,\n\
             plan,1,10,20,Laptop,60.00,2,30,,,2025-01-01\n\
             pay,1,,20,,,,,2,,2025-01-31",
        );

        let engine = process_csv_str(&csv);
        let plan = engine.get_plan(1).unwrap();
        assert_eq!(plan.installments()[1].status, InstallmentStatus::Pending);
    }

    #[test]
    fn test_wrong_customer_cannot_pay() {
        let csv = with_header(
            "enroll,,,20,,,,,,700,\n\
             approve,,,20,,,,,,,\n\
             plan,1,10,20,Laptop,60.00,2,30,,,2025-01-01\n\
             pay,1,,99,,,,,1,,2025-01-01",
        );

        let engine = process_csv_str(&csv);
        let plan = engine.get_plan(1).unwrap();
        assert_eq!(plan.installments()[0].status, InstallmentStatus::Pending);
    }

    #[test]
    fn test_overdue_marks_pending_installments_late() {
        let csv = with_header(
            "enroll,,,20,,,,,,700,\n\
             approve,,,20,,,,,,,\n\
             plan,1,10,20,Laptop,60.00,2,30,,,2025-01-01\n\
             overdue,,,,,,,,,,2025-01-15",
        );

        let engine = process_csv_str(&csv);
        let plan = engine.get_plan(1).unwrap();
        assert_eq!(plan.installments()[0].status, InstallmentStatus::Late);
        assert_eq!(plan.installments()[1].status, InstallmentStatus::Pending);
    }

    #[test]
    fn test_invalid_rows_do_not_stop_processing() {
        let csv = with_header(
            "enroll,,,20,,,,,,700,\n\
             approve,,,20,,,,,,,\n\
             bogus,,,,,,,,,,\n\
             plan,9,10,20,Broken,not-a-number,3,30,,,2025-01-01\n\
             plan,1,10,20,Laptop,60.00,2,30,,,2025-01-01",
        );

        let engine = process_csv_str(&csv);
        assert!(engine.get_plan(9).is_none());
        assert!(engine.get_plan(1).is_some());
    }

    #[test]
    fn test_reminders_match_lead_window() {
        let csv = with_header(
            "enroll,,,20,,,,,,700,\n\
             approve,,,20,,,,,,,\n\
             plan,1,10,20,Laptop,90.00,3,10,,,2025-06-01",
        );

        let engine = process_csv_str(&csv);

        // Second installment is due 2025-06-11
        let due = engine.due_for_reminder(date("2025-06-08"));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].plan.id, 1);
        assert_eq!(due[0].installment.sequence, 2);

        assert!(engine.due_for_reminder(date("2025-06-09")).is_empty());
    }

    #[test]
    fn test_reminders_skip_paid_installments() {
        let csv = with_header(
            "enroll,,,20,,,,,,700,\n\
             approve,,,20,,,,,,,\n\
             plan,1,10,20,Laptop,90.00,3,10,,,2025-06-01\n\
             pay,1,,20,,,,,1,,2025-05-29",
        );

        let engine = process_csv_str(&csv);
        assert!(engine.due_for_reminder(date("2025-05-29")).is_empty());
    }

    #[test]
    fn test_installments_matching_orders_by_due_date() {
        let csv = with_header(
            "enroll,,,20,,,,,,700,\n\
             approve,,,20,,,,,,,\n\
             plan,2,10,20,Phone,30.00,2,20,,,2025-06-05\n\
             plan,1,10,20,Laptop,90.00,3,10,,,2025-06-01",
        );

        let engine = process_csv_str(&csv);
        let upcoming =
            engine.installments_matching(InstallmentFilter::Upcoming, date("2025-06-01"));

        let order: Vec<(u32, u32)> = upcoming
            .iter()
            .map(|r| (r.plan.id, r.installment.sequence))
            .collect();
        assert_eq!(order, [(1, 1), (2, 1), (1, 2), (1, 3), (2, 2)]);
    }

    #[test]
    fn test_dashboard_metrics_per_merchant() {
        let csv = with_header(
            "enroll,,,20,,,,,,700,\n\
             approve,,,20,,,,,,,\n\
             enroll,,,21,,,,,,650,\n\
             approve,,,21,,,,,,,\n\
             plan,1,10,20,Laptop,60.00,2,30,,,2025-01-01\n\
             plan,2,10,21,Phone,30.00,1,30,,,2025-01-01\n\
             plan,3,11,21,Sofa,90.00,3,30,,,2025-01-01\n\
             pay,1,,20,,,,,1,,2025-01-01\n\
             pay,2,,21,,,,,1,,2025-01-01\n\
             overdue,,,,,,,,,,2025-02-15",
        );

        let engine = process_csv_str(&csv);
        let metrics = engine.dashboard_metrics();
        assert_eq!(metrics.len(), 2);

        // Merchant 10: 3 installments, 2 paid, plan 2 completed
        assert_eq!(metrics[0].merchant, 10);
        assert_eq!(metrics[0].total_revenue.to_string(), "60.00");
        assert!((metrics[0].success_rate - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(metrics[0].overdue_count, 1);
        assert_eq!(metrics[0].active_plans, 1);

        // Merchant 11: nothing paid, first two installments late
        assert_eq!(metrics[1].merchant, 11);
        assert_eq!(metrics[1].total_revenue.to_string(), "0.00");
        assert_eq!(metrics[1].success_rate, 0.0);
        assert_eq!(metrics[1].overdue_count, 2);
        assert_eq!(metrics[1].active_plans, 1);
    }

    #[test]
    fn test_output_format() {
        let csv = with_header(
            "enroll,,,20,,,,,,700,\n\
             approve,,,20,,,,,,,\n\
             plan,1,10,20,Laptop,60.00,2,30,,,2025-01-01\n\
             pay,1,,20,,,,,1,,2025-01-02",
        );

        let engine = process_csv_str(&csv);
        let mut output = Vec::new();
        engine.write_output(&mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert!(output_str.contains("plan,customer,seq,amount,due_date,status,paid_on"));
        assert!(output_str.contains("1,20,1,30.00,2025-01-01,paid,2025-01-02"));
        assert!(output_str.contains("1,20,2,30.00,2025-01-31,pending,"));
    }

    #[test]
    fn test_dashboard_output_format() {
        let csv = with_header(
            "enroll,,,20,,,,,,700,\n\
             approve,,,20,,,,,,,\n\
             plan,1,10,20,Laptop,60.00,2,30,,,2025-01-01\n\
             pay,1,,20,,,,,1,,2025-01-01",
        );

        let engine = process_csv_str(&csv);
        let mut output = Vec::new();
        engine.write_dashboard(&mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert!(
            output_str.contains("merchant,total_revenue,success_rate,overdue_count,active_plans")
        );
        assert!(output_str.contains("10,30.00,50.0,0,1"));
    }

    #[test]
    fn test_whitespace_handling() {
        let csv = with_header(
            "enroll, , , 20, , , , , , 700,\n\
             approve, , , 20, , , , , , ,\n\
             plan, 1, 10, 20, Laptop, 60.00, 2, 30, , , 2025-01-01",
        );

        let engine = process_csv_str(&csv);
        assert!(engine.get_plan(1).is_some());
    }
}

//! Installment schedule calculation.
//!
//! Splits a monetary total into N dated installments using integer cent
//! arithmetic. The only floating-point operation is the initial conversion
//! of the raw amount string to cents; everything after that boundary is
//! integer math, so the installment amounts always sum back to the exact
//! cent total with no drift. Leftover cents are assigned to the earliest
//! installments.

use crate::money::Money;
use chrono::{Days, NaiveDate};
use serde::Serialize;

/// A single installment in a computed schedule.
///
/// Transient value object: produced fresh on every calculation, never stored
/// beyond the caller's use of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallmentPreview {
    /// 1-based position within the schedule.
    pub sequence: u32,

    /// Amount due, always carrying exactly two fraction digits.
    pub amount: Money,

    /// Calendar date this installment falls due.
    pub due_date: NaiveDate,
}

/// Computes an installment schedule preview from raw form inputs.
///
/// Returns exactly `count` installments: the first is due on `start_date`
/// and each subsequent one `period_days` calendar days after the previous,
/// rolling over month and year boundaries as needed. Amounts are the total
/// split into equal cent shares, with the remainder cents added one each to
/// the earliest installments.
///
/// Any invalid input yields an empty vector rather than an error: an empty
/// or non-numeric amount, a zero or negative total, a zero `count` or
/// `period_days`, or an unparseable `start_date`. A live form preview calls
/// this on every keystroke, and "nothing to show yet" is the expected state
/// while the user is mid-edit, not a failure.
///
/// # Examples
///
/// ```
/// use bnpl_engine::schedule::preview_installments;
///
/// let items = preview_installments("100.01", 3, 10, "2025-06-01");
/// let amounts: Vec<String> = items.iter().map(|i| i.amount.to_string()).collect();
/// assert_eq!(amounts, ["33.34", "33.34", "33.33"]);
///
/// assert!(preview_installments("", 3, 10, "2025-06-01").is_empty());
/// ```
pub fn preview_installments(
    total_amount: &str,
    count: u32,
    period_days: u32,
    start_date: &str,
) -> Vec<InstallmentPreview> {
    let total_cents = match parse_amount_cents(total_amount) {
        Some(cents) => cents,
        None => return Vec::new(),
    };

    if count == 0 || period_days == 0 {
        return Vec::new();
    }

    let start = match parse_date(start_date) {
        Some(date) => date,
        None => return Vec::new(),
    };

    generate(total_cents, count, period_days, start).unwrap_or_default()
}

/// Parses a raw amount string into integer cents.
///
/// This is the single float boundary in the crate: the string is parsed as
/// `f64` and converted with `round(total * 100)`, rounding halves away from
/// zero. Non-numeric, non-finite, zero and negative inputs all yield `None`.
pub(crate) fn parse_amount_cents(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let total: f64 = trimmed.parse().ok()?;
    if !total.is_finite() || total <= 0.0 {
        return None;
    }

    Some((total * 100.0).round() as i64)
}

/// Parses an ISO `YYYY-MM-DD` date string.
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    raw.trim().parse::<NaiveDate>().ok()
}

/// Builds the schedule from already-validated cent and date inputs.
///
/// `None` only when a due date would fall outside the representable
/// calendar range (absurdly large periods).
pub(crate) fn generate(
    total_cents: i64,
    count: u32,
    period_days: u32,
    start: NaiveDate,
) -> Option<Vec<InstallmentPreview>> {
    let per = i64::from(count);
    let base_cents = total_cents / per;
    let remainder = total_cents % per;

    let mut items = Vec::with_capacity(count as usize);
    for seq in 1..=count {
        // Extra cent lands on the first `remainder` installments
        let cents = base_cents + if i64::from(seq) <= remainder { 1 } else { 0 };

        let offset = u64::from(period_days) * u64::from(seq - 1);
        let due_date = start.checked_add_days(Days::new(offset))?;

        items.push(InstallmentPreview {
            sequence: seq,
            amount: Money::from_cents(cents),
            due_date,
        });
    }

    Some(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amounts(items: &[InstallmentPreview]) -> Vec<String> {
        items.iter().map(|i| i.amount.to_string()).collect()
    }

    fn due_dates(items: &[InstallmentPreview]) -> Vec<String> {
        items.iter().map(|i| i.due_date.to_string()).collect()
    }

    #[test]
    fn test_equal_split_with_month_rollover() {
        let items = preview_installments("100.00", 4, 30, "2025-01-01");

        assert_eq!(items.len(), 4);
        assert_eq!(
            items.iter().map(|i| i.sequence).collect::<Vec<_>>(),
            [1, 2, 3, 4]
        );
        assert_eq!(amounts(&items), ["25.00", "25.00", "25.00", "25.00"]);
        assert_eq!(
            due_dates(&items),
            ["2025-01-01", "2025-01-31", "2025-03-02", "2025-04-01"]
        );
    }

    #[test]
    fn test_remainder_cents_go_to_earliest_installments() {
        let items = preview_installments("100.01", 3, 10, "2025-06-01");

        assert_eq!(amounts(&items), ["33.34", "33.34", "33.33"]);
        assert_eq!(due_dates(&items), ["2025-06-01", "2025-06-11", "2025-06-21"]);
    }

    #[test]
    fn test_single_installment_carries_full_amount() {
        let items = preview_installments("55.55", 1, 30, "2025-01-01");

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].amount.to_string(), "55.55");
        assert_eq!(items[0].due_date.to_string(), "2025-01-01");
    }

    #[test]
    fn test_cent_arithmetic_avoids_float_drift() {
        let items = preview_installments("10.01", 3, 1, "2025-01-01");
        assert_eq!(amounts(&items), ["3.34", "3.34", "3.33"]);
    }

    #[test]
    fn test_amounts_always_sum_to_exact_total() {
        for count in 1..=17u32 {
            let items = preview_installments("100.01", count, 7, "2025-03-15");
            assert_eq!(items.len() as u32, count);

            let sum: i64 = items.iter().map(|i| i.amount.cents()).sum();
            assert_eq!(sum, 10001, "drift with count {}", count);
        }
    }

    #[test]
    fn test_due_dates_spaced_exactly_by_period() {
        let items = preview_installments("90.00", 6, 13, "2024-12-20");

        for pair in items.windows(2) {
            let gap = pair[1].due_date - pair[0].due_date;
            assert_eq!(gap.num_days(), 13);
        }
    }

    #[test]
    fn test_leap_year_february_rollover() {
        // 2024 is a leap year: Jan 31 + 30 days lands on Mar 1
        let items = preview_installments("60.00", 2, 30, "2024-01-31");
        assert_eq!(due_dates(&items), ["2024-01-31", "2024-03-01"]);
    }

    #[test]
    fn test_empty_amount_yields_empty_preview() {
        assert!(preview_installments("", 3, 10, "2025-06-01").is_empty());
    }

    #[test]
    fn test_non_numeric_amount_yields_empty_preview() {
        assert!(preview_installments("abc", 3, 10, "2025-06-01").is_empty());
        assert!(preview_installments("12.3.4", 3, 10, "2025-06-01").is_empty());
    }

    #[test]
    fn test_zero_or_negative_amount_yields_empty_preview() {
        assert!(preview_installments("0", 3, 10, "2025-06-01").is_empty());
        assert!(preview_installments("-5.00", 3, 10, "2025-06-01").is_empty());
    }

    #[test]
    fn test_zero_count_yields_empty_preview() {
        assert!(preview_installments("100.00", 0, 10, "2025-06-01").is_empty());
    }

    #[test]
    fn test_zero_period_yields_empty_preview() {
        assert!(preview_installments("100.00", 3, 0, "2025-06-01").is_empty());
    }

    #[test]
    fn test_invalid_start_date_yields_empty_preview() {
        assert!(preview_installments("100.00", 3, 10, "").is_empty());
        assert!(preview_installments("100.00", 3, 10, "not-a-date").is_empty());
        assert!(preview_installments("100.00", 3, 10, "2025-13-40").is_empty());
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let first = preview_installments("123.45", 5, 14, "2025-02-28");
        let second = preview_installments("123.45", 5, 14, "2025-02-28");
        assert_eq!(first, second);
    }

    #[test]
    fn test_half_cent_boundary_rounds_away_from_zero() {
        let items = preview_installments("0.005", 1, 30, "2025-01-01");
        assert_eq!(amounts(&items), ["0.01"]);
    }

    #[test]
    fn test_whitespace_tolerated() {
        let items = preview_installments("  100.00 ", 2, 15, " 2025-06-01 ");
        assert_eq!(amounts(&items), ["50.00", "50.00"]);
    }
}

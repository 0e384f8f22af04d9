//! Paid/unpaid split of a leave request against the yearly allowance.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::AppError;
use crate::model::leave_request::LeaveType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LeaveSplit {
    pub total_days: i32,
    pub paid_days: i32,
    pub unpaid_days: i32,
    /// Allowance year, always the year of the start date
    pub year: i32,
}

/// Inclusive calendar-day length of `[start, end]`.
pub fn total_days(start: NaiveDate, end: NaiveDate) -> Result<i32, AppError> {
    if start > end {
        return Err(AppError::bad_request("End date can't be before start date"));
    }
    let days = (end - start).num_days() + 1;
    i32::try_from(days).map_err(|_| AppError::bad_request("Leave period is too long"))
}

/// Splits `[start, end]` into paid and unpaid days.
///
/// `used_paid_days` is what the employee has already consumed of this leave
/// type in the allowance year (approved leaves only).
pub fn split(
    leave_type: LeaveType,
    start: NaiveDate,
    end: NaiveDate,
    used_paid_days: i64,
) -> Result<LeaveSplit, AppError> {
    let total = total_days(start, end)?;

    let remaining = (i64::from(leave_type.yearly_allowance()) - used_paid_days.max(0)).max(0);
    let paid = remaining.min(i64::from(total)) as i32;

    Ok(LeaveSplit {
        total_days: total,
        paid_days: paid,
        unpaid_days: total - paid,
        year: start.year(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn single_day_counts_as_one() {
        assert_eq!(total_days(d(2026, 3, 2), d(2026, 3, 2)).unwrap(), 1);
    }

    #[test]
    fn reversed_range_is_rejected() {
        let err = total_days(d(2026, 3, 5), d(2026, 3, 2)).unwrap_err();
        assert_eq!(err.to_string(), "End date can't be before start date");
    }

    #[test]
    fn fully_paid_when_allowance_covers_request() {
        let s = split(LeaveType::Sick, d(2026, 1, 5), d(2026, 1, 7), 2).unwrap();
        assert_eq!((s.total_days, s.paid_days, s.unpaid_days), (3, 3, 0));
    }

    #[test]
    fn partially_paid_when_allowance_runs_out() {
        // casual: 6 per year, 4 already used, 5 requested
        let s = split(LeaveType::Casual, d(2026, 6, 1), d(2026, 6, 5), 4).unwrap();
        assert_eq!((s.total_days, s.paid_days, s.unpaid_days), (5, 2, 3));
    }

    #[test]
    fn fully_unpaid_when_allowance_exhausted() {
        let s = split(LeaveType::Optional, d(2026, 8, 10), d(2026, 8, 11), 3).unwrap();
        assert_eq!((s.paid_days, s.unpaid_days), (0, 2));

        // over-consumption from older data never makes paid days negative
        let s = split(LeaveType::Optional, d(2026, 8, 10), d(2026, 8, 11), 9).unwrap();
        assert_eq!((s.paid_days, s.unpaid_days), (0, 2));
    }

    #[test]
    fn unpaid_type_never_pays() {
        let s = split(LeaveType::Unpaid, d(2026, 2, 1), d(2026, 2, 10), 0).unwrap();
        assert_eq!((s.total_days, s.paid_days, s.unpaid_days), (10, 0, 10));
    }

    #[test]
    fn earned_leave_exact_fit() {
        let s = split(LeaveType::Earned, d(2026, 4, 1), d(2026, 4, 12), 0).unwrap();
        assert_eq!((s.paid_days, s.unpaid_days), (12, 0));
    }

    #[test]
    fn year_boundary_uses_start_year() {
        let s = split(LeaveType::Sick, d(2025, 12, 30), d(2026, 1, 2), 0).unwrap();
        assert_eq!(s.year, 2025);
        assert_eq!(s.total_days, 4);
    }

    #[test]
    fn leap_day_is_counted() {
        let s = split(LeaveType::Earned, d(2028, 2, 27), d(2028, 3, 1), 0).unwrap();
        assert_eq!(s.total_days, 4);
    }

    #[test]
    fn paid_plus_unpaid_equals_total() {
        for used in 0..=14 {
            for len in 0..20 {
                let start = d(2026, 5, 1);
                let end = start + chrono::Duration::days(len);
                let s = split(LeaveType::Earned, start, end, used).unwrap();
                assert_eq!(s.paid_days + s.unpaid_days, s.total_days);
                assert!(s.paid_days <= (12 - used).max(0) as i32);
                assert!(s.unpaid_days >= 0);
            }
        }
    }
}

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::model::leave_quota::{LeaveSplit, split};

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum LeaveType {
    Sick,
    Casual,
    Earned,
    Optional,
    Unpaid,
}

impl LeaveType {
    /// Paid days per calendar year.
    pub fn yearly_allowance(self) -> i32 {
        match self {
            LeaveType::Sick => 8,
            LeaveType::Casual => 6,
            LeaveType::Earned => 12,
            LeaveType::Optional => 3,
            LeaveType::Unpaid => 0,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        raw.trim()
            .parse()
            .map_err(|_| AppError::bad_request("Invalid leave type"))
    }
}

impl TryFrom<String> for LeaveType {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Revoked,
}

impl TryFrom<String> for LeaveStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl LeaveStatus {
    /// Admin decision on a pending request. Only APPROVED and REJECTED are decisions.
    pub fn decide(self, decision: &str) -> Result<LeaveStatus, AppError> {
        if self != LeaveStatus::Pending {
            return Err(AppError::bad_request("Leave already processed"));
        }
        match decision.trim().parse::<LeaveStatus>() {
            Ok(next @ (LeaveStatus::Approved | LeaveStatus::Rejected)) => Ok(next),
            _ => Err(AppError::bad_request("Invalid decision")),
        }
    }

    /// An approved leave can be withdrawn until the day it starts.
    pub fn revoke(self, today: NaiveDate, start_date: NaiveDate) -> Result<LeaveStatus, AppError> {
        if self != LeaveStatus::Approved {
            return Err(AppError::bad_request("Only APPROVED leaves can be revoked"));
        }
        if today >= start_date {
            return Err(AppError::bad_request(
                "Leave has already started, it can't be revoked now",
            ));
        }
        Ok(LeaveStatus::Revoked)
    }

    /// Owners may only edit or delete requests nobody has decided on yet.
    pub fn ensure_pending(self, action: &str) -> Result<(), AppError> {
        if self == LeaveStatus::Pending {
            Ok(())
        } else {
            Err(AppError::bad_request(format!(
                "Only PENDING leaves can be {action}"
            )))
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeaveRequest {
    pub leave_id: u64,
    pub emp_id: u64,
    #[sqlx(try_from = "String")]
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: i32,
    pub paid_days: i32,
    pub unpaid_days: i32,
    pub year: i32,
    #[sqlx(try_from = "String")]
    pub status: LeaveStatus,
    pub reason: Option<String>,
    pub applied_at: NaiveDateTime,
    pub approved_at: Option<NaiveDateTime>,
    pub approved_by: Option<u64>,
}

/// Leave as returned by the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaveResponse {
    #[schema(example = 17)]
    pub leave_id: u64,
    #[schema(example = 3)]
    pub emp_id: u64,
    pub leave_type: LeaveType,
    #[schema(example = "2026-03-02", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-03-04", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[schema(example = 3)]
    pub total_days: i32,
    #[schema(example = 3)]
    pub paid_days: i32,
    #[schema(example = 0)]
    pub unpaid_days: i32,
    #[schema(example = 2026)]
    pub year: i32,
    pub status: LeaveStatus,
    #[schema(example = "Family event", nullable = true)]
    pub reason: Option<String>,
    #[schema(example = "2026-02-20T09:15:00", value_type = String, format = "date-time")]
    pub applied_at: NaiveDateTime,
    #[schema(value_type = Option<String>, format = "date-time", nullable = true)]
    pub approved_at: Option<NaiveDateTime>,
    #[schema(nullable = true)]
    pub approved_by: Option<u64>,
}

impl From<LeaveRequest> for LeaveResponse {
    fn from(l: LeaveRequest) -> Self {
        Self {
            leave_id: l.leave_id,
            emp_id: l.emp_id,
            leave_type: l.leave_type,
            start_date: l.start_date,
            end_date: l.end_date,
            total_days: l.total_days,
            paid_days: l.paid_days,
            unpaid_days: l.unpaid_days,
            year: l.year,
            status: l.status,
            reason: l.reason,
            applied_at: l.applied_at,
            approved_at: l.approved_at,
            approved_by: l.approved_by,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LeaveApply {
    /// SICK, CASUAL, EARNED, OPTIONAL or UNPAID (any case)
    #[schema(example = "casual")]
    pub leave_type: String,
    #[schema(example = "2026-03-02", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-03-04", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[schema(example = "Family event")]
    pub reason: Option<String>,
}

/// Absent fields keep their current value.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LeaveEdit {
    #[schema(example = "sick")]
    pub leave_type: Option<String>,
    #[schema(value_type = Option<String>, format = "date")]
    pub start_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
    pub reason: Option<String>,
}

impl LeaveRequest {
    /// Merges an owner's edit; the split must be recomputed afterwards.
    pub fn apply_edit(&mut self, edit: LeaveEdit) -> Result<(), AppError> {
        self.status.ensure_pending("edited")?;
        if let Some(raw) = edit.leave_type.as_deref() {
            self.leave_type = LeaveType::parse(raw)?;
        }
        if let Some(start) = edit.start_date {
            self.start_date = start;
        }
        if let Some(end) = edit.end_date {
            self.end_date = end;
        }
        if edit.reason.is_some() {
            self.reason = edit.reason;
        }
        Ok(())
    }

    /// Re-splits the request against the paid days already approved for its type and year.
    pub fn settle(&mut self, approved_paid_days: i64) -> Result<(), AppError> {
        let split = split(self.leave_type, self.start_date, self.end_date, approved_paid_days)?;
        self.set_split(split);
        Ok(())
    }

    pub fn set_split(&mut self, split: LeaveSplit) {
        self.total_days = split.total_days;
        self.paid_days = split.paid_days;
        self.unpaid_days = split.unpaid_days;
        self.year = split.year;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn allowances_per_type() {
        let total: i32 = LeaveType::iter().map(LeaveType::yearly_allowance).sum();
        assert_eq!(total, 8 + 6 + 12 + 3);
        assert_eq!(LeaveType::Unpaid.yearly_allowance(), 0);
    }

    #[test]
    fn leave_type_parsing_ignores_case() {
        assert_eq!(LeaveType::parse("sick").unwrap(), LeaveType::Sick);
        assert_eq!(LeaveType::parse(" Earned ").unwrap(), LeaveType::Earned);
        assert_eq!(
            LeaveType::parse("maternity").unwrap_err().to_string(),
            "Invalid leave type"
        );
    }

    #[test]
    fn decisions_only_on_pending() {
        assert_eq!(
            LeaveStatus::Pending.decide("approved").unwrap(),
            LeaveStatus::Approved
        );
        assert_eq!(
            LeaveStatus::Pending.decide("REJECTED").unwrap(),
            LeaveStatus::Rejected
        );
        assert_eq!(
            LeaveStatus::Pending.decide("REVOKED").unwrap_err().to_string(),
            "Invalid decision"
        );
        assert_eq!(
            LeaveStatus::Approved.decide("REJECTED").unwrap_err().to_string(),
            "Leave already processed"
        );
    }

    #[test]
    fn revoke_requires_future_start() {
        let start = d(2026, 7, 10);
        assert_eq!(
            LeaveStatus::Approved.revoke(d(2026, 7, 9), start).unwrap(),
            LeaveStatus::Revoked
        );
        assert!(LeaveStatus::Approved.revoke(start, start).is_err());
        assert!(LeaveStatus::Approved.revoke(d(2026, 7, 11), start).is_err());
        assert!(LeaveStatus::Pending.revoke(d(2026, 7, 1), start).is_err());
    }

    #[test]
    fn edits_need_pending() {
        assert!(LeaveStatus::Pending.ensure_pending("edited").is_ok());
        assert_eq!(
            LeaveStatus::Rejected.ensure_pending("deleted").unwrap_err().to_string(),
            "Only PENDING leaves can be deleted"
        );
    }

    fn pending_leave() -> LeaveRequest {
        LeaveRequest {
            leave_id: 1,
            emp_id: 2,
            leave_type: LeaveType::Casual,
            start_date: d(2026, 3, 2),
            end_date: d(2026, 3, 3),
            total_days: 2,
            paid_days: 2,
            unpaid_days: 0,
            year: 2026,
            status: LeaveStatus::Pending,
            reason: None,
            applied_at: d(2026, 2, 1).and_hms_opt(9, 0, 0).unwrap(),
            approved_at: None,
            approved_by: None,
        }
    }

    #[test]
    fn edit_merges_present_fields() {
        let mut leave = pending_leave();
        leave
            .apply_edit(LeaveEdit {
                leave_type: Some("sick".into()),
                end_date: Some(d(2026, 3, 6)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(leave.leave_type, LeaveType::Sick);
        assert_eq!(leave.start_date, d(2026, 3, 2));
        assert_eq!(leave.end_date, d(2026, 3, 6));

        leave.status = LeaveStatus::Approved;
        assert!(leave.apply_edit(LeaveEdit::default()).is_err());
    }

    #[test]
    fn edit_rejects_unknown_type() {
        let mut leave = pending_leave();
        let err = leave
            .apply_edit(LeaveEdit {
                leave_type: Some("sabbatical".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid leave type");
    }

    #[test]
    fn approvals_share_one_allowance() {
        // casual allows 6 paid days; two 4-day requests were both applied while nothing was used
        let mut first = pending_leave();
        first.end_date = d(2026, 3, 5);
        first.settle(0).unwrap();
        let mut second = pending_leave();
        second.leave_id = 2;
        second.start_date = d(2026, 4, 6);
        second.end_date = d(2026, 4, 9);
        second.settle(0).unwrap();
        assert_eq!((first.paid_days, second.paid_days), (4, 4));

        // approving one after the other settles against what is already approved
        first.settle(0).unwrap();
        second.settle(i64::from(first.paid_days)).unwrap();

        assert_eq!((first.paid_days, first.unpaid_days), (4, 0));
        assert_eq!((second.paid_days, second.unpaid_days), (2, 2));
        assert!(first.paid_days + second.paid_days <= LeaveType::Casual.yearly_allowance());
    }

    #[test]
    fn settle_keeps_year_and_total() {
        let mut leave = pending_leave();
        leave.total_days = 0;
        leave.year = 0;
        leave.settle(6).unwrap();
        assert_eq!((leave.total_days, leave.paid_days, leave.unpaid_days), (2, 0, 2));
        assert_eq!(leave.year, 2026);
    }
}

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::model::role::Role;

#[derive(Debug, sqlx::FromRow)]
pub struct User {
    pub user_id: u64,
    pub name: String,
    pub email: String,
    pub password: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    #[sqlx(try_from = "String")]
    pub status: UserStatus,
    pub enabled: bool,
    pub created_at: NaiveDateTime,
    pub last_login_at: Option<NaiveDateTime>,
}

/// Registration lifecycle of an account.
///
/// ```text
/// PENDING --approve--> APPROVED
///    |                    |
///    +------reject--------+--> REJECTED --reopen--> PENDING
/// ```
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum UserStatus {
    Pending,
    Approved,
    Rejected,
}

impl TryFrom<String> for UserStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl UserStatus {
    pub fn approve(self) -> Result<UserStatus, AppError> {
        match self {
            UserStatus::Pending => Ok(UserStatus::Approved),
            _ => Err(AppError::bad_request("User already processed")),
        }
    }

    pub fn reject(self) -> Result<UserStatus, AppError> {
        match self {
            UserStatus::Pending | UserStatus::Approved => Ok(UserStatus::Rejected),
            UserStatus::Rejected => Err(AppError::bad_request("User already rejected")),
        }
    }

    pub fn reopen(self) -> Result<UserStatus, AppError> {
        match self {
            UserStatus::Rejected => Ok(UserStatus::Pending),
            _ => Err(AppError::bad_request("Only rejected users can be reopened")),
        }
    }

    /// Only approved accounts may sign in and own an employee record.
    pub fn is_active(self) -> bool {
        self == UserStatus::Approved
    }

    /// Pending and rejected accounts stay disabled until approval enables them.
    pub fn ensure_can_enable(self) -> Result<(), AppError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(AppError::bad_request("Only approved users can be enabled"))
        }
    }
}

/// Fails the login for accounts that are not (or no longer) approved.
pub fn ensure_can_login(status: UserStatus, enabled: bool) -> Result<(), AppError> {
    if status == UserStatus::Rejected {
        return Err(AppError::forbidden("User account has been rejected"));
    }
    if !enabled || status == UserStatus::Pending {
        return Err(AppError::forbidden("User not approved yet"));
    }
    Ok(())
}

/// Account joined with its employee record and department, if any.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct UserResponse {
    #[schema(example = 12)]
    pub user_id: u64,
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "jane@company.com")]
    pub email: String,
    #[schema(example = 29, nullable = true)]
    pub age: Option<i32>,
    #[schema(example = "female", nullable = true)]
    pub gender: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    #[sqlx(try_from = "String")]
    pub status: UserStatus,
    pub enabled: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
    #[schema(value_type = Option<String>, format = "date-time", nullable = true)]
    pub last_login_at: Option<NaiveDateTime>,
    #[schema(example = 3, nullable = true)]
    pub emp_id: Option<u64>,
    #[schema(example = 1, nullable = true)]
    pub dept_id: Option<u64>,
    #[schema(example = "Engineering", nullable = true)]
    pub department: Option<String>,
}

pub const USER_VIEW_SELECT: &str = r#"
    SELECT u.user_id, u.name, u.email, u.age, u.gender, u.role, u.status, u.enabled,
           u.created_at, u.last_login_at, e.emp_id, d.dept_id, d.dept_name AS department
    FROM users u
    LEFT JOIN employee e ON e.user_id = u.user_id
    LEFT JOIN dept d ON d.dept_id = e.dept_id
"#;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApproveReq {
    #[schema(example = 12)]
    pub user_id: u64,
    #[schema(example = 1)]
    pub dept_id: u64,
}

/// Admin edit of any account; absent fields stay untouched.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AdminUserUpdate {
    #[schema(example = "Jane Doe")]
    pub name: Option<String>,
    #[schema(example = 30)]
    pub age: Option<i32>,
    #[schema(example = "female")]
    pub gender: Option<String>,
    /// PENDING, APPROVED or REJECTED (any case)
    #[schema(example = "APPROVED")]
    pub status: Option<String>,
    #[schema(example = 1)]
    pub dept_id: Option<u64>,
}

/// What a status set by an admin does to the employee record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmployeeEffect {
    /// Create the record, or move it to this department
    Assign(u64),
    Remove,
}

/// Employee effect and `enabled` flag of an admin status set.
pub fn admin_status_effect(
    status: UserStatus,
    dept_id: Option<u64>,
) -> Result<(EmployeeEffect, bool), AppError> {
    match status {
        UserStatus::Approved => dept_id
            .map(|d| (EmployeeEffect::Assign(d), true))
            .ok_or_else(|| AppError::bad_request("Department is required to approve a user")),
        UserStatus::Pending | UserStatus::Rejected => Ok((EmployeeEffect::Remove, false)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_user_can_be_approved_once() {
        let approved = UserStatus::Pending.approve().unwrap();
        assert_eq!(approved, UserStatus::Approved);
        assert!(approved.approve().is_err());
        assert!(UserStatus::Rejected.approve().is_err());
    }

    #[test]
    fn reject_from_pending_or_approved() {
        assert_eq!(UserStatus::Pending.reject().unwrap(), UserStatus::Rejected);
        assert_eq!(UserStatus::Approved.reject().unwrap(), UserStatus::Rejected);
        assert!(UserStatus::Rejected.reject().is_err());
    }

    #[test]
    fn only_rejected_users_reopen() {
        assert_eq!(UserStatus::Rejected.reopen().unwrap(), UserStatus::Pending);
        assert!(UserStatus::Pending.reopen().is_err());
        assert!(UserStatus::Approved.reopen().is_err());
    }

    #[test]
    fn reopened_user_goes_through_approval_again() {
        let status = UserStatus::Pending
            .reject()
            .and_then(UserStatus::reopen)
            .and_then(UserStatus::approve)
            .unwrap();
        assert!(status.is_active());
    }

    #[test]
    fn login_gate() {
        assert!(ensure_can_login(UserStatus::Approved, true).is_ok());

        let rejected = ensure_can_login(UserStatus::Rejected, false).unwrap_err();
        assert_eq!(rejected.to_string(), "User account has been rejected");

        let pending = ensure_can_login(UserStatus::Pending, false).unwrap_err();
        assert_eq!(pending.to_string(), "User not approved yet");

        // approved but switched off by an admin
        assert!(ensure_can_login(UserStatus::Approved, false).is_err());
    }

    #[test]
    fn only_approved_accounts_get_enabled() {
        assert!(UserStatus::Approved.ensure_can_enable().is_ok());

        for status in [UserStatus::Pending, UserStatus::Rejected] {
            let err = status.ensure_can_enable().unwrap_err();
            assert_eq!(err.to_string(), "Only approved users can be enabled");
        }
    }

    #[test]
    fn parses_stored_values() {
        assert_eq!(UserStatus::try_from("APPROVED".to_string()).unwrap(), UserStatus::Approved);
        assert_eq!("pending".parse::<UserStatus>().unwrap(), UserStatus::Pending);
        assert!("ACTIVE".parse::<UserStatus>().is_err());
    }

    #[test]
    fn admin_status_effects() {
        assert_eq!(
            admin_status_effect(UserStatus::Approved, Some(4)).unwrap(),
            (EmployeeEffect::Assign(4), true)
        );
        assert_eq!(
            admin_status_effect(UserStatus::Approved, None)
                .unwrap_err()
                .to_string(),
            "Department is required to approve a user"
        );
        assert_eq!(
            admin_status_effect(UserStatus::Rejected, Some(4)).unwrap(),
            (EmployeeEffect::Remove, false)
        );
        assert_eq!(
            admin_status_effect(UserStatus::Pending, None).unwrap(),
            (EmployeeEffect::Remove, false)
        );
    }
}

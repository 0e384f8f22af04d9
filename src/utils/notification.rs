use sqlx::{Executor, MySql};
use strum_macros::AsRefStr;

/// Kinds of mail the HR desk would send; only the log row is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    UserApproved,
    UserRejected,
    LeaveApproved,
    LeaveRejected,
    LeaveRevoked,
}

/// Best effort: a failed log write never fails the business action.
pub async fn record<'e, E>(executor: E, user_id: u64, kind: NotificationKind)
where
    E: Executor<'e, Database = MySql>,
{
    let result = sqlx::query("INSERT INTO email_log (user_id, email_type) VALUES (?, ?)")
        .bind(user_id)
        .bind(kind.as_ref())
        .execute(executor)
        .await;

    if let Err(e) = result {
        tracing::warn!(error = %e, user_id, kind = kind.as_ref(), "Failed to record notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_names() {
        assert_eq!(NotificationKind::UserApproved.as_ref(), "USER_APPROVED");
        assert_eq!(NotificationKind::LeaveRevoked.as_ref(), "LEAVE_REVOKED");
    }
}

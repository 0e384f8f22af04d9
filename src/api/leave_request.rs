use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        leave_quota::split,
        leave_request::{
            LeaveApply, LeaveEdit, LeaveRequest, LeaveResponse, LeaveStatus, LeaveType,
        },
    },
    utils::{
        db_utils::{FilterValue, bind_filters, where_clause},
        notification::{self, NotificationKind},
    },
};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::{Executor, MySql, MySqlConnection, MySqlPool};
use tracing::{debug, info};
use utoipa::IntoParams;

const LEAVE_SELECT: &str = r#"
    SELECT leave_id, emp_id, leave_type, start_date, end_date, total_days, paid_days,
           unpaid_days, year, status, reason, applied_at, approved_at, approved_by
    FROM leave_request
"#;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DecisionQuery {
    /// APPROVED or REJECTED (any case)
    pub decision: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaveSearch {
    /// Filter by employee ID
    pub emp_id: Option<u64>,
    /// PENDING, APPROVED, REJECTED or REVOKED
    pub status: Option<String>,
    /// SICK, CASUAL, EARNED, OPTIONAL or UNPAID
    pub leave_type: Option<String>,
    /// Allowance year
    pub year: Option<i32>,
    /// Leaves starting on or after this date
    #[param(value_type = Option<String>, format = "date")]
    pub from_date: Option<NaiveDate>,
    /// Leaves ending on or before this date
    #[param(value_type = Option<String>, format = "date")]
    pub to_date: Option<NaiveDate>,
}

impl LeaveSearch {
    /// WHERE conditions and their bind values, in order.
    fn filters(&self) -> AppResult<(Vec<&'static str>, Vec<FilterValue>)> {
        let mut conditions = Vec::new();
        let mut args = Vec::new();

        if let Some(emp_id) = self.emp_id {
            conditions.push("emp_id = ?");
            args.push(FilterValue::U64(emp_id));
        }
        if let Some(raw) = self.status.as_deref().filter(|s| !s.trim().is_empty()) {
            let status: LeaveStatus = raw
                .trim()
                .parse()
                .map_err(|_| AppError::bad_request("Invalid leave status"))?;
            conditions.push("status = ?");
            args.push(FilterValue::Str(status.to_string()));
        }
        if let Some(raw) = self.leave_type.as_deref().filter(|s| !s.trim().is_empty()) {
            conditions.push("leave_type = ?");
            args.push(FilterValue::Str(LeaveType::parse(raw)?.to_string()));
        }
        if let Some(year) = self.year {
            conditions.push("year = ?");
            args.push(FilterValue::I64(i64::from(year)));
        }
        if let Some(from) = self.from_date {
            conditions.push("start_date >= ?");
            args.push(FilterValue::Date(from));
        }
        if let Some(to) = self.to_date {
            conditions.push("end_date <= ?");
            args.push(FilterValue::Date(to));
        }

        Ok((conditions, args))
    }
}

const APPROVED_PAID_DAYS: &str = r#"
    SELECT CAST(COALESCE(SUM(paid_days), 0) AS SIGNED)
    FROM leave_request
    WHERE emp_id = ? AND leave_type = ? AND year = ? AND status = ?
"#;

/// Paid days already granted to an employee for a type and year.
async fn used_paid_days<'e, E>(
    executor: E,
    emp_id: u64,
    leave_type: LeaveType,
    year: i32,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    approved_paid_days(executor, APPROVED_PAID_DAYS, emp_id, leave_type, year).await
}

/// Same sum as a locking read: sees the latest commits, not the transaction snapshot.
async fn used_paid_days_locked(
    conn: &mut MySqlConnection,
    emp_id: u64,
    leave_type: LeaveType,
    year: i32,
) -> Result<i64, sqlx::Error> {
    let sql = format!("{APPROVED_PAID_DAYS} LOCK IN SHARE MODE");
    approved_paid_days(conn, &sql, emp_id, leave_type, year).await
}

async fn approved_paid_days<'e, E>(
    executor: E,
    sql: &str,
    emp_id: u64,
    leave_type: LeaveType,
    year: i32,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    sqlx::query_scalar::<_, i64>(sql)
    .bind(emp_id)
    .bind(leave_type.as_ref())
    .bind(year)
    .bind(LeaveStatus::Approved.as_ref())
    .fetch_one(executor)
    .await
}

async fn find_leave(pool: &MySqlPool, leave_id: u64) -> AppResult<LeaveRequest> {
    sqlx::query_as::<_, LeaveRequest>(&format!("{LEAVE_SELECT} WHERE leave_id = ?"))
        .bind(leave_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Leave not found"))
}

/// Leave of the caller; other employees' leaves are hidden.
async fn find_own_leave(pool: &MySqlPool, auth: &AuthUser, leave_id: u64) -> AppResult<LeaveRequest> {
    let emp_id = auth.employee_id(pool).await?;
    let leave = find_leave(pool, leave_id).await?;
    if leave.emp_id != emp_id {
        return Err(AppError::forbidden("Not allowed"));
    }
    Ok(leave)
}

async fn leaves_where(
    pool: &MySqlPool,
    condition: &str,
    arg: FilterValue,
    order: &str,
) -> AppResult<Vec<LeaveResponse>> {
    let sql = format!("{LEAVE_SELECT} WHERE {condition} ORDER BY {order}");
    let args = [arg];
    let leaves = bind_filters(sqlx::query_as::<_, LeaveRequest>(&sql), &args)
        .fetch_all(pool)
        .await?;
    Ok(leaves.into_iter().map(LeaveResponse::from).collect())
}

async fn owner_user_id(pool: &MySqlPool, emp_id: u64) -> AppResult<Option<u64>> {
    let user_id = sqlx::query_scalar::<_, u64>("SELECT user_id FROM employee WHERE emp_id = ?")
        .bind(emp_id)
        .fetch_optional(pool)
        .await?;
    Ok(user_id)
}

/* =========================
Apply for leave
========================= */
#[utoipa::path(
    post,
    path = "/api/leaves",
    request_body = LeaveApply,
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveResponse),
        (status = 400, description = "Invalid type or dates", body = ApiError),
        (status = 404, description = "Caller has no employee record", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn apply_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<LeaveApply>,
) -> AppResult<HttpResponse> {
    let emp_id = auth.employee_id(pool.get_ref()).await?;
    let req = payload.into_inner();

    // 1️⃣ validate type and dates
    let leave_type = LeaveType::parse(&req.leave_type)?;
    let year = req.start_date.year();

    // 2️⃣ split against what is already approved
    let used = used_paid_days(pool.get_ref(), emp_id, leave_type, year).await?;
    let split = split(leave_type, req.start_date, req.end_date, used)?;
    debug!(emp_id, ?leave_type, used, ?split, "Leave split computed");

    // 3️⃣ insert request
    let applied_at = Utc::now().naive_utc();
    let result = sqlx::query(
        r#"
        INSERT INTO leave_request
            (emp_id, leave_type, start_date, end_date, total_days, paid_days, unpaid_days,
             year, status, reason, applied_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(emp_id)
    .bind(leave_type.as_ref())
    .bind(req.start_date)
    .bind(req.end_date)
    .bind(split.total_days)
    .bind(split.paid_days)
    .bind(split.unpaid_days)
    .bind(split.year)
    .bind(LeaveStatus::Pending.as_ref())
    .bind(&req.reason)
    .bind(applied_at)
    .execute(pool.get_ref())
    .await?;

    let leave_id = result.last_insert_id();
    info!(leave_id, emp_id, "Leave request submitted");

    Ok(HttpResponse::Created().json(LeaveResponse {
        leave_id,
        emp_id,
        leave_type,
        start_date: req.start_date,
        end_date: req.end_date,
        total_days: split.total_days,
        paid_days: split.paid_days,
        unpaid_days: split.unpaid_days,
        year: split.year,
        status: LeaveStatus::Pending,
        reason: req.reason,
        applied_at,
        approved_at: None,
        approved_by: None,
    }))
}

/// The caller's own leave requests, newest first
#[utoipa::path(
    get,
    path = "/api/leaves/my",
    responses((status = 200, description = "Own leaves", body = [LeaveResponse])),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn my_leaves(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    let emp_id = auth.employee_id(pool.get_ref()).await?;
    let leaves = leaves_where(
        pool.get_ref(),
        "emp_id = ?",
        FilterValue::U64(emp_id),
        "applied_at DESC, leave_id DESC",
    )
    .await?;
    Ok(HttpResponse::Ok().json(leaves))
}

/* =========================
Edit own pending leave
========================= */
#[utoipa::path(
    patch,
    path = "/api/leaves/{leave_id}",
    params(("leave_id" = u64, Path, description = "Leave ID")),
    request_body = LeaveEdit,
    responses(
        (status = 200, description = "Leave updated", body = LeaveResponse),
        (status = 400, description = "Not pending or invalid change", body = ApiError),
        (status = 403, description = "Not the owner", body = ApiError),
        (status = 404, description = "Leave not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn edit_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<LeaveEdit>,
) -> AppResult<HttpResponse> {
    let mut leave = find_own_leave(pool.get_ref(), &auth, path.into_inner()).await?;
    leave.apply_edit(payload.into_inner())?;

    // only APPROVED leaves count as used, so this request is not in the sum
    let used = used_paid_days(
        pool.get_ref(),
        leave.emp_id,
        leave.leave_type,
        leave.start_date.year(),
    )
    .await?;
    leave.settle(used)?;

    let result = sqlx::query(
        r#"
        UPDATE leave_request
        SET leave_type = ?, start_date = ?, end_date = ?, total_days = ?, paid_days = ?,
            unpaid_days = ?, year = ?, reason = ?
        WHERE leave_id = ? AND status = ?
        "#,
    )
    .bind(leave.leave_type.as_ref())
    .bind(leave.start_date)
    .bind(leave.end_date)
    .bind(leave.total_days)
    .bind(leave.paid_days)
    .bind(leave.unpaid_days)
    .bind(leave.year)
    .bind(&leave.reason)
    .bind(leave.leave_id)
    .bind(LeaveStatus::Pending.as_ref())
    .execute(pool.get_ref())
    .await?;

    // decided between our read and this write
    if result.rows_affected() == 0 {
        return Err(AppError::bad_request("Only PENDING leaves can be edited"));
    }

    info!(leave_id = leave.leave_id, "Leave edited");
    Ok(HttpResponse::Ok().json(LeaveResponse::from(leave)))
}

/* =========================
Delete own pending leave
========================= */
#[utoipa::path(
    delete,
    path = "/api/leaves/{leave_id}",
    params(("leave_id" = u64, Path, description = "Leave ID")),
    responses(
        (status = 200, description = "Leave deleted", body = Object, example = json!({
            "message": "Leave deleted"
        })),
        (status = 400, description = "Not pending", body = ApiError),
        (status = 403, description = "Not the owner", body = ApiError),
        (status = 404, description = "Leave not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn delete_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let leave = find_own_leave(pool.get_ref(), &auth, path.into_inner()).await?;
    leave.status.ensure_pending("deleted")?;

    let result = sqlx::query("DELETE FROM leave_request WHERE leave_id = ? AND status = ?")
        .bind(leave.leave_id)
        .bind(LeaveStatus::Pending.as_ref())
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::bad_request("Only PENDING leaves can be deleted"));
    }

    info!(leave_id = leave.leave_id, "Leave deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Leave deleted" })))
}

/// Pending requests awaiting a decision, oldest first (admin)
#[utoipa::path(
    get,
    path = "/api/leaves/pending",
    responses((status = 200, description = "Pending leaves", body = [LeaveResponse])),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn pending_leaves(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let leaves = leaves_where(
        pool.get_ref(),
        "status = ?",
        FilterValue::Str(LeaveStatus::Pending.to_string()),
        "applied_at ASC, leave_id ASC",
    )
    .await?;
    Ok(HttpResponse::Ok().json(leaves))
}

/* =========================
Approve / reject (admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leaves/{leave_id}/decision",
    params(
        ("leave_id" = u64, Path, description = "Leave ID"),
        DecisionQuery
    ),
    responses(
        (status = 200, description = "Leave decided", body = LeaveResponse),
        (status = 400, description = "Already processed or invalid decision", body = ApiError),
        (status = 404, description = "Leave not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn decide_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<DecisionQuery>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let leave_id = path.into_inner();

    let mut tx = pool.begin().await?;

    let emp_id = sqlx::query_scalar::<_, u64>("SELECT emp_id FROM leave_request WHERE leave_id = ?")
        .bind(leave_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Leave not found"))?;

    // decisions for one employee run one at a time, so the approved sum can't move underneath
    sqlx::query("SELECT emp_id FROM employee WHERE emp_id = ? FOR UPDATE")
        .bind(emp_id)
        .execute(&mut *tx)
        .await?;

    let mut leave = sqlx::query_as::<_, LeaveRequest>(&format!(
        "{LEAVE_SELECT} WHERE leave_id = ? FOR UPDATE"
    ))
    .bind(leave_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Leave not found"))?;

    let next = leave.status.decide(&query.decision)?;

    // approvals settle the split against the usage at decision time
    if next == LeaveStatus::Approved {
        let used = used_paid_days_locked(&mut tx, leave.emp_id, leave.leave_type, leave.year).await?;
        leave.settle(used)?;
    }

    let now = Utc::now().naive_utc();
    sqlx::query(
        r#"
        UPDATE leave_request
        SET status = ?, approved_at = ?, approved_by = ?,
            total_days = ?, paid_days = ?, unpaid_days = ?, year = ?
        WHERE leave_id = ?
        "#,
    )
    .bind(next.as_ref())
    .bind(now)
    .bind(auth.user_id)
    .bind(leave.total_days)
    .bind(leave.paid_days)
    .bind(leave.unpaid_days)
    .bind(leave.year)
    .bind(leave_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    leave.status = next;
    leave.approved_at = Some(now);
    leave.approved_by = Some(auth.user_id);

    if let Some(user_id) = owner_user_id(pool.get_ref(), leave.emp_id).await? {
        let kind = if next == LeaveStatus::Approved {
            NotificationKind::LeaveApproved
        } else {
            NotificationKind::LeaveRejected
        };
        notification::record(pool.get_ref(), user_id, kind).await;
    }

    info!(leave_id, status = %next, by = auth.user_id, "Leave decided");
    Ok(HttpResponse::Ok().json(LeaveResponse::from(leave)))
}

/* =========================
Revoke an approved leave (admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leaves/{leave_id}/revoke",
    params(("leave_id" = u64, Path, description = "Leave ID")),
    responses(
        (status = 200, description = "Leave revoked", body = LeaveResponse),
        (status = 400, description = "Not approved or already started", body = ApiError),
        (status = 404, description = "Leave not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn revoke_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let mut leave = find_leave(pool.get_ref(), path.into_inner()).await?;

    let today = Utc::now().date_naive();
    let next = leave.status.revoke(today, leave.start_date)?;

    let now = Utc::now().naive_utc();
    let result = sqlx::query(
        r#"
        UPDATE leave_request
        SET status = ?, approved_at = ?, approved_by = ?
        WHERE leave_id = ? AND status = ?
        "#,
    )
    .bind(next.as_ref())
    .bind(now)
    .bind(auth.user_id)
    .bind(leave.leave_id)
    .bind(LeaveStatus::Approved.as_ref())
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::bad_request("Only APPROVED leaves can be revoked"));
    }

    leave.status = next;
    leave.approved_at = Some(now);
    leave.approved_by = Some(auth.user_id);

    if let Some(user_id) = owner_user_id(pool.get_ref(), leave.emp_id).await? {
        notification::record(pool.get_ref(), user_id, NotificationKind::LeaveRevoked).await;
    }

    info!(leave_id = leave.leave_id, by = auth.user_id, "Leave revoked");
    Ok(HttpResponse::Ok().json(LeaveResponse::from(leave)))
}

/* =========================
Admin search
========================= */
#[utoipa::path(
    get,
    path = "/api/leaves/admin/search",
    params(LeaveSearch),
    responses(
        (status = 200, description = "Matching leaves, newest first", body = [LeaveResponse]),
        (status = 400, description = "Invalid status or type filter", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn search_leaves(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveSearch>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let (conditions, args) = query.filters()?;
    let sql = format!(
        "{LEAVE_SELECT}{} ORDER BY start_date DESC, leave_id DESC",
        where_clause(&conditions)
    );
    debug!(sql = %sql, args = ?args, "Searching leaves");

    let leaves: Vec<LeaveResponse> = bind_filters(sqlx::query_as::<_, LeaveRequest>(&sql), &args)
        .fetch_all(pool.get_ref())
        .await?
        .into_iter()
        .map(LeaveResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(leaves))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn empty_search_has_no_conditions() {
        let (conditions, args) = LeaveSearch::default().filters().unwrap();
        assert!(conditions.is_empty());
        assert!(args.is_empty());
    }

    #[test]
    fn search_normalizes_enum_filters() {
        let search = LeaveSearch {
            emp_id: Some(4),
            status: Some("approved".into()),
            leave_type: Some("Casual".into()),
            year: Some(2026),
            from_date: Some(d(2026, 1, 1)),
            to_date: Some(d(2026, 6, 30)),
        };
        let (conditions, args) = search.filters().unwrap();

        assert_eq!(
            conditions,
            vec![
                "emp_id = ?",
                "status = ?",
                "leave_type = ?",
                "year = ?",
                "start_date >= ?",
                "end_date <= ?"
            ]
        );
        assert_eq!(
            args,
            vec![
                FilterValue::U64(4),
                FilterValue::Str("APPROVED".into()),
                FilterValue::Str("CASUAL".into()),
                FilterValue::I64(2026),
                FilterValue::Date(d(2026, 1, 1)),
                FilterValue::Date(d(2026, 6, 30)),
            ]
        );
    }

    #[test]
    fn search_rejects_unknown_values() {
        let bad_status = LeaveSearch {
            status: Some("archived".into()),
            ..Default::default()
        };
        assert_eq!(
            bad_status.filters().unwrap_err().to_string(),
            "Invalid leave status"
        );

        let bad_type = LeaveSearch {
            leave_type: Some("paternity".into()),
            ..Default::default()
        };
        assert_eq!(
            bad_type.filters().unwrap_err().to_string(),
            "Invalid leave type"
        );
    }
}

use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::user::{ApproveReq, EmployeeEffect, USER_VIEW_SELECT, UserResponse, UserStatus},
    utils::notification::{self, NotificationKind},
};
use actix_web::{HttpResponse, web};
use sqlx::{MySqlConnection, MySqlPool};
use tracing::info;

/// Account view by id, 404 when missing.
pub async fn find_user_view(pool: &MySqlPool, user_id: u64) -> AppResult<UserResponse> {
    sqlx::query_as::<_, UserResponse>(&format!("{USER_VIEW_SELECT} WHERE u.user_id = ?"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

/// Locks the account row for the rest of the transaction.
pub async fn lock_user_status(conn: &mut MySqlConnection, user_id: u64) -> AppResult<UserStatus> {
    let status = sqlx::query_scalar::<_, String>(
        "SELECT status FROM users WHERE user_id = ? FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::not_found("User not found"))?;

    status
        .parse()
        .map_err(|_| AppError::internal(format!("unknown user status '{status}'")))
}

pub async fn set_status(
    conn: &mut MySqlConnection,
    user_id: u64,
    status: UserStatus,
    enabled: bool,
) -> AppResult<()> {
    sqlx::query("UPDATE users SET status = ?, enabled = ? WHERE user_id = ?")
        .bind(status.as_ref())
        .bind(enabled)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Creates or removes the employee record of an account.
pub async fn apply_employee_effect(
    conn: &mut MySqlConnection,
    user_id: u64,
    effect: EmployeeEffect,
) -> AppResult<()> {
    match effect {
        EmployeeEffect::Assign(dept_id) => {
            let dept_exists =
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM dept WHERE dept_id = ?")
                    .bind(dept_id)
                    .fetch_one(&mut *conn)
                    .await?;
            if dept_exists == 0 {
                return Err(AppError::not_found("Department not found"));
            }

            sqlx::query(
                r#"
                INSERT INTO employee (user_id, dept_id, joining_date)
                VALUES (?, ?, CURDATE())
                ON DUPLICATE KEY UPDATE dept_id = VALUES(dept_id)
                "#,
            )
            .bind(user_id)
            .bind(dept_id)
            .execute(&mut *conn)
            .await?;
        }
        EmployeeEffect::Remove => {
            sqlx::query("DELETE FROM employee WHERE user_id = ?")
                .bind(user_id)
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

/// Admins may not lock themselves out.
pub fn ensure_not_self(auth: &AuthUser, user_id: u64) -> AppResult<()> {
    if auth.user_id == user_id {
        return Err(AppError::bad_request(
            "You cannot change the status of your own account",
        ));
    }
    Ok(())
}

/// Registrations waiting for approval, oldest first
#[utoipa::path(
    get,
    path = "/api/admin/approval/pending",
    responses((status = 200, description = "Pending users", body = [UserResponse])),
    security(("bearer_auth" = [])),
    tag = "Approval"
)]
pub async fn pending_users(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let users = sqlx::query_as::<_, UserResponse>(&format!(
        "{USER_VIEW_SELECT} WHERE u.status = ? ORDER BY u.created_at, u.user_id"
    ))
    .bind(UserStatus::Pending.as_ref())
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(users))
}

/// Approve a pending user into a department
#[utoipa::path(
    post,
    path = "/api/admin/approval/approve",
    request_body = ApproveReq,
    responses(
        (status = 200, description = "User approved", body = UserResponse),
        (status = 400, description = "User already processed", body = ApiError),
        (status = 404, description = "User or department not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Approval"
)]
pub async fn approve_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ApproveReq>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let ApproveReq { user_id, dept_id } = payload.into_inner();

    let mut tx = pool.begin().await?;

    let next = lock_user_status(&mut tx, user_id).await?.approve()?;
    apply_employee_effect(&mut tx, user_id, EmployeeEffect::Assign(dept_id)).await?;
    set_status(&mut tx, user_id, next, true).await?;
    notification::record(&mut *tx, user_id, NotificationKind::UserApproved).await;

    tx.commit().await?;

    info!(user_id, dept_id, by = auth.user_id, "User approved");
    Ok(HttpResponse::Ok().json(find_user_view(pool.get_ref(), user_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/approval/reject/{user_id}",
    params(("user_id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User rejected", body = UserResponse),
        (status = 400, description = "User already rejected", body = ApiError),
        (status = 404, description = "User not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Approval"
)]
pub async fn reject_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let user_id = path.into_inner();
    ensure_not_self(&auth, user_id)?;

    let mut tx = pool.begin().await?;

    let next = lock_user_status(&mut tx, user_id).await?.reject()?;
    apply_employee_effect(&mut tx, user_id, EmployeeEffect::Remove).await?;
    set_status(&mut tx, user_id, next, false).await?;
    notification::record(&mut *tx, user_id, NotificationKind::UserRejected).await;

    tx.commit().await?;

    info!(user_id, by = auth.user_id, "User rejected");
    Ok(HttpResponse::Ok().json(find_user_view(pool.get_ref(), user_id).await?))
}

/// Send a rejected user back to the approval queue
#[utoipa::path(
    post,
    path = "/api/admin/approval/reopen/{user_id}",
    params(("user_id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User is pending again", body = UserResponse),
        (status = 400, description = "Only rejected users can be reopened", body = ApiError),
        (status = 404, description = "User not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Approval"
)]
pub async fn reopen_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let user_id = path.into_inner();

    let mut tx = pool.begin().await?;

    let next = lock_user_status(&mut tx, user_id).await?.reopen()?;
    set_status(&mut tx, user_id, next, false).await?;

    tx.commit().await?;

    info!(user_id, by = auth.user_id, "User reopened");
    Ok(HttpResponse::Ok().json(find_user_view(pool.get_ref(), user_id).await?))
}

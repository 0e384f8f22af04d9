use crate::{
    api::approval::{
        apply_employee_effect, ensure_not_self, find_user_view, lock_user_status, set_status,
    },
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::user::{AdminUserUpdate, USER_VIEW_SELECT, UserResponse, UserStatus, admin_status_effect},
    utils::notification::{self, NotificationKind},
};
use actix_web::{HttpResponse, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;

/// Every account with its employee and department, if any
#[utoipa::path(
    get,
    path = "/api/admin/employees",
    responses((status = 200, description = "All users", body = [UserResponse])),
    security(("bearer_auth" = [])),
    tag = "Admin Employees"
)]
pub async fn list_all(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let users = sqlx::query_as::<_, UserResponse>(&format!("{USER_VIEW_SELECT} ORDER BY u.user_id"))
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(users))
}

#[utoipa::path(
    get,
    path = "/api/admin/employees/user/{user_id}",
    params(("user_id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 404, description = "User not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Employees"
)]
pub async fn get_by_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    Ok(HttpResponse::Ok().json(find_user_view(pool.get_ref(), path.into_inner()).await?))
}

/// Edit profile, status and department of any account in one transaction
#[utoipa::path(
    put,
    path = "/api/admin/employees/user/{user_id}",
    params(("user_id" = u64, Path, description = "User ID")),
    request_body = AdminUserUpdate,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Invalid status or missing department", body = ApiError),
        (status = 404, description = "User or department not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Employees"
)]
pub async fn update_by_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AdminUserUpdate>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let user_id = path.into_inner();
    let update = payload.into_inner();

    if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::bad_request("Name must not be empty"));
    }

    let status = match update.status.as_deref() {
        Some(raw) => Some(
            raw.trim()
                .parse::<UserStatus>()
                .map_err(|_| AppError::bad_request("Invalid status"))?,
        ),
        None => None,
    };

    let mut tx = pool.begin().await?;

    let current = lock_user_status(&mut tx, user_id).await?;

    sqlx::query(
        r#"
        UPDATE users
        SET name = COALESCE(?, name), age = COALESCE(?, age), gender = COALESCE(?, gender)
        WHERE user_id = ?
        "#,
    )
    .bind(update.name.as_deref().map(str::trim))
    .bind(update.age)
    .bind(&update.gender)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    match status {
        Some(next) => {
            if next != current {
                ensure_not_self(&auth, user_id)?;
            }
            let (effect, enabled) = admin_status_effect(next, update.dept_id)?;
            apply_employee_effect(&mut tx, user_id, effect).await?;
            set_status(&mut tx, user_id, next, enabled).await?;

            if next != current {
                match next {
                    UserStatus::Approved => {
                        notification::record(&mut *tx, user_id, NotificationKind::UserApproved)
                            .await
                    }
                    UserStatus::Rejected => {
                        notification::record(&mut *tx, user_id, NotificationKind::UserRejected)
                            .await
                    }
                    UserStatus::Pending => {}
                }
            }
        }
        None => {
            // department move for an existing employee
            if let Some(dept_id) = update.dept_id {
                if !current.is_active() {
                    return Err(AppError::bad_request(
                        "Only approved users can be assigned a department",
                    ));
                }
                let (effect, _) = admin_status_effect(UserStatus::Approved, Some(dept_id))?;
                apply_employee_effect(&mut tx, user_id, effect).await?;
            }
        }
    }

    tx.commit().await?;

    info!(user_id, by = auth.user_id, ?status, "User updated by admin");
    Ok(HttpResponse::Ok().json(find_user_view(pool.get_ref(), user_id).await?))
}

/// Delete an employee record; the user account stays
#[utoipa::path(
    delete,
    path = "/api/admin/employees/{emp_id}",
    params(("emp_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee deleted", body = Object, example = json!({
            "message": "Employee deleted"
        })),
        (status = 404, description = "Employee not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Employees"
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let emp_id = path.into_inner();

    let result = sqlx::query("DELETE FROM employee WHERE emp_id = ?")
        .bind(emp_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Employee not found"));
    }

    info!(emp_id, by = auth.user_id, "Employee deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Employee deleted" })))
}

use crate::{
    api::approval::{ensure_not_self, find_user_view, lock_user_status},
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::user::{USER_VIEW_SELECT, UserResponse, UserStatus},
    utils::email_index::EmailKey,
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatusQuery {
    /// PENDING, APPROVED or REJECTED; all users when absent
    pub status: Option<String>,
}

async fn disable(pool: &MySqlPool, user_id: u64) -> AppResult<()> {
    let result = sqlx::query("UPDATE users SET enabled = FALSE WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;

    // 0 also when the flag already had this value
    if result.rows_affected() == 0 {
        find_user_view(pool, user_id).await?;
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/admin/users/{user_id}",
    params(("user_id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 404, description = "User not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let user = find_user_view(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[utoipa::path(
    get,
    path = "/api/admin/users/by-email",
    params(EmailQuery),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 404, description = "User not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user_by_email(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmailQuery>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let email = EmailKey::new(&query.email);

    let user = sqlx::query_as::<_, UserResponse>(&format!("{USER_VIEW_SELECT} WHERE u.email = ?"))
        .bind(email.as_str())
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(user))
}

/// All users, optionally filtered by status
#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(StatusQuery),
    responses(
        (status = 200, description = "Users", body = [UserResponse]),
        (status = 400, description = "Unknown status", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<StatusQuery>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let users = match query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => {
            let status: UserStatus = raw
                .trim()
                .parse()
                .map_err(|_| AppError::bad_request("Invalid status"))?;
            sqlx::query_as::<_, UserResponse>(&format!(
                "{USER_VIEW_SELECT} WHERE u.status = ? ORDER BY u.user_id"
            ))
            .bind(status.as_ref())
            .fetch_all(pool.get_ref())
            .await?
        }
        None => {
            sqlx::query_as::<_, UserResponse>(&format!("{USER_VIEW_SELECT} ORDER BY u.user_id"))
                .fetch_all(pool.get_ref())
                .await?
        }
    };

    Ok(HttpResponse::Ok().json(users))
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{user_id}/enable",
    params(("user_id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User enabled", body = UserResponse),
        (status = 400, description = "User is not approved", body = ApiError),
        (status = 404, description = "User not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn enable_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let user_id = path.into_inner();

    let mut tx = pool.begin().await?;
    lock_user_status(&mut tx, user_id).await?.ensure_can_enable()?;
    sqlx::query("UPDATE users SET enabled = TRUE WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    info!(user_id, by = auth.user_id, "User enabled");

    Ok(HttpResponse::Ok().json(find_user_view(pool.get_ref(), user_id).await?))
}

/// Disable an account; its tokens stop working on the next request
#[utoipa::path(
    put,
    path = "/api/admin/users/{user_id}/disable",
    params(("user_id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User disabled", body = UserResponse),
        (status = 400, description = "Own account", body = ApiError),
        (status = 404, description = "User not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn disable_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let user_id = path.into_inner();
    ensure_not_self(&auth, user_id)?;

    disable(pool.get_ref(), user_id).await?;
    info!(user_id, by = auth.user_id, "User disabled");

    Ok(HttpResponse::Ok().json(find_user_view(pool.get_ref(), user_id).await?))
}

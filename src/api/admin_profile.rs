use crate::{
    api::{approval::find_user_view, employee::update_profile},
    auth::auth::AuthUser,
    error::AppResult,
};
use actix_web::{HttpResponse, web};
use serde_json::Value;
use sqlx::MySqlPool;
use tracing::info;

/// The calling admin's own account
#[utoipa::path(
    get,
    path = "/api/admin/profile",
    responses(
        (status = 200, description = "Own account", body = UserResponse),
        (status = 403, description = "Not an admin", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Profile"
)]
pub async fn get_admin_profile(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    Ok(HttpResponse::Ok().json(find_user_view(pool.get_ref(), auth.user_id).await?))
}

#[utoipa::path(
    put,
    path = "/api/admin/profile",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Updated account", body = UserResponse),
        (status = 400, description = "Invalid or empty update", body = ApiError),
        (status = 403, description = "Not an admin", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Profile"
)]
pub async fn update_admin_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    update_profile(pool.get_ref(), auth.user_id, &body).await?;
    info!(user_id = auth.user_id, "Admin profile updated");

    Ok(HttpResponse::Ok().json(find_user_view(pool.get_ref(), auth.user_id).await?))
}

use std::collections::HashMap;

use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        employee::{EMPLOYEE_ROW_SELECT, EmployeeResponse, EmployeeRow, ProfileUpdate},
        image::ImageResponse,
        user::UserStatus,
    },
    models::{Page, PageQuery},
    utils::db_utils::{
        FilterValue, as_object, bind_filters, build_update_sql, execute_update, like_pattern,
        where_clause,
    },
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::Value;
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::IntoParams;

/// Profile columns a user may change on their own account
pub const PROFILE_COLUMNS: [&str; 3] = ["name", "age", "gender"];

const DEFAULT_PER_PAGE: u32 = 5;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmployeeQuery {
    /// Page number, starting with 1
    pub page: Option<u32>,
    /// Items per page (default 5, at most 100)
    pub per_page: Option<u32>,
    /// Case-insensitive match on name or email
    pub search: Option<String>,
}

/// Attaches the image links of each row's user, keeping row order.
pub async fn attach_images(
    pool: &MySqlPool,
    rows: Vec<EmployeeRow>,
) -> AppResult<Vec<EmployeeResponse>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; rows.len()].join(", ");
    let sql = format!(
        "SELECT user_id, image_id, file_name FROM images WHERE user_id IN ({placeholders}) ORDER BY image_id"
    );

    let mut query = sqlx::query_as::<_, (u64, u64, String)>(&sql);
    for row in &rows {
        query = query.bind(row.user_id);
    }

    let mut by_user: HashMap<u64, Vec<ImageResponse>> = HashMap::new();
    for (user_id, image_id, file_name) in query.fetch_all(pool).await? {
        by_user
            .entry(user_id)
            .or_default()
            .push(ImageResponse::new(image_id, &file_name));
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let images = by_user.remove(&row.user_id).unwrap_or_default();
            EmployeeResponse::from_row(row, images)
        })
        .collect())
}

/// Full employee view by `emp_id`.
pub async fn find_employee(pool: &MySqlPool, emp_id: u64) -> AppResult<Option<EmployeeResponse>> {
    let row = sqlx::query_as::<_, EmployeeRow>(&format!("{EMPLOYEE_ROW_SELECT} WHERE e.emp_id = ?"))
        .bind(emp_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(attach_images(pool, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

/// Applies a partial name/age/gender change to `users`.
pub async fn update_profile(pool: &MySqlPool, user_id: u64, body: &Value) -> AppResult<()> {
    let fields = as_object(body)?;

    // typed pass first so bad values fail with a readable message
    let parsed: ProfileUpdate = serde_json::from_value(body.clone())
        .map_err(|e| AppError::bad_request(format!("Invalid profile: {e}")))?;
    if parsed.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::bad_request("Name must not be empty"));
    }
    if parsed.age.is_some_and(|a| !(0..=150).contains(&a)) {
        return Err(AppError::bad_request("Age must be between 0 and 150"));
    }

    let Some(update) = build_update_sql("users", fields, &PROFILE_COLUMNS, "user_id", user_id)?
    else {
        return Err(AppError::bad_request("Nothing to update"));
    };

    execute_update(pool, update).await?;
    Ok(())
}

/// The caller's own employee record
#[utoipa::path(
    get,
    path = "/api/employees/me",
    responses(
        (status = 200, description = "Own employee record", body = EmployeeResponse),
        (status = 404, description = "No employee record", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn get_me(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    let emp_id = auth.employee_id(pool.get_ref()).await?;

    let employee = find_employee(pool.get_ref(), emp_id)
        .await?
        .ok_or_else(|| AppError::not_found("Employee not found"))?;

    Ok(HttpResponse::Ok().json(employee))
}

/// Update the caller's own name, age or gender
#[utoipa::path(
    put,
    path = "/api/employees/me",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Updated employee record", body = EmployeeResponse),
        (status = 400, description = "Invalid or empty update", body = ApiError),
        (status = 404, description = "No employee record", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn update_me(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    let emp_id = auth.employee_id(pool.get_ref()).await?;

    update_profile(pool.get_ref(), auth.user_id, &body).await?;
    info!(user_id = auth.user_id, "Profile updated");

    let employee = find_employee(pool.get_ref(), emp_id)
        .await?
        .ok_or_else(|| AppError::not_found("Employee not found"))?;

    Ok(HttpResponse::Ok().json(employee))
}

/// Paginated employee directory
#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeePage)
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> AppResult<HttpResponse> {
    let (page, per_page, offset) = PageQuery {
        page: query.page,
        per_page: query.per_page,
    }
    .resolve(DEFAULT_PER_PAGE);

    // ---------- build WHERE clause dynamically ----------
    let mut conditions = Vec::new();
    let mut args: Vec<FilterValue> = Vec::new();

    if !auth.is_admin() {
        conditions.push("u.status = ?");
        args.push(FilterValue::Str(UserStatus::Approved.to_string()));
    }

    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        conditions.push("(LOWER(u.name) LIKE ? OR LOWER(u.email) LIKE ?)");
        let like = like_pattern(search);
        args.push(FilterValue::Str(like.clone()));
        args.push(FilterValue::Str(like));
    }

    let where_sql = where_clause(&conditions);

    // ---------- total count ----------
    let count_sql = format!(
        "SELECT COUNT(*) FROM employee e JOIN users u ON u.user_id = e.user_id{where_sql}"
    );
    let (total,) = bind_filters(sqlx::query_as::<_, (i64,)>(&count_sql), &args)
        .fetch_one(pool.get_ref())
        .await?;

    // ---------- data query ----------
    let data_sql = format!("{EMPLOYEE_ROW_SELECT}{where_sql} ORDER BY e.emp_id LIMIT ? OFFSET ?");
    debug!(sql = %data_sql, page, per_page, offset, "Fetching employees");

    let rows = bind_filters(sqlx::query_as::<_, EmployeeRow>(&data_sql), &args)
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    let data = attach_images(pool.get_ref(), rows).await?;

    Ok(HttpResponse::Ok().json(Page {
        data,
        page,
        per_page,
        total,
    }))
}

/// Get Employee by ID; non-admins only see approved employees
#[utoipa::path(
    get,
    path = "/api/employees/{emp_id}",
    params(("emp_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = EmployeeResponse),
        (status = 404, description = "Employee not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let emp_id = path.into_inner();

    let employee = find_employee(pool.get_ref(), emp_id)
        .await?
        .filter(|e| auth.is_admin() || e.status == UserStatus::Approved)
        .ok_or_else(|| AppError::not_found("Employee not found"))?;

    Ok(HttpResponse::Ok().json(employee))
}

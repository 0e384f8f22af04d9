use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::holiday::{Holiday, HolidayReq, HolidayUpdate, month_range, year_range},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;

const HOLIDAY_SELECT: &str = r#"
    SELECT holiday_id, holiday_name, holiday_date, holiday_type, is_optional, description
    FROM holiday
"#;

async fn holidays_between(
    pool: &MySqlPool,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<Vec<Holiday>> {
    let holidays = sqlx::query_as::<_, Holiday>(&format!(
        "{HOLIDAY_SELECT} WHERE holiday_date BETWEEN ? AND ? ORDER BY holiday_date"
    ))
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    Ok(holidays)
}

async fn find_holiday(pool: &MySqlPool, holiday_id: u64) -> AppResult<Holiday> {
    sqlx::query_as::<_, Holiday>(&format!("{HOLIDAY_SELECT} WHERE holiday_id = ?"))
        .bind(holiday_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Holiday not found"))
}

/// Add a holiday (admin); one holiday per date
#[utoipa::path(
    post,
    path = "/api/holidays",
    request_body = HolidayReq,
    responses(
        (status = 201, description = "Holiday created", body = Holiday),
        (status = 400, description = "Invalid payload", body = ApiError),
        (status = 409, description = "A holiday already exists on that date", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn create_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<HolidayReq>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let req = payload.into_inner();

    let name = req.holiday_name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("Holiday name must not be empty"));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO holiday (holiday_name, holiday_date, holiday_type, is_optional, description)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(req.holiday_date)
    .bind(req.holiday_type.as_ref())
    .bind(req.is_optional)
    .bind(&req.description)
    .execute(pool.get_ref())
    .await
    .map_err(|e| AppError::from_db_conflict(e, "Holiday already exists on this date"))?;

    let holiday = Holiday {
        holiday_id: result.last_insert_id(),
        holiday_name: name.to_string(),
        holiday_date: req.holiday_date,
        holiday_type: req.holiday_type,
        is_optional: req.is_optional,
        description: req.description,
    };
    info!(holiday_id = holiday.holiday_id, date = %holiday.holiday_date, "Holiday created");

    Ok(HttpResponse::Created().json(holiday))
}

/// Update a holiday (admin); the date is fixed
#[utoipa::path(
    put,
    path = "/api/holidays/{holiday_id}",
    params(("holiday_id" = u64, Path, description = "Holiday ID")),
    request_body = HolidayUpdate,
    responses(
        (status = 200, description = "Holiday updated", body = Holiday),
        (status = 400, description = "Invalid change", body = ApiError),
        (status = 404, description = "Holiday not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn update_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<HolidayUpdate>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let mut holiday = find_holiday(pool.get_ref(), path.into_inner()).await?;
    holiday.apply(payload.into_inner())?;

    sqlx::query(
        r#"
        UPDATE holiday
        SET holiday_name = ?, holiday_type = ?, is_optional = ?, description = ?
        WHERE holiday_id = ?
        "#,
    )
    .bind(&holiday.holiday_name)
    .bind(holiday.holiday_type.as_ref())
    .bind(holiday.is_optional)
    .bind(&holiday.description)
    .bind(holiday.holiday_id)
    .execute(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(holiday))
}

#[utoipa::path(
    delete,
    path = "/api/holidays/{holiday_id}",
    params(("holiday_id" = u64, Path, description = "Holiday ID")),
    responses(
        (status = 200, description = "Holiday deleted", body = Object, example = json!({
            "message": "Holiday deleted"
        })),
        (status = 404, description = "Holiday not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn delete_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let holiday_id = path.into_inner();

    let result = sqlx::query("DELETE FROM holiday WHERE holiday_id = ?")
        .bind(holiday_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Holiday not found"));
    }

    info!(holiday_id, by = auth.user_id, "Holiday deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Holiday deleted" })))
}

#[utoipa::path(
    get,
    path = "/api/holidays/year/{year}",
    params(("year" = i32, Path, description = "Calendar year")),
    responses((status = 200, description = "Holidays of the year, by date", body = [Holiday])),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn holidays_by_year(
    pool: web::Data<MySqlPool>,
    path: web::Path<i32>,
) -> AppResult<HttpResponse> {
    let (from, to) = year_range(path.into_inner())?;
    let holidays = holidays_between(pool.get_ref(), from, to).await?;
    Ok(HttpResponse::Ok().json(holidays))
}

#[utoipa::path(
    get,
    path = "/api/holidays/year/{year}/month/{month}",
    params(
        ("year" = i32, Path, description = "Calendar year"),
        ("month" = u32, Path, description = "Month, 1 to 12")
    ),
    responses(
        (status = 200, description = "Holidays of the month, by date", body = [Holiday]),
        (status = 400, description = "Month out of range", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn holidays_by_month(
    pool: web::Data<MySqlPool>,
    path: web::Path<(i32, u32)>,
) -> AppResult<HttpResponse> {
    let (year, month) = path.into_inner();
    let (from, to) = month_range(year, month)?;
    let holidays = holidays_between(pool.get_ref(), from, to).await?;
    Ok(HttpResponse::Ok().json(holidays))
}

use crate::{
    api::employee::attach_images,
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{
        department::{Department, DepartmentReq},
        employee::{EMPLOYEE_ROW_SELECT, EmployeeRow},
    },
};
use actix_web::{HttpResponse, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;

async fn find_department(pool: &MySqlPool, dept_id: u64) -> AppResult<Department> {
    sqlx::query_as::<_, Department>("SELECT dept_id, dept_name FROM dept WHERE dept_id = ?")
        .bind(dept_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Department not found"))
}

/// Create a department (admin)
#[utoipa::path(
    post,
    path = "/api/departments",
    request_body = DepartmentReq,
    responses(
        (status = 201, description = "Department created", body = Department),
        (status = 400, description = "Empty name", body = ApiError),
        (status = 409, description = "Department already exists", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn create_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<DepartmentReq>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let dept_name = payload.name()?;

    let result = sqlx::query("INSERT INTO dept (dept_name) VALUES (?)")
        .bind(dept_name)
        .execute(pool.get_ref())
        .await
        .map_err(|e| AppError::from_db_conflict(e, "Department already exists"))?;

    let dept = Department {
        dept_id: result.last_insert_id(),
        dept_name: dept_name.to_string(),
    };
    info!(dept_id = dept.dept_id, by = auth.user_id, "Department created");

    Ok(HttpResponse::Created().json(dept))
}

#[utoipa::path(
    get,
    path = "/api/departments",
    responses((status = 200, description = "All departments", body = [Department])),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn list_departments(pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    let depts =
        sqlx::query_as::<_, Department>("SELECT dept_id, dept_name FROM dept ORDER BY dept_name")
            .fetch_all(pool.get_ref())
            .await?;

    Ok(HttpResponse::Ok().json(depts))
}

#[utoipa::path(
    get,
    path = "/api/departments/{dept_id}",
    params(("dept_id" = u64, Path, description = "Department ID")),
    responses(
        (status = 200, description = "Department found", body = Department),
        (status = 404, description = "Department not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn get_department(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let dept = find_department(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(dept))
}

/// Rename a department (admin)
#[utoipa::path(
    put,
    path = "/api/departments/{dept_id}",
    params(("dept_id" = u64, Path, description = "Department ID")),
    request_body = DepartmentReq,
    responses(
        (status = 200, description = "Department renamed", body = Department),
        (status = 404, description = "Department not found", body = ApiError),
        (status = 409, description = "Name taken by another department", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn update_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<DepartmentReq>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let dept_id = path.into_inner();
    let dept_name = payload.name()?;

    // existence first: MySQL reports 0 affected rows for an unchanged name too
    find_department(pool.get_ref(), dept_id).await?;

    sqlx::query("UPDATE dept SET dept_name = ? WHERE dept_id = ?")
        .bind(dept_name)
        .bind(dept_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| AppError::from_db_conflict(e, "Department already exists"))?;

    Ok(HttpResponse::Ok().json(Department {
        dept_id,
        dept_name: dept_name.to_string(),
    }))
}

/// Delete a department (admin); refused while employees are assigned
#[utoipa::path(
    delete,
    path = "/api/departments/{dept_id}",
    params(("dept_id" = u64, Path, description = "Department ID")),
    responses(
        (status = 200, description = "Department deleted", body = Object, example = json!({
            "message": "Department deleted"
        })),
        (status = 404, description = "Department not found", body = ApiError),
        (status = 409, description = "Employees still assigned", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn delete_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let dept_id = path.into_inner();

    find_department(pool.get_ref(), dept_id).await?;

    let assigned = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employee WHERE dept_id = ?")
        .bind(dept_id)
        .fetch_one(pool.get_ref())
        .await?;
    if assigned > 0 {
        return Err(AppError::conflict(format!(
            "Department still has {assigned} employee(s)"
        )));
    }

    sqlx::query("DELETE FROM dept WHERE dept_id = ?")
        .bind(dept_id)
        .execute(pool.get_ref())
        .await
        // FK race with a concurrent approval
        .map_err(|e| AppError::from_db_conflict(e, "Department still has employees"))?;

    info!(dept_id, by = auth.user_id, "Department deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Department deleted" })))
}

#[utoipa::path(
    get,
    path = "/api/departments/{dept_id}/employees",
    params(("dept_id" = u64, Path, description = "Department ID")),
    responses(
        (status = 200, description = "Employees of the department", body = [EmployeeResponse]),
        (status = 404, description = "Department not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn department_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let dept_id = path.into_inner();
    find_department(pool.get_ref(), dept_id).await?;

    let sql = if auth.is_admin() {
        format!("{EMPLOYEE_ROW_SELECT} WHERE e.dept_id = ? ORDER BY e.emp_id")
    } else {
        format!("{EMPLOYEE_ROW_SELECT} WHERE e.dept_id = ? AND u.status = 'APPROVED' ORDER BY e.emp_id")
    };

    let rows = sqlx::query_as::<_, EmployeeRow>(&sql)
        .bind(dept_id)
        .fetch_all(pool.get_ref())
        .await?;

    let employees = attach_images(pool.get_ref(), rows).await?;
    Ok(HttpResponse::Ok().json(employees))
}

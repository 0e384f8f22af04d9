use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::image::ImageResponse;
use crate::model::user::UserStatus;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Employee {
    pub emp_id: u64,
    pub user_id: u64,
    pub dept_id: u64,
    pub joining_date: NaiveDate,
}

/// Employee joined with its user and department, before images are attached.
#[derive(Debug, sqlx::FromRow)]
pub struct EmployeeRow {
    pub emp_id: u64,
    pub user_id: u64,
    pub name: String,
    pub email: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: UserStatus,
    pub dept_id: Option<u64>,
    pub dept_name: Option<String>,
}

pub const EMPLOYEE_ROW_SELECT: &str = r#"
    SELECT e.emp_id, u.user_id, u.name, u.email, u.age, u.gender, u.status,
           d.dept_id, d.dept_name
    FROM employee e
    JOIN users u ON u.user_id = e.user_id
    LEFT JOIN dept d ON d.dept_id = e.dept_id
"#;

#[derive(Debug, Serialize, ToSchema)]
#[schema(
    example = json!({
        "emp_id": 1,
        "name": "John Doe",
        "email": "john.doe@company.com",
        "department": "Engineering",
        "dept_id": 10,
        "images": [{"image_id": 4, "file_name": "/api/images/by-name/8d1c_avatar.png"}],
        "age": 31,
        "gender": "male",
        "status": "APPROVED"
    })
)]
pub struct EmployeeResponse {
    #[schema(example = 1)]
    pub emp_id: u64,
    #[schema(example = "John Doe")]
    pub name: String,
    #[schema(example = "john.doe@company.com")]
    pub email: String,
    #[schema(example = "Engineering", nullable = true)]
    pub department: Option<String>,
    #[schema(example = 10, nullable = true)]
    pub dept_id: Option<u64>,
    pub images: Vec<ImageResponse>,
    #[schema(example = 31, nullable = true)]
    pub age: Option<i32>,
    #[schema(example = "male", nullable = true)]
    pub gender: Option<String>,
    pub status: UserStatus,
}

impl EmployeeResponse {
    pub fn from_row(row: EmployeeRow, images: Vec<ImageResponse>) -> Self {
        Self {
            emp_id: row.emp_id,
            name: row.name,
            email: row.email,
            department: row.dept_name,
            dept_id: row.dept_id,
            images,
            age: row.age,
            gender: row.gender,
            status: row.status,
        }
    }
}

/// Self-service or admin profile change; absent fields stay untouched.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    #[schema(example = "Jane Doe")]
    pub name: Option<String>,
    #[schema(example = 29)]
    pub age: Option<i32>,
    #[schema(example = "female")]
    pub gender: Option<String>,
}

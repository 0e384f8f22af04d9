use crate::error::ApiError;
use crate::model::department::{Department, DepartmentReq};
use crate::model::employee::{EmployeeResponse, ProfileUpdate};
use crate::model::holiday::{Holiday, HolidayReq, HolidayType, HolidayUpdate};
use crate::model::image::ImageResponse;
use crate::model::leave_request::{LeaveApply, LeaveEdit, LeaveResponse, LeaveStatus, LeaveType};
use crate::model::role::Role;
use crate::model::user::{AdminUserUpdate, ApproveReq, UserResponse, UserStatus};
use crate::models::{EmployeePage, LoginReqDto, LoginResponse, RegisterReq, RegisterResponse};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HR Self-Service API",
        version = "1.0.0",
        description = r#"
## HR Self-Service

Backend for an employee self-service portal.

### Features
- **Accounts**: registration with an optional profile picture, approval by an admin, login with JWT access and refresh tokens
- **Employees**: own profile, employee directory with search and pagination
- **Departments** and **holidays** maintained by admins
- **Leave**: apply, edit or withdraw while pending, approval with paid/unpaid split against the yearly quota, revocation
- **Images**: stored on disk, served publicly by id or file name

### Security
Endpoints other than auth and image reads require `Authorization: Bearer <access_token>`.
Admin endpoints additionally require the `ADMIN` role.

### Errors
Every error body has the shape `{"status", "error", "message", "timestamp"}`.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::employee::get_me,
        crate::api::employee::update_me,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,

        crate::api::department::create_department,
        crate::api::department::list_departments,
        crate::api::department::get_department,
        crate::api::department::update_department,
        crate::api::department::delete_department,
        crate::api::department::department_employees,

        crate::api::holiday::create_holiday,
        crate::api::holiday::update_holiday,
        crate::api::holiday::delete_holiday,
        crate::api::holiday::holidays_by_year,
        crate::api::holiday::holidays_by_month,

        crate::api::leave_request::apply_leave,
        crate::api::leave_request::my_leaves,
        crate::api::leave_request::edit_leave,
        crate::api::leave_request::delete_leave,
        crate::api::leave_request::pending_leaves,
        crate::api::leave_request::decide_leave,
        crate::api::leave_request::revoke_leave,
        crate::api::leave_request::search_leaves,

        crate::api::image::get_image_by_id,
        crate::api::image::get_image_by_name,
        crate::api::image::delete_image_by_id,
        crate::api::image::delete_image_by_name,
        crate::api::image::upload_employee_images,
        crate::api::image::upload_user_images,

        crate::api::admin_profile::get_admin_profile,
        crate::api::admin_profile::update_admin_profile,

        crate::api::users::get_user,
        crate::api::users::get_user_by_email,
        crate::api::users::list_users,
        crate::api::users::enable_user,
        crate::api::users::disable_user,

        crate::api::approval::pending_users,
        crate::api::approval::approve_user,
        crate::api::approval::reject_user,
        crate::api::approval::reopen_user,

        crate::api::admin_employee::list_all,
        crate::api::admin_employee::get_by_user,
        crate::api::admin_employee::update_by_user,
        crate::api::admin_employee::delete_employee
    ),
    components(
        schemas(
            ApiError,
            RegisterReq,
            RegisterResponse,
            LoginReqDto,
            LoginResponse,
            Role,
            UserStatus,
            UserResponse,
            ApproveReq,
            AdminUserUpdate,
            EmployeeResponse,
            EmployeePage,
            ProfileUpdate,
            ImageResponse,
            Department,
            DepartmentReq,
            Holiday,
            HolidayType,
            HolidayReq,
            HolidayUpdate,
            LeaveType,
            LeaveStatus,
            LeaveResponse,
            LeaveApply,
            LeaveEdit
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login and token refresh"),
        (name = "Employee", description = "Own profile and employee directory"),
        (name = "Department", description = "Department management"),
        (name = "Holiday", description = "Holiday calendar"),
        (name = "Leave", description = "Leave requests and approval"),
        (name = "Image", description = "Profile pictures"),
        (name = "Admin Profile", description = "The admin's own account"),
        (name = "Users", description = "Account administration"),
        (name = "Approval", description = "Registration approval queue"),
        (name = "Admin Employees", description = "Employee administration"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::openapi::PathItemType;

    #[test]
    fn document_lists_every_scope() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/auth/login",
            "/api/employees/me",
            "/api/departments/{dept_id}",
            "/api/holidays/year/{year}/month/{month}",
            "/api/leaves/{leave_id}/decision",
            "/api/images/by-name/{file_name}",
            "/api/admin/approval/approve",
            "/api/images/upload/{emp_id}",
            "/api/images/upload/user/{user_id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn uploads_are_documented_as_multipart() {
        let doc = ApiDoc::openapi();
        for path in ["/api/images/upload/{emp_id}", "/api/images/upload/user/{user_id}"] {
            let body = doc.paths.paths[path].operations[&PathItemType::Post]
                .request_body
                .as_ref()
                .unwrap();
            assert!(body.content.contains_key("multipart/form-data"), "{path}");
        }
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}

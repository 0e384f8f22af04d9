pub mod admin_employee;
pub mod admin_profile;
pub mod approval;
pub mod department;
pub mod employee;
pub mod holiday;
pub mod image;
pub mod leave_request;
pub mod users;

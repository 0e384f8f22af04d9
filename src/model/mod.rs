pub mod department;
pub mod employee;
pub mod holiday;
pub mod image;
pub mod leave_quota;
pub mod leave_request;
pub mod role;
pub mod user;

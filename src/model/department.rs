use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Department {
    #[schema(example = 1)]
    pub dept_id: u64,
    #[schema(example = "Engineering")]
    pub dept_name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DepartmentReq {
    #[schema(example = "Engineering")]
    pub dept_name: String,
}

impl DepartmentReq {
    /// Trimmed, non-empty department name.
    pub fn name(&self) -> Result<&str, crate::error::AppError> {
        let name = self.dept_name.trim();
        if name.is_empty() {
            return Err(crate::error::AppError::bad_request(
                "Department name must not be empty",
            ));
        }
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_trimmed_and_required() {
        let req = DepartmentReq { dept_name: "  Finance ".into() };
        assert_eq!(req.name().unwrap(), "Finance");

        let blank = DepartmentReq { dept_name: "   ".into() };
        assert!(blank.name().is_err());
    }
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::image::ImageResponse;
use crate::model::role::Role;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterReq {
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "jane@company.com", format = "email")]
    pub email: String,
    #[schema(example = "s3cret-pass")]
    pub password: String,
    #[schema(example = 29)]
    pub age: Option<i32>,
    #[schema(example = "female")]
    pub gender: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    #[schema(example = 12)]
    pub user_id: u64,
    #[schema(example = "Registered successfully. Wait for admin approval")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "jane@company.com", format = "email")]
    pub email: String,
    #[schema(example = "s3cret-pass")]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    /// Account e-mail
    pub sub: String,
    pub role: Role,
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}

/// One page of a list endpoint.
#[derive(Debug, Serialize, ToSchema)]
#[aliases(
    EmployeePage = Page<crate::model::employee::EmployeeResponse>
)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct PageQuery {
    /// Page number, starting with 1
    pub page: Option<u32>,
    /// Items per page, at most 100
    pub per_page: Option<u32>,
}

impl PageQuery {
    /// Returns `(page, per_page, offset)` with the defaults applied.
    pub fn resolve(&self, default_per_page: u32) -> (u32, u32, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(default_per_page).clamp(1, 100);
        let offset = u64::from(page - 1) * u64::from(per_page);
        (page, per_page, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_bounds() {
        let q = PageQuery { page: None, per_page: None };
        assert_eq!(q.resolve(5), (1, 5, 0));

        let q = PageQuery { page: Some(0), per_page: Some(1000) };
        assert_eq!(q.resolve(5), (1, 100, 0));

        let q = PageQuery { page: Some(3), per_page: Some(20) };
        assert_eq!(q.resolve(5), (3, 20, 40));
    }

    #[test]
    fn claims_round_trip_through_json() {
        let claims = Claims {
            user_id: 7,
            sub: "a@b.c".into(),
            role: Role::Admin,
            exp: 10,
            jti: "j".into(),
            token_type: TokenType::Refresh,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["role"], "ADMIN");
        assert_eq!(json["token_type"], "Refresh");
    }
}

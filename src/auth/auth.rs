use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use crate::models::TokenType;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};
use sqlx::MySqlPool;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub role: Role,
}

/// Pulls the bearer token out of an `Authorization` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AppError> {
    let header = header.ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?;
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("Authorization header must start with Bearer"))
}

impl AuthUser {
    /// Decodes an access token into the caller identity.
    pub fn from_token(token: &str, secret: &str) -> Result<Self, AppError> {
        let claims = verify_token(token, secret)
            .map_err(|_| AppError::unauthorized("Invalid or expired token"))?;

        if claims.token_type != TokenType::Access {
            return Err(AppError::unauthorized("Access token required"));
        }

        Ok(AuthUser {
            user_id: claims.user_id,
            email: claims.sub,
            role: claims.role,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("This cannot be accessed!"))
        }
    }

    /// Admins may act on anyone, everybody else only on themselves.
    pub fn require_self_or_admin(&self, user_id: u64) -> Result<(), AppError> {
        if self.is_admin() || self.user_id == user_id {
            Ok(())
        } else {
            Err(AppError::forbidden("Not allowed"))
        }
    }

    /// Employee record of the caller; missing once the account got rejected.
    pub async fn employee_id(&self, pool: &MySqlPool) -> Result<u64, AppError> {
        sqlx::query_scalar::<_, u64>("SELECT emp_id FROM employee WHERE user_id = ?")
            .bind(self.user_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::not_found("Employee not found"))
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match bearer_token(
            req.headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok()),
        ) {
            Ok(t) => t,
            Err(e) => return ready(Err(e)),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => return ready(Err(AppError::internal("Config missing"))),
        };

        ready(AuthUser::from_token(token, &config.jwt_secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};
    use actix_web::test::TestRequest;

    const SECRET: &str = "extractor-secret";

    fn config() -> Config {
        Config::from_lookup(|key| match key {
            "SERVER_ADDR" => Some("127.0.0.1:0".into()),
            "DATABASE_URL" => Some("mysql://localhost/test".into()),
            "JWT_SECRET" => Some(SECRET.into()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert!(bearer_token(Some("Basic abc")).is_err());
        assert!(bearer_token(Some("Bearer ")).is_err());
        assert!(bearer_token(None).is_err());
    }

    #[test]
    fn refresh_token_cannot_authenticate_requests() {
        let (token, _) = generate_refresh_token(1, "a@b.c", Role::Admin, SECRET, 60).unwrap();
        let err = AuthUser::from_token(&token, SECRET).unwrap_err();
        assert_eq!(err.to_string(), "Access token required");
    }

    #[test]
    fn role_checks() {
        let admin = AuthUser { user_id: 1, email: "a@x".into(), role: Role::Admin };
        let emp = AuthUser { user_id: 2, email: "e@x".into(), role: Role::Employee };

        assert!(admin.require_admin().is_ok());
        assert!(emp.require_admin().is_err());
        assert!(emp.require_self_or_admin(2).is_ok());
        assert!(emp.require_self_or_admin(3).is_err());
        assert!(admin.require_self_or_admin(3).is_ok());
    }

    #[actix_web::test]
    async fn extracts_from_header() {
        let token = generate_access_token(9, "nine@corp.io", Role::Employee, SECRET, 60).unwrap();
        let req = TestRequest::default()
            .app_data(Data::new(config()))
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_http_request();

        let user = AuthUser::extract(&req).await.unwrap();
        assert_eq!(user.user_id, 9);
        assert_eq!(user.email, "nine@corp.io");
    }

    #[actix_web::test]
    async fn prefers_identity_set_by_middleware() {
        let req = TestRequest::default().to_http_request();
        req.extensions_mut().insert(AuthUser {
            user_id: 5,
            email: "five@corp.io".into(),
            role: Role::Admin,
        });

        let user = AuthUser::extract(&req).await.unwrap();
        assert_eq!(user.user_id, 5);
    }

    #[actix_web::test]
    async fn missing_header_is_unauthorized() {
        let req = TestRequest::default()
            .app_data(Data::new(config()))
            .to_http_request();
        assert!(matches!(
            AuthUser::extract(&req).await,
            Err(AppError::Unauthorized(_))
        ));
    }
}

use crate::auth::auth::{AuthUser, bearer_token};
use crate::config::Config;
use crate::error::AppError;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    http::Method,
    web::Data,
};
use sqlx::MySqlPool;

/// Authenticates every request of a protected scope and stores the caller as `AuthUser`.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    match authenticate(&req).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.call(req).await
        }
        Err(e) => {
            tracing::debug!(path = %req.path(), error = %e, "Rejected unauthenticated request");
            let resp = e.error_response();
            Ok(req.into_response(resp.map_into_boxed_body()))
        }
    }
}

/// Like `auth_middleware`, but GET and HEAD requests pass through anonymously.
pub async fn auth_unless_read(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    if matches!(*req.method(), Method::GET | Method::HEAD) {
        return next.call(req).await;
    }
    auth_middleware(req, next).await
}

async fn authenticate(req: &ServiceRequest) -> Result<AuthUser, AppError> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| AppError::internal("App config missing"))?;

    let header = match req.headers().get("Authorization") {
        Some(h) => Some(
            h.to_str()
                .map_err(|_| AppError::unauthorized("Invalid Authorization header encoding"))?,
        ),
        None => None,
    };

    let user = AuthUser::from_token(bearer_token(header)?, &config.jwt_secret)?;

    // tokens of accounts disabled after issuance stop working immediately
    let pool = req
        .app_data::<Data<MySqlPool>>()
        .ok_or_else(|| AppError::internal("Database pool missing"))?;

    let enabled = sqlx::query_scalar::<_, bool>("SELECT enabled FROM users WHERE user_id = ?")
        .bind(user.user_id)
        .fetch_optional(pool.get_ref())
        .await?;

    match enabled {
        Some(true) => Ok(user),
        Some(false) => Err(AppError::unauthorized("User account is not approved yet")),
        None => Err(AppError::unauthorized("User not found")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::middleware::from_fn;
    use actix_web::{App, HttpResponse, test, web};

    fn config() -> Config {
        Config::from_lookup(|key| match key {
            "SERVER_ADDR" => Some("127.0.0.1:0".into()),
            "DATABASE_URL" => Some("mysql://localhost/test".into()),
            "JWT_SECRET" => Some("mw-secret".into()),
            _ => None,
        })
        .unwrap()
    }

    #[actix_web::test]
    async fn missing_token_gets_json_401() {
        let app = test::init_service(
            App::new().app_data(Data::new(config())).service(
                web::scope("/api")
                    .wrap(from_fn(auth_middleware))
                    .route("/ping", web::get().to(HttpResponse::Ok)),
            ),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/ping").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Missing Authorization header");
    }

    #[actix_web::test]
    async fn garbage_token_gets_401() {
        let app = test::init_service(
            App::new().app_data(Data::new(config())).service(
                web::scope("/api")
                    .wrap(from_fn(auth_middleware))
                    .route("/ping", web::get().to(HttpResponse::Ok)),
            ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/ping")
            .insert_header(("Authorization", "Bearer not.a.jwt"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Invalid or expired token");
    }

    #[actix_web::test]
    async fn reads_pass_writes_need_token() {
        let app = test::init_service(
            App::new().app_data(Data::new(config())).service(
                web::scope("/api/images")
                    .wrap(from_fn(auth_unless_read))
                    .route("/1", web::get().to(HttpResponse::Ok))
                    .route("/1", web::delete().to(HttpResponse::NoContent)),
            ),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/images/1").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);

        let req = test::TestRequest::delete().uri("/api/images/1").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 401);
    }
}

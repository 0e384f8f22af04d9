use crate::{
    api::{
        admin_employee, admin_profile, approval, department, employee, holiday, image,
        leave_request, users,
    },
    auth::{
        handlers,
        middleware::{auth_middleware, auth_unless_read},
    },
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / u64::from(requests_per_min)).max(1);

    // both values are non-zero, the only case finish() rejects
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    cfg.service(
        web::scope(&config.api_prefix)
            // Public routes
            .service(
                web::scope("/auth")
                    .service(
                        web::resource("/login")
                            .wrap(login_limiter.clone())
                            .route(web::post().to(handlers::login)),
                    )
                    .service(
                        web::resource("/register")
                            .wrap(register_limiter.clone())
                            .route(web::post().to(handlers::register)),
                    )
                    .service(
                        web::resource("/refresh")
                            .wrap(refresh_limiter.clone())
                            .route(web::post().to(handlers::refresh_token)),
                    )
                    .service(
                        web::resource("/logout")
                            .wrap(login_limiter.clone())
                            .route(web::post().to(handlers::logout)),
                    ),
            )
            // image reads are public, uploads and deletes are not
            .service(
                web::scope("/images")
                    .wrap(from_fn(auth_unless_read))
                    .wrap(protected_limiter.clone())
                    .service(
                        web::resource("/upload/user/{user_id}")
                            .route(web::post().to(image::upload_user_images)),
                    )
                    .service(
                        web::resource("/upload/{emp_id}")
                            .route(web::post().to(image::upload_employee_images)),
                    )
                    .service(
                        web::resource("/by-name/{file_name}")
                            .route(web::get().to(image::get_image_by_name))
                            .route(web::delete().to(image::delete_image_by_name)),
                    )
                    .service(
                        web::resource("/{image_id}")
                            .route(web::get().to(image::get_image_by_id))
                            .route(web::delete().to(image::delete_image_by_id)),
                    ),
            )
            // Protected routes
            .service(
                web::scope("")
                    .wrap(from_fn(auth_middleware)) // authentication
                    .wrap(protected_limiter) // rate limiting
                    .service(
                        web::scope("/employees")
                            .service(
                                web::resource("/me")
                                    .route(web::get().to(employee::get_me))
                                    .route(web::put().to(employee::update_me)),
                            )
                            .service(
                                web::resource("").route(web::get().to(employee::list_employees)),
                            )
                            .service(
                                web::resource("/{emp_id}")
                                    .route(web::get().to(employee::get_employee)),
                            ),
                    )
                    .service(
                        web::scope("/departments")
                            .service(
                                web::resource("")
                                    .route(web::post().to(department::create_department))
                                    .route(web::get().to(department::list_departments)),
                            )
                            .service(
                                web::resource("/{dept_id}/employees")
                                    .route(web::get().to(department::department_employees)),
                            )
                            .service(
                                web::resource("/{dept_id}")
                                    .route(web::get().to(department::get_department))
                                    .route(web::put().to(department::update_department))
                                    .route(web::delete().to(department::delete_department)),
                            ),
                    )
                    .service(
                        web::scope("/leaves")
                            .service(
                                web::resource("").route(web::post().to(leave_request::apply_leave)),
                            )
                            .service(
                                web::resource("/my").route(web::get().to(leave_request::my_leaves)),
                            )
                            .service(
                                web::resource("/pending")
                                    .route(web::get().to(leave_request::pending_leaves)),
                            )
                            .service(
                                web::resource("/admin/search")
                                    .route(web::get().to(leave_request::search_leaves)),
                            )
                            .service(
                                web::resource("/{leave_id}/decision")
                                    .route(web::put().to(leave_request::decide_leave)),
                            )
                            .service(
                                web::resource("/{leave_id}/revoke")
                                    .route(web::put().to(leave_request::revoke_leave)),
                            )
                            .service(
                                web::resource("/{leave_id}")
                                    .route(web::patch().to(leave_request::edit_leave))
                                    .route(web::delete().to(leave_request::delete_leave)),
                            ),
                    )
                    .service(
                        web::scope("/holidays")
                            .service(
                                web::resource("").route(web::post().to(holiday::create_holiday)),
                            )
                            .service(
                                web::resource("/year/{year}/month/{month}")
                                    .route(web::get().to(holiday::holidays_by_month)),
                            )
                            .service(
                                web::resource("/year/{year}")
                                    .route(web::get().to(holiday::holidays_by_year)),
                            )
                            .service(
                                web::resource("/{holiday_id}")
                                    .route(web::put().to(holiday::update_holiday))
                                    .route(web::delete().to(holiday::delete_holiday)),
                            ),
                    )
                    .service(
                        web::scope("/admin")
                            .service(
                                web::resource("/profile")
                                    .route(web::get().to(admin_profile::get_admin_profile))
                                    .route(web::put().to(admin_profile::update_admin_profile)),
                            )
                            .service(
                                web::scope("/approval")
                                    .route("/pending", web::get().to(approval::pending_users))
                                    .route("/approve", web::post().to(approval::approve_user))
                                    .route("/reject/{user_id}", web::post().to(approval::reject_user))
                                    .route("/reopen/{user_id}", web::post().to(approval::reopen_user)),
                            )
                            .service(
                                web::scope("/users")
                                    .service(
                                        web::resource("").route(web::get().to(users::list_users)),
                                    )
                                    .service(
                                        web::resource("/by-email")
                                            .route(web::get().to(users::get_user_by_email)),
                                    )
                                    .service(
                                        web::resource("/{user_id}/enable")
                                            .route(web::put().to(users::enable_user)),
                                    )
                                    .service(
                                        web::resource("/{user_id}/disable")
                                            .route(web::put().to(users::disable_user)),
                                    )
                                    .service(
                                        web::resource("/{user_id}")
                                            .route(web::get().to(users::get_user)),
                                    ),
                            )
                            .service(
                                web::scope("/employees")
                                    .service(
                                        web::resource("")
                                            .route(web::get().to(admin_employee::list_all)),
                                    )
                                    .service(
                                        web::resource("/user/{user_id}")
                                            .route(web::get().to(admin_employee::get_by_user))
                                            .route(web::put().to(admin_employee::update_by_user)),
                                    )
                                    .service(
                                        web::resource("/{emp_id}")
                                            .route(web::delete().to(admin_employee::delete_employee)),
                                    ),
                            ),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (1 h)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /api/auth/refresh with refresh_token as bearer
//       └─ returns a new token pair, the old refresh token is revoked

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, test as actix_test, web::Data};

    fn config() -> Config {
        Config::from_lookup(|key| match key {
            "SERVER_ADDR" => Some("127.0.0.1:0".into()),
            "DATABASE_URL" => Some("mysql://localhost/test".into()),
            "JWT_SECRET" => Some("routes-secret".into()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn limiter_accepts_zero_rate() {
        let _ = build_limiter(0);
        let _ = build_limiter(1000);
    }

    #[actix_web::test]
    async fn protected_routes_require_a_token() {
        let config = config();
        let app = actix_test::init_service(
            App::new()
                .app_data(Data::new(config.clone()))
                .configure(|cfg| configure(cfg, &config)),
        )
        .await;

        for uri in ["/api/employees/me", "/api/leaves/my", "/api/admin/users", "/api/holidays/year/2026"] {
            let req = actix_test::TestRequest::get()
                .uri(uri)
                .peer_addr("127.0.0.1:40000".parse().unwrap())
                .to_request();
            let resp = actix_test::call_service(&app, req).await;
            assert_eq!(resp.status(), 401, "{uri}");
        }
    }
}

use crate::{
    api::image::{discard_image, insert_image},
    auth::{
        auth::bearer_token,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{AppError, AppResult, is_duplicate_key},
    model::{
        role::Role,
        user::{User, UserStatus, ensure_can_login},
    },
    models::{Claims, LoginReqDto, LoginResponse, RegisterReq, RegisterResponse, TokenType},
    model::image::ImageResponse,
    utils::{
        email_index::{self, EmailKey, Presence},
        image_storage::{FormPart, ImageStorage, StoredFile, read_multipart, validate_image},
    },
};
use actix_multipart::Multipart;
use actix_web::{FromRequest, HttpRequest, HttpResponse, http::header, web};
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument, warn};

/// Whether no account uses this address yet.
pub async fn is_email_available(email: &EmailKey, pool: &MySqlPool) -> AppResult<bool> {
    match email_index::presence(email).await {
        Presence::Absent => return Ok(true),
        Presence::Registered => return Ok(false),
        Presence::Unknown => {}
    }

    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(email.as_str())
        .fetch_one(pool)
        .await?;

    if count > 0 {
        email_index::remember(email).await;
        return Ok(false);
    }
    Ok(true)
}

/// Inserts the user and, when given, its image row in one transaction.
async fn create_account(
    pool: &MySqlPool,
    user: &RegisterReq,
    email: &EmailKey,
    hashed: &str,
    image: Option<&StoredFile>,
) -> AppResult<(u64, Option<u64>)> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        INSERT INTO users (name, email, password, age, gender, role, status, enabled)
        VALUES (?, ?, ?, ?, ?, ?, ?, FALSE)
        "#,
    )
    .bind(user.name.trim())
    .bind(email.as_str())
    .bind(hashed)
    .bind(user.age)
    .bind(&user.gender)
    .bind(Role::Employee.as_ref())
    .bind(UserStatus::Pending.as_ref())
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if is_duplicate_key(&e) {
            AppError::conflict("Email already registered")
        } else {
            AppError::from(e)
        }
    })?;

    let user_id = result.last_insert_id();

    let image_id = match image {
        Some(file) => Some(insert_image(&mut *tx, user_id, file).await?),
        None => None,
    };

    tx.commit().await?;
    Ok((user_id, image_id))
}

/// Registration body: either plain JSON or multipart with a `data` JSON part and an optional `image` part.
async fn read_registration(
    req: &HttpRequest,
    payload: web::Payload,
    max_image_bytes: usize,
) -> AppResult<(RegisterReq, Option<FormPart>)> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let is_multipart = content_type
        .to_ascii_lowercase()
        .starts_with("multipart/form-data");

    let mut payload = payload.into_inner();

    if !is_multipart {
        let json = web::Json::<RegisterReq>::from_request(req, &mut payload)
            .await
            .map_err(|e| AppError::bad_request(format!("Invalid JSON payload: {e}")))?;
        return Ok((json.into_inner(), None));
    }

    let multipart = Multipart::new(req.headers(), payload);
    let mut data = None;
    let mut image = None;

    for part in read_multipart(multipart, max_image_bytes).await? {
        match part.name.as_str() {
            "data" => {
                let parsed = serde_json::from_slice::<RegisterReq>(&part.bytes)
                    .map_err(|e| AppError::bad_request(format!("Invalid data part: {e}")))?;
                data = Some(parsed);
            }
            "image" if !part.bytes.is_empty() => image = Some(part),
            _ => {}
        }
    }

    let data = data.ok_or_else(|| AppError::bad_request("Missing data part"))?;
    Ok((data, image))
}

/// Register a new account; it stays PENDING and disabled until an admin approves it
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body(
        content = RegisterReq,
        description = "JSON body, or multipart/form-data with a `data` JSON part and an optional `image` part"
    ),
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 409, description = "Email already registered", body = ApiError)
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip_all)]
pub async fn register(
    req: HttpRequest,
    payload: web::Payload,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    storage: web::Data<ImageStorage>,
) -> AppResult<HttpResponse> {
    let (user, image) = read_registration(&req, payload, config.max_image_bytes).await?;

    let email = EmailKey::new(&user.email);

    if user.name.trim().is_empty() || email.is_empty() || user.password.is_empty() {
        info!("Validation failed: empty name, email or password");
        return Err(AppError::bad_request(
            "Name, email and password must not be empty",
        ));
    }

    if let Some(part) = &image {
        validate_image(part)?;
    }

    if !is_email_available(&email, pool.get_ref()).await? {
        info!(%email, "Registration refused: email taken");
        return Err(AppError::conflict("Email already registered"));
    }

    let hashed = hash_password(&user.password)
        .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))?;

    let stored = match image {
        Some(part) => Some(storage.store(part).await?),
        None => None,
    };

    let (user_id, image_id) =
        match create_account(pool.get_ref(), &user, &email, &hashed, stored.as_ref()).await {
            Ok(ids) => ids,
            Err(e) => {
                if let Some(file) = &stored {
                    discard_image(storage.get_ref(), file).await;
                }
                return Err(e);
            }
        };

    // only committed rows enter the index
    email_index::remember(&email).await;

    let image = stored
        .zip(image_id)
        .map(|(file, image_id)| ImageResponse::new(image_id, &file.file_name));

    info!(user_id, %email, "User registered, awaiting approval");

    Ok(HttpResponse::Created().json(RegisterResponse {
        user_id,
        message: "Registered successfully. Wait for admin approval".to_string(),
        image,
    }))
}

async fn issue_tokens(
    pool: &MySqlPool,
    config: &Config,
    user_id: u64,
    email: &str,
    role: Role,
) -> AppResult<LoginResponse> {
    let access_token =
        generate_access_token(user_id, email, role, &config.jwt_secret, config.access_token_ttl)
            .map_err(|e| AppError::internal(format!("token signing failed: {e}")))?;

    let (refresh_token, refresh_claims) =
        generate_refresh_token(user_id, email, role, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(|e| AppError::internal(format!("token signing failed: {e}")))?;

    store_refresh_token(pool, &refresh_claims).await?;

    Ok(LoginResponse {
        access_token,
        refresh_token,
        role,
    })
}

async fn store_refresh_token(pool: &MySqlPool, claims: &Claims) -> AppResult<()> {
    debug!(user_id = claims.user_id, jti = %claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(claims.user_id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(pool)
    .await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ApiError),
        (status = 403, description = "Account not approved or rejected", body = ApiError)
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(email = %user.email)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    info!("Login request received");

    // 1️⃣ Basic validation
    if user.email.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty email or password");
        return Err(AppError::bad_request("Email and password are required"));
    }

    // 2️⃣ Fetch user
    let email = EmailKey::new(&user.email);
    let db_user = sqlx::query_as::<_, User>(
        r#"
        SELECT user_id, name, email, password, age, gender, role, status, enabled,
               created_at, last_login_at
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(email.as_str())
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| {
        info!("Invalid credentials: user not found");
        AppError::unauthorized("Invalid email or password")
    })?;

    debug!(user_id = db_user.user_id, "User found");

    // 3️⃣ Verify password
    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::unauthorized("Invalid email or password"));
    }

    // 4️⃣ Approval gate
    if let Err(e) = ensure_can_login(db_user.status, db_user.enabled) {
        info!(status = %db_user.status, enabled = db_user.enabled, "Login refused");
        return Err(e);
    }

    // 5️⃣ Tokens
    let tokens = issue_tokens(
        pool.get_ref(),
        &config,
        db_user.user_id,
        &db_user.email,
        db_user.role,
    )
    .await?;

    // 6️⃣ Update last_login_at (non-fatal)
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE user_id = ?")
        .bind(db_user.user_id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.user_id, "Login successful");
    Ok(HttpResponse::Ok().json(tokens))
}

fn refresh_claims(req: &HttpRequest, secret: &str) -> AppResult<Claims> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());
    let token = bearer_token(header)?;

    let claims = verify_token(token, secret)
        .map_err(|_| AppError::unauthorized("Invalid or expired token"))?;

    if claims.token_type != TokenType::Refresh {
        return Err(AppError::unauthorized("Refresh token required"));
    }
    Ok(claims)
}

/// Exchange a refresh token (sent as bearer) for a new token pair; the old refresh token is revoked
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = LoginResponse),
        (status = 401, description = "Refresh token invalid, revoked or expired", body = ApiError),
        (status = 403, description = "Account no longer approved", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
#[instrument(name = "auth_refresh", skip_all)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let claims = refresh_claims(&req, &config.jwt_secret)?;

    let mut tx = pool.begin().await?;

    // 🔍 find refresh token in DB
    let record = sqlx::query_as::<_, (u64, u64, bool)>(
        "SELECT id, user_id, revoked FROM refresh_tokens WHERE jti = ? FOR UPDATE",
    )
    .bind(&claims.jti)
    .fetch_optional(&mut *tx)
    .await?;

    let (token_id, user_id) = match record {
        Some((id, user_id, false)) => (id, user_id),
        Some((_, user_id, true)) => {
            warn!(user_id, jti = %claims.jti, "Revoked refresh token presented");
            return Err(AppError::unauthorized("Refresh token revoked"));
        }
        None => return Err(AppError::unauthorized("Unknown refresh token")),
    };

    // 🔥 revoke old refresh token
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = ?")
        .bind(token_id)
        .execute(&mut *tx)
        .await?;

    // current role and status, not the ones baked into the old token
    let db_user = sqlx::query_as::<_, User>(
        r#"
        SELECT user_id, name, email, password, age, gender, role, status, enabled,
               created_at, last_login_at
        FROM users
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::unauthorized("User not found"))?;

    tx.commit().await?;

    ensure_can_login(db_user.status, db_user.enabled)?;

    let tokens = issue_tokens(
        pool.get_ref(),
        &config,
        db_user.user_id,
        &db_user.email,
        db_user.role,
    )
    .await?;

    debug!(user_id, "Refresh token rotated");
    Ok(HttpResponse::Ok().json(tokens))
}

/// Revoke the presented refresh token; always answers 204
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 204, description = "Signed out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    // only refresh tokens can log out; anything else is a silent no-op
    let claims = match refresh_claims(&req, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return HttpResponse::NoContent().finish(),
    };

    // idempotent
    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::{self as actix_test, TestRequest};
    use actix_web::App;
    use sqlx::mysql::MySqlPoolOptions;
    use std::time::Duration;

    const SECRET: &str = "handler-secret";

    #[test]
    fn refresh_requires_a_refresh_token() {
        let access = generate_access_token(1, "a@b.c", Role::Employee, SECRET, 60).unwrap();
        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {access}")))
            .to_http_request();
        assert_eq!(
            refresh_claims(&req, SECRET).unwrap_err().to_string(),
            "Refresh token required"
        );

        let (refresh, issued) =
            generate_refresh_token(1, "a@b.c", Role::Employee, SECRET, 60).unwrap();
        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {refresh}")))
            .to_http_request();
        assert_eq!(refresh_claims(&req, SECRET).unwrap().jti, issued.jti);
    }

    #[test]
    fn refresh_rejects_foreign_signatures() {
        let (refresh, _) = generate_refresh_token(1, "a@b.c", Role::Admin, "other", 60).unwrap();
        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {refresh}")))
            .to_http_request();
        assert!(matches!(
            refresh_claims(&req, SECRET),
            Err(AppError::Unauthorized(_))
        ));
    }

    fn test_config(upload_dir: &std::path::Path) -> Config {
        Config::from_lookup(|key| match key {
            "SERVER_ADDR" => Some("127.0.0.1:0".into()),
            "DATABASE_URL" => Some("mysql://root@127.0.0.1:1/hr".into()),
            "JWT_SECRET" => Some(SECRET.into()),
            "IMAGE_UPLOAD_DIR" => Some(upload_dir.to_string_lossy().into_owned()),
            _ => None,
        })
        .unwrap()
    }

    #[actix_web::test]
    async fn failed_registration_leaves_no_trace() {
        let dir = std::env::temp_dir().join(format!("hr_register_{}", std::process::id()));
        let config = test_config(&dir);
        // nothing listens there, so the transaction can't even start
        let pool = MySqlPoolOptions::new()
            .acquire_timeout(Duration::from_millis(300))
            .connect_lazy(&config.database_url)
            .unwrap();

        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(pool))
                .app_data(web::Data::new(ImageStorage::new(&dir)))
                .app_data(web::Data::new(config))
                .route("/register", web::post().to(register)),
        )
        .await;

        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{b}\r\n\
             Content-Disposition: form-data; name=\"data\"\r\n\
             Content-Type: application/json\r\n\r\n\
             {{\"name\":\"Ada\",\"email\":\"Rollback.Case@corp.io\",\"password\":\"pw\"}}\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"image\"; filename=\"ada.png\"\r\n\
             Content-Type: image/png\r\n\r\n\
             PNGDATA\r\n\
             --{b}--\r\n",
            b = boundary
        );

        let req = TestRequest::post()
            .uri("/register")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            ))
            .set_payload(body)
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), 500);

        // a retry must not be told the address is taken
        assert_eq!(
            email_index::presence(&EmailKey::new("rollback.case@corp.io")).await,
            Presence::Absent
        );

        // the stored picture was removed again
        let leftovers = std::fs::read_dir(&dir).map(|d| d.count()).unwrap_or(0);
        assert_eq!(leftovers, 0);
    }
}

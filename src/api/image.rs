use actix_multipart::Multipart;
use actix_web::{HttpResponse, http::header, web};
use sqlx::{Executor, MySql, MySqlPool};
use tracing::{info, warn};

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::model::image::{Image, ImageResponse};
use crate::utils::image_storage::{
    FormPart, ImageStorage, StoredFile, read_multipart, validate_image,
};

const IMAGE_COLUMNS: &str = "image_id, user_id, file_name, file_path, content_type, uploaded_at";

/// Row for a file already written by `ImageStorage::store`.
pub async fn insert_image<'e, E>(executor: E, user_id: u64, stored: &StoredFile) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let result = sqlx::query(
        "INSERT INTO images (user_id, file_name, file_path, content_type) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(&stored.file_name)
    .bind(&stored.file_path)
    .bind(&stored.content_type)
    .execute(executor)
    .await?;
    Ok(result.last_insert_id())
}

/// Removes a stored file whose row never made it into the table.
pub async fn discard_image(storage: &ImageStorage, stored: &StoredFile) {
    if let Err(e) = storage.delete(&stored.file_path).await {
        warn!(error = %e, file = %stored.file_name, "Orphaned image file left on disk");
    }
}

/// Stores the file and its row; the file is removed again if the insert fails.
pub async fn save_image(
    pool: &MySqlPool,
    storage: &ImageStorage,
    user_id: u64,
    part: FormPart,
) -> AppResult<ImageResponse> {
    let stored = storage.store(part).await?;

    match insert_image(pool, user_id, &stored).await {
        Ok(image_id) => Ok(ImageResponse::new(image_id, &stored.file_name)),
        Err(e) => {
            discard_image(storage, &stored).await;
            Err(e.into())
        }
    }
}

async fn find_by_id(pool: &MySqlPool, image_id: u64) -> AppResult<Image> {
    sqlx::query_as::<_, Image>(&format!("SELECT {IMAGE_COLUMNS} FROM images WHERE image_id = ?"))
        .bind(image_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Image not found"))
}

async fn find_by_name(pool: &MySqlPool, file_name: &str) -> AppResult<Image> {
    sqlx::query_as::<_, Image>(&format!("SELECT {IMAGE_COLUMNS} FROM images WHERE file_name = ?"))
        .bind(file_name)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Image not found"))
}

async fn serve(storage: &ImageStorage, image: Image) -> AppResult<HttpResponse> {
    let bytes = storage.load(&image.file_path).await?;
    Ok(HttpResponse::Ok()
        .content_type(image.content_type)
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", image.file_name),
        ))
        .body(bytes))
}

async fn remove(pool: &MySqlPool, storage: &ImageStorage, auth: &AuthUser, image: Image) -> AppResult<()> {
    auth.require_self_or_admin(image.user_id)?;

    // file first, so a failed unlink keeps the row pointing at it
    storage.delete(&image.file_path).await?;
    sqlx::query("DELETE FROM images WHERE image_id = ?")
        .bind(image.image_id)
        .execute(pool)
        .await?;

    info!(image_id = image.image_id, by = auth.user_id, "Image deleted");
    Ok(())
}

async fn upload_for_user(
    pool: &MySqlPool,
    storage: &ImageStorage,
    config: &Config,
    user_id: u64,
    payload: Multipart,
) -> AppResult<Vec<ImageResponse>> {
    let parts: Vec<FormPart> = read_multipart(payload, config.max_image_bytes)
        .await?
        .into_iter()
        .filter(|p| p.name == "images" && !p.bytes.is_empty())
        .collect();

    if parts.is_empty() {
        return Err(AppError::bad_request("No images provided"));
    }
    // reject the whole batch before anything is written
    parts.iter().try_for_each(validate_image)?;

    let mut saved = Vec::with_capacity(parts.len());
    for part in parts {
        saved.push(save_image(pool, storage, user_id, part).await?);
    }

    info!(user_id, count = saved.len(), "Images uploaded");
    Ok(saved)
}

/// Fetch an image by id
#[utoipa::path(
    get,
    path = "/api/images/{image_id}",
    params(("image_id" = u64, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Raw image bytes", content_type = "image/*"),
        (status = 404, description = "Image not found", body = ApiError)
    ),
    tag = "Image"
)]
pub async fn get_image_by_id(
    pool: web::Data<MySqlPool>,
    storage: web::Data<ImageStorage>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let image = find_by_id(pool.get_ref(), path.into_inner()).await?;
    serve(storage.get_ref(), image).await
}

/// Fetch an image by stored file name
#[utoipa::path(
    get,
    path = "/api/images/by-name/{file_name}",
    params(("file_name" = String, Path, description = "Stored file name")),
    responses(
        (status = 200, description = "Raw image bytes", content_type = "image/*"),
        (status = 404, description = "Image not found", body = ApiError)
    ),
    tag = "Image"
)]
pub async fn get_image_by_name(
    pool: web::Data<MySqlPool>,
    storage: web::Data<ImageStorage>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let image = find_by_name(pool.get_ref(), &path.into_inner()).await?;
    serve(storage.get_ref(), image).await
}

#[utoipa::path(
    delete,
    path = "/api/images/{image_id}",
    params(("image_id" = u64, Path, description = "Image ID")),
    responses(
        (status = 204, description = "Image deleted"),
        (status = 403, description = "Not the owner", body = ApiError),
        (status = 404, description = "Image not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Image"
)]
pub async fn delete_image_by_id(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    storage: web::Data<ImageStorage>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let image = find_by_id(pool.get_ref(), path.into_inner()).await?;
    remove(pool.get_ref(), storage.get_ref(), &auth, image).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    delete,
    path = "/api/images/by-name/{file_name}",
    params(("file_name" = String, Path, description = "Stored file name")),
    responses(
        (status = 204, description = "Image deleted"),
        (status = 403, description = "Not the owner", body = ApiError),
        (status = 404, description = "Image not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Image"
)]
pub async fn delete_image_by_name(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    storage: web::Data<ImageStorage>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let image = find_by_name(pool.get_ref(), &path.into_inner()).await?;
    remove(pool.get_ref(), storage.get_ref(), &auth, image).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Upload images for an employee; they are owned by the employee's user account
#[utoipa::path(
    post,
    path = "/api/images/upload/{emp_id}",
    params(("emp_id" = u64, Path, description = "Employee ID")),
    request_body(content = Vec<u8>, content_type = "multipart/form-data", description = "One or more `images` parts"),
    responses(
        (status = 200, description = "Stored images", body = [ImageResponse]),
        (status = 400, description = "No or invalid images", body = ApiError),
        (status = 404, description = "Employee not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Image"
)]
pub async fn upload_employee_images(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    storage: web::Data<ImageStorage>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let emp_id = path.into_inner();

    let user_id = sqlx::query_scalar::<_, u64>("SELECT user_id FROM employee WHERE emp_id = ?")
        .bind(emp_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| AppError::not_found("Employee not found"))?;

    auth.require_self_or_admin(user_id)?;

    let saved = upload_for_user(pool.get_ref(), storage.get_ref(), &config, user_id, payload).await?;
    Ok(HttpResponse::Ok().json(saved))
}

#[utoipa::path(
    post,
    path = "/api/images/upload/user/{user_id}",
    params(("user_id" = u64, Path, description = "User ID")),
    request_body(content = Vec<u8>, content_type = "multipart/form-data", description = "One or more `images` parts"),
    responses(
        (status = 200, description = "Stored images", body = [ImageResponse]),
        (status = 400, description = "No or invalid images", body = ApiError),
        (status = 404, description = "User not found", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "Image"
)]
pub async fn upload_user_images(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    storage: web::Data<ImageStorage>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let user_id = path.into_inner();
    auth.require_self_or_admin(user_id)?;

    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool.get_ref())
        .await?;
    if exists == 0 {
        return Err(AppError::not_found("User not found"));
    }

    let saved = upload_for_user(pool.get_ref(), storage.get_ref(), &config, user_id, payload).await?;
    Ok(HttpResponse::Ok().json(saved))
}

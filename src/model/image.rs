use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, sqlx::FromRow)]
pub struct Image {
    pub image_id: u64,
    pub user_id: u64,
    pub file_name: String,
    pub file_path: String,
    pub content_type: String,
    pub uploaded_at: NaiveDateTime,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImageResponse {
    #[schema(example = 4)]
    pub image_id: u64,
    /// Public URL of the image
    #[schema(example = "/api/images/by-name/0f8e..._avatar.png")]
    pub file_name: String,
}

impl ImageResponse {
    pub fn new(image_id: u64, file_name: &str) -> Self {
        Self {
            image_id,
            file_name: format!("/api/images/by-name/{file_name}"),
        }
    }
}

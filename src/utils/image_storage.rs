use std::path::{Path, PathBuf};

use actix_multipart::Multipart;
use actix_web::web;
use futures_util::TryStreamExt;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// One part of a `multipart/form-data` body, fully buffered.
#[derive(Debug)]
pub struct FormPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, PartialEq)]
pub struct StoredFile {
    pub file_name: String,
    pub file_path: String,
    pub content_type: String,
}

/// Reads every part of the body; parts above `max_bytes` fail the request.
pub async fn read_multipart(mut multipart: Multipart, max_bytes: usize) -> AppResult<Vec<FormPart>> {
    let mut parts = Vec::new();

    while let Some(mut field) = multipart
        .try_next()
        .await
        .map_err(|e| AppError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().to_string();
        let file_name = field
            .content_disposition()
            .get_filename()
            .map(str::to_string);
        let content_type = field.content_type().map(|m| m.essence_str().to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| AppError::bad_request(format!("Invalid multipart body: {e}")))?
        {
            if bytes.len() + chunk.len() > max_bytes {
                return Err(AppError::bad_request(format!(
                    "Part '{name}' exceeds {max_bytes} bytes"
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        parts.push(FormPart {
            name,
            file_name,
            content_type,
            bytes,
        });
    }

    Ok(parts)
}

/// Keeps only the last path component and a conservative character set.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned.chars().take(120).collect()
    }
}

pub fn validate_image(part: &FormPart) -> AppResult<()> {
    if part.bytes.is_empty() {
        return Err(AppError::bad_request("Empty file not allowed"));
    }
    match part.content_type.as_deref() {
        Some(ct) if ct.starts_with("image/") => Ok(()),
        _ => Err(AppError::bad_request("Only image files are allowed")),
    }
}

#[derive(Debug, Clone)]
pub struct ImageStorage {
    base_dir: PathBuf,
}

impl ImageStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Writes the part to `<base_dir>/<uuid>_<name>`.
    pub async fn store(&self, part: FormPart) -> AppResult<StoredFile> {
        validate_image(&part)?;

        let original = part.file_name.as_deref().unwrap_or("image");
        let file_name = format!("{}_{}", Uuid::new_v4(), sanitize_file_name(original));
        let path = self.base_dir.join(&file_name);
        let content_type = part.content_type.unwrap_or_default();

        let base_dir = self.base_dir.clone();
        let target = path.clone();
        let bytes = part.bytes;
        web::block(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&base_dir)?;
            std::fs::write(&target, bytes)
        })
        .await?
        .map_err(|e| AppError::internal(format!("Failed to store image: {e}")))?;

        tracing::debug!(file = %file_name, "Image stored");

        Ok(StoredFile {
            file_name,
            file_path: path.to_string_lossy().into_owned(),
            content_type,
        })
    }

    pub async fn load(&self, file_path: &str) -> AppResult<Vec<u8>> {
        let path = PathBuf::from(file_path);
        web::block(move || std::fs::read(path))
            .await?
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => AppError::not_found("File not found on disk"),
                _ => AppError::internal(format!("Failed to load image: {e}")),
            })
    }

    /// Removing a file that is already gone is not an error.
    pub async fn delete(&self, file_path: &str) -> AppResult<()> {
        if file_path.trim().is_empty() {
            return Ok(());
        }
        let path = PathBuf::from(file_path);
        web::block(move || remove_if_exists(&path))
            .await?
            .map_err(|e| AppError::internal(format!("Failed to delete image file: {e}")))
    }
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(content_type: Option<&str>, bytes: &[u8]) -> FormPart {
        FormPart {
            name: "images".into(),
            file_name: Some("../../etc/avatar me.png".into()),
            content_type: content_type.map(str::to_string),
            bytes: bytes.to_vec(),
        }
    }

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("hr_images_{tag}_{}", std::process::id()))
    }

    #[test]
    fn file_names_lose_directories_and_odd_chars() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\photos\\me.jpg"), "me.jpg");
        assert_eq!(sanitize_file_name("my photo (1).png"), "my_photo__1_.png");
        assert_eq!(sanitize_file_name(".."), "image");
        assert_eq!(sanitize_file_name(""), "image");
    }

    #[test]
    fn only_non_empty_images_pass() {
        assert!(validate_image(&part(Some("image/png"), b"png")).is_ok());
        assert_eq!(
            validate_image(&part(Some("image/png"), b"")).unwrap_err().to_string(),
            "Empty file not allowed"
        );
        assert_eq!(
            validate_image(&part(Some("application/pdf"), b"%PDF"))
                .unwrap_err()
                .to_string(),
            "Only image files are allowed"
        );
        assert!(validate_image(&part(None, b"x")).is_err());
    }

    #[actix_web::test]
    async fn store_load_delete_cycle() {
        let dir = temp_dir("cycle");
        let storage = ImageStorage::new(&dir);

        let stored = storage.store(part(Some("image/png"), b"\x89PNG")).await.unwrap();
        assert!(stored.file_name.ends_with("_avatar_me.png"));
        assert!(Path::new(&stored.file_path).starts_with(&dir));
        assert_eq!(stored.content_type, "image/png");

        assert_eq!(storage.load(&stored.file_path).await.unwrap(), b"\x89PNG");

        storage.delete(&stored.file_path).await.unwrap();
        assert!(matches!(
            storage.load(&stored.file_path).await,
            Err(AppError::NotFound(_))
        ));
        // second delete is a no-op
        storage.delete(&stored.file_path).await.unwrap();

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[actix_web::test]
    async fn rejected_part_writes_nothing() {
        let dir = temp_dir("rejected");
        let storage = ImageStorage::new(&dir);

        assert!(storage.store(part(Some("text/plain"), b"hi")).await.is_err());
        assert!(!dir.exists());
    }
}

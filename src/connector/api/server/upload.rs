use axum::extract::Multipart;
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::ApiError;

const IMAGE_FIELD: &str = "image";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub image_data: String,
    pub image_id: String,
}

/// `POST /api/upload-image`: multipart field `image`, answered with the
/// base64 payload and the SHA-256 of the raw bytes.
pub async fn upload_image(mut multipart: Multipart) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        if let Some(content_type) = field.content_type() {
            if !content_type.starts_with("image/") {
                return Err(ApiError::bad_request(format!(
                    "Unsupported file type: {}",
                    content_type
                )));
            }
        }

        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Err(ApiError::bad_request("No image provided"));
        }

        let image_id = format!("{:x}", Sha256::digest(&bytes));
        debug!("Received image {} ({} bytes)", image_id, bytes.len());

        return Ok(Json(UploadResponse {
            status: "success",
            image_data: STANDARD.encode(&bytes),
            image_id,
        }));
    }

    Err(ApiError::bad_request("No image provided"))
}

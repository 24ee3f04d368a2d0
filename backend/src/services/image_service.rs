//! Recipe images: base64 data-URI decoding and media storage.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::storage::StorageBackend;

/// URL prefix the gateway serves the media volume under.
pub const MEDIA_URL: &str = "/media/";

/// Decoded images larger than this are rejected.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub extension: &'static str,
    pub content: Bytes,
}

fn extension_for(mime: &str) -> Option<&'static str> {
    match mime {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Decode `data:image/<type>;base64,<payload>`.
pub fn decode_data_uri(value: &str) -> Result<DecodedImage> {
    let invalid = || AppError::field("image", "Upload a valid image.");

    let rest = value.trim().strip_prefix("data:").ok_or_else(invalid)?;
    let (header, payload) = rest.split_once(',').ok_or_else(invalid)?;
    let mime = header.strip_suffix(";base64").ok_or_else(invalid)?;
    let extension = extension_for(&mime.to_ascii_lowercase()).ok_or_else(|| {
        AppError::field("image", format!("Unsupported image type '{}'.", mime))
    })?;

    let content = STANDARD.decode(payload.trim()).map_err(|_| invalid())?;
    if content.is_empty() {
        return Err(invalid());
    }
    if content.len() > MAX_IMAGE_BYTES {
        return Err(AppError::field("image", "Image is too large."));
    }

    Ok(DecodedImage {
        extension,
        content: Bytes::from(content),
    })
}

/// Public URL of a stored media key.
pub fn media_url(key: &str) -> String {
    format!("{}{}", MEDIA_URL, key)
}

/// Stores recipe images in the media backend.
#[derive(Clone)]
pub struct ImageService {
    storage: Arc<dyn StorageBackend>,
}

impl ImageService {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Decode and store a data URI; returns the media key.
    pub async fn store(&self, data_uri: &str) -> Result<String> {
        let image = decode_data_uri(data_uri)?;
        let key = format!("recipes/{}.{}", Uuid::new_v4(), image.extension);
        self.storage.put(&key, image.content).await?;
        tracing::debug!(key = %key, "Recipe image stored");
        Ok(key)
    }

    /// Best-effort removal; failures are logged, not returned.
    pub async fn remove(&self, key: &str) {
        match self.storage.exists(key).await {
            Ok(true) => {
                if let Err(e) = self.storage.delete(key).await {
                    tracing::warn!(key = %key, error = %e, "Failed to delete recipe image");
                }
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to check recipe image"),
        }
    }
}

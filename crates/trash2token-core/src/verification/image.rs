//! ============================================================================
//! Image Encoder - Photo to inline model payload
//! ============================================================================
//! Accepts raw bytes, browser data URLs or files and produces the base64 +
//! MIME pair the vision model expects, plus a content digest used as the
//! report's image reference.
//! ============================================================================

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;

/// Upload limit (matches the "up to 10MB" upload form)
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ImageError {
    #[error("Image is empty")]
    Empty,

    #[error("Image is {size} bytes, limit is {max}")]
    TooLarge { size: usize, max: usize },

    #[error("Upload must be an image")]
    NotAnImage,

    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),

    #[error("Failed to read image: {0}")]
    Io(String),
}

/// Photo encoded for transfer to the vision model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub mime_type: String,
    /// Standard base64, no data URL prefix
    pub data: String,
    /// `sha256:<hex>` of the raw bytes
    pub reference: String,
    pub size: usize,
}

impl EncodedImage {
    /// Encode raw image bytes. The MIME type is sniffed from the content.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ImageError::TooLarge {
                size: bytes.len(),
                max: MAX_IMAGE_BYTES,
            });
        }
        let mime_type = sniff_mime(bytes).ok_or(ImageError::NotAnImage)?;

        debug!("Encoded {} image, {} bytes", mime_type, bytes.len());

        Ok(Self {
            mime_type: mime_type.to_string(),
            data: STANDARD.encode(bytes),
            reference: image_reference(bytes),
            size: bytes.len(),
        })
    }

    /// Decode a `data:image/...;base64,...` URL as produced by a browser file reader.
    pub fn from_data_url(url: &str) -> Result<Self, ImageError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| ImageError::InvalidDataUrl("missing data: prefix".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ImageError::InvalidDataUrl("missing payload".into()))?;
        let declared = header
            .strip_suffix(";base64")
            .ok_or_else(|| ImageError::InvalidDataUrl("payload is not base64".into()))?;
        if !declared.starts_with("image/") {
            return Err(ImageError::NotAnImage);
        }

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| ImageError::InvalidDataUrl(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let bytes = tokio::fs::read(path.as_ref())
            .await
            .map_err(|e| ImageError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_bytes(&bytes)
    }
}

/// Content digest stored as a report's image reference.
pub fn image_reference(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

/// Detect the image format from magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Smallest byte string the sniffer accepts as a PNG
    pub(crate) fn png_bytes() -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(b"IHDR-test-payload");
        bytes
    }

    #[test]
    fn test_sniff_mime() {
        assert_eq!(sniff_mime(&png_bytes()), Some("image/png"));
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]), Some("image/jpeg"));
        assert_eq!(sniff_mime(b"GIF89a......"), Some("image/gif"));
        assert_eq!(sniff_mime(b"RIFF\x00\x00\x00\x00WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_mime(b"%PDF-1.7"), None);
    }

    #[test]
    fn test_from_bytes() {
        let image = EncodedImage::from_bytes(&png_bytes()).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(STANDARD.decode(&image.data).unwrap(), png_bytes());
        assert!(image.reference.starts_with("sha256:"));
        assert_eq!(image.reference.len(), "sha256:".len() + 64);
    }

    #[test]
    fn test_rejects_non_images() {
        assert_eq!(EncodedImage::from_bytes(&[]), Err(ImageError::Empty));
        assert_eq!(
            EncodedImage::from_bytes(b"just some text"),
            Err(ImageError::NotAnImage)
        );

        let mut huge = png_bytes();
        huge.resize(MAX_IMAGE_BYTES + 1, 0);
        assert!(matches!(
            EncodedImage::from_bytes(&huge),
            Err(ImageError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_from_data_url() {
        let url = format!("data:image/png;base64,{}", STANDARD.encode(png_bytes()));
        let image = EncodedImage::from_data_url(&url).unwrap();
        assert_eq!(image, EncodedImage::from_bytes(&png_bytes()).unwrap());

        assert!(matches!(
            EncodedImage::from_data_url("image/png;base64,AAAA"),
            Err(ImageError::InvalidDataUrl(_))
        ));
        assert_eq!(
            EncodedImage::from_data_url("data:text/plain;base64,aGVsbG8="),
            Err(ImageError::NotAnImage)
        );
    }
}

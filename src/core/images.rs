//! Limits and checks for gallery images.
//!
//! Images are opaque `data:image/<type>;base64,<payload>` strings embedded in
//! the library JSON. Only the header and payload length are inspected.

use thiserror::Error;

/// Default per-image limit (5 MiB of decoded data)
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

/// Reasons an image is refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageRejection {
    #[error("not a base64 data URI")]
    NotDataUri,

    #[error("unsupported media type: {0}")]
    NotAnImage(String),

    #[error("image is {actual} bytes (limit: {limit})")]
    TooLarge { actual: u64, limit: u64 },
}

/// Limits applied when images are attached to an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLimits {
    pub max_image_bytes: u64,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self {
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl ImageLimits {
    /// Check that `uri` is a base64 image data URI within the size limit
    pub fn validate(&self, uri: &str) -> Result<(), ImageRejection> {
        let (media_type, payload) = split_data_uri(uri).ok_or(ImageRejection::NotDataUri)?;

        if !media_type.starts_with("image/") {
            return Err(ImageRejection::NotAnImage(media_type.to_string()));
        }

        let actual = decoded_len(payload);
        if actual > self.max_image_bytes {
            return Err(ImageRejection::TooLarge {
                actual,
                limit: self.max_image_bytes,
            });
        }

        Ok(())
    }
}

/// Split `data:<media>;base64,<payload>` into media type and payload
pub fn split_data_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let media_type = header.strip_suffix(";base64")?;
    Some((media_type, payload))
}

/// Number of bytes a base64 payload decodes to
pub fn decoded_len(payload: &str) -> u64 {
    let trimmed = payload.trim_end();
    let padding = trimmed.bytes().rev().take_while(|b| *b == b'=').count() as u64;
    (trimmed.len() as u64 * 3 / 4).saturating_sub(padding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_data_uri() {
        assert_eq!(
            split_data_uri("data:image/png;base64,iVBO"),
            Some(("image/png", "iVBO"))
        );
        assert_eq!(split_data_uri("https://example.com/cover.png"), None);
        assert_eq!(split_data_uri("data:image/svg+xml,<svg/>"), None);
    }

    #[test]
    fn test_decoded_len() {
        assert_eq!(decoded_len(""), 0);
        assert_eq!(decoded_len("QQ=="), 1);
        assert_eq!(decoded_len("QUI="), 2);
        assert_eq!(decoded_len("QUJD"), 3);
        assert_eq!(decoded_len("QUJDRA=="), 4);
    }

    #[test]
    fn test_validate_rejects_non_images() {
        let limits = ImageLimits::default();

        assert!(limits.validate("data:image/jpeg;base64,QUJD").is_ok());
        assert_eq!(
            limits.validate("data:text/plain;base64,QUJD"),
            Err(ImageRejection::NotAnImage("text/plain".to_string()))
        );
        assert_eq!(limits.validate("cover.jpg"), Err(ImageRejection::NotDataUri));
    }

    #[test]
    fn test_validate_enforces_limit() {
        let limits = ImageLimits { max_image_bytes: 3 };

        assert!(limits.validate("data:image/png;base64,QUJD").is_ok());

        match limits.validate("data:image/png;base64,QUJDRA==") {
            Err(ImageRejection::TooLarge { actual, limit }) => {
                assert_eq!(actual, 4);
                assert_eq!(limit, 3);
            }
            other => panic!("Expected TooLarge, got {:?}", other),
        }
    }
}

use base64::{Engine as _, engine::general_purpose};
use std::path::Path;

use crate::error::{InspectorError, Result};

/// An image the user handed over, either inline or by reference.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageInput {
    Inline { bytes: Vec<u8>, mime_type: String },
    Url(String),
}

impl ImageInput {
    /// Wrap raw bytes, sniffing the MIME type from the file signature.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(InspectorError::Media("image is empty".to_string()));
        }
        let mime_type = sniff_mime(&bytes)
            .ok_or_else(|| {
                InspectorError::Media("unsupported image format (expected jpeg, png, gif or webp)".to_string())
            })?
            .to_string();
        Ok(Self::Inline { bytes, mime_type })
    }

    /// Accepts bare base64 or a full `data:` URI.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let payload = match encoded.trim().split_once(";base64,") {
            Some((prefix, data)) if prefix.starts_with("data:") => data,
            _ => encoded.trim(),
        };
        let bytes = general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| InspectorError::Media(format!("invalid base64 image: {e}")))?;
        Self::from_bytes(bytes)
    }

    pub fn from_url(url: &str) -> Result<Self> {
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(InspectorError::Media(format!(
                "image URL must be http(s): {url}"
            )));
        }
        Ok(Self::Url(url.to_string()))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            InspectorError::Media(format!("cannot read image {}: {e}", path.display()))
        })?;
        Self::from_bytes(bytes)
    }

    /// Reference the vision model receives: a data URI or the URL itself.
    pub fn to_model_url(&self) -> String {
        match self {
            ImageInput::Inline { bytes, mime_type } => {
                format!(
                    "data:{mime_type};base64,{}",
                    general_purpose::STANDARD.encode(bytes)
                )
            }
            ImageInput::Url(url) => url.clone(),
        }
    }

    /// Short description for logs and transcripts; never the payload.
    pub fn describe(&self) -> String {
        match self {
            ImageInput::Inline { bytes, mime_type } => {
                format!("{mime_type} image ({} bytes)", bytes.len())
            }
            ImageInput::Url(url) => url.clone(),
        }
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_png_becomes_data_uri() {
        let img = ImageInput::from_bytes(PNG_HEADER.to_vec()).unwrap();
        let url = img.to_model_url();
        assert!(url.starts_with("data:image/png;base64,"));
        assert!(url.ends_with(&general_purpose::STANDARD.encode(PNG_HEADER)));
    }

    #[test]
    fn test_jpeg_sniffed() {
        let img = ImageInput::from_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0]).unwrap();
        assert!(matches!(img, ImageInput::Inline { ref mime_type, .. } if mime_type == "image/jpeg"));
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(ImageInput::from_bytes(b"hello world".to_vec()).is_err());
        assert!(ImageInput::from_bytes(Vec::new()).is_err());
    }

    #[test]
    fn test_base64_with_data_uri_prefix() {
        let encoded = format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(PNG_HEADER)
        );
        let img = ImageInput::from_base64(&encoded).unwrap();
        assert_eq!(img.describe(), "image/png image (8 bytes)");
    }

    #[test]
    fn test_bad_base64_rejected() {
        assert!(ImageInput::from_base64("***").is_err());
    }

    #[test]
    fn test_url_passthrough() {
        let img = ImageInput::from_url(" https://example.com/a.jpg ").unwrap();
        assert_eq!(img.to_model_url(), "https://example.com/a.jpg");
        assert!(ImageInput::from_url("file:///etc/passwd").is_err());
    }
}

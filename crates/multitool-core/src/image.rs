//! Base64 image payloads exchanged with the Gemini API
//!
//! Images are opaque: we only look at the first bytes to learn the MIME type,
//! never at pixel content.

use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// MIME types the image model accepts as input
pub const SUPPORTED_MIME_TYPES: [&str; 5] = [
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/heic",
    "image/heif",
];

/// An image as base64 text plus its MIME type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub data: String,
    pub mime_type: String,
}

impl EncodedImage {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Encode raw bytes. The MIME type is sniffed, falling back to `hint`
    /// (usually derived from a file extension).
    pub fn from_bytes(bytes: &[u8], hint: Option<&str>) -> Result<Self> {
        let mime_type = detect_mime_type(bytes)
            .or(hint)
            .ok_or_else(|| Error::UnsupportedImage("unknown".to_string()))?;

        if !is_supported_mime_type(mime_type) {
            return Err(Error::UnsupportedImage(mime_type.to_string()));
        }

        Ok(Self::new(BASE64.encode(bytes), mime_type))
    }

    /// Read a file and encode it in one step.
    pub fn from_path(path: &Path) -> Result<Self> {
        let hint = mime_type_from_extension(path);
        if let Some(mime) = hint {
            if !is_supported_mime_type(mime) {
                return Err(Error::UnsupportedImage(mime.to_string()));
            }
        }

        let bytes = fs::read(path)?;
        let image = Self::from_bytes(&bytes, hint)?;
        debug!(
            path = %path.display(),
            mime = %image.mime_type,
            bytes = bytes.len(),
            "Encoded image"
        );
        Ok(image)
    }

    /// Check the payload is something the provider will accept.
    pub fn validate(&self) -> Result<()> {
        if !is_supported_mime_type(&self.mime_type) {
            return Err(Error::UnsupportedImage(self.mime_type.clone()));
        }
        self.decode().map(|_| ())
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(self.data.trim())
            .map_err(|e| Error::InvalidImage(e.to_string()))
    }

    /// Size of the decoded image without decoding it.
    pub fn byte_len(&self) -> usize {
        let data = self.data.trim();
        let padding = data.bytes().rev().take_while(|b| *b == b'=').count();
        (data.len() / 4 * 3).saturating_sub(padding)
    }

    pub fn extension(&self) -> &'static str {
        extension_for_mime_type(&self.mime_type)
    }

    /// Write the decoded bytes to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.decode()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, bytes)?;
        Ok(())
    }
}

pub fn is_supported_mime_type(mime_type: &str) -> bool {
    SUPPORTED_MIME_TYPES.contains(&mime_type)
}

/// Detect the MIME type from magic bytes
pub fn detect_mime_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"RIFF") && data.get(8..12) == Some(b"WEBP") {
        Some("image/webp")
    } else if data.starts_with(b"GIF8") {
        Some("image/gif")
    } else if data.get(4..8) == Some(b"ftyp") {
        match data.get(8..12) {
            Some(b"heic") | Some(b"heix") | Some(b"hevc") | Some(b"hevx") => Some("image/heic"),
            Some(b"mif1") | Some(b"msf1") | Some(b"heif") => Some("image/heif"),
            _ => None,
        }
    } else {
        None
    }
}

pub fn mime_type_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        "txt" | "md" => "text/plain",
        "pdf" => "application/pdf",
        _ => return None,
    };
    Some(mime)
}

pub fn extension_for_mime_type(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/heic" => "heic",
        "image/heif" => "heif",
        _ => "png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn detects_mime_from_magic_bytes() {
        assert_eq!(detect_mime_type(&PNG_HEADER), Some("image/png"));
        assert_eq!(detect_mime_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));

        let mut webp = vec![0u8; 12];
        webp[0..4].copy_from_slice(b"RIFF");
        webp[8..12].copy_from_slice(b"WEBP");
        assert_eq!(detect_mime_type(&webp), Some("image/webp"));

        let heic = b"\0\0\0\x18ftypheic\0\0\0\0";
        assert_eq!(detect_mime_type(heic), Some("image/heic"));

        assert_eq!(detect_mime_type(b"hello world"), None);
    }

    #[test]
    fn encodes_supported_bytes() {
        let image = EncodedImage::from_bytes(&PNG_HEADER, None).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.decode().unwrap(), PNG_HEADER);
        assert_eq!(image.byte_len(), PNG_HEADER.len());
    }

    #[test]
    fn rejects_gif_even_with_valid_magic() {
        let err = EncodedImage::from_bytes(b"GIF89a....", None).unwrap_err();
        assert!(matches!(err, Error::UnsupportedImage(ref m) if m == "image/gif"));
    }

    #[test]
    fn rejects_unknown_bytes_without_hint() {
        let err = EncodedImage::from_bytes(b"plain text", None).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn from_path_rejects_text_file_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "not an image").unwrap();

        let err = EncodedImage::from_path(&path).unwrap_err();
        assert!(matches!(err, Error::UnsupportedImage(ref m) if m == "text/plain"));
    }

    #[test]
    fn from_path_reads_png() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo.png");
        fs::write(&path, PNG_HEADER).unwrap();

        let image = EncodedImage::from_path(&path).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert!(image.validate().is_ok());
    }

    #[test]
    fn from_path_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = EncodedImage::from_path(&dir.path().join("gone.png")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn validate_rejects_bad_base64() {
        let image = EncodedImage::new("not*base64!", "image/png");
        assert!(matches!(image.validate(), Err(Error::InvalidImage(_))));
    }

    #[test]
    fn save_writes_decoded_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("edited.png");
        let image = EncodedImage::from_bytes(&PNG_HEADER, None).unwrap();

        image.save(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), PNG_HEADER);
        assert_eq!(image.extension(), "png");
    }
}

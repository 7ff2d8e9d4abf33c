//! Core types for image generation.

use crate::error::{PlatesError, Result};
use base64::Engine;
use std::fmt;
use std::path::Path;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG format (lossless).
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// An image held as `data:<mime>;base64,<payload>`.
///
/// This is the in-memory representation of both the uploaded source and
/// every generated plate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    mime_type: String,
    payload: String,
}

impl DataUrl {
    /// Wraps an already base64-encoded payload.
    pub fn new(mime_type: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            payload: payload.into(),
        }
    }

    /// Encodes raw bytes.
    pub fn from_bytes(mime_type: impl Into<String>, data: &[u8]) -> Self {
        Self::new(
            mime_type,
            base64::engine::general_purpose::STANDARD.encode(data),
        )
    }

    /// Parses a `data:` URL. Only base64 data URLs are accepted.
    pub fn parse(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| PlatesError::Decode("not a data URL".into()))?;
        let (mime_type, payload) = rest
            .split_once(";base64,")
            .ok_or_else(|| PlatesError::Decode("data URL is not base64 encoded".into()))?;
        if payload.is_empty() {
            return Err(PlatesError::Decode("data URL has an empty payload".into()));
        }
        Ok(Self::new(mime_type, payload))
    }

    /// MIME type of the payload.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// The base64 payload, without the `data:...;base64,` prefix.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Decodes the payload into raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.payload)
            .map_err(|e| PlatesError::Decode(e.to_string()))
    }

    /// Decodes the payload and writes it to `path`.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let data = self.decode()?;
        tokio::fs::write(path, data).await?;
        Ok(())
    }
}

impl fmt::Display for DataUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.payload)
    }
}

/// A request to re-render the source image under a new prompt.
#[derive(Debug, Clone, Copy)]
pub struct EditRequest<'a> {
    /// Base64 payload of the source image (no data URL prefix).
    pub image: &'a str,
    /// MIME type of the source image as uploaded.
    pub mime_type: &'a str,
    /// The text prompt describing the desired shot.
    pub prompt: &'a str,
}

impl<'a> EditRequest<'a> {
    /// Creates a request against the given source image.
    pub fn new(source: &'a DataUrl, prompt: &'a str) -> Self {
        Self {
            image: source.payload(),
            mime_type: source.mime_type(),
            prompt,
        }
    }
}

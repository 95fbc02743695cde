//! crates/debug_assistant_core/src/encoder.rs
//!
//! Turns uploaded screenshot bytes into a base64 `data:` URI that can be
//! embedded directly in a JSON request body.

use crate::ports::{AssistantError, AssistantResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::path::Path;

/// Largest image the upstream API accepts per part.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Raster formats the multimodal API accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMime {
    Png,
    Jpeg,
    Webp,
    Gif,
}

impl ImageMime {
    /// Parses a declared content type, ignoring case and any `;` parameters.
    pub fn parse(declared: &str) -> AssistantResult<Self> {
        let essence = declared
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/png" => Ok(ImageMime::Png),
            "image/jpeg" | "image/jpg" => Ok(ImageMime::Jpeg),
            "image/webp" => Ok(ImageMime::Webp),
            "image/gif" => Ok(ImageMime::Gif),
            "" => Err(AssistantError::Encoding(
                "the upload has no content type".to_string(),
            )),
            other => Err(AssistantError::Encoding(format!(
                "unsupported image type '{}'; use PNG, JPEG, WebP or GIF",
                other
            ))),
        }
    }

    /// Guesses the type from a file extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(ImageMime::Png),
            "jpg" | "jpeg" => Some(ImageMime::Jpeg),
            "webp" => Some(ImageMime::Webp),
            "gif" => Some(ImageMime::Gif),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMime::Png => "image/png",
            ImageMime::Jpeg => "image/jpeg",
            ImageMime::Webp => "image/webp",
            ImageMime::Gif => "image/gif",
        }
    }
}

/// A screenshot ready for transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    mime: ImageMime,
    data_url: String,
    byte_len: usize,
}

impl EncodedImage {
    pub fn mime(&self) -> ImageMime {
        self.mime
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    /// Size of the original, unencoded image.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }
}

#[derive(Debug, Clone)]
pub struct ImageEncoder {
    max_bytes: usize,
}

impl Default for ImageEncoder {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl ImageEncoder {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn encode(&self, bytes: &[u8], declared_mime: &str) -> AssistantResult<EncodedImage> {
        if bytes.is_empty() {
            return Err(AssistantError::Encoding(
                "the uploaded screenshot is empty".to_string(),
            ));
        }
        if bytes.len() > self.max_bytes {
            return Err(AssistantError::Encoding(format!(
                "the screenshot is {} bytes, the limit is {} bytes",
                bytes.len(),
                self.max_bytes
            )));
        }
        let mime = ImageMime::parse(declared_mime)?;

        Ok(EncodedImage {
            mime,
            data_url: format!("data:{};base64,{}", mime.as_str(), BASE64.encode(bytes)),
            byte_len: bytes.len(),
        })
    }
}

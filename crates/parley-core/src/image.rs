//! Image attachments waiting to be sent

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use crate::message::ImageRef;
use crate::model::{InlineImage, DEFAULT_IMAGE_MEDIA_TYPE};

/// An attachment between selection and send.
///
/// Sending consumes it; dropping it discards the bytes and the preview.
#[derive(Debug, Clone)]
pub struct PendingImage {
    bytes: Vec<u8>,
    encoded: String,
    media_type: Option<String>,
    preview: ImageRef,
}

impl PendingImage {
    pub fn new(bytes: Vec<u8>, media_type: Option<String>, preview: ImageRef) -> Self {
        let encoded = BASE64_STANDARD.encode(&bytes);
        Self {
            bytes,
            encoded,
            media_type,
            preview,
        }
    }

    /// Load an image file, guessing its media type from the extension.
    ///
    /// Files whose extension maps to a non-image type are refused. An unknown
    /// extension is accepted and falls back to the default media type at send time.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let media_type = mime_guess::from_path(path).first().map(|m| m.essence_str().to_string());

        if let Some(ref mt) = media_type {
            if !mt.starts_with("image/") {
                return Err(anyhow!("{} is not an image ({})", path.display(), mt));
            }
        }

        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        if bytes.is_empty() {
            return Err(anyhow!("{} is empty", path.display()));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let preview = ImageRef::new(name, Some(path.to_path_buf()), bytes.len());

        Ok(Self::new(bytes, media_type, preview))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    /// Declared media type, or `image/jpeg` when the source didn't say
    pub fn media_type(&self) -> &str {
        self.media_type.as_deref().unwrap_or(DEFAULT_IMAGE_MEDIA_TYPE)
    }

    pub fn preview(&self) -> &ImageRef {
        &self.preview
    }

    pub fn to_inline(&self) -> InlineImage {
        InlineImage {
            media_type: self.media_type().to_string(),
            data: self.encoded.clone(),
        }
    }
}

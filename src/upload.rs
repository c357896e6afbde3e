//! Image selection for the drop zone and file browser.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::path::Path;
use tracing::{debug, info};

const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// A file picked by the user, held in memory until replaced
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    name: String,
    media_type: String,
    bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Build a file, deriving the media type from its name (or content when
    /// the name has no extension)
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let media_type = detect_media_type(&name, &bytes);
        Self {
            name,
            media_type,
            bytes,
        }
    }

    /// Read a file chosen through the file browser
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("Path has no file name")?;
        Ok(Self::from_bytes(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }

    /// Inline `data:` URL for showing the image without a round trip
    pub fn preview_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, STANDARD.encode(&self.bytes))
    }
}

fn detect_media_type(name: &str, bytes: &[u8]) -> String {
    let path = Path::new(name);
    if path.extension().is_some() {
        return match image::ImageFormat::from_path(path) {
            Ok(format) => format.to_mime_type().to_string(),
            Err(_) => FALLBACK_MEDIA_TYPE.to_string(),
        };
    }
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type().to_string(),
        Err(_) => FALLBACK_MEDIA_TYPE.to_string(),
    }
}

/// Pending upload plus drop zone state
#[derive(Debug, Default)]
pub struct UploadController {
    pending: Option<SelectedFile>,
    preview: Option<String>,
    hovering: bool,
}

impl UploadController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a browsed or dropped file. Non-images are ignored.
    pub fn accept(&mut self, file: SelectedFile) -> bool {
        if !file.is_image() {
            debug!(
                "Ignoring {} with media type {}",
                file.name(),
                file.media_type()
            );
            return false;
        }

        info!("Selected {} ({} bytes)", file.name(), file.len());
        self.preview = Some(file.preview_data_url());
        self.pending = Some(file);
        true
    }

    /// Drop handler: only the first dropped file is considered
    pub fn accept_dropped(&mut self, files: Vec<SelectedFile>) -> bool {
        self.hovering = false;
        match files.into_iter().next() {
            Some(file) => self.accept(file),
            None => false,
        }
    }

    pub fn drag_enter(&mut self) {
        self.hovering = true;
    }

    pub fn drag_leave(&mut self) {
        self.hovering = false;
    }

    pub fn is_hovering(&self) -> bool {
        self.hovering
    }

    pub fn pending(&self) -> Option<&SelectedFile> {
        self.pending.as_ref()
    }

    pub fn has_file(&self) -> bool {
        self.pending.is_some()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.pending.as_ref().map(SelectedFile::name)
    }

    pub fn preview(&self) -> Option<&str> {
        self.preview.as_deref()
    }
}

//! File-backed image storage.
//!
//! Images are written under a single directory with generated names and are
//! referenced from records by `ImageRef`. Only JPEG and PNG are accepted.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use super::ImageRef;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct BlobStore {
    dir: PathBuf,
    max_bytes: usize,
}

/// Map an incoming MIME type to the stored one and its file extension.
fn accepted_type(content_type: &str) -> Option<(&'static str, &'static str)> {
    let essence = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/jpeg" | "image/jpg" => Some(("image/jpeg", "jpg")),
        "image/png" => Some(("image/png", "png")),
        _ => None,
    }
}

impl BlobStore {
    pub fn new<P: AsRef<Path>>(dir: P, max_bytes: usize) -> std::io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, max_bytes })
    }

    pub fn dir(&self) -> &Path { &self.dir }

    pub fn max_bytes(&self) -> usize { self.max_bytes }

    /// Check type and size without writing anything.
    pub fn validate(&self, bytes: &[u8], content_type: &str) -> AppResult<()> {
        if accepted_type(content_type).is_none() {
            return Err(AppError::validation("Only JPEG and PNG images are allowed"));
        }
        if bytes.is_empty() {
            return Err(AppError::validation("Image file is empty"));
        }
        if bytes.len() > self.max_bytes {
            return Err(AppError::validation(format!("Image exceeds the {} byte limit", self.max_bytes)));
        }
        Ok(())
    }

    pub async fn save(&self, bytes: &[u8], content_type: &str) -> AppResult<ImageRef> {
        self.validate(bytes, content_type)?;
        let (mime, ext) = accepted_type(content_type).ok_or_else(|| AppError::validation("Only JPEG and PNG images are allowed"))?;
        let file = format!("{}.{}", Uuid::new_v4(), ext);
        tokio::fs::write(self.dir.join(&file), bytes).await?;
        debug!(target: "eventshare::blobs", "saved image file={} bytes={}", file, bytes.len());
        Ok(ImageRef { file, content_type: mime.to_string() })
    }

    pub async fn read(&self, image: &ImageRef) -> AppResult<Vec<u8>> {
        let path = self.resolve(image)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::missing("Image")),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal; failures are logged and otherwise ignored.
    pub async fn delete(&self, image: &ImageRef) {
        let Ok(path) = self.resolve(image) else { return; };
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(target: "eventshare::blobs", "failed to delete image file={}: {}", image.file, e);
            }
        }
    }

    pub async fn delete_all(&self, images: &[ImageRef]) {
        for image in images {
            self.delete(image).await;
        }
    }

    fn resolve(&self, image: &ImageRef) -> AppResult<PathBuf> {
        let name = image.file.as_str();
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(AppError::missing("Image"));
        }
        Ok(self.dir.join(name))
    }
}

//! On-disk storage for profile pictures and course media.
//!
//! Everything is addressed by a path relative to the uploads root, which is
//! also what gets persisted and served under `/uploads`.

use image::{imageops::FilterType, DynamicImage, ImageFormat};
use rand::Rng;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::Picture;

const PICTURE_DIR: &str = "users";
const MEDIA_DIR: &str = "media";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Unsupported picture format: {0}")]
    UnsupportedFormat(String),

    #[error("Uploaded file is not a valid image: {0}")]
    InvalidImage(String),

    #[error("Upload processing failed: {0}")]
    Task(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct Uploads {
    root: PathBuf,
}

impl Uploads {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_dirs(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(self.root.join(PICTURE_DIR)).await?;
        tokio::fs::create_dir_all(self.root.join(MEDIA_DIR)).await
    }

    /// Absolute location of a stored upload. Relative paths are produced by
    /// this module only, so they never contain `..` components.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Decode, shrink to fit `max_dimension`, and store a profile picture as
    /// `users/<id>-<4 random digits><ext>`.
    pub async fn store_picture(
        &self,
        user_id: Uuid,
        original_name: &str,
        bytes: Vec<u8>,
        max_dimension: u32,
    ) -> Result<Picture, UploadError> {
        let ext = extension(original_name).unwrap_or_default();
        let format = picture_format(&ext)?;
        let name = picture_file_name(user_id, &ext);
        let relative = format!("{}/{}", PICTURE_DIR, name);
        let path = self.resolve(&relative);

        tokio::fs::create_dir_all(self.root.join(PICTURE_DIR)).await?;
        tokio::task::spawn_blocking(move || save_resized(&bytes, &path, format, max_dimension))
            .await
            .map_err(|e| UploadError::Task(e.to_string()))??;

        let size = tokio::fs::metadata(self.resolve(&relative)).await?.len();
        Ok(Picture {
            alias: original_name.to_string(),
            name,
            path: relative,
            size,
        })
    }

    /// Store a media upload as `media/<uuid><ext>`, returning its relative link.
    pub async fn store_media(&self, original_name: &str, bytes: &[u8]) -> Result<String, UploadError> {
        let ext = extension(original_name)
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let relative = format!("{}/{}{}", MEDIA_DIR, Uuid::new_v4().simple(), ext);

        tokio::fs::create_dir_all(self.root.join(MEDIA_DIR)).await?;
        tokio::fs::write(self.resolve(&relative), bytes).await?;
        Ok(relative)
    }

    /// Best-effort removal; a missing file is not an error.
    pub async fn remove(&self, relative: &str) {
        match tokio::fs::remove_file(self.resolve(relative)).await {
            Ok(()) => tracing::debug!("Removed upload {}", relative),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove upload {}: {}", relative, e),
        }
    }
}

/// Lowercased extension without the dot, if it is short and alphanumeric.
fn extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    let valid = !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(ext)
}

fn picture_format(ext: &str) -> Result<ImageFormat, UploadError> {
    match ext {
        "png" => Ok(ImageFormat::Png),
        "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
        "gif" => Ok(ImageFormat::Gif),
        "bmp" => Ok(ImageFormat::Bmp),
        other => Err(UploadError::UnsupportedFormat(if other.is_empty() {
            "missing file extension".to_string()
        } else {
            other.to_string()
        })),
    }
}

pub fn picture_file_name(user_id: Uuid, ext: &str) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(1000..10000);
    format!("{}-{}.{}", user_id, suffix, ext)
}

fn save_resized(bytes: &[u8], path: &Path, format: ImageFormat, max_dimension: u32) -> Result<(), UploadError> {
    let image = image::load_from_memory(bytes).map_err(|e| UploadError::InvalidImage(e.to_string()))?;

    let image = if image.width() > max_dimension || image.height() > max_dimension {
        image.resize(max_dimension, max_dimension, FilterType::Lanczos3)
    } else {
        image
    };

    // JPEG has no alpha channel
    let image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    };

    image.save_with_format(path, format).map_err(|e| match e {
        image::ImageError::IoError(io) => UploadError::Io(io),
        other => UploadError::InvalidImage(other.to_string()),
    })
}

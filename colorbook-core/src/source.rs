//! Where source photographs come from.
//!
//! Fetching is the only asynchronous step of line-art generation; everything
//! after a bitmap arrives runs synchronously.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::pipeline::Bitmap;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("image source unavailable: {0}")]
    Unavailable(String),

    #[error("invalid category '{0}'")]
    InvalidCategory(String),

    #[error("no images found in {}", dir.display())]
    NoImages { dir: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Produces a decoded photograph for a category such as "animals" or "flowers".
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, category: &str) -> Result<Bitmap, FetchError>;
}

#[cfg(feature = "directory-source")]
pub use directory::DirectorySource;

#[cfg(feature = "directory-source")]
mod directory {
    use std::path::{Path, PathBuf};

    use async_trait::async_trait;
    use rand::seq::SliceRandom;
    use tracing::{debug, info};

    use super::{FetchError, ImageSource};
    use crate::exif_orientation::decode_upright;
    use crate::pipeline::Bitmap;

    const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp"];

    /// Picks a random photo from `<root>/<category>/`, or from `<root>` itself
    /// when the category is empty.
    #[derive(Debug, Clone)]
    pub struct DirectorySource {
        root: PathBuf,
    }

    impl DirectorySource {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self { root: root.into() }
        }

        pub fn root(&self) -> &Path {
            &self.root
        }

        fn category_dir(&self, category: &str) -> Result<PathBuf, FetchError> {
            let category = category.trim();
            if category.is_empty() {
                return Ok(self.root.clone());
            }
            let plain = category
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == ' ');
            if !plain {
                return Err(FetchError::InvalidCategory(category.to_string()));
            }
            Ok(self.root.join(category))
        }

        async fn list_images(dir: &Path) -> Result<Vec<PathBuf>, FetchError> {
            let io_err = |source| FetchError::Io {
                path: dir.to_path_buf(),
                source,
            };
            let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
            let mut images = Vec::new();
            while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
                let path = entry.path();
                if entry.file_type().await.map_err(io_err)?.is_file() && has_image_extension(&path) {
                    images.push(path);
                }
            }
            // Directory order is platform dependent.
            images.sort();
            Ok(images)
        }
    }

    #[async_trait]
    impl ImageSource for DirectorySource {
        async fn fetch(&self, category: &str) -> Result<Bitmap, FetchError> {
            let dir = self.category_dir(category)?;
            let images = Self::list_images(&dir).await?;

            let path = images
                .choose(&mut rand::thread_rng())
                .cloned()
                .ok_or_else(|| FetchError::NoImages { dir: dir.clone() })?;
            debug!(candidates = images.len(), path = %path.display(), "picked photo");

            let bytes = tokio::fs::read(&path).await.map_err(|source| FetchError::Io {
                path: path.clone(),
                source,
            })?;
            let bitmap = decode_upright(&bytes)?.to_rgba8();
            info!(path = %path.display(), width = bitmap.width(), height = bitmap.height(), "loaded photo");
            Ok(bitmap)
        }
    }

    fn has_image_extension(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
    }

}

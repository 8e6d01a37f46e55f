//! Saving the annotated image to the device photo library.
//!
//! The library only imports files, so the decoded image is first staged in
//! the cache directory and then handed over.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::permission::PermissionState;
use crate::session::AnnotatedImage;

/// A platform photo library.
#[async_trait::async_trait]
pub trait MediaLibrary: Send + Sync {
    /// The name of this library (for logging/debugging).
    fn name(&self) -> &'static str;

    /// Whether the user has granted write access.
    fn permission(&self) -> PermissionState;

    /// Import `file` into `album`, returning the new asset's location.
    ///
    /// # Errors
    ///
    /// Returns an error if the import fails.
    async fn save_to_album(&self, file: &Path, album: &str) -> Result<PathBuf>;
}

/// Write `image` to `cache_dir` as `annot_<millis>.jpg`.
///
/// # Errors
///
/// Returns an error if the cache directory cannot be created or the file
/// cannot be written.
pub async fn stage_image(cache_dir: &Path, image: &AnnotatedImage) -> Result<PathBuf> {
    tokio::fs::create_dir_all(cache_dir)
        .await
        .map_err(|source| Error::DirectoryCreate {
            path: cache_dir.to_path_buf(),
            source,
        })?;

    let path = cache_dir.join(format!("annot_{}.jpg", Utc::now().timestamp_millis()));
    tokio::fs::write(&path, image.bytes()).await?;
    debug!("Staged annotated image at {}", path.display());
    Ok(path)
}

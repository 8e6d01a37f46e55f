//! Photo library kept in a plain directory, one subdirectory per album.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::permissions::{self, PermissionStatus};

/// Errors that can occur while saving to the library.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The file to import has no file name.
    #[error("cannot import {0}: not a file")]
    NotAFile(PathBuf),

    /// Copying into the album failed.
    #[error("failed to import {path} into album '{album}': {source}")]
    Import {
        /// The file being imported.
        path: PathBuf,
        /// Target album.
        album: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for media library operations.
pub type Result<T> = std::result::Result<T, MediaError>;

/// A media library rooted at a directory.
#[derive(Debug, Clone)]
pub struct AlbumDirectory {
    root: PathBuf,
}

impl AlbumDirectory {
    /// Create a library rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Library root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write access to the library root.
    #[must_use]
    pub fn permission(&self) -> PermissionStatus {
        permissions::check_writable_dir(&self.root)
    }

    /// Copy `file` into `album`, creating the album if needed.
    ///
    /// Returns the path of the new asset.
    ///
    /// # Errors
    ///
    /// Returns an error if `file` has no file name or the copy fails.
    pub async fn create_asset(&self, file: &Path, album: &str) -> Result<PathBuf> {
        let name = file
            .file_name()
            .ok_or_else(|| MediaError::NotAFile(file.to_path_buf()))?;
        let album_dir = self.root.join(album);
        let dest = album_dir.join(name);

        let import_err = |source| MediaError::Import {
            path: file.to_path_buf(),
            album: album.to_string(),
            source,
        };
        tokio::fs::create_dir_all(&album_dir)
            .await
            .map_err(import_err)?;
        tokio::fs::copy(file, &dest).await.map_err(import_err)?;

        info!("Saved {} to album '{}'", dest.display(), album);
        Ok(dest)
    }
}

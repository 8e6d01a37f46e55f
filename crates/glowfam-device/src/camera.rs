//! Still camera that develops photos from a directory of JPEG files.
//!
//! Each shutter press returns the next file in name order, wrapping around.
//! An optional second directory stands in for the front lens.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, trace};

use crate::permissions::{self, PermissionStatus};

/// Errors that can occur while taking a picture.
#[derive(Debug, Error)]
pub enum CameraError {
    /// The lens directory holds no JPEG files.
    #[error("no photos available in {0}")]
    NoPhotos(PathBuf),

    /// Reading the lens directory or a photo failed.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for camera operations.
pub type Result<T> = std::result::Result<T, CameraError>;

/// Which lens the shutter fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lens {
    /// Rear camera.
    #[default]
    Back,
    /// Selfie camera.
    Front,
}

/// A developed still.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StillPhoto {
    /// Where the source frame lives.
    pub path: PathBuf,
    /// Encoded JPEG bytes.
    pub bytes: Vec<u8>,
    /// Shutter time.
    pub taken_at: DateTime<Utc>,
}

/// Camera backed by directories of JPEG files.
#[derive(Debug)]
pub struct DirectoryCamera {
    back_dir: PathBuf,
    front_dir: Option<PathBuf>,
    cursor: usize,
}

impl DirectoryCamera {
    /// Create a camera whose back lens reads from `back_dir`.
    #[must_use]
    pub fn new(back_dir: impl Into<PathBuf>) -> Self {
        Self {
            back_dir: back_dir.into(),
            front_dir: None,
            cursor: 0,
        }
    }

    /// Use a separate directory for the front lens.
    #[must_use]
    pub fn with_front_dir(mut self, front_dir: impl Into<PathBuf>) -> Self {
        self.front_dir = Some(front_dir.into());
        self
    }

    /// Directory the given lens develops from.
    #[must_use]
    pub fn lens_dir(&self, lens: Lens) -> &Path {
        match (lens, &self.front_dir) {
            (Lens::Front, Some(front)) => front,
            _ => &self.back_dir,
        }
    }

    /// Camera access is granted when the back lens directory is readable.
    #[must_use]
    pub fn permission(&self) -> PermissionStatus {
        permissions::check_readable_dir(&self.back_dir)
    }

    /// Take a picture with the given lens.
    ///
    /// # Errors
    ///
    /// Returns an error if the lens directory cannot be listed, holds no
    /// JPEG files, or the chosen file cannot be read.
    pub async fn capture(&mut self, lens: Lens) -> Result<StillPhoto> {
        let dir = self.lens_dir(lens).to_path_buf();
        let frames = list_jpegs(&dir).await?;
        if frames.is_empty() {
            return Err(CameraError::NoPhotos(dir));
        }

        let path = frames[self.cursor % frames.len()].clone();
        self.cursor = self.cursor.wrapping_add(1);
        trace!(?lens, frame = %path.display(), "shutter");

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| CameraError::Read {
                path: path.clone(),
                source,
            })?;

        debug!("Captured {} ({} bytes)", path.display(), bytes.len());
        Ok(StillPhoto {
            path,
            bytes,
            taken_at: Utc::now(),
        })
    }
}

async fn list_jpegs(dir: &Path) -> Result<Vec<PathBuf>> {
    let read_err = |source| CameraError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_err)?;
    let mut frames = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        let path = entry.path();
        let is_jpeg = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"));
        if is_jpeg {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

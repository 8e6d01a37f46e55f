//! Camera seam for the capture flow.
//!
//! This module defines the photo type handed to the estimation backend and
//! the trait a platform camera implements.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::permission::PermissionState;

/// Which lens is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    /// Rear camera.
    #[default]
    Back,
    /// Selfie camera.
    Front,
}

impl CameraFacing {
    /// The other lens.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Back => Self::Front,
            Self::Front => Self::Back,
        }
    }
}

impl std::fmt::Display for CameraFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Back => write!(f, "back"),
            Self::Front => write!(f, "front"),
        }
    }
}

/// Shutter settings for one picture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotOptions {
    /// Lens to use.
    pub facing: CameraFacing,
    /// JPEG quality in (0, 1].
    pub quality: f32,
}

/// A photo taken by the camera.
///
/// The photo only lives until it has been uploaded; a failed upload
/// discards it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPhoto {
    /// Local handle of the image on the device.
    pub uri: PathBuf,

    /// Encoded JPEG bytes.
    pub bytes: Vec<u8>,

    /// When the shutter fired.
    pub taken_at: DateTime<Utc>,
}

impl CapturedPhoto {
    /// Create a photo taken now.
    #[must_use]
    pub fn new(uri: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            uri: uri.into(),
            bytes,
            taken_at: Utc::now(),
        }
    }

    /// File name used for the upload: `family_<millis>.jpg`.
    #[must_use]
    pub fn upload_file_name(&self) -> String {
        format!("family_{}.jpg", self.taken_at.timestamp_millis())
    }

    /// Size of the encoded image.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the image is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Trait for platform cameras.
///
/// Implementors provide the actual shutter for a platform (a handset camera,
/// a directory of frames, a test double).
#[async_trait::async_trait]
pub trait Camera: Send {
    /// The name of this camera (for logging/debugging).
    fn name(&self) -> &'static str;

    /// Whether the user has granted camera access.
    fn permission(&self) -> PermissionState;

    /// Take a picture.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Capture`] if the shutter fails or produces no
    /// image.
    async fn take_picture(&mut self, options: ShotOptions) -> Result<CapturedPhoto>;
}

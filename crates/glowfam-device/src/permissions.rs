//! Access checks for the file-backed device services.
//!
//! A real handset asks the user for camera, motion and photo library
//! permissions. The file-backed services map those prompts onto plain
//! filesystem access: the camera needs a readable photo directory, the
//! motion source a readable replay file, the media library a writable
//! album root.

use std::path::Path;

use thiserror::Error;

/// Errors related to device permissions.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// The permission is not granted.
    #[error("{0} permission not granted")]
    NotGranted(&'static str),

    /// Failed to check permissions.
    #[error("failed to check permissions: {0}")]
    CheckFailed(String),
}

/// Information about the current permission status of a device service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionStatus {
    /// Whether the permission is currently granted.
    pub is_granted: bool,

    /// Human-readable description of the status.
    pub description: String,
}

impl PermissionStatus {
    /// Create a new granted status.
    #[must_use]
    pub fn granted(description: impl Into<String>) -> Self {
        Self {
            is_granted: true,
            description: description.into(),
        }
    }

    /// Create a new denied status.
    #[must_use]
    pub fn denied(description: impl Into<String>) -> Self {
        Self {
            is_granted: false,
            description: description.into(),
        }
    }

    /// Convert into a `Result`, naming the permission on failure.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError::NotGranted`] when the status is denied.
    pub fn require(&self, permission: &'static str) -> Result<(), PermissionError> {
        if self.is_granted {
            Ok(())
        } else {
            Err(PermissionError::NotGranted(permission))
        }
    }
}

/// Check that `path` is a directory we can list.
#[must_use]
pub fn check_readable_dir(path: &Path) -> PermissionStatus {
    match std::fs::read_dir(path) {
        Ok(_) => PermissionStatus::granted(format!("{} is readable", path.display())),
        Err(e) => PermissionStatus::denied(format!("cannot read {}: {e}", path.display())),
    }
}

/// Check that `path` is a file we can open.
#[must_use]
pub fn check_readable_file(path: &Path) -> PermissionStatus {
    match std::fs::File::open(path) {
        Ok(_) => PermissionStatus::granted(format!("{} is readable", path.display())),
        Err(e) => PermissionStatus::denied(format!("cannot read {}: {e}", path.display())),
    }
}

/// Check that files can be written below `path`.
///
/// A missing directory is fine as long as its nearest existing ancestor is
/// writable, since the media library creates albums on demand.
#[must_use]
pub fn check_writable_dir(path: &Path) -> PermissionStatus {
    let existing = path.ancestors().find(|p| p.exists());
    let Some(existing) = existing else {
        return PermissionStatus::denied(format!("no existing ancestor for {}", path.display()));
    };

    match std::fs::metadata(existing) {
        Ok(meta) if !meta.is_dir() => {
            PermissionStatus::denied(format!("{} is not a directory", existing.display()))
        }
        Ok(meta) if meta.permissions().readonly() => {
            PermissionStatus::denied(format!("{} is read-only", existing.display()))
        }
        Ok(_) => PermissionStatus::granted(format!("{} is writable", path.display())),
        Err(e) => PermissionStatus::denied(format!("cannot inspect {}: {e}", existing.display())),
    }
}

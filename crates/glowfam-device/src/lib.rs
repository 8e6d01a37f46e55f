//! File-backed device services for glowfam.
//!
//! This crate stands in for the handset APIs the capture flow talks to: a
//! still camera that develops photos from a directory, a motion sensor that
//! replays a recorded rotation stream, and a photo library kept on disk.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod camera;
pub mod media;
pub mod motion;
pub mod permissions;

pub use camera::{CameraError, DirectoryCamera, Lens, StillPhoto};
pub use media::{AlbumDirectory, MediaError};
pub use motion::{MotionError, MotionReading, ReplayMotion, DEFAULT_UPDATE_INTERVAL};
pub use permissions::{PermissionError, PermissionStatus};

/// Initialize the device layer.
///
/// # Errors
///
/// Returns an error if initialization fails.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Initializing file-backed device services");
    Ok(())
}

/// Get the platform name.
#[must_use]
pub fn platform_name() -> &'static str {
    "file-backed"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        assert!(init().is_ok());
    }

    #[test]
    fn test_platform_name() {
        assert_eq!(platform_name(), "file-backed");
    }

    #[test]
    fn test_exports() {
        let camera = DirectoryCamera::new("/tmp");
        assert_eq!(camera.lens_dir(Lens::default()), std::path::Path::new("/tmp"));
        let motion = ReplayMotion::fixed(0.0);
        assert_eq!(motion.update_interval(), DEFAULT_UPDATE_INTERVAL);
    }
}

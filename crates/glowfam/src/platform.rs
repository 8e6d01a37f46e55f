//! Device services from `glowfam-device`.
//!
//! The device crate has its own types so that it does not depend on this
//! one; this module plugs them into the capture flow seams.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use glowfam_device::{AlbumDirectory, DirectoryCamera, Lens, ReplayMotion};
use tracing::{debug, trace};

use crate::backend::HttpBackend;
use crate::camera::{Camera, CameraFacing, CapturedPhoto, ShotOptions};
use crate::config::Config;
use crate::controller::FlowServices;
use crate::error::{Error, Result};
use crate::media::MediaLibrary;
use crate::permission::PermissionState;
use crate::sensor::{MotionSample, MotionSensor, MotionStream};

/// Upright phone, used when no replay file is configured.
const UPRIGHT_BETA: f64 = std::f64::consts::FRAC_PI_2;

impl From<CameraFacing> for Lens {
    fn from(facing: CameraFacing) -> Self {
        match facing {
            CameraFacing::Back => Self::Back,
            CameraFacing::Front => Self::Front,
        }
    }
}

#[async_trait::async_trait]
impl Camera for DirectoryCamera {
    fn name(&self) -> &'static str {
        "directory"
    }

    fn permission(&self) -> PermissionState {
        DirectoryCamera::permission(self).into()
    }

    async fn take_picture(&mut self, options: ShotOptions) -> Result<CapturedPhoto> {
        // Frames are already encoded; quality only matters on real hardware.
        trace!(quality = options.quality, "ignoring JPEG quality");
        let still = self
            .capture(options.facing.into())
            .await
            .map_err(|e| Error::capture(e.to_string()))?;
        Ok(CapturedPhoto {
            uri: still.path,
            bytes: still.bytes,
            taken_at: still.taken_at,
        })
    }
}

impl MotionSensor for ReplayMotion {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn permission(&self) -> PermissionState {
        ReplayMotion::permission(self).into()
    }

    fn open(&self, interval: Duration) -> Result<Box<dyn MotionStream>> {
        let mut stream = self.clone();
        stream.set_update_interval(interval);
        Ok(Box::new(stream))
    }
}

#[async_trait::async_trait]
impl MotionStream for ReplayMotion {
    async fn next_sample(&mut self) -> Option<MotionSample> {
        self.next_reading()
            .await
            .map(|reading| MotionSample { beta: reading.beta })
    }
}

#[async_trait::async_trait]
impl MediaLibrary for AlbumDirectory {
    fn name(&self) -> &'static str {
        "album-directory"
    }

    fn permission(&self) -> PermissionState {
        AlbumDirectory::permission(self).into()
    }

    async fn save_to_album(&self, file: &Path, album: &str) -> Result<PathBuf> {
        self.create_asset(file, album)
            .await
            .map_err(|e| Error::save("image", e.to_string()))
    }
}

/// Build the motion source named in the configuration.
///
/// # Errors
///
/// Returns a sensor error if the replay file cannot be loaded.
pub fn motion_from_config(config: &Config) -> Result<ReplayMotion> {
    match &config.device.motion_replay {
        Some(path) => ReplayMotion::from_file(path)
            .map(|replay| replay.looped(true))
            .map_err(|e| Error::sensor(e.to_string())),
        None => Ok(ReplayMotion::fixed(UPRIGHT_BETA)),
    }
}

/// Wire the file-backed device services and the HTTP backend together.
///
/// # Errors
///
/// Returns an error if the motion replay cannot be loaded or the HTTP
/// client cannot be built.
pub fn file_backed_services(config: &Config) -> Result<FlowServices> {
    let mut camera = DirectoryCamera::new(config.photo_dir());
    if let Some(front) = &config.device.front_photo_dir {
        camera = camera.with_front_dir(front);
    }
    let motion = motion_from_config(config)?;
    let media = AlbumDirectory::new(config.media_dir());
    let backend = HttpBackend::new(config)?;

    debug!(
        platform = glowfam_device::platform_name(),
        photos = %config.photo_dir().display(),
        media = %config.media_dir().display(),
        backend = %backend.base_url(),
        "Device services ready"
    );

    Ok(FlowServices {
        camera: Box::new(camera),
        motion: Arc::new(motion),
        media: Arc::new(media),
        backend: Arc::new(backend),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::SensorSubscription;

    #[tokio::test]
    async fn test_directory_camera_adapter() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), [0xff, 0xd8, 0xff]).unwrap();

        let mut camera = DirectoryCamera::new(dir.path());
        assert!(Camera::permission(&camera).is_granted);
        let photo = camera
            .take_picture(ShotOptions {
                facing: CameraFacing::Back,
                quality: 0.7,
            })
            .await
            .unwrap();
        assert_eq!(photo.bytes, vec![0xff, 0xd8, 0xff]);
        assert_eq!(photo.uri, dir.path().join("a.jpg"));
    }

    #[tokio::test]
    async fn test_empty_photo_dir_is_capture_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut camera = DirectoryCamera::new(dir.path());
        let err = camera
            .take_picture(ShotOptions {
                facing: CameraFacing::Front,
                quality: 0.7,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Capture(_)));
    }

    #[test]
    fn test_missing_photo_dir_denies_camera() {
        let camera = DirectoryCamera::new("/nonexistent/glowfam/photos");
        let state = Camera::permission(&camera);
        assert!(!state.is_granted);
        assert!(state.require("camera").unwrap_err().is_permission_error());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_motion_feeds_subscription() {
        let motion = ReplayMotion::fixed(UPRIGHT_BETA + 3.0_f64.to_radians());
        let subscription =
            SensorSubscription::acquire(&motion, Duration::from_millis(50)).unwrap();
        assert!(subscription.latest().is_none());

        tokio::time::sleep(Duration::from_millis(60)).await;
        let reading = subscription.latest().unwrap();
        assert!((reading.degrees() - 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_album_directory_adapter() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("annot_1.jpg");
        std::fs::write(&src, b"jpeg").unwrap();

        let library = AlbumDirectory::new(dir.path().join("library"));
        let asset = library.save_to_album(&src, "Download").await.unwrap();
        assert_eq!(asset, dir.path().join("library/Download/annot_1.jpg"));

        let err = library
            .save_to_album(&dir.path().join("missing.jpg"), "Download")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Save { what: "image", .. }));
    }

    #[test]
    fn test_motion_from_config_defaults_upright() {
        let config = Config::default();
        let motion = motion_from_config(&config).unwrap();
        assert!(MotionSensor::permission(&motion).is_granted);
    }

    #[test]
    fn test_motion_from_config_missing_file() {
        let mut config = Config::default();
        config.device.motion_replay = Some(PathBuf::from("/nonexistent/motion.txt"));
        let err = motion_from_config(&config).unwrap_err();
        assert!(matches!(err, Error::Sensor(_)));
    }

    #[test]
    fn test_file_backed_services() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.device.photo_dir = Some(dir.path().join("photos"));
        config.device.media_dir = Some(dir.path().join("media"));

        let services = file_backed_services(&config).unwrap();
        assert_eq!(services.camera.name(), "directory");
        assert_eq!(services.motion.name(), "replay");
        assert_eq!(services.media.name(), "album-directory");
    }
}

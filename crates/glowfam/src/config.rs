//! Configuration management for glowfam.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::camera::CameraFacing;
use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "glowfam";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `GLOWFAM_`)
/// 2. TOML config file at `~/.config/glowfam/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Estimation backend configuration.
    pub backend: BackendConfig,
    /// Capture flow configuration.
    pub capture: CaptureConfig,
    /// Tilt indicator thresholds.
    pub tilt: TiltConfig,
    /// File-backed device configuration.
    pub device: DeviceConfig,
}

/// Estimation backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the API.
    pub base_url: String,
    /// Timeout for the photo upload in seconds.
    pub upload_timeout_secs: u64,
    /// Timeout for the small JSON calls in seconds.
    pub request_timeout_secs: u64,
}

/// Capture flow configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Length of the shutter countdown in seconds.
    pub countdown_secs: u32,
    /// Interval between orientation updates in milliseconds.
    pub sensor_interval_ms: u64,
    /// JPEG quality passed to the camera, in (0, 1].
    pub jpeg_quality: f32,
    /// Lens selected when the screen opens.
    pub default_facing: CameraFacing,
    /// Album the annotated image is saved into.
    pub album: String,
}

/// Tilt indicator thresholds, in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TiltConfig {
    /// Largest tilt still shown green.
    pub nominal_max_degrees: f64,
    /// Largest tilt shown amber; anything above is red.
    pub caution_max_degrees: f64,
}

/// File-backed device configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Directory the back camera develops photos from.
    /// Defaults to `~/.local/share/glowfam/camera`
    pub photo_dir: Option<PathBuf>,
    /// Directory the front camera develops photos from.
    /// Falls back to `photo_dir`.
    pub front_photo_dir: Option<PathBuf>,
    /// Motion replay file. Without one the phone is assumed upright.
    pub motion_replay: Option<PathBuf>,
    /// Root of the photo library.
    /// Defaults to `~/.local/share/glowfam/media`
    pub media_dir: Option<PathBuf>,
    /// Scratch directory for staged images.
    /// Defaults to `~/.cache/glowfam`
    pub cache_dir: Option<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            upload_timeout_secs: 30,
            request_timeout_secs: 10,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 10,
            sensor_interval_ms: 200,
            jpeg_quality: 0.7,
            default_facing: CameraFacing::Back,
            album: "Download".to_string(),
        }
    }
}

impl Default for TiltConfig {
    fn default() -> Self {
        Self {
            nominal_max_degrees: 2.0,
            caution_max_degrees: 5.0,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `GLOWFAM_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("GLOWFAM_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if let Err(e) = url::Url::parse(&self.backend.base_url) {
            return Err(Error::ConfigValidation {
                message: format!("invalid backend base_url {:?}: {e}", self.backend.base_url),
            });
        }

        if self.backend.upload_timeout_secs == 0 || self.backend.request_timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "backend timeouts must be greater than 0".to_string(),
            });
        }

        if self.capture.countdown_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "countdown_secs must be greater than 0".to_string(),
            });
        }

        if self.capture.sensor_interval_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "sensor_interval_ms must be greater than 0".to_string(),
            });
        }

        if !(self.capture.jpeg_quality > 0.0 && self.capture.jpeg_quality <= 1.0) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "jpeg_quality ({}) must be in (0, 1]",
                    self.capture.jpeg_quality
                ),
            });
        }

        if self.tilt.nominal_max_degrees < 0.0
            || self.tilt.nominal_max_degrees > self.tilt.caution_max_degrees
        {
            return Err(Error::ConfigValidation {
                message: format!(
                    "nominal_max_degrees ({}) must be between 0 and caution_max_degrees ({})",
                    self.tilt.nominal_max_degrees, self.tilt.caution_max_degrees
                ),
            });
        }

        Ok(())
    }

    /// Get the back camera directory, resolving defaults if not set.
    #[must_use]
    pub fn photo_dir(&self) -> PathBuf {
        self.device
            .photo_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join("camera"))
    }

    /// Get the media library root, resolving defaults if not set.
    #[must_use]
    pub fn media_dir(&self) -> PathBuf {
        self.device
            .media_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join("media"))
    }

    /// Get the cache directory, resolving defaults if not set.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.device.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join(DATA_DIR_NAME)
        })
    }

    /// Get the upload timeout as a Duration.
    #[must_use]
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.upload_timeout_secs)
    }

    /// Get the JSON request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.request_timeout_secs)
    }

    /// Get the sensor update interval as a Duration.
    #[must_use]
    pub fn sensor_interval(&self) -> Duration {
        Duration::from_millis(self.capture.sensor_interval_ms)
    }
}

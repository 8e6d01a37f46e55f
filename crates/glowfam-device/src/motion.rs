//! Device-motion replay.
//!
//! Plays back a recorded rotation stream at a fixed update interval. The
//! replay file holds one sample per line: the `beta` rotation (around the
//! device x-axis) in radians. Blank lines and `-` stand for a sample with no
//! rotation data, `#` starts a comment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::permissions::{self, PermissionStatus};

/// Default update interval, matching a handset motion API.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(200);

/// Errors that can occur while loading a motion replay.
#[derive(Debug, Error)]
pub enum MotionError {
    /// The replay file could not be read.
    #[error("failed to read motion replay {path}: {source}")]
    Read {
        /// Path to the replay file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A line could not be parsed as radians.
    #[error("invalid motion sample on line {line}: {content:?}")]
    InvalidSample {
        /// 1-based line number.
        line: usize,
        /// The offending content.
        content: String,
    },

    /// The replay holds no samples.
    #[error("motion replay is empty")]
    Empty,
}

/// Result type for motion operations.
pub type Result<T> = std::result::Result<T, MotionError>;

/// One reading from the motion sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionReading {
    /// Rotation around the x-axis in radians, if the sensor reported it.
    pub beta: Option<f64>,
}

/// A motion source that replays recorded samples.
#[derive(Debug, Clone)]
pub struct ReplayMotion {
    samples: Vec<Option<f64>>,
    position: usize,
    looped: bool,
    interval: Duration,
    source: Option<PathBuf>,
}

impl ReplayMotion {
    /// A sensor that reports the same rotation forever.
    #[must_use]
    pub fn fixed(beta: f64) -> Self {
        Self {
            samples: vec![Some(beta)],
            position: 0,
            looped: true,
            interval: DEFAULT_UPDATE_INTERVAL,
            source: None,
        }
    }

    /// Replay the given samples once.
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::Empty`] if `samples` is empty.
    pub fn from_samples(samples: Vec<Option<f64>>) -> Result<Self> {
        if samples.is_empty() {
            return Err(MotionError::Empty);
        }
        Ok(Self {
            samples,
            position: 0,
            looped: false,
            interval: DEFAULT_UPDATE_INTERVAL,
            source: None,
        })
    }

    /// Load a replay file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a line is not a number,
    /// or no samples remain after stripping comments.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| MotionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut replay = Self::from_samples(parse_samples(&text)?)?;
        replay.source = Some(path.to_path_buf());
        debug!(
            "Loaded {} motion samples from {}",
            replay.samples.len(),
            path.display()
        );
        Ok(replay)
    }

    /// Restart from the first sample once the replay runs out.
    #[must_use]
    pub fn looped(mut self, looped: bool) -> Self {
        self.looped = looped;
        self
    }

    /// Change the delay between samples.
    pub fn set_update_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// The delay between samples.
    #[must_use]
    pub fn update_interval(&self) -> Duration {
        self.interval
    }

    /// Motion access is granted for in-memory replays and readable files.
    #[must_use]
    pub fn permission(&self) -> PermissionStatus {
        match &self.source {
            Some(path) => permissions::check_readable_file(path),
            None => PermissionStatus::granted("in-memory motion replay"),
        }
    }

    /// Wait one update interval and return the next reading.
    ///
    /// Returns `None` once a non-looping replay is exhausted.
    pub async fn next_reading(&mut self) -> Option<MotionReading> {
        if self.position >= self.samples.len() {
            if !self.looped {
                return None;
            }
            self.position = 0;
        }
        tokio::time::sleep(self.interval).await;
        let beta = self.samples[self.position];
        self.position += 1;
        Some(MotionReading { beta })
    }
}

fn parse_samples(text: &str) -> Result<Vec<Option<f64>>> {
    let mut samples = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let content = raw.split('#').next().unwrap_or_default().trim();
        if raw.trim_start().starts_with('#') {
            continue;
        }
        if content.is_empty() || content == "-" {
            samples.push(None);
            continue;
        }
        let beta = content
            .parse::<f64>()
            .map_err(|_| MotionError::InvalidSample {
                line: idx + 1,
                content: content.to_string(),
            })?;
        samples.push(Some(beta));
    }
    Ok(samples)
}

//! State of one measurement on the capture screen.
//!
//! A [`CaptureSession`] lives exactly as long as the screen. It is mutated
//! only by the controller, in response to user input and sensor or
//! countdown events, and is wiped when the user measures again.

use std::path::PathBuf;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::camera::CameraFacing;
use crate::error::{Error, Result};
use crate::tilt::TiltReading;

/// Label shown above the estimated height.
pub const CHILD_HEIGHT_LABEL: &str = "아이 예측 키";

/// Prefix of the display URI for the annotated image.
const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// Lifecycle stage of the capture screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Waiting for a usable reference height.
    #[default]
    AwaitingReferenceHeight,
    /// Live preview with the tilt indicator.
    Capturing,
    /// Showing the annotated image and the estimate.
    Result,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingReferenceHeight => write!(f, "awaiting the reference height"),
            Self::Capturing => write!(f, "capturing"),
            Self::Result => write!(f, "showing the result"),
        }
    }
}

/// A validated reference height in centimeters.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ReferenceHeight(f64);

impl ReferenceHeight {
    /// Parse user input.
    ///
    /// Surrounding whitespace is ignored. Empty, non-numeric, non-finite,
    /// zero and negative values are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidReferenceHeight`] for unusable input.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || Error::InvalidReferenceHeight {
            input: input.to_string(),
        };
        let value: f64 = input.trim().parse().map_err(|_| invalid())?;
        if !value.is_finite() || value <= 0.0 {
            return Err(invalid());
        }
        Ok(Self(value))
    }

    /// Height in centimeters.
    #[must_use]
    pub const fn cm(self) -> f64 {
        self.0
    }

    /// Text sent with an upload.
    #[must_use]
    pub fn to_form_value(self) -> String {
        self.0.to_string()
    }
}

/// The annotated JPEG returned by the backend.
#[derive(Clone, PartialEq, Eq)]
pub struct AnnotatedImage {
    bytes: Vec<u8>,
    base64: String,
}

impl std::fmt::Debug for AnnotatedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotatedImage")
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl AnnotatedImage {
    /// Decode a base64 JPEG payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid base64 or decodes to
    /// nothing.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        if bytes.is_empty() {
            return Err(Error::malformed("annotated image is empty"));
        }
        Ok(Self {
            bytes,
            base64: encoded.to_string(),
        })
    }

    /// Decoded JPEG bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// URI the screen renders: `data:image/jpeg;base64,...`.
    #[must_use]
    pub fn data_uri(&self) -> String {
        format!("{JPEG_DATA_URI_PREFIX}{}", self.base64)
    }
}

/// A successful height estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimationResult {
    /// Estimated child height in centimeters.
    pub child_height_cm: f64,
    /// Image with the detected people boxed.
    pub annotated_image: AnnotatedImage,
    /// Estimated camera distance to the reference person, if reported.
    pub reference_distance_cm: Option<f64>,
}

impl EstimationResult {
    /// Height with one decimal, e.g. `102.4 cm`.
    #[must_use]
    pub fn display_height(&self) -> String {
        format!("{:.1} cm", self.child_height_cm)
    }

    /// Line shown over the annotated image.
    #[must_use]
    pub fn headline(&self) -> String {
        format!("{CHILD_HEIGHT_LABEL}: {}", self.display_height())
    }
}

/// Ephemeral state of the capture screen.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSession {
    pub(crate) step: Step,
    pub(crate) reference_input: String,
    pub(crate) reference_height: Option<ReferenceHeight>,
    pub(crate) tilt: Option<TiltReading>,
    pub(crate) timer_enabled: bool,
    pub(crate) countdown_remaining: u32,
    pub(crate) facing: CameraFacing,
    pub(crate) captured_photo: Option<PathBuf>,
    pub(crate) estimation_result: Option<EstimationResult>,
}

impl CaptureSession {
    /// A fresh session.
    #[must_use]
    pub fn new(facing: CameraFacing) -> Self {
        Self {
            step: Step::AwaitingReferenceHeight,
            reference_input: String::new(),
            reference_height: None,
            tilt: None,
            timer_enabled: false,
            countdown_remaining: 0,
            facing,
            captured_photo: None,
            estimation_result: None,
        }
    }

    /// Current step.
    #[must_use]
    pub fn step(&self) -> Step {
        self.step
    }

    /// Raw reference height text as typed.
    #[must_use]
    pub fn reference_input(&self) -> &str {
        &self.reference_input
    }

    /// Validated reference height, once accepted.
    #[must_use]
    pub fn reference_height(&self) -> Option<ReferenceHeight> {
        self.reference_height
    }

    /// Latest tilt reading.
    #[must_use]
    pub fn tilt(&self) -> Option<TiltReading> {
        self.tilt
    }

    /// Whether the shutter waits for a countdown.
    #[must_use]
    pub fn timer_enabled(&self) -> bool {
        self.timer_enabled
    }

    /// Seconds left on the countdown, 0 when none runs.
    #[must_use]
    pub fn countdown_remaining(&self) -> u32 {
        self.countdown_remaining
    }

    /// Active lens.
    #[must_use]
    pub fn facing(&self) -> CameraFacing {
        self.facing
    }

    /// Local handle of the last photo, until it is discarded.
    #[must_use]
    pub fn captured_photo(&self) -> Option<&PathBuf> {
        self.captured_photo.as_ref()
    }

    /// The estimate, present only in [`Step::Result`].
    #[must_use]
    pub fn estimation_result(&self) -> Option<&EstimationResult> {
        self.estimation_result.as_ref()
    }

    /// Whether the session obeys its invariants.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let result_matches_step = self.estimation_result.is_some() == (self.step == Step::Result);
        let reference_ok = self.step == Step::AwaitingReferenceHeight
            || self.reference_height.is_some_and(|h| h.cm() > 0.0);
        result_matches_step && reference_ok
    }

    /// Forget everything and start over.
    pub(crate) fn reset(&mut self, facing: CameraFacing) {
        *self = Self::new(facing);
    }
}

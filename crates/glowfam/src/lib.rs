//! `glowfam` - Photo-based child height estimation
//!
//! This library drives the capture screen: it takes the height of an adult
//! as a reference, keeps the phone upright with a live tilt indicator,
//! takes the photo (optionally after a countdown), and sends it to the
//! estimation backend. The estimate can then be saved to the child's
//! profile and the annotated image to the photo library.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod backend;
pub mod camera;
pub mod cli;
pub mod config;
pub mod controller;
pub mod countdown;
pub mod error;
pub mod logging;
pub mod media;
pub mod notification;
pub mod permission;
pub mod platform;
pub mod sensor;
pub mod session;
pub mod tilt;

pub use backend::{
    EstimationBackend, EstimationRequest, HttpBackend, MeasurementRecord, SaveMeasurementRequest,
};
pub use camera::{Camera, CameraFacing, CapturedPhoto, ShotOptions};
pub use config::Config;
pub use controller::{
    CaptureController, CountdownStep, FlowServices, FlowSettings, MeasurementContext,
    PressOutcome, ScreenHandle,
};
pub use countdown::{Countdown, CountdownEvent};
pub use error::{Error, ErrorKind, Result};
pub use logging::init_logging;
pub use media::MediaLibrary;
pub use notification::{Level, Notification};
pub use permission::PermissionState;
pub use sensor::{MotionSample, MotionSensor, MotionStream, SensorSubscription};
pub use session::{AnnotatedImage, CaptureSession, EstimationResult, ReferenceHeight, Step};
pub use tilt::{IndicatorColor, TiltBand, TiltIndicator, TiltPolicy, TiltReading};

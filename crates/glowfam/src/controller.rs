//! The capture flow controller.
//!
//! [`CaptureController`] is the headless capture screen. It walks a
//! [`CaptureSession`] through `AwaitingReferenceHeight → Capturing →
//! Result`, owns the orientation subscription while capturing, runs the
//! shutter countdown, and talks to the estimation backend.
//!
//! Every operation takes `&mut self`, so user actions are serialized: a
//! save cannot interleave with "measure again", and a second shutter press
//! is refused while a countdown or upload is running. The only thing that
//! can change under an in-flight call is the [`ScreenHandle`], which another
//! task may use to close the screen; results that arrive after that are
//! dropped.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::{EstimationBackend, EstimationRequest, SaveMeasurementRequest};
use crate::camera::{Camera, CameraFacing, ShotOptions};
use crate::config::Config;
use crate::countdown::{Countdown, CountdownEvent};
use crate::error::{Error, ErrorKind, Result};
use crate::media::{self, MediaLibrary};
use crate::notification::Notification;
use crate::sensor::{MotionSensor, SensorSubscription};
use crate::session::{CaptureSession, EstimationResult, ReferenceHeight, Step};
use crate::tilt::{TiltIndicator, TiltPolicy, TiltReading};

/// Tunables of the capture flow.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSettings {
    /// Countdown length in seconds.
    pub countdown_secs: u32,
    /// Orientation update interval.
    pub sensor_interval: Duration,
    /// JPEG quality handed to the camera.
    pub jpeg_quality: f32,
    /// Lens selected on open and after a reset.
    pub default_facing: CameraFacing,
    /// Album the annotated image is saved into.
    pub album: String,
    /// Where images are staged before import.
    pub cache_dir: PathBuf,
    /// Upper bound for the estimation call.
    pub upload_timeout: Duration,
    /// Upper bound for the save call.
    pub save_timeout: Duration,
    /// Tilt bands.
    pub tilt: TiltPolicy,
}

impl FlowSettings {
    /// Settings derived from the application configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            countdown_secs: config.capture.countdown_secs,
            sensor_interval: config.sensor_interval(),
            jpeg_quality: config.capture.jpeg_quality,
            default_facing: config.capture.default_facing,
            album: config.capture.album.clone(),
            cache_dir: config.cache_dir(),
            upload_timeout: config.upload_timeout(),
            save_timeout: config.request_timeout(),
            tilt: TiltPolicy::from(&config.tilt),
        }
    }
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Who the measurement is for.
///
/// Passed in when the screen opens; the controller never looks these up
/// on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeasurementContext {
    /// Child profile a saved measurement is attached to.
    pub kid_info_no: Option<u64>,
    /// Family of that child.
    pub family_no: Option<u64>,
}

/// The device and remote services the screen uses.
pub struct FlowServices {
    /// Camera.
    pub camera: Box<dyn Camera>,
    /// Orientation sensor.
    pub motion: Arc<dyn MotionSensor>,
    /// Photo library.
    pub media: Arc<dyn MediaLibrary>,
    /// Estimation backend.
    pub backend: Arc<dyn EstimationBackend>,
}

impl std::fmt::Debug for FlowServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowServices")
            .field("camera", &self.camera.name())
            .field("motion", &self.motion.name())
            .field("media", &self.media.name())
            .finish_non_exhaustive()
    }
}

/// A lightweight, cloneable handle to close the screen.
///
/// Closing is one-way. Once closed, the controller drops its sensor
/// subscription and countdown at the next opportunity and discards results
/// of calls that were still in flight.
#[derive(Debug, Clone, Default)]
pub struct ScreenHandle {
    closed: Arc<AtomicBool>,
}

impl ScreenHandle {
    /// Create a handle for an open screen.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the screen.
    pub fn unmount(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Check if the screen was closed.
    #[must_use]
    pub fn is_unmounted(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// What a shutter press did.
#[derive(Debug, Clone, PartialEq)]
pub enum PressOutcome {
    /// The photo was taken and estimated right away.
    Measured(EstimationResult),
    /// A countdown started; drive it with
    /// [`CaptureController::next_countdown_step`].
    CountdownStarted {
        /// Countdown length.
        seconds: u32,
    },
}

/// Progress of a running countdown.
#[derive(Debug, Clone, PartialEq)]
pub enum CountdownStep {
    /// No countdown is running.
    Idle,
    /// One second passed.
    Tick {
        /// Seconds left.
        remaining: u32,
    },
    /// The countdown reached zero and the estimate succeeded.
    Measured(EstimationResult),
}

/// The capture screen.
pub struct CaptureController {
    settings: FlowSettings,
    context: MeasurementContext,
    services: FlowServices,
    session: CaptureSession,
    subscription: Option<SensorSubscription>,
    countdown: Option<Countdown>,
    uploading: bool,
    screen: ScreenHandle,
    notifications: VecDeque<Notification>,
}

impl std::fmt::Debug for CaptureController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureController")
            .field("context", &self.context)
            .field("session", &self.session)
            .field("subscribed", &self.subscription.is_some())
            .field("countdown", &self.countdown.as_ref().map(Countdown::remaining))
            .field("uploading", &self.uploading)
            .field("services", &self.services)
            .finish_non_exhaustive()
    }
}

impl CaptureController {
    /// Open the screen.
    #[must_use]
    pub fn new(settings: FlowSettings, context: MeasurementContext, services: FlowServices) -> Self {
        let session = CaptureSession::new(settings.default_facing);
        debug!(?context, ?services, "Capture screen opened");
        Self {
            settings,
            context,
            services,
            session,
            subscription: None,
            countdown: None,
            uploading: false,
            screen: ScreenHandle::new(),
            notifications: VecDeque::new(),
        }
    }

    /// Current session state.
    #[must_use]
    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    /// Current step.
    #[must_use]
    pub fn step(&self) -> Step {
        self.session.step
    }

    /// Identifiers the screen was opened with.
    #[must_use]
    pub fn context(&self) -> MeasurementContext {
        self.context
    }

    /// A handle that can close this screen from another task.
    #[must_use]
    pub fn screen_handle(&self) -> ScreenHandle {
        self.screen.clone()
    }

    /// Whether the shutter is disabled by a running countdown or upload.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.uploading || self.countdown.is_some()
    }

    /// Whether the orientation listener is attached.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Remove and return all pending notifications.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }

    /// Update the reference height text field.
    pub fn set_reference_input(&mut self, input: impl Into<String>) {
        self.session.reference_input = input.into();
    }

    /// Accept a reference height and start the live preview.
    ///
    /// # Errors
    ///
    /// Fails with a validation error for unusable input, or a permission
    /// error if the camera or motion sensor is not available. The step does
    /// not change on failure.
    pub fn submit_reference_height(&mut self, input: &str) -> Result<()> {
        if self.session.step != Step::AwaitingReferenceHeight {
            return self.fail(Error::InvalidState {
                action: "enter a reference height",
                step: self.session.step,
            });
        }
        self.session.reference_input = input.to_string();
        let height = match ReferenceHeight::parse(input) {
            Ok(height) => height,
            Err(e) => return self.fail(e),
        };
        self.enter_capturing(height)
    }

    fn enter_capturing(&mut self, height: ReferenceHeight) -> Result<()> {
        if let Err(e) = self.services.camera.permission().require("camera") {
            return self.fail(e);
        }
        let subscription = match SensorSubscription::acquire(
            self.services.motion.as_ref(),
            self.settings.sensor_interval,
        ) {
            Ok(subscription) => subscription,
            Err(e) => return self.fail(e),
        };

        self.subscription = Some(subscription);
        self.session.reference_height = Some(height);
        self.session.step = Step::Capturing;
        info!(reference_cm = height.cm(), "Capturing");
        Ok(())
    }

    /// Switch between the front and back lens.
    pub fn toggle_facing(&mut self) -> CameraFacing {
        self.session.facing = self.session.facing.toggled();
        debug!(facing = %self.session.facing, "Lens switched");
        self.session.facing
    }

    /// Turn the shutter countdown on or off.
    pub fn toggle_timer(&mut self) -> bool {
        self.session.timer_enabled = !self.session.timer_enabled;
        debug!(enabled = self.session.timer_enabled, "Timer toggled");
        self.session.timer_enabled
    }

    /// Pull the latest reading from the sensor into the session and return
    /// the indicator to show.
    pub fn refresh_tilt(&mut self) -> Option<TiltIndicator> {
        self.latest_tilt();
        self.settings.tilt.indicator(self.session.tilt)
    }

    fn latest_tilt(&mut self) -> Option<TiltReading> {
        if let Some(reading) = self.subscription.as_ref().and_then(SensorSubscription::latest) {
            self.session.tilt = Some(reading);
        }
        self.session.tilt
    }

    /// A receiver that wakes on every new tilt reading while capturing.
    #[must_use]
    pub fn tilt_updates(&self) -> Option<watch::Receiver<Option<TiltReading>>> {
        self.subscription.as_ref().map(SensorSubscription::watch)
    }

    /// Press the shutter.
    ///
    /// From `AwaitingReferenceHeight` the typed reference height is
    /// validated first and the preview started. With the timer on, this
    /// starts the countdown; otherwise the photo is taken and estimated
    /// immediately.
    ///
    /// # Errors
    ///
    /// Fails if the reference height is unusable, a capture is already in
    /// progress, the step is `Result`, or the capture or upload fails. On
    /// capture and upload failures the screen stays in `Capturing` with the
    /// photo discarded.
    pub async fn press_capture(&mut self) -> Result<PressOutcome> {
        self.ensure_mounted()?;
        if self.is_busy() {
            return self.fail(Error::CaptureInProgress);
        }

        let step = self.session.step;
        if step == Step::Result {
            return self.fail(Error::InvalidState {
                action: "take a photo",
                step,
            });
        }

        let height = match ReferenceHeight::parse(&self.session.reference_input) {
            Ok(height) => height,
            Err(e) => return self.fail(e),
        };
        if step == Step::AwaitingReferenceHeight {
            self.enter_capturing(height)?;
        } else {
            self.session.reference_height = Some(height);
        }

        // A zero-length countdown shoots right away.
        if self.session.timer_enabled && self.settings.countdown_secs > 0 {
            let seconds = self.settings.countdown_secs;
            self.countdown = Some(Countdown::start(seconds));
            self.session.countdown_remaining = seconds;
            return Ok(PressOutcome::CountdownStarted { seconds });
        }

        self.capture_and_upload().await.map(PressOutcome::Measured)
    }

    /// Wait for the next countdown event.
    ///
    /// When the countdown reaches zero the photo is taken and estimated,
    /// exactly once.
    ///
    /// # Errors
    ///
    /// Fails like [`Self::press_capture`] when the capture or upload fails.
    pub async fn next_countdown_step(&mut self) -> Result<CountdownStep> {
        if self.screen.is_unmounted() {
            self.unmount();
            return Ok(CountdownStep::Idle);
        }
        let Some(countdown) = self.countdown.as_mut() else {
            return Ok(CountdownStep::Idle);
        };

        let event = countdown.next_event().await;
        if self.screen.is_unmounted() {
            self.unmount();
            return Ok(CountdownStep::Idle);
        }

        match event {
            Some(CountdownEvent::Tick { remaining }) => {
                self.session.countdown_remaining = remaining;
                Ok(CountdownStep::Tick { remaining })
            }
            Some(CountdownEvent::Elapsed) => {
                self.stop_countdown();
                self.capture_and_upload()
                    .await
                    .map(CountdownStep::Measured)
            }
            None => {
                self.stop_countdown();
                Ok(CountdownStep::Idle)
            }
        }
    }

    /// Drive a running countdown to the end.
    ///
    /// Returns `None` if no countdown was running or the screen closed.
    ///
    /// # Errors
    ///
    /// Fails like [`Self::next_countdown_step`].
    pub async fn run_countdown(&mut self) -> Result<Option<EstimationResult>> {
        loop {
            match self.next_countdown_step().await? {
                CountdownStep::Idle => return Ok(None),
                CountdownStep::Tick { remaining } => debug!(remaining, "countdown"),
                CountdownStep::Measured(result) => return Ok(Some(result)),
            }
        }
    }

    fn stop_countdown(&mut self) {
        self.countdown = None;
        self.session.countdown_remaining = 0;
    }

    async fn capture_and_upload(&mut self) -> Result<EstimationResult> {
        self.uploading = true;
        let outcome = self.capture_and_estimate().await;
        self.uploading = false;
        self.session.countdown_remaining = 0;

        if self.screen.is_unmounted() {
            debug!("Screen closed during upload; dropping the result");
            self.session.captured_photo = None;
            self.unmount();
            return Err(Error::ScreenClosed);
        }

        match outcome {
            Ok(result) => {
                info!(
                    height_cm = result.child_height_cm,
                    "Measurement ready: {}",
                    result.headline()
                );
                self.session.estimation_result = Some(result.clone());
                self.session.step = Step::Result;
                self.subscription = None;
                Ok(result)
            }
            Err(e) => {
                self.session.captured_photo = None;
                self.fail(e)
            }
        }
    }

    async fn capture_and_estimate(&mut self) -> Result<EstimationResult> {
        let reference_height = self
            .session
            .reference_height
            .ok_or_else(|| Error::internal("capture without a reference height"))?;

        let options = ShotOptions {
            facing: self.session.facing,
            quality: self.settings.jpeg_quality,
        };
        let photo = self.services.camera.take_picture(options).await?;
        if photo.is_empty() {
            return Err(Error::capture("camera returned an empty image"));
        }
        self.session.captured_photo = Some(photo.uri.clone());

        let tilt = self.latest_tilt();
        if let Some(indicator) = self.settings.tilt.indicator(tilt) {
            debug!(%indicator, "Tilt at capture");
        }

        let request = EstimationRequest {
            photo,
            reference_height,
            tilt,
        };
        let backend = Arc::clone(&self.services.backend);
        tokio::time::timeout(self.settings.upload_timeout, backend.estimate(&request))
            .await
            .unwrap_or_else(|_| {
                Err(Error::Timeout {
                    operation: "photo upload".to_string(),
                })
            })
    }

    /// Go back to entering a reference height, forgetting the result.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidState`] outside the `Result` step.
    pub fn measure_again(&mut self) -> Result<()> {
        if self.session.step != Step::Result {
            return self.fail(Error::InvalidState {
                action: "measure again",
                step: self.session.step,
            });
        }
        self.stop_countdown();
        self.subscription = None;
        self.session.reset(self.settings.default_facing);
        info!("Measuring again");
        Ok(())
    }

    /// Store the estimate for the child profile the screen was opened for.
    ///
    /// The step does not change, whether or not the save works.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidState`] outside the `Result` step and with
    /// [`Error::Save`] if there is no child profile or the backend refuses.
    pub async fn save_measurement(&mut self) -> Result<()> {
        self.ensure_mounted()?;
        let Some(height_cm) = self.current_result().map(|r| r.child_height_cm) else {
            return self.fail(Error::InvalidState {
                action: "save the measurement",
                step: self.session.step,
            });
        };
        let Some(kid_info_no) = self.context.kid_info_no else {
            return self.fail(Error::save("measurement", "no child profile selected"));
        };

        let request = SaveMeasurementRequest {
            kid_info_no,
            height_cm,
        };
        let backend = Arc::clone(&self.services.backend);
        let outcome = tokio::time::timeout(
            self.settings.save_timeout,
            backend.save_measurement(&request),
        )
        .await
        .unwrap_or_else(|_| {
            Err(Error::Timeout {
                operation: "save measurement".to_string(),
            })
        });
        self.ensure_mounted()?;

        match outcome {
            Ok(()) => {
                info!(kid_info_no, height_cm, "Measurement saved");
                self.notifications
                    .push_back(Notification::info("Saved", "The measurement was saved."));
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::Save => self.fail(e),
            Err(e) => self.fail(Error::save("measurement", e.to_string())),
        }
    }

    /// Save the annotated image into the photo library.
    ///
    /// The step does not change, whether or not the save works.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidState`] outside the `Result` step, with a
    /// permission error if the library is not writable, and with
    /// [`Error::Save`] if staging or importing fails.
    pub async fn save_image(&mut self) -> Result<PathBuf> {
        self.ensure_mounted()?;
        let Some(image) = self.current_result().map(|r| r.annotated_image.clone()) else {
            return self.fail(Error::InvalidState {
                action: "save the image",
                step: self.session.step,
            });
        };
        if let Err(e) = self.services.media.permission().require("photo library") {
            return self.fail(e);
        }

        let staged = match media::stage_image(&self.settings.cache_dir, &image).await {
            Ok(path) => path,
            Err(e) => return self.fail(Error::save("image", e.to_string())),
        };
        let media = Arc::clone(&self.services.media);
        match media.save_to_album(&staged, &self.settings.album).await {
            Ok(asset) => {
                info!("Annotated image saved to {}", asset.display());
                self.notifications.push_back(Notification::info(
                    "Saved",
                    "The image was saved to the gallery.",
                ));
                Ok(asset)
            }
            Err(e) => self.fail(Error::save("image", e.to_string())),
        }
    }

    fn current_result(&self) -> Option<&EstimationResult> {
        if self.session.step == Step::Result {
            self.session.estimation_result.as_ref()
        } else {
            None
        }
    }

    /// Close the screen: stop listening to the sensor and cancel any
    /// countdown.
    pub fn unmount(&mut self) {
        if !self.screen.is_unmounted() {
            debug!("Capture screen closed");
        }
        self.screen.unmount();
        self.stop_countdown();
        self.subscription = None;
    }

    fn ensure_mounted(&mut self) -> Result<()> {
        if self.screen.is_unmounted() {
            self.unmount();
            Err(Error::ScreenClosed)
        } else {
            Ok(())
        }
    }

    fn fail<T>(&mut self, err: Error) -> Result<T> {
        warn!(kind = %err.kind(), "{err}");
        if !self.screen.is_unmounted() {
            self.notifications.push_back(Notification::from(&err));
        }
        debug_assert!(self.session.is_consistent());
        Err(err)
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use tokio::time::Instant;

    use super::*;
    use crate::backend::MeasurementRecord;
    use crate::camera::CapturedPhoto;
    use crate::permission::PermissionState;
    use crate::sensor::{MotionSample, MotionStream};
    use crate::session::AnnotatedImage;
    use crate::tilt::IndicatorColor;

    const JPEG_B64: &str = "/9j/4AAQ";

    #[derive(Default)]
    struct Probe {
        shots: AtomicUsize,
        estimates: AtomicUsize,
        saves: Mutex<Vec<SaveMeasurementRequest>>,
        imports: Mutex<Vec<(PathBuf, String)>>,
        last_request: Mutex<Option<(String, Option<TiltReading>)>>,
    }

    struct FakeCamera {
        granted: bool,
        broken: bool,
        probe: Arc<Probe>,
    }

    #[async_trait::async_trait]
    impl Camera for FakeCamera {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn permission(&self) -> PermissionState {
            if self.granted {
                PermissionState::granted()
            } else {
                PermissionState::denied("camera access refused")
            }
        }

        async fn take_picture(&mut self, _options: ShotOptions) -> Result<CapturedPhoto> {
            self.probe.shots.fetch_add(1, Ordering::SeqCst);
            if self.broken {
                return Err(Error::capture("shutter jammed"));
            }
            Ok(CapturedPhoto::new("/tmp/shot.jpg", vec![0xff, 0xd8, 0xff]))
        }
    }

    struct FakeMotion {
        beta: f64,
    }

    struct FakeStream {
        beta: f64,
        interval: Duration,
    }

    #[async_trait::async_trait]
    impl MotionStream for FakeStream {
        async fn next_sample(&mut self) -> Option<MotionSample> {
            tokio::time::sleep(self.interval).await;
            Some(MotionSample {
                beta: Some(self.beta),
            })
        }
    }

    impl MotionSensor for FakeMotion {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn permission(&self) -> PermissionState {
            PermissionState::granted()
        }

        fn open(&self, interval: Duration) -> Result<Box<dyn MotionStream>> {
            Ok(Box::new(FakeStream {
                beta: self.beta,
                interval,
            }))
        }
    }

    struct FakeMedia {
        probe: Arc<Probe>,
    }

    #[async_trait::async_trait]
    impl MediaLibrary for FakeMedia {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn permission(&self) -> PermissionState {
            PermissionState::granted()
        }

        async fn save_to_album(&self, file: &Path, album: &str) -> Result<PathBuf> {
            self.probe
                .imports
                .lock()
                .unwrap()
                .push((file.to_path_buf(), album.to_string()));
            Ok(PathBuf::from("/library").join(album).join("annot.jpg"))
        }
    }

    #[derive(Clone, Copy)]
    enum Reply {
        Height(f64),
        Reject(&'static str),
        Malformed,
        Hang,
        CloseScreen,
    }

    struct FakeBackend {
        reply: Reply,
        save_ok: bool,
        probe: Arc<Probe>,
        screen: Mutex<Option<ScreenHandle>>,
    }

    #[async_trait::async_trait]
    impl EstimationBackend for FakeBackend {
        async fn estimate(&self, request: &EstimationRequest) -> Result<EstimationResult> {
            self.probe.estimates.fetch_add(1, Ordering::SeqCst);
            *self.probe.last_request.lock().unwrap() =
                Some((request.reference_height.to_form_value(), request.tilt));
            match self.reply {
                Reply::Height(h) => Ok(EstimationResult {
                    child_height_cm: h,
                    annotated_image: AnnotatedImage::from_base64(JPEG_B64)?,
                    reference_distance_cm: None,
                }),
                Reply::Reject(msg) => Err(Error::rejected(msg)),
                Reply::Malformed => Err(Error::malformed("missing annotated_image")),
                Reply::Hang => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
                Reply::CloseScreen => {
                    let screen = self.screen.lock().unwrap().clone();
                    if let Some(screen) = screen {
                        screen.unmount();
                    }
                    Ok(EstimationResult {
                        child_height_cm: 100.0,
                        annotated_image: AnnotatedImage::from_base64(JPEG_B64)?,
                        reference_distance_cm: None,
                    })
                }
            }
        }

        async fn save_measurement(&self, request: &SaveMeasurementRequest) -> Result<()> {
            self.probe.saves.lock().unwrap().push(*request);
            if self.save_ok {
                Ok(())
            } else {
                Err(Error::save("measurement", "database unavailable"))
            }
        }

        async fn measurement_history(&self, _family_no: u64) -> Result<Vec<MeasurementRecord>> {
            Ok(Vec::new())
        }
    }

    struct Fixture {
        camera_granted: bool,
        camera_broken: bool,
        reply: Reply,
        save_ok: bool,
        tilt_degrees: f64,
        kid_info_no: Option<u64>,
        cache_dir: PathBuf,
    }

    impl Default for Fixture {
        fn default() -> Self {
            Self {
                camera_granted: true,
                camera_broken: false,
                reply: Reply::Height(102.4),
                save_ok: true,
                tilt_degrees: 1.2,
                kid_info_no: Some(7),
                cache_dir: std::env::temp_dir().join("glowfam-controller-tests"),
            }
        }
    }

    impl Fixture {
        fn build(self) -> (CaptureController, Arc<Probe>, Arc<FakeBackend>) {
            let probe = Arc::new(Probe::default());
            let backend = Arc::new(FakeBackend {
                reply: self.reply,
                save_ok: self.save_ok,
                probe: Arc::clone(&probe),
                screen: Mutex::new(None),
            });
            let services = FlowServices {
                camera: Box::new(FakeCamera {
                    granted: self.camera_granted,
                    broken: self.camera_broken,
                    probe: Arc::clone(&probe),
                }),
                motion: Arc::new(FakeMotion {
                    beta: FRAC_PI_2 + self.tilt_degrees.to_radians(),
                }),
                media: Arc::new(FakeMedia {
                    probe: Arc::clone(&probe),
                }),
                backend: Arc::clone(&backend) as Arc<dyn EstimationBackend>,
            };
            let settings = FlowSettings {
                cache_dir: self.cache_dir,
                ..FlowSettings::default()
            };
            let context = MeasurementContext {
                kid_info_no: self.kid_info_no,
                family_no: Some(3),
            };
            let controller = CaptureController::new(settings, context, services);
            *backend.screen.lock().unwrap() = Some(controller.screen_handle());
            (controller, probe, backend)
        }
    }

    #[tokio::test]
    async fn test_blank_reference_is_rejected_without_upload() {
        let (mut controller, probe, _) = Fixture::default().build();

        let err = controller.press_capture().await.unwrap_err();
        assert!(matches!(err, Error::InvalidReferenceHeight { .. }));
        assert_eq!(controller.step(), Step::AwaitingReferenceHeight);
        assert_eq!(probe.estimates.load(Ordering::SeqCst), 0);
        assert_eq!(probe.shots.load(Ordering::SeqCst), 0);

        let notes = controller.take_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_unusable_references_keep_first_step() {
        let (mut controller, probe, _) = Fixture::default().build();
        for input in ["", "abc", "0", "-170", "1e999"] {
            controller.set_reference_input(input);
            assert!(controller.press_capture().await.is_err(), "{input:?}");
            assert!(controller.submit_reference_height(input).is_err(), "{input:?}");
            assert_eq!(controller.step(), Step::AwaitingReferenceHeight);
            assert!(!controller.is_subscribed());
        }
        assert_eq!(probe.estimates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_capture_success() {
        let (mut controller, probe, _) = Fixture::default().build();
        controller.submit_reference_height("175").unwrap();
        assert_eq!(controller.step(), Step::Capturing);
        assert!(controller.is_subscribed());

        tokio::time::sleep(Duration::from_millis(250)).await;
        let indicator = controller.refresh_tilt().unwrap();
        assert_eq!(indicator.color, IndicatorColor::Green);

        let outcome = controller.press_capture().await.unwrap();
        let PressOutcome::Measured(result) = outcome else {
            panic!("expected an immediate measurement");
        };
        assert_eq!(result.headline(), "아이 예측 키: 102.4 cm");
        assert_eq!(controller.step(), Step::Result);
        assert!(controller.session().estimation_result().is_some());
        assert!(controller.session().is_consistent());
        assert!(!controller.is_subscribed());
        assert_eq!(probe.estimates.load(Ordering::SeqCst), 1);

        let (reference, tilt) = probe.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(reference, "175");
        assert!((tilt.unwrap().degrees() - 1.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_press_from_first_step_enters_capturing() {
        let (mut controller, probe, _) = Fixture::default().build();
        controller.set_reference_input("175");
        controller.press_capture().await.unwrap();
        assert_eq!(controller.step(), Step::Result);
        assert_eq!(probe.shots.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backend_rejection_stays_capturing() {
        let (mut controller, _, _) = Fixture {
            reply: Reply::Reject("두 사람 미검출"),
            ..Fixture::default()
        }
        .build();
        controller.submit_reference_height("175").unwrap();

        let err = controller.press_capture().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendRejected);
        assert_eq!(controller.step(), Step::Capturing);
        assert!(controller.session().estimation_result().is_none());
        assert!(controller.session().captured_photo().is_none());
        assert_eq!(controller.session().countdown_remaining(), 0);
        assert!(!controller.is_busy());

        let notes = controller.take_notifications();
        assert!(notes[0].message.contains("두 사람 미검출"));
    }

    #[tokio::test]
    async fn test_malformed_response_stays_capturing() {
        let (mut controller, _, _) = Fixture {
            reply: Reply::Malformed,
            ..Fixture::default()
        }
        .build();
        controller.submit_reference_height("175").unwrap();

        let err = controller.press_capture().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(controller.step(), Step::Capturing);
        assert!(controller.session().estimation_result().is_none());
    }

    #[tokio::test]
    async fn test_capture_failure_reenables_controls() {
        let (mut controller, probe, _) = Fixture {
            camera_broken: true,
            ..Fixture::default()
        }
        .build();
        controller.submit_reference_height("175").unwrap();

        let err = controller.press_capture().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capture);
        assert_eq!(controller.step(), Step::Capturing);
        assert!(!controller.is_busy());
        assert_eq!(probe.estimates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_camera_permission_denied_blocks_preview() {
        let (mut controller, _, _) = Fixture {
            camera_granted: false,
            ..Fixture::default()
        }
        .build();

        let err = controller.submit_reference_height("175").unwrap_err();
        assert!(err.is_permission_error());
        assert_eq!(controller.step(), Step::AwaitingReferenceHeight);
        assert!(!controller.is_subscribed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_capture_fires_once_at_zero() {
        let (mut controller, probe, _) = Fixture::default().build();
        controller.submit_reference_height("175").unwrap();
        assert!(controller.toggle_timer());

        let start = Instant::now();
        let outcome = controller.press_capture().await.unwrap();
        assert_eq!(outcome, PressOutcome::CountdownStarted { seconds: 10 });
        assert_eq!(controller.session().countdown_remaining(), 10);

        for expected in (1..10).rev() {
            let step = controller.next_countdown_step().await.unwrap();
            assert_eq!(step, CountdownStep::Tick { remaining: expected });
            assert_eq!(controller.session().countdown_remaining(), expected);
            assert_eq!(probe.estimates.load(Ordering::SeqCst), 0);
        }

        let step = controller.next_countdown_step().await.unwrap();
        assert!(matches!(step, CountdownStep::Measured(_)));
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(probe.estimates.load(Ordering::SeqCst), 1);
        assert_eq!(controller.session().countdown_remaining(), 0);
        assert_eq!(controller.step(), Step::Result);

        assert_eq!(
            controller.next_countdown_step().await.unwrap(),
            CountdownStep::Idle
        );
        assert_eq!(probe.estimates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_press_during_countdown_is_refused() {
        let (mut controller, probe, _) = Fixture::default().build();
        controller.submit_reference_height("175").unwrap();
        controller.toggle_timer();
        controller.press_capture().await.unwrap();
        controller.next_countdown_step().await.unwrap();

        let err = controller.press_capture().await.unwrap_err();
        assert!(matches!(err, Error::CaptureInProgress));
        assert_eq!(controller.session().countdown_remaining(), 9);

        let result = controller.run_countdown().await.unwrap();
        assert!(result.is_some());
        assert_eq!(probe.estimates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_mid_countdown_never_captures() {
        let (mut controller, probe, _) = Fixture::default().build();
        controller.submit_reference_height("175").unwrap();
        controller.toggle_timer();
        controller.press_capture().await.unwrap();
        controller.next_countdown_step().await.unwrap();
        controller.next_countdown_step().await.unwrap();

        controller.screen_handle().unmount();
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(
            controller.next_countdown_step().await.unwrap(),
            CountdownStep::Idle
        );
        assert!(!controller.is_busy());
        assert!(!controller.is_subscribed());
        assert_eq!(probe.shots.load(Ordering::SeqCst), 0);
        assert_eq!(probe.estimates.load(Ordering::SeqCst), 0);
        assert!(matches!(
            controller.press_capture().await,
            Err(Error::ScreenClosed)
        ));
    }

    #[tokio::test]
    async fn test_unmount_releases_sensor() {
        let (mut controller, _, _) = Fixture::default().build();
        controller.submit_reference_height("175").unwrap();
        assert!(controller.tilt_updates().is_some());
        controller.unmount();
        assert!(!controller.is_subscribed());
        assert!(controller.tilt_updates().is_none());
        assert!(controller.screen_handle().is_unmounted());
    }

    #[tokio::test]
    async fn test_result_arriving_after_unmount_is_dropped() {
        let (mut controller, _, _) = Fixture {
            reply: Reply::CloseScreen,
            ..Fixture::default()
        }
        .build();
        controller.submit_reference_height("175").unwrap();

        let err = controller.press_capture().await.unwrap_err();
        assert!(matches!(err, Error::ScreenClosed));
        assert_ne!(controller.step(), Step::Result);
        assert!(controller.session().estimation_result().is_none());
        assert!(controller.take_notifications().is_empty());
        assert!(!controller.is_subscribed());
        assert!(controller.tilt_updates().is_none());
    }

    #[tokio::test]
    async fn test_closed_handle_releases_sensor_on_next_action() {
        let (mut controller, _, _) = Fixture::default().build();
        controller.submit_reference_height("175").unwrap();
        assert!(controller.is_subscribed());

        controller.screen_handle().unmount();
        assert!(matches!(
            controller.press_capture().await,
            Err(Error::ScreenClosed)
        ));
        assert!(!controller.is_subscribed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_countdown_captures_immediately() {
        let (mut controller, probe, _) = Fixture::default().build();
        controller.settings.countdown_secs = 0;
        controller.submit_reference_height("175").unwrap();
        controller.toggle_timer();

        let outcome = controller.press_capture().await.unwrap();
        assert!(matches!(outcome, PressOutcome::Measured(_)));
        assert_eq!(probe.estimates.load(Ordering::SeqCst), 1);
        assert_eq!(controller.step(), Step::Result);
        assert!(!controller.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_upload_times_out() {
        let (mut controller, _, _) = Fixture {
            reply: Reply::Hang,
            ..Fixture::default()
        }
        .build();
        controller.submit_reference_height("175").unwrap();

        let err = controller.press_capture().await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(controller.step(), Step::Capturing);
        assert!(!controller.is_busy());
    }

    #[tokio::test]
    async fn test_save_measurement_snapshot() {
        let (mut controller, probe, _) = Fixture::default().build();
        controller.submit_reference_height("175").unwrap();
        controller.press_capture().await.unwrap();

        controller.save_measurement().await.unwrap();
        assert_eq!(controller.step(), Step::Result);
        let saves = probe.saves.lock().unwrap().clone();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].kid_info_no, 7);
        assert!((saves[0].height_cm - 102.4).abs() < f64::EPSILON);

        let notes = controller.take_notifications();
        assert!(!notes.last().unwrap().is_error());
    }

    #[tokio::test]
    async fn test_save_measurement_failure_keeps_result() {
        let (mut controller, _, _) = Fixture {
            save_ok: false,
            ..Fixture::default()
        }
        .build();
        controller.submit_reference_height("175").unwrap();
        controller.press_capture().await.unwrap();

        let err = controller.save_measurement().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Save);
        assert_eq!(controller.step(), Step::Result);
        assert!(controller.session().estimation_result().is_some());
    }

    #[tokio::test]
    async fn test_save_measurement_without_child() {
        let (mut controller, probe, _) = Fixture {
            kid_info_no: None,
            ..Fixture::default()
        }
        .build();
        controller.submit_reference_height("175").unwrap();
        controller.press_capture().await.unwrap();

        let err = controller.save_measurement().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Save);
        assert!(probe.saves.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_before_result_is_refused() {
        let (mut controller, _, _) = Fixture::default().build();
        let err = controller.save_measurement().await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
        let err = controller.save_image().await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_save_image_stages_then_imports() {
        let dir = tempfile::tempdir().unwrap();
        let (mut controller, probe, _) = Fixture {
            cache_dir: dir.path().join("cache"),
            ..Fixture::default()
        }
        .build();
        controller.submit_reference_height("175").unwrap();
        controller.press_capture().await.unwrap();

        let asset = controller.save_image().await.unwrap();
        assert_eq!(asset, PathBuf::from("/library/Download/annot.jpg"));
        assert_eq!(controller.step(), Step::Result);

        let imports = probe.imports.lock().unwrap().clone();
        assert_eq!(imports.len(), 1);
        let (staged, album) = &imports[0];
        assert_eq!(album, "Download");
        assert!(staged.starts_with(dir.path().join("cache")));
        assert_eq!(std::fs::read(staged).unwrap(), vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10]);
    }

    #[tokio::test]
    async fn test_measure_again_resets_session() {
        let (mut controller, _, _) = Fixture::default().build();
        controller.submit_reference_height("175").unwrap();
        controller.toggle_timer();
        controller.toggle_facing();
        controller.toggle_timer();
        controller.press_capture().await.unwrap();
        assert_eq!(controller.step(), Step::Result);

        controller.measure_again().unwrap();
        let session = controller.session();
        assert_eq!(session.step(), Step::AwaitingReferenceHeight);
        assert!(session.estimation_result().is_none());
        assert!(session.reference_height().is_none());
        assert_eq!(session.reference_input(), "");
        assert_eq!(session.facing(), CameraFacing::Back);
        assert!(!session.timer_enabled());
        assert_eq!(controller.context().kid_info_no, Some(7));

        let err = controller.measure_again().unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_press_in_result_is_refused() {
        let (mut controller, probe, _) = Fixture::default().build();
        controller.submit_reference_height("175").unwrap();
        controller.press_capture().await.unwrap();

        let err = controller.press_capture().await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
        assert_eq!(probe.estimates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_screen_handle_shared() {
        let handle = ScreenHandle::new();
        let clone = handle.clone();
        assert!(!clone.is_unmounted());
        handle.unmount();
        assert!(clone.is_unmounted());
    }

    #[test]
    fn test_flow_settings_from_config() {
        let mut config = Config::default();
        config.capture.countdown_secs = 3;
        config.capture.album = "Growth".to_string();
        let settings = FlowSettings::from_config(&config);
        assert_eq!(settings.countdown_secs, 3);
        assert_eq!(settings.album, "Growth");
        assert_eq!(settings.sensor_interval, Duration::from_millis(200));
        assert_eq!(settings.upload_timeout, Duration::from_secs(30));
    }
}

//! Orientation sensor subscription.
//!
//! The capture screen listens to device motion only while it is in the
//! capturing step. [`SensorSubscription`] owns the listener: it is acquired
//! on entry and released when dropped, so every exit path (result, reset,
//! unmount) tears the listener down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::Result;
use crate::permission::PermissionState;
use crate::tilt::TiltReading;

/// One raw motion sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    /// Rotation around the device x-axis in radians, if reported.
    pub beta: Option<f64>,
}

/// A live stream of motion samples.
#[async_trait::async_trait]
pub trait MotionStream: Send {
    /// Wait for the next sample; `None` when the stream has ended.
    async fn next_sample(&mut self) -> Option<MotionSample>;
}

/// A platform motion sensor.
pub trait MotionSensor: Send + Sync {
    /// The name of this sensor (for logging/debugging).
    fn name(&self) -> &'static str;

    /// Whether the user has granted motion access.
    fn permission(&self) -> PermissionState;

    /// Start listening, delivering one sample per `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Sensor`] if the listener cannot be attached.
    fn open(&self, interval: Duration) -> Result<Box<dyn MotionStream>>;
}

/// A lightweight, cloneable handle to stop a subscription.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionHandle {
    released: Arc<AtomicBool>,
}

impl SubscriptionHandle {
    /// Create a new handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the listener to stop.
    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    /// Check if the stop signal has been sent.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

/// An active orientation listener.
///
/// Only the latest reading is kept; a slow reader never sees a backlog.
#[derive(Debug)]
pub struct SensorSubscription {
    handle: SubscriptionHandle,
    task: JoinHandle<()>,
    readings: watch::Receiver<Option<TiltReading>>,
}

impl SensorSubscription {
    /// Check permission and start listening to `sensor`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a permission error if motion access is denied, or a sensor
    /// error if the listener cannot be attached.
    pub fn acquire(sensor: &dyn MotionSensor, interval: Duration) -> Result<Self> {
        sensor.permission().require("motion sensor")?;
        let mut stream = sensor.open(interval)?;
        debug!(sensor = sensor.name(), ?interval, "Subscribed to orientation updates");

        let (tx, readings) = watch::channel(None);
        let handle = SubscriptionHandle::new();
        let stop = handle.clone();

        let task = tokio::spawn(async move {
            while !stop.is_released() {
                let Some(sample) = stream.next_sample().await else {
                    debug!("Orientation stream ended");
                    break;
                };
                if stop.is_released() {
                    break;
                }
                if let Some(reading) = sample.beta.and_then(TiltReading::from_beta_radians) {
                    trace!(degrees = reading.degrees(), "tilt");
                    tx.send_replace(Some(reading));
                }
            }
        });

        Ok(Self {
            handle,
            task,
            readings,
        })
    }

    /// The most recent reading, if any arrived yet.
    #[must_use]
    pub fn latest(&self) -> Option<TiltReading> {
        *self.readings.borrow()
    }

    /// A receiver that wakes on every new reading.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Option<TiltReading>> {
        self.readings.clone()
    }

    /// A handle that can stop this subscription from elsewhere.
    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// Whether the listener task is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.handle.is_released() && !self.task.is_finished()
    }

    /// Stop listening.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for SensorSubscription {
    fn drop(&mut self) {
        self.handle.release();
        self.task.abort();
        debug!("Released orientation subscription");
    }
}

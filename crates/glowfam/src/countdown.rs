//! Cancellable shutter countdown.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::debug;

const TICK: Duration = Duration::from_secs(1);

/// Progress of a countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    /// One second passed; `remaining` seconds are left.
    Tick {
        /// Seconds left.
        remaining: u32,
    },
    /// The countdown reached zero. Delivered exactly once.
    Elapsed,
}

/// A running countdown.
///
/// Dropping the countdown cancels it; no event is delivered afterwards.
#[derive(Debug)]
pub struct Countdown {
    events: mpsc::Receiver<CountdownEvent>,
    task: JoinHandle<()>,
    remaining: u32,
}

impl Countdown {
    /// Start counting down from `seconds`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(seconds: u32) -> Self {
        // Room for every event, so the timer never waits on the reader.
        let capacity = usize::try_from(seconds).unwrap_or(usize::MAX).max(1);
        let (tx, events) = mpsc::channel(capacity);

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + TICK, TICK);
            for remaining in (0..seconds).rev() {
                ticker.tick().await;
                let event = if remaining == 0 {
                    CountdownEvent::Elapsed
                } else {
                    CountdownEvent::Tick { remaining }
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });

        debug!(seconds, "Countdown started");
        Self {
            events,
            task,
            remaining: seconds,
        }
    }

    /// Seconds left as of the last event received.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the countdown is over.
    pub async fn next_event(&mut self) -> Option<CountdownEvent> {
        let event = self.events.recv().await?;
        self.remaining = match event {
            CountdownEvent::Tick { remaining } => remaining,
            CountdownEvent::Elapsed => 0,
        };
        Some(event)
    }

    /// Stop the countdown.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        if !self.task.is_finished() {
            debug!(remaining = self.remaining, "Countdown cancelled");
        }
        self.task.abort();
    }
}

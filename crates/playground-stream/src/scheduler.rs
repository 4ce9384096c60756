//! Pacing between rendered updates.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::Sleep;

use crate::errors::PlayerError;

/// Lower bound applied to delays typed into the UI.
pub const MIN_USER_DELAY: Duration = Duration::from_millis(10);
/// Upper bound applied to delays typed into the UI.
pub const MAX_USER_DELAY: Duration = Duration::from_millis(3000);

/// Interval between two rendered updates. Always positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "Duration", into = "Duration")]
pub struct PacingDelay(Duration);

impl PacingDelay {
    /// Accepts any positive duration.
    pub fn new(delay: Duration) -> Result<Self, PlayerError> {
        if delay.is_zero() {
            return Err(PlayerError::Validation(
                "pacing delay must be greater than zero".into(),
            ));
        }
        Ok(Self(delay))
    }

    /// Clamps a user-typed millisecond value to the UI range.
    pub fn from_user_millis(millis: i64) -> Self {
        let clamped = millis.clamp(
            MIN_USER_DELAY.as_millis() as i64,
            MAX_USER_DELAY.as_millis() as i64,
        );
        Self(Duration::from_millis(clamped.unsigned_abs()))
    }

    pub fn get(self) -> Duration {
        self.0
    }
}

impl TryFrom<Duration> for PacingDelay {
    type Error = PlayerError;

    fn try_from(delay: Duration) -> Result<Self, Self::Error> {
        Self::new(delay)
    }
}

impl From<PacingDelay> for Duration {
    fn from(delay: PacingDelay) -> Self {
        delay.0
    }
}

impl Default for PacingDelay {
    fn default() -> Self {
        Self(Duration::from_millis(100))
    }
}

/// Holds at most one pending pacing timer.
///
/// `arm` replaces whatever timer was pending, so two renders can never be
/// scheduled at once. Without a delay the scheduler never waits.
#[derive(Debug, Default)]
pub struct PlaybackScheduler {
    delay: Option<PacingDelay>,
    pending: Option<Pin<Box<Sleep>>>,
}

impl PlaybackScheduler {
    pub fn new(delay: Option<PacingDelay>) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Option<PacingDelay> {
        self.delay
    }

    /// Starts the delay that must elapse before the next update.
    pub fn arm(&mut self) {
        self.pending = self
            .delay
            .map(|delay| Box::pin(tokio::time::sleep(delay.get())));
    }

    /// Drops the pending timer, if any.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Waits for the pending timer. Returns immediately when none is armed.
    ///
    /// Cancel-safe: if this future is dropped the timer stays armed.
    pub async fn wait(&mut self) {
        if let Some(sleep) = self.pending.as_mut() {
            sleep.as_mut().await;
            self.pending = None;
        }
    }
}

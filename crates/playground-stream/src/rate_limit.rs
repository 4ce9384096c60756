use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::errors::PlayerError;

/// Keeps requests disabled for a cool-down window after an HTTP 429.
#[derive(Debug, Default)]
pub struct RateLimitGate {
    blocked_until: Mutex<Option<Instant>>,
}

impl RateLimitGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or extends) the cool-down window.
    pub fn trip(&self, cooldown: Duration) {
        let until = Instant::now() + cooldown;
        if let Ok(mut blocked) = self.blocked_until.lock() {
            *blocked = Some((*blocked).map_or(until, |current| current.max(until)));
        }
    }

    /// Time left in the current window, if any.
    pub fn remaining(&self) -> Option<Duration> {
        let mut blocked = self.blocked_until.lock().ok()?;
        let until = (*blocked)?;
        let now = Instant::now();
        if now >= until {
            *blocked = None;
            return None;
        }
        Some(until - now)
    }

    /// Fails with `PlayerError::RateLimited` while the window is open.
    pub fn check(&self) -> Result<(), PlayerError> {
        match self.remaining() {
            Some(retry_after) => Err(PlayerError::RateLimited { retry_after }),
            None => Ok(()),
        }
    }
}

use std::path::Path;
use std::time::Duration;

use crate::errors::PlayerError;
use crate::scheduler::PacingDelay;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(60);

/// Configuration shared by the streaming transport, the player and the
/// chat client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaygroundConfig {
    /// Origin of the playground site, without a trailing path.
    pub base_url: String,
    /// Whole-request HTTP timeout.
    pub timeout: Duration,
    /// Delay between rendered Game of Life generations.
    pub pacing_delay: PacingDelay,
    /// Optional delay between rendered completion deltas. `None` renders
    /// text as fast as it arrives.
    pub text_pacing_delay: Option<PacingDelay>,
    /// How long requests stay disabled after an HTTP 429.
    pub rate_limit_cooldown: Duration,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            pacing_delay: PacingDelay::default(),
            text_pacing_delay: None,
            rate_limit_cooldown: DEFAULT_RATE_LIMIT_COOLDOWN,
        }
    }
}

impl PlaygroundConfig {
    /// Creates a config with defaults for the given site origin.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Loads `.env` (if present) and reads `PLAYGROUND_*` variables.
    ///
    /// - `PLAYGROUND_BASE_URL`
    /// - `PLAYGROUND_TIMEOUT_SECS`
    /// - `PLAYGROUND_DELAY_MS` (clamped to the UI range)
    /// - `PLAYGROUND_TEXT_DELAY_MS` (unset or `0` means unpaced)
    /// - `PLAYGROUND_RATE_LIMIT_COOLDOWN_SECS`
    pub fn from_env() -> Result<Self, PlayerError> {
        load_dotenv();
        let mut config = Self::default();
        if let Some(base_url) = env_string("PLAYGROUND_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(secs) = env_parse::<u64>("PLAYGROUND_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(millis) = env_parse::<i64>("PLAYGROUND_DELAY_MS")? {
            config.pacing_delay = PacingDelay::from_user_millis(millis);
        }
        if let Some(millis) = env_parse::<u64>("PLAYGROUND_TEXT_DELAY_MS")? {
            config.text_pacing_delay = PacingDelay::new(Duration::from_millis(millis)).ok();
        }
        if let Some(secs) = env_parse::<u64>("PLAYGROUND_RATE_LIMIT_COOLDOWN_SECS")? {
            config.rate_limit_cooldown = Duration::from_secs(secs);
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the site origin.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the generation pacing delay.
    pub fn pacing_delay(mut self, delay: PacingDelay) -> Self {
        self.pacing_delay = delay;
        self
    }

    /// Paces completion deltas as well.
    pub fn text_pacing_delay(mut self, delay: Option<PacingDelay>) -> Self {
        self.text_pacing_delay = delay;
        self
    }

    /// Overrides the 429 cool-down window.
    pub fn rate_limit_cooldown(mut self, cooldown: Duration) -> Self {
        self.rate_limit_cooldown = cooldown;
        self
    }

    pub fn validate(&self) -> Result<(), PlayerError> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(PlayerError::Config("base_url must not be empty".into()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(PlayerError::Config(format!(
                "base_url must be an http(s) URL: {base}"
            )));
        }
        if self.timeout.is_zero() {
            return Err(PlayerError::Config("timeout must be greater than zero".into()));
        }
        Ok(())
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn load_dotenv() {
    let _ = dotenvy::from_path(Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/.env")));
    dotenvy::dotenv().ok();
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, PlayerError> {
    match env_string(key) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            tracing::error!(key, value = %raw, "invalid environment value");
            PlayerError::Config(format!("invalid value for {key}: {raw}"))
        }),
    }
}

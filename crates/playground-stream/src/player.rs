use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::PlaygroundConfig;
use crate::errors::{PlayerError, SessionFailure};
use crate::rate_limit::RateLimitGate;
use crate::request::PlaybackRequest;
use crate::scheduler::PacingDelay;
use crate::session::{Session, SessionParams, SessionState, StopHandle};
use crate::sink::RenderSink;
use crate::transport::{ByteSource, HttpTransport};

/// Result of `Player::start`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    /// A fresh session was spawned.
    Started(uuid::Uuid),
    /// The current session is still requesting or streaming; nothing changed.
    AlreadyRunning,
}

/// Owns at most one live session and the resources it plays through.
///
/// Dropping the player stops the current session.
pub struct Player {
    source: Arc<dyn ByteSource>,
    sink: Arc<dyn RenderSink>,
    config: PlaygroundConfig,
    gate: Arc<RateLimitGate>,
    current: Option<Session>,
}

impl Player {
    /// Starts a builder for wiring a transport, a sink and configuration.
    pub fn builder() -> PlayerBuilder {
        PlayerBuilder::default()
    }

    /// Starts a session for `request`.
    ///
    /// While the current session is active this does nothing and returns
    /// `StartOutcome::AlreadyRunning`. Otherwise the previous session (if
    /// any) is disposed before the new one is spawned, so two sessions never
    /// render into the same sink.
    pub fn start(&mut self, request: PlaybackRequest) -> Result<StartOutcome, PlayerError> {
        if self.current.as_ref().is_some_and(Session::is_active) {
            debug!(%request, "start ignored, session already running");
            return Ok(StartOutcome::AlreadyRunning);
        }
        request.validate()?;
        self.gate.check()?;

        if let Some(previous) = self.current.take() {
            previous.dispose();
        }

        let delay = match &request {
            PlaybackRequest::Completion { .. } => self.config.text_pacing_delay,
            PlaybackRequest::Generations { .. } => Some(self.config.pacing_delay),
        };
        let session = Session::spawn(
            request,
            SessionParams {
                source: self.source.clone(),
                sink: self.sink.clone(),
                delay,
                gate: self.gate.clone(),
            },
        );
        let id = session.id();
        self.current = Some(session);
        Ok(StartOutcome::Started(id))
    }

    /// Stops the current session. Returns false when nothing was playing.
    pub fn stop(&self) -> bool {
        self.current.as_ref().is_some_and(Session::stop)
    }

    /// State of the current session, `Idle` before the first start.
    pub fn state(&self) -> SessionState {
        self.current
            .as_ref()
            .map_or(SessionState::Idle, Session::state)
    }

    pub fn session_id(&self) -> Option<uuid::Uuid> {
        self.current.as_ref().map(Session::id)
    }

    /// Handle that can stop the current session from another task.
    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.current.as_ref().map(Session::stop_handle)
    }

    /// Waits for the current session to reach a terminal state.
    pub async fn wait(&mut self) -> SessionState {
        match self.current.as_mut() {
            Some(session) => session.wait().await,
            None => SessionState::Idle,
        }
    }

    /// Starts `request` and waits for it, mapping the terminal state to a
    /// result.
    pub async fn play(&mut self, request: PlaybackRequest) -> Result<(), PlayerError> {
        if let StartOutcome::AlreadyRunning = self.start(request)? {
            return Err(PlayerError::Validation(
                "a session is already running".into(),
            ));
        }
        match self.wait().await {
            SessionState::Completed => Ok(()),
            SessionState::Stopped => Err(PlayerError::Stopped),
            SessionState::Errored(SessionFailure::RateLimited { retry_after_secs }) => {
                Err(PlayerError::RateLimited {
                    retry_after: Duration::from_secs(retry_after_secs),
                })
            }
            SessionState::Errored(failure) => Err(PlayerError::Failed(failure)),
            other => Err(PlayerError::Failed(SessionFailure::Protocol {
                message: format!("session ended in non-terminal state {other:?}"),
            })),
        }
    }

    /// Changes the generation delay used by sessions started from now on.
    pub fn set_pacing_delay(&mut self, delay: PacingDelay) {
        info!(delay_ms = delay.get().as_millis() as u64, "pacing delay changed");
        self.config.pacing_delay = delay;
    }

    /// Time left before requests are allowed again after a 429.
    pub fn rate_limit_remaining(&self) -> Option<Duration> {
        self.gate.remaining()
    }

    pub fn config(&self) -> &PlaygroundConfig {
        &self.config
    }
}

/// Builder for `Player`.
#[derive(Default)]
pub struct PlayerBuilder {
    source: Option<Arc<dyn ByteSource>>,
    sink: Option<Arc<dyn RenderSink>>,
    config: Option<PlaygroundConfig>,
    gate: Option<Arc<RateLimitGate>>,
}

impl PlayerBuilder {
    /// Uses a custom byte source instead of the HTTP transport.
    pub fn source(mut self, source: Arc<dyn ByteSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets the sink that receives rendered updates. Required.
    pub fn sink(mut self, sink: Arc<dyn RenderSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(mut self, config: PlaygroundConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Shares a cool-down window with other clients (for example `ChatClient`).
    pub fn rate_limit_gate(mut self, gate: Arc<RateLimitGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Builds the player. Without an explicit source an `HttpTransport` is
    /// created from the config.
    pub fn build(self) -> Result<Player, PlayerError> {
        let sink = self
            .sink
            .ok_or_else(|| PlayerError::Config("a render sink is required".into()))?;
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let source = match self.source {
            Some(source) => source,
            None => Arc::new(HttpTransport::new(config.clone())?),
        };
        Ok(Player {
            source,
            sink,
            config,
            gate: self.gate.unwrap_or_default(),
            current: None,
        })
    }
}

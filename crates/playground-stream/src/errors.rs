use std::time::Duration;

/// Coarse classification of a transport failure.
///
/// reqwest exposes a few structured flags; everything else is classified by
/// inspecting the failure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Connect or read timed out.
    Timeout,
    /// TLS handshake or certificate failure.
    Tls,
    /// Connection refused, reset, or closed mid-stream.
    ConnectionLost,
    /// Anything not matched above.
    Other,
}

impl TransportKind {
    /// Classifies a failure from its message text.
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("timed out") || lower.contains("timeout") {
            Self::Timeout
        } else if lower.contains("certificate") || lower.contains("tls") || lower.contains("ssl")
        {
            Self::Tls
        } else if ["connection", "reset", "refused", "closed", "broken pipe", "eof"]
            .iter()
            .any(|needle| lower.contains(needle))
        {
            Self::ConnectionLost
        } else {
            Self::Other
        }
    }
}

/// Server-reported failure sub-kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationErrorKind {
    /// The model host ran out of memory or similar resources.
    InsufficientResources,
    /// Any other server-side failure.
    Other,
}

/// Errors raised while opening or reading a single playback stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Connection lost, TLS failure, timeout.
    #[error("transport error ({kind:?}): {message}")]
    Transport {
        kind: TransportKind,
        message: String,
    },
    /// Malformed frame or payload.
    #[error("protocol error: {message}")]
    Protocol { message: String },
    /// The server reported a semantic failure.
    #[error("application error: {message}")]
    Application {
        kind: ApplicationErrorKind,
        message: String,
    },
    /// HTTP 429. Callers must back off for `retry_after`.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    /// Any other non-success HTTP status.
    #[error("http {status}: {message}")]
    Http { status: u16, message: String },
    /// The response ended before a single byte arrived.
    #[error("response has no streamable body")]
    EmptyBody,
}

impl StreamError {
    /// Creates a transport error, classifying it from the message.
    pub fn transport(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Transport {
            kind: TransportKind::from_message(&message),
            message,
        }
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Maps a non-success HTTP status to the user-facing error.
    pub fn from_status(status: u16, rate_limit_cooldown: Duration) -> Self {
        if status == 429 {
            return Self::RateLimited {
                retry_after: rate_limit_cooldown,
            };
        }
        let message = match status {
            403 => "Access to the playground service was denied.".to_string(),
            404 => "The playground endpoint was not found.".to_string(),
            408 => "Request timed out. The service might be busy. Please try again.".to_string(),
            502 => "The AI service is temporarily unavailable. Please try again in a moment."
                .to_string(),
            500..=599 => "The AI service is experiencing issues. Please try again later.".to_string(),
            other => format!("HTTP error! Status: {other}"),
        };
        Self::Http { status, message }
    }
}

/// Terminal session failure recorded in `SessionState::Errored`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum SessionFailure {
    /// Network/stream transport failed.
    #[error("transport failure ({kind:?}): {message}")]
    Transport {
        kind: TransportKind,
        message: String,
    },
    /// The server rejected the request.
    #[error("request failed with status {status}: {message}")]
    Http { status: u16, message: String },
    /// Too many requests.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    /// The response could not be played back at all.
    #[error("protocol failure: {message}")]
    Protocol { message: String },
    /// No body was delivered.
    #[error("empty response body")]
    EmptyBody,
}

impl From<&StreamError> for SessionFailure {
    fn from(err: &StreamError) -> Self {
        match err {
            StreamError::Transport { kind, message } => Self::Transport {
                kind: *kind,
                message: message.clone(),
            },
            StreamError::Protocol { message } => Self::Protocol {
                message: message.clone(),
            },
            // sessions render error frames inline; a source failing this way
            // before any content is a protocol failure
            StreamError::Application { message, .. } => Self::Protocol {
                message: message.clone(),
            },
            StreamError::RateLimited { retry_after } => Self::RateLimited {
                retry_after_secs: retry_after.as_secs(),
            },
            StreamError::Http { status, message } => Self::Http {
                status: *status,
                message: message.clone(),
            },
            StreamError::EmptyBody => Self::EmptyBody,
        }
    }
}

/// Top-level error type for the public player API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayerError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid caller input (for example an empty prompt).
    #[error("validation error: {0}")]
    Validation(String),
    /// A previous 429 is still cooling down.
    #[error(
        "Rate limit exceeded. Wait {} seconds before making another request.",
        retry_after.as_secs().max(1)
    )]
    RateLimited { retry_after: Duration },
    /// Request-level failure outside a session.
    #[error(transparent)]
    Stream(StreamError),
    /// A started session ended in `Errored`.
    #[error(transparent)]
    Failed(SessionFailure),
    /// The session was stopped before it reached a terminal result.
    #[error("stopped")]
    Stopped,
}

impl From<StreamError> for PlayerError {
    fn from(value: StreamError) -> Self {
        match value {
            StreamError::RateLimited { retry_after } => Self::RateLimited { retry_after },
            other => Self::Stream(other),
        }
    }
}

impl From<SessionFailure> for PlayerError {
    fn from(value: SessionFailure) -> Self {
        Self::Failed(value)
    }
}

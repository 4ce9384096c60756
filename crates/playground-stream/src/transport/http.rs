use futures::StreamExt as _;
use tracing::debug;

use crate::config::PlaygroundConfig;
use crate::errors::{PlayerError, StreamError, TransportKind};
use crate::request::PlaybackRequest;

use super::{ByteSource, ByteStream};

/// `ByteSource` backed by reqwest, posting JSON to the playground site.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: PlaygroundConfig,
}

impl HttpTransport {
    /// Creates a transport from explicit configuration.
    pub fn new(config: PlaygroundConfig) -> Result<Self, PlayerError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PlayerError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a transport from `PLAYGROUND_*` environment variables.
    pub fn from_env() -> Result<Self, PlayerError> {
        Self::new(PlaygroundConfig::from_env()?)
    }

    pub fn config(&self) -> &PlaygroundConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl ByteSource for HttpTransport {
    async fn open(&self, request: &PlaybackRequest) -> Result<ByteStream, StreamError> {
        let url = self.config.url(request.path());
        debug!(%url, %request, "opening playback stream");

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream, application/json")
            .json(&request.body())
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e))?;
        check_status(response.status(), &self.config)?;

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| map_reqwest_error(&e)));
        Ok(Box::pin(stream))
    }
}

pub(crate) fn check_status(
    status: reqwest::StatusCode,
    config: &PlaygroundConfig,
) -> Result<(), StreamError> {
    if status.is_success() {
        return Ok(());
    }
    Err(StreamError::from_status(
        status.as_u16(),
        config.rate_limit_cooldown,
    ))
}

/// Classifies a reqwest failure, preferring its structured flags and
/// falling back to the message text.
pub(crate) fn map_reqwest_error(err: &reqwest::Error) -> StreamError {
    let message = full_message(err);
    let kind = if err.is_timeout() {
        TransportKind::Timeout
    } else {
        match TransportKind::from_message(&message) {
            TransportKind::Other if err.is_connect() => TransportKind::ConnectionLost,
            kind => kind,
        }
    };
    StreamError::Transport { kind, message }
}

fn full_message(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

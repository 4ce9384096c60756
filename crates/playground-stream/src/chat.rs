//! Non-streaming LLM calls: one-shot generation and multi-turn chat.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::PlaygroundConfig;
use crate::errors::{PlayerError, StreamError};
use crate::event::EventError;
use crate::parser::application_error;
use crate::rate_limit::RateLimitGate;
use crate::transport::{check_status, map_reqwest_error};

/// One-shot text generation endpoint.
pub const GENERATE_TEXT_PATH: &str = "/playground/zllm/generate_text/";
/// Multi-turn chat endpoint.
pub const CHAT_PATH: &str = "/playground/zllm/chat/chat_with_zllm/";

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a conversation, as sent in the `messages` array.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// In-memory conversation; the server keeps no state between calls.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct ChatHistory {
    messages: Vec<ChatMessage>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn push_exchange(&mut self, prompt: String, reply: String) {
        self.messages.push(ChatMessage::user(prompt));
        self.messages.push(ChatMessage::assistant(reply));
    }

    fn clear(&mut self) {
        self.messages.clear();
    }
}

#[derive(Debug, serde::Deserialize)]
struct ReplyBody {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the request/response LLM endpoints.
pub struct ChatClient {
    client: reqwest::Client,
    config: PlaygroundConfig,
    gate: Arc<RateLimitGate>,
    history: ChatHistory,
}

impl ChatClient {
    pub fn new(config: PlaygroundConfig) -> Result<Self, PlayerError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PlayerError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            gate: Arc::new(RateLimitGate::new()),
            history: ChatHistory::new(),
        })
    }

    pub fn from_env() -> Result<Self, PlayerError> {
        Self::new(PlaygroundConfig::from_env()?)
    }

    /// Shares the cool-down window with a `Player`.
    pub fn with_rate_limit_gate(mut self, gate: Arc<RateLimitGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    /// Forgets the conversation.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Generates a full reply for `prompt` without streaming.
    pub async fn generate(&self, prompt: &str) -> Result<String, PlayerError> {
        let prompt = non_empty_prompt(prompt)?;
        let reply = self
            .post(GENERATE_TEXT_PATH, serde_json::json!({ "prompt": prompt }))
            .await?;
        match reply {
            ReplyBody {
                error: Some(message),
                ..
            } => Err(application(message).into()),
            ReplyBody {
                response: Some(text),
                ..
            } => Ok(text),
            _ => Err(StreamError::protocol("Unexpected response format.").into()),
        }
    }

    /// Sends `prompt` with the conversation so far and records the exchange.
    ///
    /// History only changes when the assistant returned a non-empty reply.
    pub async fn send(&mut self, prompt: &str) -> Result<String, PlayerError> {
        let prompt = non_empty_prompt(prompt)?;
        let body = serde_json::json!({
            "prompt": prompt,
            "messages": self.history,
        });
        let reply = self.post(CHAT_PATH, body).await?;
        if let Some(message) = reply.error {
            return Err(application(message).into());
        }
        match reply.response.filter(|text| !text.trim().is_empty()) {
            Some(text) => {
                self.history.push_exchange(prompt.to_string(), text.clone());
                debug!(turns = self.history.len(), "chat exchange recorded");
                Ok(text)
            }
            None => Err(StreamError::protocol("Received empty response from the server.").into()),
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<ReplyBody, PlayerError> {
        self.gate.check()?;
        let url = self.config.url(path);
        debug!(%url, "posting chat request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e))?;
        let status = response.status();
        let raw = response.text().await.map_err(|e| map_reqwest_error(&e))?;
        let reply = serde_json::from_str::<ReplyBody>(&raw);

        if let Err(err) = check_status(status, &self.config) {
            warn!(status = status.as_u16(), "chat request failed");
            if let StreamError::RateLimited { retry_after } = &err {
                self.gate.trip(*retry_after);
            }
            let server_message = reply.ok().and_then(|r| r.error);
            return Err(prefer_server_message(err, server_message).into());
        }
        reply.map_err(|e| StreamError::protocol(format!("invalid response body: {e}")).into())
    }
}

fn non_empty_prompt(prompt: &str) -> Result<&str, PlayerError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(PlayerError::Validation(
            "Please enter text before generating a response.".into(),
        ));
    }
    Ok(prompt)
}

/// Client errors keep the server's explanation; timeouts and 5xx use the
/// fixed friendly text.
fn prefer_server_message(err: StreamError, server_message: Option<String>) -> StreamError {
    match (err, server_message) {
        (StreamError::Http { status, .. }, Some(message))
            if status < 500 && status != 408 && !message.trim().is_empty() =>
        {
            StreamError::Http { status, message }
        }
        (err, _) => err,
    }
}

fn application(message: String) -> StreamError {
    match application_error(message) {
        EventError::Application { kind, message } => StreamError::Application { kind, message },
        EventError::Malformed { raw } => StreamError::protocol(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ApplicationErrorKind;
    use crate::test_support::{refused_base_url, serve_once};

    fn json_response(status_line: &str, body: &str) -> &'static str {
        Box::leak(
            format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            )
            .into_boxed_str(),
        )
    }

    #[tokio::test]
    async fn generate_returns_the_response_field() {
        let (base, server) =
            serve_once(json_response("200 OK", r#"{"response":"Hi there"}"#)).await;
        let client = ChatClient::new(PlaygroundConfig::new(base)).expect("client");
        assert_eq!(client.generate("hello").await.expect("reply"), "Hi there");

        let raw = server.await.expect("server");
        assert!(raw.starts_with("POST /playground/zllm/generate_text/ "));
        assert!(raw.contains(r#"{"prompt":"hello"}"#));
    }

    #[tokio::test]
    async fn generate_maps_error_bodies() {
        let (base, _server) = serve_once(json_response(
            "200 OK",
            r#"{"error":"model requires more system memory"}"#,
        ))
        .await;
        let client = ChatClient::new(PlaygroundConfig::new(base)).expect("client");
        let err = client.generate("hello").await.expect_err("error body");
        assert!(matches!(
            err,
            PlayerError::Stream(StreamError::Application {
                kind: ApplicationErrorKind::InsufficientResources,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn send_grows_history_by_two_turns() {
        let (base, server) =
            serve_once(json_response("200 OK", r#"{"response":"Sure."}"#)).await;
        let mut client = ChatClient::new(PlaygroundConfig::new(base)).expect("client");
        assert_eq!(client.send(" help? ").await.expect("reply"), "Sure.");
        assert_eq!(
            client.history().messages(),
            &[ChatMessage::user("help?"), ChatMessage::assistant("Sure.")]
        );

        let raw = server.await.expect("server");
        assert!(raw.starts_with("POST /playground/zllm/chat/chat_with_zllm/ "));
        assert!(raw.contains(r#""messages":[]"#));

        client.reset();
        assert!(client.history().is_empty());
    }

    #[tokio::test]
    async fn empty_reply_leaves_history_untouched() {
        let (base, _server) = serve_once(json_response("200 OK", r#"{"response":""}"#)).await;
        let mut client = ChatClient::new(PlaygroundConfig::new(base)).expect("client");
        assert!(matches!(
            client.send("hello").await,
            Err(PlayerError::Stream(StreamError::Protocol { .. }))
        ));
        assert!(client.history().is_empty());
    }

    #[tokio::test]
    async fn client_errors_keep_the_server_message() {
        let (base, _server) =
            serve_once(json_response("400 Bad Request", r#"{"error":"Prompt is required"}"#)).await;
        let client = ChatClient::new(PlaygroundConfig::new(base)).expect("client");
        assert_eq!(
            client.generate("x").await,
            Err(PlayerError::Stream(StreamError::Http {
                status: 400,
                message: "Prompt is required".into()
            }))
        );
    }

    #[tokio::test]
    async fn server_errors_use_the_friendly_message() {
        let (base, _server) =
            serve_once(json_response("502 Bad Gateway", r#"{"error":"upstream"}"#)).await;
        let client = ChatClient::new(PlaygroundConfig::new(base)).expect("client");
        assert!(matches!(
            client.generate("x").await,
            Err(PlayerError::Stream(StreamError::Http { status: 502, message }))
                if message.contains("temporarily unavailable")
        ));
    }

    #[tokio::test]
    async fn too_many_requests_closes_the_shared_gate() {
        let (base, _server) = serve_once(json_response("429 Too Many Requests", "{}")).await;
        let gate = Arc::new(RateLimitGate::new());
        let mut client = ChatClient::new(PlaygroundConfig::new(base))
            .expect("client")
            .with_rate_limit_gate(gate.clone());
        assert!(matches!(
            client.send("x").await,
            Err(PlayerError::RateLimited { .. })
        ));
        assert!(gate.remaining().is_some());
        // rejected locally, no server left to answer
        assert!(matches!(
            client.send("x").await,
            Err(PlayerError::RateLimited { .. })
        ));
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected_before_any_request() {
        let client = ChatClient::new(PlaygroundConfig::new(refused_base_url().await))
            .expect("client");
        assert!(matches!(
            client.generate("  ").await,
            Err(PlayerError::Validation(_))
        ));
    }
}

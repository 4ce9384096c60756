use std::time::Duration;

use crate::errors::ApplicationErrorKind;

/// Decoded application-level unit of the completion stream.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Incremental text output.
    Delta(String),
    /// Terminal marker; no further frames are read once this is seen.
    Completion(CompletionStats),
    /// Inline failure; the stream keeps going.
    Error(EventError),
    /// Valid JSON without a recognised shape.
    Unknown(serde_json::Value),
}

impl Event {
    /// True for `Event::Completion`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completion(_))
    }
}

/// Metadata carried by the completion frame.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CompletionStats {
    /// Number of generated units (tokens).
    pub eval_count: Option<u64>,
    /// Time spent generating, sent on the wire in nanoseconds.
    pub eval_duration: Option<Duration>,
    /// Text that arrived in the completion frame itself.
    pub final_text: Option<String>,
}

impl CompletionStats {
    /// Tokens per second, when both count and a non-zero duration are known.
    pub fn tokens_per_second(&self) -> Option<f64> {
        let count = self.eval_count?;
        let secs = self.eval_duration?.as_secs_f64();
        (secs > 0.0).then(|| count as f64 / secs)
    }
}

/// Failure reported by a single frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventError {
    /// The server sent an `error` payload.
    Application {
        kind: ApplicationErrorKind,
        message: String,
    },
    /// The payload was not valid JSON; `raw` is the text after `data:`.
    Malformed { raw: String },
}

impl EventError {
    /// Text suitable for inline display.
    pub fn display_text(&self) -> String {
        match self {
            Self::Application { message, .. } => format!("Error: {message}"),
            Self::Malformed { raw } => raw.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_per_second_needs_count_and_duration() {
        let stats = CompletionStats {
            eval_count: Some(50),
            eval_duration: Some(Duration::from_millis(500)),
            final_text: None,
        };
        assert_eq!(stats.tokens_per_second(), Some(100.0));
        assert_eq!(CompletionStats::default().tokens_per_second(), None);
        let zero = CompletionStats {
            eval_count: Some(3),
            eval_duration: Some(Duration::ZERO),
            final_text: None,
        };
        assert_eq!(zero.tokens_per_second(), None);
    }
}

//! Frame payload extraction and classification.

use std::time::Duration;

use crate::errors::{ApplicationErrorKind, StreamError};
use crate::event::{CompletionStats, Event, EventError};
use crate::grid::{Generation, GenerationsResponse, PlaybackQueue};
use crate::reassembler::Frame;

const DATA_PREFIX: &str = "data:";

/// Replacement shown when the model host runs out of memory.
pub const INSUFFICIENT_RESOURCES_MESSAGE: &str = "The AI model requires more system memory to process your request. Please try again later or contact support.";

/// Returns the trimmed `data:` payload of a frame.
///
/// Frames without a `data:` line (keep-alives, `:` comments) yield `None`,
/// as do frames whose payload is empty. Multiple `data:` lines are joined
/// with `\n`.
pub fn frame_payload(frame: &Frame) -> Option<String> {
    let mut data_lines: Vec<&str> = Vec::new();
    for raw_line in frame.text.split('\n') {
        let line = raw_line.trim_end_matches('\r').trim_start();
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix(DATA_PREFIX) {
            data_lines.push(rest);
        }
    }
    if data_lines.is_empty() {
        return None;
    }
    let payload = data_lines.join("\n").trim().to_string();
    (!payload.is_empty()).then_some(payload)
}

/// Parses one completion-stream frame.
pub fn parse_event(frame: &Frame) -> Option<Event> {
    let payload = frame_payload(frame)?;
    match serde_json::from_str::<serde_json::Value>(&payload) {
        Ok(value) => Some(classify(value)),
        Err(_) => Some(Event::Error(EventError::Malformed { raw: payload })),
    }
}

/// Decides which `Event` a JSON payload represents.
///
/// Precedence: `error`, then `done: true`, then `response`/`token`/`done:
/// false`, then `Unknown`.
pub fn classify(value: serde_json::Value) -> Event {
    if let Some(error) = value.get("error").filter(|v| !v.is_null()) {
        let message = error
            .as_str()
            .map(ToOwned::to_owned)
            .or_else(|| {
                error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(ToOwned::to_owned)
            })
            .unwrap_or_else(|| error.to_string());
        return Event::Error(application_error(message));
    }

    let text = value
        .get("response")
        .and_then(|v| v.as_str())
        .or_else(|| value.get("token").and_then(|v| v.as_str()))
        .map(ToOwned::to_owned);

    match value.get("done").and_then(|v| v.as_bool()) {
        Some(true) => Event::Completion(CompletionStats {
            eval_count: value.get("eval_count").and_then(|v| v.as_u64()),
            eval_duration: value
                .get("eval_duration")
                .and_then(|v| v.as_u64())
                .map(Duration::from_nanos),
            final_text: text.filter(|t| !t.is_empty()),
        }),
        Some(false) => Event::Delta(text.unwrap_or_default()),
        None => match text {
            Some(text) => Event::Delta(text),
            None => Event::Unknown(value),
        },
    }
}

pub(crate) fn application_error(message: String) -> EventError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("more system memory") || lower.contains("insufficient resources") {
        EventError::Application {
            kind: ApplicationErrorKind::InsufficientResources,
            message: INSUFFICIENT_RESOURCES_MESSAGE.to_string(),
        }
    } else {
        EventError::Application {
            kind: ApplicationErrorKind::Other,
            message,
        }
    }
}

/// Parses one frame of the chunked Game of Life stream.
pub fn parse_generation(frame: &Frame) -> Option<Result<Generation, StreamError>> {
    let payload = frame_payload(frame)?;
    Some(
        serde_json::from_str::<Generation>(&payload)
            .map_err(|e| StreamError::protocol(format!("invalid generation frame: {e}"))),
    )
}

/// Parses the whole-response Game of Life body into a playback queue.
pub fn parse_generations(body: &str) -> Result<PlaybackQueue, StreamError> {
    let response: GenerationsResponse = serde_json::from_str(body.trim())
        .map_err(|e| StreamError::protocol(format!("invalid generations body: {e}")))?;
    Ok(PlaybackQueue::from(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Cell;

    fn frame(text: &str) -> Frame {
        Frame::new(text)
    }

    #[test]
    fn keepalive_frames_are_dropped() {
        assert_eq!(parse_event(&frame("keepalive")), None);
        assert_eq!(parse_event(&frame(": ping")), None);
        assert_eq!(parse_event(&frame("data:   ")), None);
    }

    #[test]
    fn maps_delta_token_and_completion() {
        assert_eq!(
            parse_event(&frame("data: {\"response\":\"Hel\"}")),
            Some(Event::Delta("Hel".into()))
        );
        assert_eq!(
            parse_event(&frame("data:{\"token\":\"lo\"}")),
            Some(Event::Delta("lo".into()))
        );
        let completion = parse_event(&frame(
            "data: {\"done\":true,\"eval_count\":12,\"eval_duration\":2000000000}",
        ));
        assert_eq!(
            completion,
            Some(Event::Completion(CompletionStats {
                eval_count: Some(12),
                eval_duration: Some(Duration::from_secs(2)),
                final_text: None,
            }))
        );
    }

    #[test]
    fn not_done_flag_without_text_is_an_empty_delta() {
        assert_eq!(
            parse_event(&frame("data: {\"done\":false}")),
            Some(Event::Delta(String::new()))
        );
    }

    #[test]
    fn completion_keeps_trailing_text() {
        let event = parse_event(&frame("data: {\"response\":\"!\",\"done\":true}"));
        assert!(matches!(
            event,
            Some(Event::Completion(CompletionStats { final_text: Some(ref t), .. })) if t == "!"
        ));
    }

    #[test]
    fn error_payloads_become_error_events() {
        let event = parse_event(&frame("data: {\"error\":\"boom\"}"));
        assert_eq!(
            event,
            Some(Event::Error(EventError::Application {
                kind: ApplicationErrorKind::Other,
                message: "boom".into(),
            }))
        );
        let event = parse_event(&frame(
            "data: {\"error\":\"model requires more system memory\"}",
        ));
        assert!(matches!(
            event,
            Some(Event::Error(EventError::Application {
                kind: ApplicationErrorKind::InsufficientResources,
                ..
            }))
        ));
    }

    #[test]
    fn malformed_json_keeps_raw_text() {
        assert_eq!(
            parse_event(&frame("data: {\"response\": oops")),
            Some(Event::Error(EventError::Malformed {
                raw: "{\"response\": oops".into()
            }))
        );
    }

    #[test]
    fn unrecognised_json_is_unknown() {
        assert!(matches!(
            parse_event(&frame("data: {\"model\":\"x\"}")),
            Some(Event::Unknown(_))
        ));
    }

    #[test]
    fn event_and_comment_lines_around_data() {
        let event = parse_event(&frame(": hi\nevent: message\ndata: {\"token\":\"a\"}"));
        assert_eq!(event, Some(Event::Delta("a".into())));
    }

    #[test]
    fn generation_frames_parse_pairs() {
        let generation = parse_generation(&frame("data: [[0,0],[1,0]]"))
            .expect("protocol frame")
            .expect("valid");
        assert_eq!(generation.len(), 2);
        assert!(generation.contains(Cell(1, 0)));
        assert!(parse_generation(&frame("retry: 10")).is_none());
        assert!(matches!(
            parse_generation(&frame("data: [[0]]")),
            Some(Err(StreamError::Protocol { .. }))
        ));
    }

    #[test]
    fn whole_body_parses_into_queue() {
        let queue = parse_generations("{\"generations\":[[[0,0]],[]]}\n").expect("queue");
        assert_eq!(queue.len(), 2);
        assert!(parse_generations("{\"gens\":1}").is_err());
    }
}

use std::fmt;

use crate::errors::PlayerError;
use crate::grid::{AliveCellsRequest, Generation};
use crate::reassembler::Delimiter;

/// Streaming LLM completion endpoint.
pub const COMPLETION_STREAM_PATH: &str = "/playground/zllm/generate_text_streaming/";
/// Game of Life endpoint (chunked or whole response).
pub const CONWAYS_STREAM_PATH: &str = "/playground/conways/stream/";

/// How the Game of Life server delivers generations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridMode {
    /// One `data: [[x,y],...]` frame per generation.
    #[default]
    Chunked,
    /// One JSON body `{"generations": [...]}` buffered up front.
    Whole,
}

/// Body posted to a playback endpoint.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum RequestBody {
    Prompt { prompt: String },
    AliveCells(AliveCellsRequest),
}

/// What a playback session asks the server for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaybackRequest {
    /// Streamed LLM completion for a prompt.
    Completion { prompt: String },
    /// Game of Life generations starting from `alive_cells`.
    Generations {
        alive_cells: Generation,
        mode: GridMode,
    },
}

impl PlaybackRequest {
    pub fn completion(prompt: impl Into<String>) -> Self {
        Self::Completion {
            prompt: prompt.into(),
        }
    }

    pub fn generations(alive_cells: Generation, mode: GridMode) -> Self {
        Self::Generations { alive_cells, mode }
    }

    /// Rejects requests that must never reach the server.
    pub fn validate(&self) -> Result<(), PlayerError> {
        match self {
            Self::Completion { prompt } if prompt.trim().is_empty() => Err(
                PlayerError::Validation(
                    "Please enter text before generating a response.".into(),
                ),
            ),
            _ => Ok(()),
        }
    }

    /// Site-relative endpoint path.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Completion { .. } => COMPLETION_STREAM_PATH,
            Self::Generations { .. } => CONWAYS_STREAM_PATH,
        }
    }

    /// JSON request body.
    pub fn body(&self) -> RequestBody {
        match self {
            Self::Completion { prompt } => RequestBody::Prompt {
                prompt: prompt.clone(),
            },
            Self::Generations { alive_cells, .. } => RequestBody::AliveCells(AliveCellsRequest {
                alive_cells: alive_cells.clone(),
            }),
        }
    }

    /// Frame delimiter used by the response, `None` for whole-body responses.
    pub fn delimiter(&self) -> Option<Delimiter> {
        match self {
            Self::Completion { .. }
            | Self::Generations {
                mode: GridMode::Chunked,
                ..
            } => Some(Delimiter::BlankLine),
            Self::Generations {
                mode: GridMode::Whole,
                ..
            } => None,
        }
    }
}

impl fmt::Display for PlaybackRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completion { prompt } => write!(f, "completion ({} chars)", prompt.len()),
            Self::Generations { alive_cells, mode } => {
                write!(f, "generations ({} cells, {mode:?})", alive_cells.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_prompt_is_rejected() {
        assert!(matches!(
            PlaybackRequest::completion("   ").validate(),
            Err(PlayerError::Validation(_))
        ));
        assert!(PlaybackRequest::completion("hi").validate().is_ok());
    }

    #[test]
    fn bodies_match_the_wire_shapes() {
        let json = |request: PlaybackRequest| serde_json::to_value(request.body()).expect("body");
        assert_eq!(
            json(PlaybackRequest::completion("hi")),
            serde_json::json!({"prompt": "hi"})
        );
        let cells: Generation = [(1, 0), (0, 0)].into_iter().collect();
        assert_eq!(
            json(PlaybackRequest::generations(cells, GridMode::Chunked)),
            serde_json::json!({"alive_cells": [[0, 0], [1, 0]]})
        );
    }

    #[test]
    fn whole_mode_has_no_delimiter() {
        let request = PlaybackRequest::generations(Generation::new(), GridMode::Whole);
        assert_eq!(request.delimiter(), None);
        assert_eq!(request.path(), CONWAYS_STREAM_PATH);
    }
}

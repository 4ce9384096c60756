//! Streaming response decoder and paced playback for the playground demos.
//!
//! A [`Player`] opens a chunked HTTP response, decodes it incrementally
//! (UTF-8 carry, blank-line frames, `data:` payloads) and hands each update
//! to a [`RenderSink`] at a controlled pace. The next chunk is only read
//! after the previous update's delay elapsed, so a fast server never floods
//! the renderer.
//!
//! # Playing Game of Life generations
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use playground_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), PlayerError> {
//! let sink = Arc::new(RecordingSink::new());
//! let mut player = Player::builder()
//!     .config(PlaygroundConfig::from_env()?)
//!     .sink(sink.clone())
//!     .build()?;
//!
//! let glider: Generation = [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)].into_iter().collect();
//! player
//!     .play(PlaybackRequest::generations(glider, GridMode::Chunked))
//!     .await?;
//!
//! println!("{} generations", sink.generations().len());
//! # Ok(())
//! # }
//! ```

/// One-shot generation and multi-turn chat clients.
pub mod chat;
/// Configuration shared by the transport, player and chat client.
pub mod config;
/// Incremental UTF-8 decoding across chunk boundaries.
pub mod decoder;
/// Error types for streams, sessions and the public API.
pub mod errors;
/// Decoded completion events.
pub mod event;
/// Game of Life cells, generations and the playback queue.
pub mod grid;
/// Tracing subscriber setup.
pub mod observability;
/// Frame payload extraction and classification.
pub mod parser;
/// Player owning the current session.
pub mod player;
/// Common imports for typical usage.
pub mod prelude;
/// Cool-down window after HTTP 429.
pub mod rate_limit;
/// Frame reassembly from decoded text.
pub mod reassembler;
/// Playback requests and endpoint paths.
pub mod request;
/// Pacing delay and the single pending timer.
pub mod scheduler;
/// Session state machine and stream task.
pub mod session;
/// Render sink contract.
pub mod sink;
/// Byte sources, including the reqwest transport.
pub mod transport;

#[cfg(test)]
mod test_support;

pub use chat::{ChatClient, ChatHistory, ChatMessage, Role};
pub use config::PlaygroundConfig;
pub use errors::{ApplicationErrorKind, PlayerError, SessionFailure, StreamError, TransportKind};
pub use event::{CompletionStats, Event, EventError};
pub use grid::{Cell, Generation, PlaybackQueue};
pub use player::{Player, PlayerBuilder, StartOutcome};
pub use rate_limit::RateLimitGate;
pub use request::{GridMode, PlaybackRequest};
pub use scheduler::PacingDelay;
pub use session::{Session, SessionState, StopHandle};
pub use sink::{RecordingSink, RenderSink, RenderUpdate};
pub use transport::{ByteSource, ByteStream, HttpTransport};

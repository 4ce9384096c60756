//! Common imports for driving a player and implementing a sink.
pub use crate::{
    ByteSource, ChatClient, Generation, GridMode, PacingDelay, PlaybackRequest, Player,
    PlayerError, PlaygroundConfig, RecordingSink, RenderSink, RenderUpdate, SessionState,
    StartOutcome,
};

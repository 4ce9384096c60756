//! Byte sources feeding a playback session.
//!
//! The session only sees a stream of raw chunks; `HttpTransport` is the
//! production implementation and tests plug in scripted sources.
mod http;

use std::pin::Pin;

pub use http::HttpTransport;
pub(crate) use http::{check_status, map_reqwest_error};

use crate::errors::StreamError;
use crate::request::PlaybackRequest;

/// Ordered raw chunks of one response body.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, StreamError>> + Send + 'static>>;

/// Opens the response body for a playback request.
///
/// Implementations map HTTP status failures to `StreamError` before any
/// byte is returned. Dropping the returned stream closes the underlying
/// connection.
#[async_trait::async_trait]
pub trait ByteSource: Send + Sync {
    /// Issues the request and returns its body as a chunk stream.
    async fn open(&self, request: &PlaybackRequest) -> Result<ByteStream, StreamError>;
}

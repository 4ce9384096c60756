//! One request/stream/playback lifecycle.
//!
//! A session task follows a strict "read, process, deliver, delay, read
//! again" loop: the next chunk is only requested after the pacing delay of
//! the previous rendered update has elapsed, which is what throttles
//! consumption of a fast server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt as _;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::decoder::ChunkDecoder;
use crate::errors::{SessionFailure, StreamError};
use crate::event::{CompletionStats, Event};
use crate::parser::{parse_event, parse_generation, parse_generations};
use crate::rate_limit::RateLimitGate;
use crate::reassembler::{Delimiter, Frame, FrameReassembler};
use crate::request::PlaybackRequest;
use crate::scheduler::{PacingDelay, PlaybackScheduler};
use crate::sink::{RenderSink, RenderUpdate};
use crate::transport::{ByteSource, ByteStream};

/// Lifecycle of one session.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SessionState {
    /// Not started.
    #[default]
    Idle,
    /// Request issued, no byte received yet.
    Requesting,
    /// At least one byte received.
    Streaming,
    /// Completion event or clean stream end.
    Completed,
    /// Terminal, user-visible failure.
    Errored(SessionFailure),
    /// Explicitly stopped by the caller.
    Stopped,
}

impl SessionState {
    /// True once no further transition can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Errored(_) | Self::Stopped)
    }

    /// True while requesting or streaming.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Requesting | Self::Streaming)
    }
}

/// State shared between a session handle and its task.
struct Shared {
    id: uuid::Uuid,
    live: AtomicBool,
    /// Held across a render so `stop` cannot return while one is in flight.
    render_gate: Mutex<()>,
    state_tx: watch::Sender<SessionState>,
    sink: Arc<dyn RenderSink>,
}

impl Shared {
    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Moves to `next` unless a terminal state was already reached.
    fn transition(&self, next: SessionState) -> bool {
        let changed = self.state_tx.send_if_modified(|current| {
            if current.is_terminal() || *current == next {
                return false;
            }
            *current = next.clone();
            true
        });
        if changed {
            if next.is_terminal() {
                self.live.store(false, Ordering::SeqCst);
            }
            debug!(session_id = %self.id, state = ?next, "session state changed");
            self.sink.state_changed(&next);
        }
        changed
    }

    /// Renders only while the session is live.
    fn render(&self, update: RenderUpdate) -> bool {
        let _gate = self.render_gate.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_live() {
            return false;
        }
        self.sink.render(&update);
        true
    }

    fn stop(&self) -> bool {
        let was_live = {
            let _gate = self.render_gate.lock().unwrap_or_else(PoisonError::into_inner);
            self.live.swap(false, Ordering::SeqCst)
        };
        self.transition(SessionState::Stopped);
        was_live
    }
}

/// Cloneable handle that stops a session from anywhere.
#[derive(Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
    abort_tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    /// Stops the session. Idempotent; returns true if it was still live.
    ///
    /// The pending pacing timer is cancelled, any read that completes later
    /// renders nothing, and the sink keeps its last drawn state. A render
    /// already in progress on another thread finishes before this returns.
    pub fn stop(&self) -> bool {
        let was_live = self.shared.stop();
        let _ = self.abort_tx.send(true);
        if was_live {
            info!(session_id = %self.shared.id, "session stopped");
        }
        was_live
    }
}

/// Handle to a running (or finished) playback session.
///
/// Dropping the handle stops the session and releases its transport.
pub struct Session {
    stop: StopHandle,
    state_rx: watch::Receiver<SessionState>,
    task: Option<JoinHandle<()>>,
}

/// Everything a session task needs besides its request.
pub(crate) struct SessionParams {
    pub source: Arc<dyn ByteSource>,
    pub sink: Arc<dyn RenderSink>,
    pub delay: Option<PacingDelay>,
    pub gate: Arc<RateLimitGate>,
}

impl Session {
    /// Spawns the session task on the current tokio runtime.
    pub(crate) fn spawn(request: PlaybackRequest, params: SessionParams) -> Self {
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let (abort_tx, abort_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            id: uuid::Uuid::new_v4(),
            live: AtomicBool::new(true),
            render_gate: Mutex::new(()),
            state_tx,
            sink: params.sink.clone(),
        });
        info!(session_id = %shared.id, %request, "starting session");
        // Requesting is published before spawning so callers never observe Idle
        shared.transition(SessionState::Requesting);

        let task = tokio::spawn(run_session(
            shared.clone(),
            request,
            params,
            abort_rx,
        ));
        Self {
            stop: StopHandle {
                shared,
                abort_tx: Arc::new(abort_tx),
            },
            state_rx,
            task: Some(task),
        }
    }

    pub fn id(&self) -> uuid::Uuid {
        self.stop.shared.id
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        self.state_rx.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// See `StopHandle::stop`.
    pub fn stop(&self) -> bool {
        self.stop.stop()
    }

    /// Waits until the session reaches a terminal state and returns it.
    pub async fn wait(&mut self) -> SessionState {
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            warn!(session_id = %self.id(), error = %err, "session task ended abnormally");
            self.stop.shared.transition(SessionState::Errored(SessionFailure::Protocol {
                message: format!("session task ended abnormally: {err}"),
            }));
        }
        self.state()
    }

    /// Stops the session and tears down its task and transport.
    pub fn dispose(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        self.stop.stop();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn run_session(
    shared: Arc<Shared>,
    request: PlaybackRequest,
    params: SessionParams,
    mut abort_rx: watch::Receiver<bool>,
) {
    let outcome = tokio::select! {
        biased;
        _ = abort_rx.changed() => None,
        outcome = drive(&shared, &request, &params) => Some(outcome),
    };

    match outcome {
        None => {
            // stop() already published Stopped
            debug!(session_id = %shared.id, "session task cancelled");
        }
        Some(Ok(())) if !shared.is_live() => {}
        Some(Ok(())) => {
            shared.transition(SessionState::Completed);
        }
        Some(Err(err)) => {
            if let StreamError::RateLimited { retry_after } = &err {
                params.gate.trip(*retry_after);
            }
            warn!(session_id = %shared.id, error = %err, "session failed");
            if shared.is_live() {
                shared.transition(SessionState::Errored(SessionFailure::from(&err)));
            }
        }
    }
}

enum Flow {
    Continue,
    Finished,
}

async fn drive(
    shared: &Shared,
    request: &PlaybackRequest,
    params: &SessionParams,
) -> Result<(), StreamError> {
    let body = params.source.open(request).await?;
    let mut scheduler = PlaybackScheduler::new(params.delay);
    match request.delimiter() {
        Some(delimiter) => {
            let kind = match request {
                PlaybackRequest::Completion { .. } => FrameKind::Event,
                PlaybackRequest::Generations { .. } => FrameKind::Generation,
            };
            stream_frames(shared, body, delimiter, kind, &mut scheduler).await
        }
        None => play_whole_body(shared, body, &mut scheduler).await,
    }
}

#[derive(Clone, Copy)]
enum FrameKind {
    Event,
    Generation,
}

async fn stream_frames(
    shared: &Shared,
    mut body: ByteStream,
    delimiter: Delimiter,
    kind: FrameKind,
    scheduler: &mut PlaybackScheduler,
) -> Result<(), StreamError> {
    let mut decoder = ChunkDecoder::new();
    let mut reassembler = FrameReassembler::new(delimiter);
    let mut received = 0_usize;
    let mut frames_seen = 0_u64;

    loop {
        let next = body.next().await;
        if !shared.is_live() {
            return Ok(());
        }
        let frames = match next {
            Some(Ok(chunk)) => {
                if chunk.is_empty() {
                    continue;
                }
                if received == 0 {
                    shared.transition(SessionState::Streaming);
                }
                received += chunk.len();
                reassembler.push(&decoder.decode(&chunk))
            }
            Some(Err(err)) => return Err(err),
            None => {
                if received == 0 {
                    return Err(StreamError::EmptyBody);
                }
                let mut frames = reassembler.push(&decoder.finish());
                frames.extend(reassembler.close());
                for frame in frames {
                    frames_seen += 1;
                    if let Flow::Finished = handle_frame(shared, frame, kind, scheduler).await {
                        return Ok(());
                    }
                }
                debug!(session_id = %shared.id, received, frames = frames_seen, "stream ended");
                shared.render(RenderUpdate::Completed(None));
                return Ok(());
            }
        };

        for frame in frames {
            frames_seen += 1;
            if let Flow::Finished = handle_frame(shared, frame, kind, scheduler).await {
                debug!(session_id = %shared.id, received, frames = frames_seen, "completion received");
                return Ok(());
            }
        }
    }
}

async fn handle_frame(
    shared: &Shared,
    frame: Frame,
    kind: FrameKind,
    scheduler: &mut PlaybackScheduler,
) -> Flow {
    match kind {
        FrameKind::Event => {
            let Some(event) = parse_event(&frame) else {
                return Flow::Continue;
            };
            let terminal = event.is_terminal();
            let flow = handle_event(shared, event, scheduler).await;
            if terminal { Flow::Finished } else { flow }
        }
        FrameKind::Generation => match parse_generation(&frame) {
            None => Flow::Continue,
            Some(Ok(generation)) => {
                deliver(shared, RenderUpdate::Generation(generation), scheduler).await
            }
            Some(Err(err)) => {
                warn!(session_id = %shared.id, error = %err, "skipping malformed generation frame");
                shared.render(RenderUpdate::InlineError(err.to_string()));
                Flow::Continue
            }
        },
    }
}

async fn handle_event(
    shared: &Shared,
    event: Event,
    scheduler: &mut PlaybackScheduler,
) -> Flow {
    match event {
        Event::Delta(text) if text.is_empty() => Flow::Continue,
        Event::Delta(text) => deliver(shared, RenderUpdate::Text(text), scheduler).await,
        Event::Completion(stats) => {
            finish_completion(shared, stats);
            Flow::Continue
        }
        Event::Error(err) => {
            warn!(session_id = %shared.id, error = ?err, "error frame");
            shared.render(RenderUpdate::InlineError(err.display_text()));
            Flow::Continue
        }
        Event::Unknown(value) => {
            debug!(session_id = %shared.id, %value, "ignoring unrecognised frame");
            Flow::Continue
        }
    }
}

fn finish_completion(shared: &Shared, stats: CompletionStats) {
    if let Some(text) = stats.final_text.as_ref().filter(|t| !t.is_empty()) {
        shared.render(RenderUpdate::Text(text.clone()));
    }
    if let Some(rate) = stats.tokens_per_second() {
        info!(session_id = %shared.id, eval_count = ?stats.eval_count, tokens_per_second = rate, "completion finished");
    }
    shared.render(RenderUpdate::Completed(Some(stats)));
}

/// Renders one paced update, then holds the loop for the pacing delay.
async fn deliver(
    shared: &Shared,
    update: RenderUpdate,
    scheduler: &mut PlaybackScheduler,
) -> Flow {
    if !shared.render(update) {
        return Flow::Finished;
    }
    scheduler.arm();
    scheduler.wait().await;
    if shared.is_live() {
        Flow::Continue
    } else {
        scheduler.cancel();
        Flow::Finished
    }
}

async fn play_whole_body(
    shared: &Shared,
    mut body: ByteStream,
    scheduler: &mut PlaybackScheduler,
) -> Result<(), StreamError> {
    let mut decoder = ChunkDecoder::new();
    let mut text = String::new();
    let mut received = 0_usize;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        if !shared.is_live() {
            return Ok(());
        }
        if chunk.is_empty() {
            continue;
        }
        if received == 0 {
            shared.transition(SessionState::Streaming);
        }
        received += chunk.len();
        text.push_str(&decoder.decode(&chunk));
    }
    if received == 0 {
        return Err(StreamError::EmptyBody);
    }
    text.push_str(&decoder.finish());
    // release the connection before playback starts
    drop(body);

    let mut queue = parse_generations(&text)?;
    debug!(session_id = %shared.id, generations = queue.len(), "playing buffered generations");
    while let Some(generation) = queue.next_generation() {
        if let Flow::Finished = deliver(shared, RenderUpdate::Generation(generation), scheduler).await {
            queue.clear();
            return Ok(());
        }
    }
    shared.render(RenderUpdate::Completed(None));
    Ok(())
}

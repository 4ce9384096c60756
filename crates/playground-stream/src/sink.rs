use std::sync::Mutex;

use crate::event::CompletionStats;
use crate::grid::Generation;
use crate::session::SessionState;

/// One update delivered to the renderer.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderUpdate {
    /// Append text to the output area.
    Text(String),
    /// Replace the drawn grid with this generation.
    Generation(Generation),
    /// Show an inline error without ending the stream.
    InlineError(String),
    /// The stream finished cleanly.
    Completed(Option<CompletionStats>),
}

/// Consumer of decoded updates (a canvas, a text area, a terminal).
///
/// Calls arrive from the session task in wire order, one at a time.
/// Stopping a session sends nothing further, so the sink keeps showing the
/// last update it drew. `stop` waits for a render already in progress, so
/// `render` must not stop its own session.
pub trait RenderSink: Send + Sync {
    /// Draws one update.
    fn render(&self, update: &RenderUpdate);

    /// Observes session state changes. Every session ends with a terminal
    /// state here, so loading indicators can always be cleared.
    fn state_changed(&self, _state: &SessionState) {}
}

/// Sink that records everything it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<RenderUpdate>>,
    states: Mutex<Vec<SessionState>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates received so far.
    pub fn updates(&self) -> Vec<RenderUpdate> {
        self.updates
            .lock()
            .map(|u| u.clone())
            .unwrap_or_default()
    }

    /// State transitions received so far.
    pub fn states(&self) -> Vec<SessionState> {
        self.states.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Concatenation of all `Text` updates.
    pub fn text(&self) -> String {
        self.updates()
            .into_iter()
            .filter_map(|u| match u {
                RenderUpdate::Text(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// All `Generation` updates, in order.
    pub fn generations(&self) -> Vec<Generation> {
        self.updates()
            .into_iter()
            .filter_map(|u| match u {
                RenderUpdate::Generation(generation) => Some(generation),
                _ => None,
            })
            .collect()
    }
}

impl RenderSink for RecordingSink {
    fn render(&self, update: &RenderUpdate) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.push(update.clone());
        }
    }

    fn state_changed(&self, state: &SessionState) {
        if let Ok(mut states) = self.states.lock() {
            states.push(state.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_concatenates_text_updates_only() {
        let sink = RecordingSink::new();
        sink.render(&RenderUpdate::Text("hello".into()));
        sink.render(&RenderUpdate::InlineError("Error: x".into()));
        sink.render(&RenderUpdate::Text(" world".into()));
        assert_eq!(sink.text(), "hello world");
        assert_eq!(sink.updates().len(), 3);
    }
}

use std::io::Write as _;

use playground_stream::prelude::*;
use playground_stream::{Cell, CompletionStats};

/// Viewport drawn for Game of Life generations.
#[derive(Clone, Copy, Debug)]
pub struct Viewport {
    pub width: i64,
    pub height: i64,
}

/// Renders text deltas inline and redraws the grid for every generation.
pub struct TerminalSink {
    viewport: Viewport,
}

impl TerminalSink {
    pub fn new(viewport: Viewport) -> Self {
        Self { viewport }
    }

    fn draw(&self, generation: &Generation) -> String {
        let mut out = String::from("\x1b[2J\x1b[H");
        for y in 0..self.viewport.height {
            for x in 0..self.viewport.width {
                out.push(if generation.contains(Cell(x, y)) { '#' } else { '.' });
            }
            out.push('\n');
        }
        out.push_str(&format!("alive: {}\n", generation.len()));
        out
    }
}

fn summary(stats: &CompletionStats) -> Option<String> {
    let rate = stats.tokens_per_second()?;
    Some(format!(
        "[{} tokens, {rate:.1} tokens/s]",
        stats.eval_count.unwrap_or_default()
    ))
}

impl RenderSink for TerminalSink {
    fn render(&self, update: &RenderUpdate) {
        let mut stdout = std::io::stdout().lock();
        let _ = match update {
            RenderUpdate::Text(text) => write!(stdout, "{text}"),
            RenderUpdate::Generation(generation) => write!(stdout, "{}", self.draw(generation)),
            RenderUpdate::InlineError(message) => writeln!(stdout, "\n{message}"),
            RenderUpdate::Completed(stats) => match stats.as_ref().and_then(summary) {
                Some(line) => writeln!(stdout, "\n{line}"),
                None => writeln!(stdout),
            },
        };
        let _ = stdout.flush();
    }

    /// Failures are printed once, by the caller of `play`.
    fn state_changed(&self, state: &SessionState) {
        tracing::debug!(?state, "session state");
    }
}

/// Parses `x,y;x,y;...`.
pub fn parse_cells(raw: &str) -> Result<Generation, String> {
    raw.split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| format!("expected x,y but got {pair:?}"))?;
            let x = x.trim().parse::<i64>().map_err(|e| format!("{pair:?}: {e}"))?;
            let y = y.trim().parse::<i64>().map_err(|e| format!("{pair:?}: {e}"))?;
            Ok(Cell(x, y))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cell_lists() {
        let cells = parse_cells("1,0; 2,1 ;0,2;").expect("cells");
        assert_eq!(cells.len(), 3);
        assert!(cells.contains(Cell(2, 1)));
        assert!(parse_cells("1;2").is_err());
    }

    #[test]
    fn draws_live_cells_inside_the_viewport() {
        let sink = TerminalSink::new(Viewport {
            width: 3,
            height: 2,
        });
        let generation: Generation = [(1, 0), (5, 5)].into_iter().collect();
        let drawn = sink.draw(&generation);
        assert!(drawn.ends_with(".#.\n...\nalive: 2\n"));
    }
}

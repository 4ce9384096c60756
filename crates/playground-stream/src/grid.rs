//! Game of Life grid snapshots and their wire shapes.
//!
//! Cells travel as `[x, y]` integer pairs. The simulation itself runs
//! server-side; this module only carries snapshots to the renderer.

use std::collections::{BTreeSet, VecDeque};

/// A live cell at grid position `(x, y)`. `(0, 0)` is the grid origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Cell(pub i64, pub i64);

impl From<(i64, i64)> for Cell {
    fn from((x, y): (i64, i64)) -> Self {
        Self(x, y)
    }
}

/// The set of live cells for one generation.
///
/// Equality is order-independent: two snapshots listing the same cells in
/// a different order compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Generation {
    cells: BTreeSet<Cell>,
}

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.cells.contains(&cell)
    }

    /// Flips a cell between alive and dead. Returns whether it is now alive.
    pub fn toggle(&mut self, cell: Cell) -> bool {
        if self.cells.remove(&cell) {
            false
        } else {
            self.cells.insert(cell);
            true
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells.iter().copied()
    }
}

impl FromIterator<Cell> for Generation {
    fn from_iter<I: IntoIterator<Item = Cell>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

impl FromIterator<(i64, i64)> for Generation {
    fn from_iter<I: IntoIterator<Item = (i64, i64)>>(iter: I) -> Self {
        iter.into_iter().map(Cell::from).collect()
    }
}

/// Request body for both Game of Life endpoints.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AliveCellsRequest {
    pub alive_cells: Generation,
}

/// Whole-response body: every generation computed by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GenerationsResponse {
    pub generations: Vec<Generation>,
}

/// Generations waiting for timed display, drained one per tick.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    pending: VecDeque<Generation>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, generation: Generation) {
        self.pending.push_back(generation);
    }

    pub fn next_generation(&mut self) -> Option<Generation> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl From<GenerationsResponse> for PlaybackQueue {
    fn from(value: GenerationsResponse) -> Self {
        Self {
            pending: value.generations.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_serialize_as_pairs() {
        let generation: Generation = [(1, 0), (0, 0)].into_iter().collect();
        let json = serde_json::to_string(&AliveCellsRequest {
            alive_cells: generation,
        })
        .expect("serialize");
        assert_eq!(json, r#"{"alive_cells":[[0,0],[1,0]]}"#);
    }

    #[test]
    fn echoed_cells_rebuild_the_same_set() {
        let sent: Generation = [(3, -2), (0, 0), (-7, 4)].into_iter().collect();
        let wire = serde_json::to_string(&sent).expect("serialize");
        // the server may answer in any order
        let echoed: Generation = serde_json::from_str("[[-7,4],[3,-2],[0,0]]").expect("parse");
        assert_eq!(echoed, sent);
        let back: Generation = serde_json::from_str(&wire).expect("parse");
        assert_eq!(back, sent);
    }

    #[test]
    fn toggle_flips_membership() {
        let mut generation = Generation::new();
        assert!(generation.toggle(Cell(2, 3)));
        assert!(generation.contains(Cell(2, 3)));
        assert!(!generation.toggle(Cell(2, 3)));
        assert!(generation.is_empty());
    }

    #[test]
    fn queue_drains_in_order() {
        let response: GenerationsResponse =
            serde_json::from_str(r#"{"generations":[[[0,0]],[[1,1]],[]]}"#).expect("parse");
        let mut queue = PlaybackQueue::from(response);
        assert_eq!(queue.len(), 3);
        assert!(queue.next_generation().expect("first").contains(Cell(0, 0)));
        assert!(queue.next_generation().expect("second").contains(Cell(1, 1)));
        assert!(queue.next_generation().expect("third").is_empty());
        assert!(queue.next_generation().is_none());
    }
}

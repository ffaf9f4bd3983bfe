//! Bounded history of single-cell moves.

use std::collections::{HashMap, VecDeque};

use ccag_model::TestCase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Undo {
    row: usize,
    column: usize,
    /// Value the cell held before the move.
    previous: usize,
}

/// The most recent moves, oldest evicted first.
///
/// A proposed move is tabu when it would put the array back into a state it
/// held within the window: walking back from the newest move, the cells
/// that differ from the current array are tracked, and the move is rejected
/// as soon as the only difference is exactly the proposed cell and value.
#[derive(Debug, Clone)]
pub struct TabuList {
    moves: VecDeque<Undo>,
    capacity: usize,
}

impl TabuList {
    pub fn new(capacity: usize) -> Self {
        Self {
            moves: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.moves.clear();
    }

    /// Record that `(row, column)` is about to change from `previous`.
    pub fn record(&mut self, row: usize, column: usize, previous: usize) {
        if self.capacity == 0 {
            return;
        }
        if self.moves.len() == self.capacity {
            self.moves.pop_front();
        }
        self.moves.push_back(Undo {
            row,
            column,
            previous,
        });
    }

    /// Whether setting `rows[row][column] = value` returns to a recent state.
    pub fn is_tabu(&self, rows: &[TestCase], row: usize, column: usize, value: usize) -> bool {
        let mut diff: HashMap<(usize, usize), usize> = HashMap::new();

        for undo in self.moves.iter().rev() {
            let cell = (undo.row, undo.column);
            if rows[undo.row][undo.column] == Some(undo.previous) {
                diff.remove(&cell);
            } else {
                diff.insert(cell, undo.previous);
            }
            if diff.len() == 1 && diff.get(&(row, column)) == Some(&value) {
                return true;
            }
        }
        false
    }
}

//! The coverage matrix: one ragged row per parameter subset.
//!
//! Each cell holds a small integer:
//! - `-1`: permanently invalid (violates constraints),
//! - `0`: valid and not yet covered,
//! - `k > 0`: valid and covered by `k` rows of the working suite.
//!
//! Rows live back to back in a single arena addressed by per-row offsets.
//! The matrix keeps a global zero count and a per-row zero count, so a
//! uniformly random zero cell can be located by skipping whole rows.

use rand::Rng;

/// State value of an invalid cell.
pub const INVALID: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageMatrix {
    cells: Vec<i32>,
    /// `offsets[r]..offsets[r + 1]` is row `r`.
    offsets: Vec<usize>,
    row_zeros: Vec<u64>,
    zeros: u64,
}

impl CoverageMatrix {
    /// Allocate a zeroed matrix with the given row widths.
    pub fn new(widths: &[usize]) -> Self {
        let mut offsets = Vec::with_capacity(widths.len() + 1);
        let mut total = 0usize;
        offsets.push(0);
        for &w in widths {
            total += w;
            offsets.push(total);
        }
        Self {
            cells: vec![0; total],
            offsets,
            row_zeros: widths.iter().map(|&w| w as u64).collect(),
            zeros: total as u64,
        }
    }

    pub fn rows(&self) -> usize {
        self.row_zeros.len()
    }

    pub fn row_width(&self, row: usize) -> usize {
        self.offsets[row + 1] - self.offsets[row]
    }

    pub fn row(&self, row: usize) -> &[i32] {
        &self.cells[self.offsets[row]..self.offsets[row + 1]]
    }

    /// Total number of cells across all rows.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn zero_count(&self) -> u64 {
        self.zeros
    }

    pub fn get(&self, row: usize, col: usize) -> i32 {
        self.cells[self.index(row, col)]
    }

    /// Overwrite a cell, keeping the zero counters exact.
    pub fn set(&mut self, row: usize, col: usize, state: i32) {
        assert!(state >= INVALID, "cell state {state} below invalid");
        let idx = self.index(row, col);
        let old = self.cells[idx];
        if old == 0 && state != 0 {
            self.zeros -= 1;
            self.row_zeros[row] -= 1;
        } else if old != 0 && state == 0 {
            self.zeros += 1;
            self.row_zeros[row] += 1;
        }
        self.cells[idx] = state;
    }

    pub fn increment(&mut self, row: usize, col: usize) {
        let idx = self.index(row, col);
        assert!(self.cells[idx] >= 0, "increment of invalid cell ({row}, {col})");
        if self.cells[idx] == 0 {
            self.zeros -= 1;
            self.row_zeros[row] -= 1;
        }
        self.cells[idx] += 1;
    }

    pub fn decrement(&mut self, row: usize, col: usize) {
        let idx = self.index(row, col);
        assert!(self.cells[idx] >= 1, "decrement of uncovered cell ({row}, {col})");
        if self.cells[idx] == 1 {
            self.zeros += 1;
            self.row_zeros[row] += 1;
        }
        self.cells[idx] -= 1;
    }

    /// A zero cell drawn uniformly at random, or `None` when every cell is
    /// covered or invalid.
    pub fn random_zero_cell<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(usize, usize)> {
        if self.zeros == 0 {
            return None;
        }
        let mut target = rng.gen_range(0..self.zeros);
        for (row, &count) in self.row_zeros.iter().enumerate() {
            if target >= count {
                target -= count;
                continue;
            }
            for (col, &cell) in self.row(row).iter().enumerate() {
                if cell == 0 {
                    if target == 0 {
                        return Some((row, col));
                    }
                    target -= 1;
                }
            }
        }
        None
    }

    /// Literal recount of zero cells, for auditing the running counter.
    pub fn count_zero_cells(&self) -> u64 {
        self.cells.iter().filter(|&&c| c == 0).count() as u64
    }

    /// Literal recount of non-negative (valid) cells.
    pub fn count_valid_cells(&self) -> u64 {
        self.cells.iter().filter(|&&c| c >= 0).count() as u64
    }

    /// Render one row, `-` for invalid cells.
    pub fn render_row(&self, row: usize) -> String {
        self.row(row)
            .iter()
            .map(|&c| if c == INVALID { "-".to_string() } else { c.to_string() })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn index(&self, row: usize, col: usize) -> usize {
        assert!(
            col < self.row_width(row),
            "column {col} out of range for row {row} of width {}",
            self.row_width(row)
        );
        self.offsets[row] + col
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_ragged_rows() {
        let m = CoverageMatrix::new(&[4, 6, 2]);
        assert_eq!(m.rows(), 3);
        assert_eq!(m.row_width(1), 6);
        assert_eq!(m.len(), 12);
        assert_eq!(m.zero_count(), 12);
    }

    #[test]
    fn test_set_tracks_zero_transitions() {
        let mut m = CoverageMatrix::new(&[2, 2]);
        m.set(0, 0, INVALID);
        assert_eq!(m.zero_count(), 3);
        m.set(0, 0, INVALID);
        assert_eq!(m.zero_count(), 3);
        m.set(1, 1, 3);
        assert_eq!(m.zero_count(), 2);
        m.set(1, 1, 0);
        assert_eq!(m.zero_count(), 3);
        assert_eq!(m.count_zero_cells(), 3);
    }

    #[test]
    #[should_panic(expected = "decrement of uncovered cell")]
    fn test_decrement_of_uncovered_cell_panics() {
        let mut m = CoverageMatrix::new(&[2]);
        m.decrement(0, 0);
    }

    #[test]
    fn test_increment_decrement() {
        let mut m = CoverageMatrix::new(&[3]);
        m.increment(0, 1);
        m.increment(0, 1);
        assert_eq!(m.get(0, 1), 2);
        assert_eq!(m.zero_count(), 2);
        m.decrement(0, 1);
        assert_eq!(m.zero_count(), 2);
        m.decrement(0, 1);
        assert_eq!(m.get(0, 1), 0);
        assert_eq!(m.zero_count(), 3);
    }

    #[test]
    fn test_random_zero_cell_only_returns_zeros() {
        let mut m = CoverageMatrix::new(&[3, 3]);
        m.increment(0, 0);
        m.set(0, 2, INVALID);
        m.increment(1, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            let (r, c) = m.random_zero_cell(&mut rng).unwrap();
            assert_eq!(m.get(r, c), 0);
        }
    }

    #[test]
    fn test_random_zero_cell_reaches_every_zero() {
        let mut m = CoverageMatrix::new(&[2, 5]);
        m.increment(1, 0);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            seen.insert(m.random_zero_cell(&mut rng).unwrap());
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn test_random_zero_cell_none_when_full() {
        let mut m = CoverageMatrix::new(&[1, 1]);
        m.increment(0, 0);
        m.set(1, 0, INVALID);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(m.random_zero_cell(&mut rng).is_none());
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_column_panics() {
        let m = CoverageMatrix::new(&[2]);
        m.get(0, 2);
    }

    #[test]
    fn test_render_row() {
        let mut m = CoverageMatrix::new(&[3]);
        m.set(0, 0, INVALID);
        m.increment(0, 2);
        assert_eq!(m.render_row(0), "- 0 1");
    }
}

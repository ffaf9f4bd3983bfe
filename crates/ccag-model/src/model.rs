//! The coverage model: every `t`-way combination of a test model and how
//! often the working suite covers it.
//!
//! Lifecycle within one generation run:
//! 1. [`CoverageModel::new`] validates the test model.
//! 2. [`CoverageModel::initialize`] enumerates the `C(n, t)` parameter
//!    subsets in rank order and allocates one zeroed matrix row per subset.
//! 3. A constraint handler may prune cells to `-1`, eagerly through
//!    [`CoverageModel::prune_invalid`] or lazily through
//!    [`CoverageModel::set_invalid`].
//! 4. A generator mutates coverage counts until no zero cell remains.
//!
//! `space_total` always equals the number of non-negative cells and the
//! matrix zero count always equals the number of zero cells;
//! [`CoverageModel::audit`] recounts both.

use std::fmt;

use rand::Rng;

use crate::combinatorial::{self, BinomialTable};
use crate::error::ModelError;
use crate::matrix::{CoverageMatrix, INVALID};
use crate::tuple::Tuple;
use crate::types::{LiteralMap, TestCase, TestModel};

/// Coverage state of a single `t`-way combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    /// Violates the constraints; never needs covering.
    Invalid,
    /// Valid and not covered by any row yet.
    Uncovered,
    /// Valid and covered by this many rows.
    Covered(u32),
}

impl CellState {
    fn from_raw(raw: i32) -> Self {
        match raw {
            INVALID => CellState::Invalid,
            0 => CellState::Uncovered,
            k => CellState::Covered(k as u32),
        }
    }
}

/// Saved coverage state, see [`CoverageModel::snapshot`].
#[derive(Debug, Clone)]
pub struct CoverageSnapshot {
    matrix: CoverageMatrix,
    space_total: u64,
}

#[derive(Debug, Clone)]
pub struct CoverageModel {
    spec: TestModel,
    literals: LiteralMap,
    binomials: BinomialTable,
    /// All `t`-subsets of the parameters, indexed by rank.
    subsets: Vec<Vec<usize>>,
    /// Arities of each subset's parameters, parallel to `subsets`.
    subset_arities: Vec<Vec<usize>>,
    matrix: CoverageMatrix,
    space_raw: u64,
    space_total: u64,
}

impl CoverageModel {
    pub fn new(spec: TestModel) -> Result<Self, ModelError> {
        spec.validate()?;
        let literals = spec.literal_map();
        let binomials = BinomialTable::new(spec.parameters(), spec.strength);
        Ok(Self {
            spec,
            literals,
            binomials,
            subsets: Vec::new(),
            subset_arities: Vec::new(),
            matrix: CoverageMatrix::new(&[]),
            space_raw: 0,
            space_total: 0,
        })
    }

    /// Enumerate all parameter subsets and reset every cell to uncovered.
    pub fn initialize(&mut self) -> Result<(), ModelError> {
        let n = self.spec.parameters();
        let t = self.spec.strength;

        let rows = combinatorial::binomial(n, t)?;
        usize::try_from(rows).map_err(|_| ModelError::capacity(format!("C({n}, {t}) rows")))?;

        let subsets = combinatorial::all_subsets(n, t);
        let mut widths = Vec::with_capacity(subsets.len());
        let mut total: u64 = 0;
        for subset in &subsets {
            let width = combinatorial::product_of_arities(subset, &self.spec.arities)?;
            total = total
                .checked_add(width as u64)
                .ok_or_else(|| ModelError::capacity("total number of combinations"))?;
            widths.push(width);
        }

        self.subset_arities = subsets
            .iter()
            .map(|s| s.iter().map(|&p| self.spec.arities[p]).collect())
            .collect();
        self.subsets = subsets;
        self.matrix = CoverageMatrix::new(&widths);
        self.space_raw = total;
        self.space_total = total;
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn is_initialized(&self) -> bool {
        !self.subsets.is_empty()
    }

    /// Fail with [`ModelError::NotInitialized`] before [`initialize`](Self::initialize).
    pub fn ensure_initialized(&self) -> Result<(), ModelError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(ModelError::NotInitialized)
        }
    }

    pub fn spec(&self) -> &TestModel {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn parameters(&self) -> usize {
        self.spec.parameters()
    }

    pub fn strength(&self) -> usize {
        self.spec.strength
    }

    pub fn arities(&self) -> &[usize] {
        &self.spec.arities
    }

    pub fn literals(&self) -> &LiteralMap {
        &self.literals
    }

    pub fn subsets(&self) -> &[Vec<usize>] {
        &self.subsets
    }

    pub fn matrix(&self) -> &CoverageMatrix {
        &self.matrix
    }

    /// Number of combinations before any pruning.
    pub fn space_raw(&self) -> u64 {
        self.space_raw
    }

    /// Number of valid combinations that must be covered.
    pub fn space_total(&self) -> u64 {
        self.space_total
    }

    /// Number of valid combinations not covered yet.
    pub fn uncovered(&self) -> u64 {
        self.matrix.zero_count()
    }

    // ── Index helpers ────────────────────────────────────────────────

    /// Matrix row of a sorted parameter subset of size `t`.
    pub fn row_of(&self, positions: &[usize]) -> usize {
        assert_eq!(
            positions.len(),
            self.strength(),
            "expected a {}-way combination, got {positions:?}",
            self.strength()
        );
        self.binomials.rank(positions)
    }

    /// Matrix column of `values` within `row`.
    pub fn column_of(&self, row: usize, values: &[usize]) -> usize {
        combinatorial::assignment_to_rank(&self.subset_arities[row], values)
    }

    /// Column of the combination `test` induces in `row`, or `None` if any
    /// of the row's parameters is unassigned.
    pub fn column_in_test(&self, row: usize, test: &[Option<usize>]) -> Option<usize> {
        let arities = &self.subset_arities[row];
        let mut column = 0;
        for (k, &p) in self.subsets[row].iter().enumerate() {
            let value = test[p]?;
            assert!(
                value < arities[k],
                "value {value} out of range for arity {} of parameter {p}",
                arities[k]
            );
            column = column * arities[k] + value;
        }
        Some(column)
    }

    /// The tuple stored at `(row, column)`.
    pub fn tuple_at(&self, row: usize, column: usize) -> Tuple {
        let schema = combinatorial::rank_to_assignment(column, &self.subset_arities[row]);
        Tuple::new(self.subsets[row].clone(), schema, self.parameters())
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn coverage_state(&self, positions: &[usize], values: &[usize]) -> CellState {
        let row = self.row_of(positions);
        let column = self.column_of(row, values);
        self.cell_state(row, column)
    }

    pub fn cell_state(&self, row: usize, column: usize) -> CellState {
        CellState::from_raw(self.matrix.get(row, column))
    }

    /// Number of currently uncovered combinations `test` would cover.
    /// Combinations touching an unassigned position are ignored.
    pub fn uncovered_count(&self, test: &[Option<usize>]) -> u64 {
        (0..self.subsets.len())
            .filter_map(|row| self.column_in_test(row, test).map(|col| (row, col)))
            .filter(|&(row, col)| self.matrix.get(row, col) == 0)
            .count() as u64
    }

    /// A uniformly random uncovered combination.
    pub fn sample_uncovered_tuple<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Tuple> {
        self.matrix
            .random_zero_cell(rng)
            .map(|(row, col)| self.tuple_at(row, col))
    }

    /// Every uncovered combination over the given parameters.
    pub fn uncovered_tuples(&self, positions: &[usize]) -> Vec<Tuple> {
        let row = self.row_of(positions);
        self.matrix
            .row(row)
            .iter()
            .enumerate()
            .filter(|(_, &state)| state == 0)
            .map(|(col, _)| self.tuple_at(row, col))
            .collect()
    }

    /// For each suite row that violates one of the model's constraints, the
    /// first violated constraint as a tuple of the row's values at the
    /// constrained positions, paired with the row index.
    pub fn covered_constraints(&self, rows: &[TestCase]) -> Vec<(Tuple, usize)> {
        let mut found = Vec::new();
        for (index, test) in rows.iter().enumerate() {
            for clause in &self.spec.constraints {
                if let Some(positions) = self.violated_positions(clause.literals(), test) {
                    found.push((Tuple::extract(test, &positions), index));
                    break;
                }
            }
        }
        found
    }

    /// Positions of a clause whose every literal `test` falsifies.
    fn violated_positions(&self, literals: &[i64], test: &[Option<usize>]) -> Option<Vec<usize>> {
        let mut positions = Vec::with_capacity(literals.len());
        for &literal in literals {
            let (p, v) = self.literals.decode(literal).ok()?;
            let assigned = test[p]?;
            let falsified = if literal < 0 { assigned == v } else { assigned != v };
            if !falsified {
                return None;
            }
            positions.push(p);
        }
        positions.sort_unstable();
        positions.dedup();
        Some(positions)
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Mark every combination `is_valid` rejects as permanently invalid.
    /// Already-invalid cells stay invalid.
    pub fn prune_invalid<F>(&mut self, mut is_valid: F)
    where
        F: FnMut(&[Option<usize>]) -> bool,
    {
        let parameters = self.parameters();
        for row in 0..self.subsets.len() {
            for (col, schema) in combinatorial::all_assignments(&self.subset_arities[row])
                .into_iter()
                .enumerate()
            {
                if self.matrix.get(row, col) == INVALID {
                    continue;
                }
                let tuple = Tuple::new(self.subsets[row].clone(), schema, parameters);
                if !is_valid(&tuple.test) {
                    self.invalidate_cell(row, col);
                }
            }
        }
    }

    /// Mark one combination as permanently invalid.
    pub fn set_invalid(&mut self, positions: &[usize], values: &[usize]) {
        let row = self.row_of(positions);
        let col = self.column_of(row, values);
        self.invalidate_cell(row, col);
    }

    /// Mark `(row, col)` invalid; `space_total` drops once per cell.
    pub fn invalidate_cell(&mut self, row: usize, col: usize) {
        if self.matrix.get(row, col) != INVALID {
            self.matrix.set(row, col, INVALID);
            self.space_total -= 1;
        }
    }

    /// Remove one row's worth of coverage from a covered cell.
    pub fn decrement_cell(&mut self, row: usize, col: usize) {
        self.matrix.decrement(row, col);
    }

    /// Count `test` as part of the suite; returns how many combinations
    /// were uncovered before.
    pub fn mark_covered(&mut self, test: &[Option<usize>]) -> u64 {
        let mut newly = 0;
        for row in 0..self.subsets.len() {
            let Some(col) = self.column_in_test(row, test) else {
                continue;
            };
            match self.matrix.get(row, col) {
                INVALID => {}
                state => {
                    if state == 0 {
                        newly += 1;
                    }
                    self.matrix.increment(row, col);
                }
            }
        }
        newly
    }

    /// Replace `from` by `to` in the suite and return the change in the
    /// number of uncovered combinations (negative is better).
    ///
    /// The matrix is updated; calling again with the arguments swapped
    /// undoes the move exactly.
    pub fn fitness_delta(&mut self, from: &[Option<usize>], to: &[Option<usize>]) -> i64 {
        let mut removal = 0i64;
        let mut addition = 0i64;

        for row in 0..self.subsets.len() {
            let Some(col) = self.column_in_test(row, from) else {
                continue;
            };
            let state = self.matrix.get(row, col);
            if state == INVALID {
                continue;
            }
            assert!(state >= 1, "row being replaced does not cover ({row}, {col})");
            if state == 1 {
                removal += 1;
            }
            self.matrix.decrement(row, col);
        }

        for row in 0..self.subsets.len() {
            let Some(col) = self.column_in_test(row, to) else {
                continue;
            };
            let state = self.matrix.get(row, col);
            if state == INVALID {
                continue;
            }
            if state == 0 {
                addition += 1;
            }
            self.matrix.increment(row, col);
        }

        removal - addition
    }

    /// Same value as [`fitness_delta`](Self::fitness_delta) without touching
    /// the matrix.
    pub fn fitness_delta_eval(&self, from: &[Option<usize>], to: &[Option<usize>]) -> i64 {
        let mut delta = 0i64;
        for row in 0..self.subsets.len() {
            let col_from = self.column_in_test(row, from);
            let col_to = self.column_in_test(row, to);
            if col_from == col_to {
                continue;
            }
            if let Some(col) = col_from {
                if self.matrix.get(row, col) == 1 {
                    delta += 1;
                }
            }
            if let Some(col) = col_to {
                if self.matrix.get(row, col) == 0 {
                    delta -= 1;
                }
            }
        }
        delta
    }

    // ── Snapshots and auditing ───────────────────────────────────────

    pub fn snapshot(&self) -> CoverageSnapshot {
        CoverageSnapshot {
            matrix: self.matrix.clone(),
            space_total: self.space_total,
        }
    }

    pub fn restore(&mut self, snapshot: &CoverageSnapshot) {
        self.matrix.clone_from(&snapshot.matrix);
        self.space_total = snapshot.space_total;
    }

    /// Recount zero and valid cells and compare them with the running
    /// counters.
    pub fn audit(&self) -> Result<(), ModelError> {
        let actual_zeros = self.matrix.count_zero_cells();
        let actual_valid = self.matrix.count_valid_cells();
        if actual_zeros != self.matrix.zero_count() || actual_valid != self.space_total {
            return Err(ModelError::CounterDrift {
                zero_count: self.matrix.zero_count(),
                actual_zeros,
                space_total: self.space_total,
                actual_valid,
            });
        }
        Ok(())
    }
}

impl fmt::Display for CoverageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "model = {}", self.spec.name)?;
        writeln!(f, "strength = {}", self.spec.strength)?;
        writeln!(f, "arities = {:?}", self.spec.arities)?;
        writeln!(f, "constraints = {}", self.spec.constraints.len())?;
        writeln!(
            f,
            "raw space = {}, valid combinations = {}, uncovered = {}",
            self.space_raw,
            self.space_total,
            self.uncovered()
        )?;
        for (row, subset) in self.subsets.iter().enumerate() {
            writeln!(f, "{subset:?}: {}", self.matrix.render_row(row))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Clause;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn binary3() -> CoverageModel {
        let mut model = CoverageModel::new(TestModel::new("b3", 2, vec![2, 2, 2])).unwrap();
        model.initialize().unwrap();
        model
    }

    #[test]
    fn test_initialize_binary_model() {
        let model = binary3();
        assert_eq!(model.subsets().len(), 3);
        for row in 0..3 {
            assert_eq!(model.matrix().row_width(row), 4);
        }
        assert_eq!(model.space_total(), 12);
        assert_eq!(model.space_raw(), 12);
        assert_eq!(model.uncovered(), 12);
    }

    #[test]
    fn test_mark_covered_counts_new_pairs() {
        let mut model = binary3();
        assert_eq!(model.mark_covered(&[Some(0), Some(0), Some(0)]), 3);
        assert_eq!(model.uncovered(), 9);
        assert_eq!(model.coverage_state(&[0, 1], &[0, 0]), CellState::Covered(1));
        assert_eq!(model.mark_covered(&[Some(0), Some(0), Some(0)]), 0);
        assert_eq!(model.coverage_state(&[1, 2], &[0, 0]), CellState::Covered(2));
        model.audit().unwrap();
    }

    #[test]
    fn test_partial_test_skips_unassigned_rows() {
        let mut model = binary3();
        let partial = [Some(1), None, Some(0)];
        assert_eq!(model.uncovered_count(&partial), 1);
        assert_eq!(model.mark_covered(&partial), 1);
        assert_eq!(model.coverage_state(&[0, 2], &[1, 0]), CellState::Covered(1));
    }

    #[test]
    fn test_set_invalid_counts_once() {
        let mut model = binary3();
        model.set_invalid(&[0, 2], &[1, 1]);
        model.set_invalid(&[0, 2], &[1, 1]);
        assert_eq!(model.space_total(), 11);
        assert_eq!(model.uncovered(), 11);
        assert_eq!(model.coverage_state(&[0, 2], &[1, 1]), CellState::Invalid);
        // Invalid cells are never counted as covered.
        assert_eq!(model.mark_covered(&[Some(1), Some(0), Some(1)]), 2);
        assert_eq!(model.coverage_state(&[0, 2], &[1, 1]), CellState::Invalid);
        model.audit().unwrap();
    }

    #[test]
    fn test_prune_invalid_is_idempotent() {
        let mut model = binary3();
        let forbid = |t: &[Option<usize>]| !(t[0] == Some(0) && t[1] == Some(1));
        model.prune_invalid(forbid);
        assert_eq!(model.space_total(), 11);
        model.prune_invalid(forbid);
        assert_eq!(model.space_total(), 11);
        model.audit().unwrap();
    }

    #[test]
    fn test_sample_uncovered_tuple_is_uncovered() {
        let mut model = binary3();
        model.mark_covered(&[Some(0), Some(1), Some(0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..50 {
            let tuple = model.sample_uncovered_tuple(&mut rng).unwrap();
            assert_eq!(
                model.coverage_state(&tuple.positions, &tuple.schema),
                CellState::Uncovered
            );
        }
    }

    #[test]
    fn test_uncovered_tuples_of_row() {
        let mut model = binary3();
        model.mark_covered(&[Some(1), Some(1), Some(0)]);
        let tuples = model.uncovered_tuples(&[0, 1]);
        assert_eq!(tuples.len(), 3);
        assert!(tuples.iter().all(|t| t.schema != vec![1, 1]));
    }

    #[test]
    fn test_fitness_delta_matches_eval_and_undoes() {
        let mut model = binary3();
        let a = vec![Some(0), Some(0), Some(0)];
        let b = vec![Some(1), Some(1), Some(1)];
        model.mark_covered(&a);
        model.mark_covered(&[Some(0), Some(1), Some(1)]);
        let before = model.snapshot();

        let c = vec![Some(1), Some(0), Some(0)];
        let predicted = model.fitness_delta_eval(&a, &c);
        let applied = model.fitness_delta(&a, &c);
        assert_eq!(predicted, applied);
        let undo = model.fitness_delta(&c, &a);
        assert_eq!(undo, -applied);
        assert_eq!(model.matrix(), &before.matrix);

        assert_eq!(model.fitness_delta_eval(&a, &b), model.fitness_delta(&a, &b));
        model.audit().unwrap();
    }

    #[test]
    #[should_panic(expected = "does not cover")]
    fn test_fitness_delta_requires_covered_source() {
        let mut model = binary3();
        model.fitness_delta(&[Some(0), Some(0), Some(0)], &[Some(1), Some(1), Some(1)]);
    }

    #[test]
    #[should_panic(expected = "out of range for arity")]
    fn test_set_invalid_rejects_value_beyond_arity() {
        let mut model = binary3();
        model.set_invalid(&[0, 1], &[0, 2]);
    }

    #[test]
    #[should_panic(expected = "not strictly increasing")]
    fn test_row_of_rejects_unsorted_positions() {
        binary3().row_of(&[2, 0]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_column_in_test_rejects_value_beyond_arity() {
        binary3().uncovered_count(&[Some(0), Some(3), Some(0)]);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut model = binary3();
        model.set_invalid(&[0, 1], &[0, 0]);
        let snap = model.snapshot();
        model.mark_covered(&[Some(1), Some(1), Some(1)]);
        model.set_invalid(&[1, 2], &[0, 0]);
        model.restore(&snap);
        assert_eq!(model.space_total(), 11);
        assert_eq!(model.uncovered(), 11);
        model.audit().unwrap();
    }

    #[test]
    fn test_covered_constraints() {
        let spec = TestModel::new("c", 2, vec![2, 2, 2])
            .with_constraints(vec![Clause(vec![-1, -3]), Clause(vec![-2, 6])]);
        let mut model = CoverageModel::new(spec).unwrap();
        model.initialize().unwrap();
        let rows = vec![
            vec![Some(0), Some(0), Some(1)], // violates [-1, -3]
            vec![Some(1), Some(1), Some(1)], // satisfies both
            vec![Some(1), Some(0), Some(0)], // violates [-2, 6]: p0=1 and p2 != 1
        ];
        let found = model.covered_constraints(&rows);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].1, 0);
        assert_eq!(found[0].0.positions, vec![0, 1]);
        assert_eq!(found[0].0.schema, vec![0, 0]);
        assert_eq!(found[1].1, 2);
        assert_eq!(found[1].0.positions, vec![0, 2]);
        assert_eq!(found[1].0.schema, vec![1, 0]);
    }

    #[test]
    fn test_rejects_bad_strength() {
        let err = CoverageModel::new(TestModel::new("bad", 3, vec![2, 2])).unwrap_err();
        assert!(matches!(err, ModelError::StrengthOutOfRange { .. }));
    }
}

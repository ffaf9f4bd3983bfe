//! Tabu search over an evolving test suite.
//!
//! The outer search picks a suite size `N` inside a bracket and asks the
//! inner search for a covering array of exactly `N` rows, shrinking the
//! bracket from above on success and from below on failure.
//!
//! The inner search seeds `N` diverse rows and then changes one cell per
//! round. Each candidate move is scored as
//! `delta_uncovered + weight * delta_violation`; moves the handler rejects or
//! the [`TabuList`] forbids are skipped. It succeeds once nothing is
//! uncovered and nothing is violated.

pub mod history;

use std::collections::BTreeSet;

use ccag_handler::{ConstraintHandler, HandlerKind};
use ccag_model::{CoverageModel, CoverageSnapshot, TestCase, TestSuite};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::generator::{GenerationStatus, Generator};
use crate::limits::{Budget, SearchLimits, StopReason};

pub use history::TabuList;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabuConfig {
    /// Round budget of one inner search.
    pub rounds: u64,
    /// Weight of a constraint violation relative to an uncovered combination.
    pub weight: f64,
    /// Tabu list length is `N * parameters * max_arity / tabu_divisor`,
    /// capped at `tabu_ceiling`.
    pub tabu_divisor: usize,
    pub tabu_ceiling: usize,
    /// Moves sampled by a random move.
    pub random_moves: usize,
    /// Random rows drawn per seeded row.
    pub seed_candidates: usize,
    pub limits: SearchLimits,
}

impl Default for TabuConfig {
    fn default() -> Self {
        Self {
            rounds: 80_000,
            weight: 4.0,
            tabu_divisor: 10,
            tabu_ceiling: 5_000,
            random_moves: 10,
            seed_candidates: 10,
            limits: SearchLimits::default(),
        }
    }
}

impl TabuConfig {
    /// Tabu list length for a suite of `rows` rows.
    pub fn tabu_length(&self, rows: usize, parameters: usize, max_arity: usize) -> usize {
        let scaled = rows.saturating_mul(parameters).saturating_mul(max_arity)
            / self.tabu_divisor.max(1);
        scaled.min(self.tabu_ceiling)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TabuSearch {
    config: TabuConfig,
}

impl TabuSearch {
    pub fn new(config: TabuConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TabuConfig {
        &self.config
    }
}

/// Result of one inner search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    Found(T),
    Failed,
    Stopped(StopReason),
}

/// Search the size bracket `[lower, upper]` for the smallest size at which
/// `inner` succeeds. Sizes are tried at `(lower + 2 * upper) / 3`; a
/// success at `N` moves the upper bound to `N - 1`, a failure moves the
/// lower bound to `N + 1`.
///
/// Returns the last success, if any, and the reason the search was cut
/// short, if it was.
pub fn bracket_search<T, F>(mut lower: usize, mut upper: usize, mut inner: F) -> (Option<T>, Option<StopReason>)
where
    F: FnMut(usize) -> Attempt<T>,
{
    let mut best = None;
    while upper >= lower {
        let n = (lower + 2 * upper) / 3;
        match inner(n) {
            Attempt::Found(found) => {
                best = Some(found);
                if n == 0 {
                    break;
                }
                upper = n - 1;
            }
            Attempt::Failed => lower = n + 1,
            Attempt::Stopped(reason) => return (best, Some(reason)),
        }
    }
    (best, None)
}

/// Initial size bracket: the product of the `t` largest arities, and five
/// times the largest arity to the power `t`.
pub fn size_bounds(arities: &[usize], strength: usize) -> (usize, usize) {
    let mut sorted = arities.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let lower = sorted
        .iter()
        .take(strength)
        .fold(1usize, |acc, &a| acc.saturating_mul(a));
    let max = sorted.first().copied().unwrap_or(1);
    let upper = (0..strength).fold(5usize, |acc, _| acc.saturating_mul(max));
    (lower, upper)
}

impl Generator for TabuSearch {
    fn name(&self) -> &'static str {
        "tabu"
    }

    fn supported_handlers(&self) -> &'static [HandlerKind] {
        &HandlerKind::ALL
    }

    fn process(
        &self,
        model: &mut CoverageModel,
        handler: &dyn ConstraintHandler,
        suite: &mut TestSuite,
        rng: &mut ChaCha8Rng,
    ) -> GenerationStatus {
        suite.clear();
        model.prune_invalid(|test| handler.is_valid(test));

        let (lower, upper) = size_bounds(model.arities(), model.strength());
        let baseline = model.snapshot();
        let constrained = model.spec().constrained_parameters();
        let mut search = InnerSearch {
            model: &mut *model,
            handler,
            rng: &mut *rng,
            config: &self.config,
            budget: Budget::new(self.config.limits.clone()),
            baseline: &baseline,
            constrained,
            rounds_used: 0,
        };

        let (mut found, mut stopped) = bracket_search(lower, upper, |n| search.run(n));
        if found.is_none() && stopped.is_none() {
            let upper = upper.saturating_mul(2);
            tracing::debug!(lower, upper, "retrying with a doubled upper bound");
            (found, stopped) = bracket_search(lower, upper, |n| search.run(n));
        }

        model.restore(&baseline);
        match found {
            Some(rows) => {
                for row in &rows {
                    model.mark_covered(row);
                }
                suite.rows = rows;
                GenerationStatus::Complete
            }
            None => {
                let reason = stopped.unwrap_or(StopReason::NoCoveringArray);
                tracing::warn!(model = model.name(), ?reason, "no covering array found");
                GenerationStatus::Exhausted { reason }
            }
        }
    }
}

/// A candidate single-cell change with its score components.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Move {
    row: usize,
    column: usize,
    value: usize,
    delta_uncovered: i64,
    delta_violation: i64,
}

/// Keeps the lowest-effect moves seen so far.
struct BestMoves {
    moves: Vec<Move>,
    effect: f64,
}

impl BestMoves {
    /// `ceiling` is the worst effect still accepted.
    fn new(ceiling: Option<f64>) -> Self {
        Self {
            moves: Vec::new(),
            effect: ceiling.unwrap_or(f64::INFINITY),
        }
    }

    fn offer(&mut self, mv: Move, effect: f64) {
        if effect < self.effect {
            self.moves.clear();
            self.effect = effect;
        }
        if effect <= self.effect {
            self.moves.push(mv);
        }
    }

    fn pick(self, rng: &mut ChaCha8Rng) -> Option<Move> {
        self.moves.choose(rng).copied()
    }
}

struct InnerSearch<'a> {
    model: &'a mut CoverageModel,
    handler: &'a dyn ConstraintHandler,
    rng: &'a mut ChaCha8Rng,
    config: &'a TabuConfig,
    budget: Budget,
    baseline: &'a CoverageSnapshot,
    constrained: BTreeSet<usize>,
    rounds_used: u64,
}

impl InnerSearch<'_> {
    /// Try to evolve a covering array of `n` rows.
    fn run(&mut self, n: usize) -> Attempt<Vec<TestCase>> {
        if let Some(reason) = self.budget.check(self.rounds_used) {
            return Attempt::Stopped(reason);
        }
        self.model.restore(self.baseline);

        let max_arity = self.model.arities().iter().copied().max().unwrap_or(1);
        let mut tabu = TabuList::new(self.config.tabu_length(n, self.model.parameters(), max_arity));

        let mut rows: Vec<TestCase> = Vec::with_capacity(n);
        for _ in 0..n {
            let row = self.max_hamming_row(&rows);
            self.model.mark_covered(&row);
            rows.push(row);
        }

        let mut uncovered = self.model.uncovered() as i64;
        let mut violation = self.handler.suite_penalty(&rows) as i64;
        tracing::debug!(n, uncovered, violation, tabu = tabu.capacity(), "inner search seeded");

        let mut round = 0;
        while uncovered > 0 || violation > 0 {
            if round >= self.config.rounds {
                tracing::debug!(n, uncovered, violation, "inner search ran out of rounds");
                return Attempt::Failed;
            }
            if let Some(reason) = self.budget.check(self.rounds_used) {
                return Attempt::Stopped(reason);
            }
            round += 1;
            self.rounds_used += 1;

            let Some(mv) = self.choose_move(&rows, &tabu, uncovered, violation) else {
                continue;
            };

            let mut candidate = rows[mv.row].clone();
            candidate[mv.column] = Some(mv.value);
            let delta = self.model.fitness_delta(&rows[mv.row], &candidate);
            if delta != mv.delta_uncovered {
                tracing::warn!(
                    expected = mv.delta_uncovered,
                    actual = delta,
                    "coverage delta differs from its evaluation"
                );
            }
            if let Some(previous) = rows[mv.row][mv.column] {
                tabu.record(mv.row, mv.column, previous);
            }
            rows[mv.row] = candidate;
            uncovered += delta;
            violation += mv.delta_violation;
        }

        tracing::debug!(n, round, "inner search found a covering array");
        Attempt::Found(rows)
    }

    fn choose_move(&mut self, rows: &[TestCase], tabu: &TabuList, uncovered: i64, violation: i64) -> Option<Move> {
        if violation > 0 {
            let violated = self.model.covered_constraints(rows);
            if let Some((tuple, row)) = violated.choose(&mut *self.rng) {
                return self.repair_move(rows, tabu, *row, &tuple.positions, &tuple.schema);
            }
        }

        if uncovered > 0 {
            let Some(tuple) = self.model.sample_uncovered_tuple(&mut *self.rng) else {
                tracing::warn!(uncovered, "uncovered count set but no uncovered combination found");
                return None;
            };
            match self.cover_move(rows, tabu, &tuple.positions, &tuple.schema) {
                Some(mv) if mv.delta_uncovered != 0 => Some(mv),
                _ => self.random_move(rows, tabu),
            }
        } else {
            self.random_move(rows, tabu)
        }
    }

    /// Best change of one cell of `row` away from a violated constraint.
    fn repair_move(
        &mut self,
        rows: &[TestCase],
        tabu: &TabuList,
        row: usize,
        positions: &[usize],
        schema: &[usize],
    ) -> Option<Move> {
        let mut best = BestMoves::new(None);
        for (&column, &current) in positions.iter().zip(schema) {
            for value in 0..self.model.arities()[column] {
                if value == current {
                    continue;
                }
                if let Some((mv, effect)) = self.evaluate(rows, tabu, row, column, value) {
                    best.offer(mv, effect);
                }
            }
        }
        best.pick(&mut *self.rng)
    }

    /// Best row that covers the combination by changing a single cell.
    fn cover_move(
        &mut self,
        rows: &[TestCase],
        tabu: &TabuList,
        positions: &[usize],
        schema: &[usize],
    ) -> Option<Move> {
        let mut best = BestMoves::new(None);
        for (row, test) in rows.iter().enumerate() {
            let mut differing = positions
                .iter()
                .zip(schema)
                .filter(|&(&p, &v)| test[p] != Some(v));
            let (Some((&column, &value)), None) = (differing.next(), differing.next()) else {
                continue;
            };
            if let Some((mv, effect)) = self.evaluate(rows, tabu, row, column, value) {
                best.offer(mv, effect);
            }
        }
        best.pick(&mut *self.rng)
    }

    /// Best of a few random moves that do not make things worse.
    fn random_move(&mut self, rows: &[TestCase], tabu: &TabuList) -> Option<Move> {
        let mut best = BestMoves::new(Some(0.0));
        for _ in 0..self.config.random_moves {
            let row = self.rng.gen_range(0..rows.len());
            let column = self.rng.gen_range(0..self.model.parameters());
            let value = self.rng.gen_range(0..self.model.arities()[column]);
            if rows[row][column] == Some(value) {
                continue;
            }
            if let Some((mv, effect)) = self.evaluate(rows, tabu, row, column, value) {
                best.offer(mv, effect);
            }
        }
        best.pick(&mut *self.rng)
    }

    /// Score `rows[row][column] = value`, or `None` if the handler rejects
    /// the new row or the move is tabu.
    fn evaluate(
        &self,
        rows: &[TestCase],
        tabu: &TabuList,
        row: usize,
        column: usize,
        value: usize,
    ) -> Option<(Move, f64)> {
        let mut candidate = rows[row].clone();
        candidate[column] = Some(value);
        if !self.handler.is_valid(&candidate) || tabu.is_tabu(rows, row, column, value) {
            return None;
        }
        let delta_uncovered = self.model.fitness_delta_eval(&rows[row], &candidate);
        let delta_violation =
            self.handler.penalty_term(&candidate) as i64 - self.handler.penalty_term(&rows[row]) as i64;
        let effect = delta_uncovered as f64 + self.config.weight * delta_violation as f64;
        Some((
            Move {
                row,
                column,
                value,
                delta_uncovered,
                delta_violation,
            },
            effect,
        ))
    }

    /// A random row, as far in Hamming distance from the existing rows as
    /// the sampled candidates allow.
    fn max_hamming_row(&mut self, rows: &[TestCase]) -> TestCase {
        let first = self.sample_row();
        if rows.is_empty() {
            return first;
        }

        let mut best = first;
        let mut best_distance = min_distance(rows, &best);
        for _ in 1..self.config.seed_candidates {
            let candidate = self.sample_row();
            let distance = min_distance(rows, &candidate);
            if distance > best_distance {
                best = candidate;
                best_distance = distance;
            }
        }
        best
    }

    /// A random row; constrained parameters only take values the handler
    /// accepts given the earlier positions, when such a value exists.
    fn sample_row(&mut self) -> TestCase {
        let parameters = self.model.parameters();
        let mut test: TestCase = vec![None; parameters];
        for p in 0..parameters {
            let arity = self.model.arities()[p];
            if !self.constrained.contains(&p) {
                test[p] = Some(self.rng.gen_range(0..arity));
                continue;
            }
            let mut values: Vec<usize> = (0..arity).collect();
            values.shuffle(&mut *self.rng);
            let pick = values
                .iter()
                .copied()
                .find(|&v| {
                    test[p] = Some(v);
                    self.handler.is_valid(&test)
                })
                .unwrap_or(values[0]);
            test[p] = Some(pick);
        }
        test
    }
}

fn min_distance(rows: &[TestCase], candidate: &[Option<usize>]) -> usize {
    rows.iter()
        .map(|row| row.iter().zip(candidate).filter(|(a, b)| a != b).count())
        .min()
        .unwrap_or(0)
}

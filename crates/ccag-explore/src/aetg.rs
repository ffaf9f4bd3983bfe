//! Greedy one-test-at-a-time construction (AETG).
//!
//! Each new row starts from a random uncovered combination. The remaining
//! parameters are fixed one by one in random order, each to the value that
//! completes the most uncovered combinations with the parameters fixed so
//! far. Of several such candidate rows the one covering the most is kept.
//!
//! Invalid combinations are discovered lazily: a sampled combination the
//! handler rejects is marked invalid in the model and another is drawn.

use ccag_handler::{ConstraintHandler, HandlerKind};
use ccag_model::combinatorial::all_subsets;
use ccag_model::{CellState, CoverageModel, TestCase, TestSuite, Tuple};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::generator::{GenerationStatus, Generator};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AetgConfig {
    /// Candidate rows built per committed row.
    pub candidates: usize,
    /// Attempts to complete a seed combination before it is given up as
    /// invalid.
    pub completion_attempts: usize,
}

impl Default for AetgConfig {
    fn default() -> Self {
        Self {
            candidates: 50,
            completion_attempts: 10,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Aetg {
    config: AetgConfig,
}

impl Aetg {
    pub fn new(config: AetgConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AetgConfig {
        &self.config
    }
}

impl Generator for Aetg {
    fn name(&self) -> &'static str {
        "aetg"
    }

    fn supported_handlers(&self) -> &'static [HandlerKind] {
        &[HandlerKind::Verify, HandlerKind::Solver, HandlerKind::Replace]
    }

    fn process(
        &self,
        model: &mut CoverageModel,
        handler: &dyn ConstraintHandler,
        suite: &mut TestSuite,
        rng: &mut ChaCha8Rng,
    ) -> GenerationStatus {
        suite.clear();
        let mut builder = RowBuilder {
            model: &mut *model,
            handler,
            rng: &mut *rng,
            config: &self.config,
        };

        while builder.model.uncovered() != 0 {
            let Some(test) = builder.next_best_test_case() else {
                break;
            };
            builder.model.mark_covered(&test);
            suite.push(test);
        }

        tracing::debug!(
            size = suite.len(),
            valid = model.space_total(),
            "greedy construction finished"
        );
        GenerationStatus::Complete
    }
}

struct RowBuilder<'a> {
    model: &'a mut CoverageModel,
    handler: &'a dyn ConstraintHandler,
    rng: &'a mut ChaCha8Rng,
    config: &'a AetgConfig,
}

impl RowBuilder<'_> {
    /// The best of several candidate rows, or `None` once nothing valid is
    /// left to cover.
    fn next_best_test_case(&mut self) -> Option<TestCase> {
        let most = self.model.subsets().len() as u64;
        let mut best: Option<TestCase> = None;
        let mut best_score = 0;
        let mut ties = 0u32;

        for _ in 0..self.config.candidates.max(1) {
            let Some(candidate) = self.next_test_case() else {
                break;
            };
            let score = self.model.uncovered_count(&candidate);
            if best.is_none() || score > best_score {
                best = Some(candidate);
                best_score = score;
                ties = 1;
            } else if score == best_score {
                ties += 1;
                if self.rng.gen_range(0..ties) == 0 {
                    best = Some(candidate);
                }
            }
            if best_score == most {
                break;
            }
        }
        best
    }

    fn next_test_case(&mut self) -> Option<TestCase> {
        loop {
            let seed = self.sample_valid_tuple()?;
            for _ in 0..self.config.completion_attempts.max(1) {
                if let Some(test) = self.complete(&seed.test) {
                    return Some(test);
                }
            }
            tracing::warn!(
                positions = ?seed.positions,
                schema = ?seed.schema,
                "no valid completion found for combination, marking it invalid"
            );
            self.model.set_invalid(&seed.positions, &seed.schema);
        }
    }

    /// A random uncovered combination the handler accepts. Rejected ones are
    /// marked invalid on the way.
    fn sample_valid_tuple(&mut self) -> Option<Tuple> {
        loop {
            let tuple = self.model.sample_uncovered_tuple(&mut *self.rng)?;
            if self.handler.is_valid(&tuple.test) {
                return Some(tuple);
            }
            tracing::debug!(
                positions = ?tuple.positions,
                schema = ?tuple.schema,
                "lazily discovered invalid combination"
            );
            self.model.set_invalid(&tuple.positions, &tuple.schema);
        }
    }

    /// Fix every free position of `seed` greedily, in random order.
    fn complete(&mut self, seed: &[Option<usize>]) -> Option<TestCase> {
        let mut test = seed.to_vec();
        let mut free: Vec<usize> = (0..test.len()).filter(|&p| test[p].is_none()).collect();
        free.shuffle(&mut *self.rng);

        for par in free {
            let value = self.select_best_value(&mut test, par)?;
            test[par] = Some(value);
        }
        Some(test)
    }

    /// Value of `par` completing the most uncovered combinations with the
    /// already fixed positions, ties broken at random. `None` if the handler
    /// rejects every value.
    fn select_best_value(&mut self, test: &mut TestCase, par: usize) -> Option<usize> {
        let fixed: Vec<usize> = (0..test.len())
            .filter(|&p| p != par && test[p].is_some())
            .collect();
        let partners = all_subsets(fixed.len(), self.model.strength() - 1);

        let mut best = Vec::new();
        let mut best_score = 0;
        for value in 0..self.model.arities()[par] {
            test[par] = Some(value);
            if !self.handler.is_valid(test.as_slice()) {
                continue;
            }
            let score = newly_covered(self.model, test, &fixed, &partners, par);
            if best.is_empty() || score > best_score {
                best.clear();
                best_score = score;
            }
            if score == best_score {
                best.push(value);
            }
        }
        test[par] = None;
        best.choose(&mut *self.rng).copied()
    }
}

/// Uncovered `t`-way combinations made of `par` plus `t - 1` positions from
/// `fixed`. Only these can change when `par` is assigned.
fn newly_covered(
    model: &CoverageModel,
    test: &[Option<usize>],
    fixed: &[usize],
    partners: &[Vec<usize>],
    par: usize,
) -> usize {
    let mut positions = Vec::with_capacity(model.strength());
    let mut values = Vec::with_capacity(model.strength());
    let mut count = 0;

    for combo in partners {
        positions.clear();
        positions.extend(combo.iter().map(|&i| fixed[i]));
        positions.push(par);
        positions.sort_unstable();

        values.clear();
        values.extend(positions.iter().map(|&p| test[p].unwrap_or_default()));

        if model.coverage_state(&positions, &values) == CellState::Uncovered {
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccag_handler::VerifyHandler;
    use ccag_model::TestModel;
    use rand::SeedableRng;

    fn model(arities: Vec<usize>, t: usize) -> CoverageModel {
        let mut model = CoverageModel::new(TestModel::new("m", t, arities)).unwrap();
        model.initialize().unwrap();
        model
    }

    #[test]
    fn test_newly_covered_counts_only_partner_combinations() {
        let mut model = model(vec![2, 2, 2], 2);
        model.mark_covered(&[Some(0), Some(0), Some(1)]);
        let test = [Some(0), Some(1), Some(1)];
        let fixed = [0, 2];
        let partners = all_subsets(2, 1);
        // (p0, p1) = (0, 1) is uncovered, (p1, p2) = (1, 1) is uncovered.
        assert_eq!(newly_covered(&model, &test, &fixed, &partners, 1), 2);
        let test = [Some(0), Some(0), Some(1)];
        assert_eq!(newly_covered(&model, &test, &fixed, &partners, 1), 0);
    }

    #[test]
    fn test_select_best_value_prefers_uncovered() {
        let mut model = model(vec![2, 2], 2);
        model.mark_covered(&[Some(0), Some(0)]);
        let handler = VerifyHandler::new();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let config = AetgConfig::default();
        let mut builder = RowBuilder {
            model: &mut model,
            handler: &handler,
            rng: &mut rng,
            config: &config,
        };
        let mut test = vec![Some(0), None];
        for _ in 0..20 {
            assert_eq!(builder.select_best_value(&mut test, 1), Some(1));
            assert_eq!(test[1], None);
        }
    }

    #[test]
    fn test_invalid_combinations_are_discovered_during_construction() {
        let spec = TestModel::new("forbid-00", 2, vec![2, 2, 2])
            .with_constraints(vec![ccag_model::Clause(vec![-1, -3])]);
        let mut model = CoverageModel::new(spec).unwrap();
        model.initialize().unwrap();
        let mut handler = VerifyHandler::new();
        handler.pre(&mut model).unwrap();
        assert_eq!(model.space_total(), 12);

        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut suite = TestSuite::new();
        let status = Aetg::default().process(&mut model, &handler, &mut suite, &mut rng);

        assert!(status.is_complete());
        assert_eq!(model.space_total(), 11);
        assert_eq!(model.coverage_state(&[0, 1], &[0, 0]), CellState::Invalid);
        assert_eq!(model.uncovered(), 0);
        assert!(suite.iter().all(|row| handler.is_valid(row)));
        model.audit().unwrap();
    }

    #[test]
    fn test_strength_one_covers_every_value() {
        let mut model = model(vec![3, 2, 4], 1);
        let handler = VerifyHandler::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut suite = TestSuite::new();
        let status = Aetg::default().process(&mut model, &handler, &mut suite, &mut rng);
        assert!(status.is_complete());
        assert_eq!(model.uncovered(), 0);
        assert_eq!(suite.len(), 4);
    }
}

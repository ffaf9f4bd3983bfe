//! Repair-after-generation constraint handling.
//!
//! Generation runs unconstrained. `post` then rebuilds coverage against the
//! verified model, drops every invalid row, and replaces it with new rows
//! that cover the combinations only the dropped rows covered:
//!
//! 1. collect each such combination as a partial test case,
//! 2. merge each into the compatible partial row it overlaps most (the
//!    merged row must stay valid), or start a new partial row,
//! 3. fill the remaining positions at random with accepted values.

use ccag_model::{CellState, CoverageModel, TestCase, TestSuite, Tuple};
use rand_chacha::ChaCha8Rng;

use crate::verify::VerifyHandler;
use crate::{ConstraintHandler, HandlerError, HandlerKind};

#[derive(Debug, Clone, Default)]
pub struct ReplaceHandler;

impl ReplaceHandler {
    pub fn new() -> Self {
        Self
    }
}

impl ConstraintHandler for ReplaceHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Replace
    }

    fn pre(&mut self, _model: &mut CoverageModel) -> Result<(), HandlerError> {
        Ok(())
    }

    fn post(
        &mut self,
        model: &mut CoverageModel,
        suite: &mut TestSuite,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), HandlerError> {
        let mut verify = VerifyHandler::new();
        verify.pre(model)?;

        model.initialize()?;
        model.prune_invalid(|test| verify.is_valid(test));
        for row in suite.iter() {
            model.mark_covered(row);
        }

        let mut kept = Vec::with_capacity(suite.len());
        let mut orphaned: Vec<TestCase> = Vec::new();
        let mut dropped = 0usize;

        for test in std::mem::take(&mut suite.rows) {
            if verify.is_valid(&test) {
                kept.push(test);
                continue;
            }
            dropped += 1;
            for row in 0..model.subsets().len() {
                let Some(col) = model.column_in_test(row, &test) else {
                    continue;
                };
                match model.cell_state(row, col) {
                    CellState::Covered(count) => {
                        if count == 1 {
                            orphaned.push(Tuple::extract(&test, &model.subsets()[row]).test);
                        }
                        model.decrement_cell(row, col);
                    }
                    CellState::Uncovered => {
                        tracing::warn!(row, col, "input suite is not a covering array");
                    }
                    CellState::Invalid => {}
                }
            }
        }

        let merged = merge_tuples(orphaned, &verify);
        tracing::debug!(
            dropped,
            replacements = merged.len(),
            "replaced invalid test cases"
        );

        let appended = kept.len();
        kept.extend(merged);
        suite.rows = kept;
        suite.assign_unfixed_values(model.arities(), |test| verify.is_valid(test), rng);
        for row in &suite.rows[appended..] {
            model.mark_covered(row);
        }
        Ok(())
    }

    fn is_valid(&self, _test: &[Option<usize>]) -> bool {
        true
    }

    fn penalty_term(&self, _test: &[Option<usize>]) -> u64 {
        0
    }
}

/// Greedily pack partial test cases into as few rows as possible.
fn merge_tuples(tuples: Vec<TestCase>, verify: &VerifyHandler) -> Vec<TestCase> {
    let mut rows: Vec<TestCase> = Vec::new();
    for tuple in tuples {
        let best = rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| overlap(row, &tuple, verify).map(|m| (i, m)))
            .fold(None, |best: Option<(usize, usize)>, (i, m)| match best {
                Some((_, bm)) if bm >= m => best,
                _ => Some((i, m)),
            });
        match best {
            Some((i, _)) => {
                for (slot, value) in rows[i].iter_mut().zip(&tuple) {
                    if slot.is_none() {
                        *slot = *value;
                    }
                }
            }
            None => rows.push(tuple),
        }
    }
    rows
}

/// Number of positions fixed to the same value in both, or `None` if they
/// conflict or their union is invalid.
fn overlap(a: &[Option<usize>], b: &[Option<usize>], verify: &VerifyHandler) -> Option<usize> {
    let mut union = Vec::with_capacity(a.len());
    let mut shared = 0;
    for (&x, &y) in a.iter().zip(b) {
        match (x, y) {
            (Some(x), Some(y)) if x != y => return None,
            (Some(x), Some(_)) => {
                shared += 1;
                union.push(Some(x));
            }
            (x, y) => union.push(x.or(y)),
        }
    }
    verify.is_valid(&union).then_some(shared)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefers_largest_overlap() {
        let verify = VerifyHandler::new();
        let rows = merge_tuples(
            vec![
                vec![Some(0), Some(1), None, None],
                vec![Some(1), None, Some(0), None],
                vec![Some(0), None, None, Some(1)],
                vec![Some(1), None, Some(0), Some(0)],
            ],
            &verify,
        );
        assert_eq!(
            rows,
            vec![
                vec![Some(0), Some(1), None, Some(1)],
                vec![Some(1), None, Some(0), Some(0)],
            ]
        );
    }

    #[test]
    fn test_overlap_rejects_conflicts() {
        let verify = VerifyHandler::new();
        assert_eq!(overlap(&[Some(0), None], &[Some(1), None], &verify), None);
        assert_eq!(overlap(&[Some(0), None], &[Some(0), Some(1)], &verify), Some(1));
        assert_eq!(overlap(&[None, None], &[Some(0), Some(1)], &verify), Some(0));
    }
}

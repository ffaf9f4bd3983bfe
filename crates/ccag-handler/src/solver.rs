use ccag_model::CoverageModel;

use crate::sat::SatOracle;
use crate::{ConstraintHandler, HandlerError, HandlerKind};

/// Hard constraints checked by a SAT solver.
///
/// A solver error during `is_valid` is logged and treated as invalid.
#[derive(Default)]
pub struct SolverHandler {
    oracle: Option<SatOracle>,
}

impl SolverHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConstraintHandler for SolverHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Solver
    }

    fn pre(&mut self, model: &mut CoverageModel) -> Result<(), HandlerError> {
        self.oracle = Some(SatOracle::new(model.spec())?);
        Ok(())
    }

    fn is_valid(&self, test: &[Option<usize>]) -> bool {
        let Some(oracle) = &self.oracle else {
            return true;
        };
        match oracle.check(test) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!(error = %e, "SAT query failed, treating test case as invalid");
                false
            }
        }
    }

    fn penalty_term(&self, _test: &[Option<usize>]) -> u64 {
        0
    }
}

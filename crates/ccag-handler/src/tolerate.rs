use ccag_model::CoverageModel;

use crate::mft::ForbiddenTuples;
use crate::{ConstraintHandler, HandlerError, HandlerKind};

/// Soft constraints: any test case is accepted, and the number of forbidden
/// tuples it contains is reported as a penalty.
///
/// `is_valid` cannot reject anything here, so `pre` marks every invalid
/// combination in the model up front.
#[derive(Debug, Clone, Default)]
pub struct TolerateHandler {
    forbidden: ForbiddenTuples,
}

impl TolerateHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConstraintHandler for TolerateHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Tolerate
    }

    fn pre(&mut self, model: &mut CoverageModel) -> Result<(), HandlerError> {
        model.ensure_initialized()?;
        self.forbidden = ForbiddenTuples::derive(model.spec())?;
        let forbidden = &self.forbidden;
        model.prune_invalid(|test| forbidden.satisfied(test));
        tracing::debug!(
            model = model.name(),
            forbidden = forbidden.len(),
            pruned = model.space_raw() - model.space_total(),
            "marked invalid combinations"
        );
        Ok(())
    }

    fn is_valid(&self, _test: &[Option<usize>]) -> bool {
        true
    }

    fn penalty_term(&self, test: &[Option<usize>]) -> u64 {
        self.forbidden.violations(test)
    }
}

use ccag_model::CoverageModel;

use crate::mft::ForbiddenTuples;
use crate::{ConstraintHandler, HandlerError, HandlerKind};

/// Hard constraints checked against precomputed minimal forbidden tuples.
#[derive(Debug, Clone, Default)]
pub struct VerifyHandler {
    forbidden: ForbiddenTuples,
}

impl VerifyHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forbidden(&self) -> &ForbiddenTuples {
        &self.forbidden
    }
}

impl ConstraintHandler for VerifyHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Verify
    }

    fn pre(&mut self, model: &mut CoverageModel) -> Result<(), HandlerError> {
        self.forbidden = ForbiddenTuples::derive(model.spec())?;
        tracing::debug!(
            model = model.name(),
            forbidden = self.forbidden.len(),
            "derived minimal forbidden tuples"
        );
        Ok(())
    }

    fn is_valid(&self, test: &[Option<usize>]) -> bool {
        self.forbidden.satisfied(test)
    }

    fn penalty_term(&self, _test: &[Option<usize>]) -> u64 {
        0
    }
}

//! Constraint handling for covering-array generation.
//!
//! A [`ConstraintHandler`] answers two questions for the generators: is a
//! partial test case still completable to a valid one, and how badly does a
//! test case violate the constraints. The four strategies differ in when
//! they do the work:
//!
//! | handler    | `pre`                         | `is_valid`        | `post`            |
//! |------------|-------------------------------|-------------------|-------------------|
//! | `Verify`   | derive forbidden tuples       | no forbidden tuple| -                 |
//! | `Solver`   | encode the model for SAT      | SAT query         | -                 |
//! | `Tolerate` | derive tuples, prune the model| always `true`     | -                 |
//! | `Replace`  | -                             | always `true`     | repair the suite  |

pub mod error;
pub mod mft;
pub mod replace;
pub mod sat;
pub mod solver;
pub mod tolerate;
pub mod verify;

use std::fmt;
use std::str::FromStr;

use ccag_model::{CoverageModel, TestCase, TestSuite};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

pub use error::HandlerError;
pub use mft::ForbiddenTuples;
pub use replace::ReplaceHandler;
pub use sat::SatOracle;
pub use solver::SolverHandler;
pub use tolerate::TolerateHandler;
pub use verify::VerifyHandler;

/// Pluggable validity oracle consulted by every generator.
pub trait ConstraintHandler {
    fn kind(&self) -> HandlerKind;

    /// One-time setup before generation. May prune the model.
    fn pre(&mut self, model: &mut CoverageModel) -> Result<(), HandlerError>;

    /// Cleanup or repair of the finished suite.
    fn post(
        &mut self,
        _model: &mut CoverageModel,
        _suite: &mut TestSuite,
        _rng: &mut ChaCha8Rng,
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Whether `test` (unassigned positions are `None`) can still be valid.
    fn is_valid(&self, test: &[Option<usize>]) -> bool;

    /// Soft-constraint violation count; 0 for hard-constraint handlers.
    fn penalty_term(&self, test: &[Option<usize>]) -> u64;

    fn suite_is_valid(&self, rows: &[TestCase]) -> bool {
        rows.iter().all(|row| self.is_valid(row))
    }

    fn suite_penalty(&self, rows: &[TestCase]) -> u64 {
        rows.iter().map(|row| self.penalty_term(row)).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    Verify,
    Solver,
    Replace,
    Tolerate,
}

impl HandlerKind {
    pub const ALL: [HandlerKind; 4] = [
        HandlerKind::Verify,
        HandlerKind::Solver,
        HandlerKind::Replace,
        HandlerKind::Tolerate,
    ];

    /// A fresh handler of this kind; `pre` has not run yet.
    pub fn build(self) -> Box<dyn ConstraintHandler> {
        match self {
            HandlerKind::Verify => Box::new(VerifyHandler::new()),
            HandlerKind::Solver => Box::new(SolverHandler::new()),
            HandlerKind::Replace => Box::new(ReplaceHandler::new()),
            HandlerKind::Tolerate => Box::new(TolerateHandler::new()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HandlerKind::Verify => "verify",
            HandlerKind::Solver => "solver",
            HandlerKind::Replace => "replace",
            HandlerKind::Tolerate => "tolerate",
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandlerKind {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HandlerKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| HandlerError::UnknownHandler(s.to_string()))
    }
}

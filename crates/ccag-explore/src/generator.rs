//! The generator interface and the run driver.

use std::time::Instant;

use ccag_handler::{ConstraintHandler, HandlerError, HandlerKind};
use ccag_model::{CoverageModel, ModelError, TestModel, TestSuite};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::limits::StopReason;
use crate::rng::{seeded_rng, GENERATE_STREAM, POST_STREAM};

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("generator '{generator}' does not support the {handler} constraint handler")]
    UnsupportedHandler {
        generator: &'static str,
        handler: HandlerKind,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// Outcome of a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationStatus {
    /// The suite covers every valid combination.
    Complete,
    /// The search gave up; the suite may be empty or partial.
    Exhausted { reason: StopReason },
}

impl GenerationStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, GenerationStatus::Complete)
    }
}

/// Report of one [`generate`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub model: String,
    pub generator: String,
    pub handler: HandlerKind,
    pub suite: TestSuite,
    pub size: usize,
    pub elapsed_ms: u64,
    pub status: GenerationStatus,
}

/// A covering-array construction strategy.
///
/// `process` receives an initialized model that the handler's `pre` has
/// already seen, and fills `suite`. It owns the model exclusively for the
/// duration of the call.
pub trait Generator {
    fn name(&self) -> &'static str;

    fn supported_handlers(&self) -> &'static [HandlerKind];

    fn process(
        &self,
        model: &mut CoverageModel,
        handler: &dyn ConstraintHandler,
        suite: &mut TestSuite,
        rng: &mut ChaCha8Rng,
    ) -> GenerationStatus;

    fn supports(&self, kind: HandlerKind) -> bool {
        self.supported_handlers().contains(&kind)
    }
}

/// Run `generator` on `spec` under the given constraint handler.
///
/// Initializes the coverage model, runs the handler's `pre`, the generator,
/// then the handler's `post`. The same seed reproduces the same suite.
pub fn generate(
    generator: &dyn Generator,
    spec: TestModel,
    kind: HandlerKind,
    seed: u64,
) -> Result<Generation, GenerateError> {
    if !generator.supports(kind) {
        return Err(GenerateError::UnsupportedHandler {
            generator: generator.name(),
            handler: kind,
        });
    }

    let start = Instant::now();
    let name = spec.name.clone();

    let mut model = CoverageModel::new(spec)?;
    model.initialize()?;

    let mut handler = kind.build();
    handler.pre(&mut model)?;

    let mut suite = TestSuite::new();
    let mut rng = seeded_rng(seed, GENERATE_STREAM);
    let status = generator.process(&mut model, handler.as_ref(), &mut suite, &mut rng);

    let mut post_rng = seeded_rng(seed, POST_STREAM);
    handler.post(&mut model, &mut suite, &mut post_rng)?;

    let elapsed_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        model = %name,
        generator = generator.name(),
        handler = %kind,
        size = suite.len(),
        elapsed_ms,
        status = ?status,
        "generation finished"
    );

    Ok(Generation {
        model: name,
        generator: generator.name().to_string(),
        handler: kind,
        size: suite.len(),
        suite,
        elapsed_ms,
        status,
    })
}

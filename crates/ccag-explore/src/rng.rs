//! Deterministic RNG streams with ChaCha8.
//!
//! Every run takes one global seed. Each phase of the run draws from its
//! own stream seeded with `(seed + stream)`, so the same seed reproduces the
//! same suite regardless of how many numbers another phase consumed.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Stream used by the generator itself.
pub const GENERATE_STREAM: u64 = 0;
/// Stream used by the handler's post-processing.
pub const POST_STREAM: u64 = 1;

pub fn seeded_rng(seed: u64, stream: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed.wrapping_add(stream))
}

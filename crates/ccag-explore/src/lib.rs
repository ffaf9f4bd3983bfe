pub mod aetg;
pub mod generator;
pub mod limits;
pub mod rng;
pub mod tabu;

pub use aetg::{Aetg, AetgConfig};
pub use generator::{generate, GenerateError, Generation, GenerationStatus, Generator};
pub use limits::{Budget, SearchLimits, StopReason};
pub use tabu::{TabuConfig, TabuSearch};

//! Search budgets.
//!
//! Local search runs until it finds a covering array or a budget runs out.
//! Running out is a normal outcome: the caller gets whatever was found so
//! far together with the reason the search stopped.

use std::time::Instant;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchLimits {
    /// Maximum search rounds across all inner searches of one run.
    pub max_rounds: u64,
    /// Maximum wall-clock seconds for one run.
    pub max_wall_secs: u64,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_rounds: 50_000_000,
            max_wall_secs: 600,
        }
    }
}

/// Why a search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Every valid combination is covered.
    Complete,
    /// Every size in the search bracket failed.
    NoCoveringArray,
    /// Wall-clock limit exceeded.
    WallTimeExceeded,
    /// Round limit exceeded.
    RoundLimitExceeded,
}

/// Tracks a run's consumption against its [`SearchLimits`].
#[derive(Debug)]
pub struct Budget {
    limits: SearchLimits,
    start: Instant,
}

impl Budget {
    pub fn new(limits: SearchLimits) -> Self {
        Self {
            limits,
            start: Instant::now(),
        }
    }

    /// `None` while within budget, otherwise the limit that was hit.
    pub fn check(&self, rounds: u64) -> Option<StopReason> {
        if self.wall_time_exceeded() {
            return Some(StopReason::WallTimeExceeded);
        }
        if rounds >= self.limits.max_rounds {
            return Some(StopReason::RoundLimitExceeded);
        }
        None
    }

    pub fn wall_time_exceeded(&self) -> bool {
        self.start.elapsed().as_secs() >= self.limits.max_wall_secs
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub fn limits(&self) -> &SearchLimits {
        &self.limits
    }
}

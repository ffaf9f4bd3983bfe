/// Errors raised while building or checking a coverage model.
///
/// All of these indicate a malformed model or a capacity limit; none of
/// them is recovered from inside a generation run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("model has no parameters")]
    EmptyParameters,

    #[error("parameter {parameter} has no values")]
    ZeroArity { parameter: usize },

    #[error("interaction strength {strength} is out of range for {parameters} parameters")]
    StrengthOutOfRange { strength: usize, parameters: usize },

    #[error("capacity exceeded while computing {what}")]
    CapacityExceeded { what: String },

    #[error("literal {literal} does not name a parameter value")]
    LiteralOutOfRange { literal: i64 },

    #[error("coverage model has not been initialized")]
    NotInitialized,

    #[error(
        "coverage counters drifted: zero_count={zero_count} (actual {actual_zeros}), \
         space_total={space_total} (actual {actual_valid})"
    )]
    CounterDrift {
        zero_count: u64,
        actual_zeros: u64,
        space_total: u64,
        actual_valid: u64,
    },
}

impl ModelError {
    pub(crate) fn capacity(what: impl Into<String>) -> Self {
        ModelError::CapacityExceeded { what: what.into() }
    }
}

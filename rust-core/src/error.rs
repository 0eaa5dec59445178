use thiserror::Error;

use crate::interfaces::PhaseId;

/// Fatal domain errors raised while validating synthesis input.
///
/// Numerical degeneracies are handled locally by the routines that meet them, and optimizers
/// that exhaust their budgets report through their returned reports instead of failing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SynthesisError {
    #[error("phase {phase}: `{field}` has {found} entries, expected {expected}")]
    ArrayLengthMismatch {
        phase: PhaseId,
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("phase {phase}: required distribution table `{field}` is empty")]
    MissingTable { phase: PhaseId, field: &'static str },

    #[error("phase {phase}: Beta coefficients in `{field}` row {row} must be positive and finite (got {alpha}, {beta})")]
    BadBetaCoefficients {
        phase: PhaseId,
        field: &'static str,
        row: usize,
        alpha: f64,
        beta: f64,
    },

    #[error("phase {phase}: probability array `{field}` sums to {sum}, expected 1")]
    NotNormalized {
        phase: PhaseId,
        field: &'static str,
        sum: f64,
    },

    #[error("phase {phase}: `{field}` holds a negative or non-finite entry at index {index}")]
    InvalidProbability {
        phase: PhaseId,
        field: &'static str,
        index: usize,
    },

    #[error("phase {phase}: invalid size distribution `{field}`: {reason}")]
    InvalidSizeDistribution {
        phase: PhaseId,
        field: &'static str,
        reason: String,
    },

    #[error("phase {phase}: `{field}` = {value} is outside [0, 1]")]
    InvalidFraction {
        phase: PhaseId,
        field: &'static str,
        value: f64,
    },

    #[error("statistics contain no primary phase with a positive phase fraction")]
    NoPrimaryPhase,

    #[error("invalid geometry `{field}`: {reason}")]
    InvalidGeometry { field: &'static str, reason: String },
}

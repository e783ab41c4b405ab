//! Fatal run errors.

use platecalc_core::plan::PlanError;

use crate::interfaces::{ResolveError, StoreError};

/// Errors that abort a calculation run before it reaches a terminal report.
#[derive(Debug, thiserror::Error)]
pub enum CalcError {
    /// A plate, measurement, protocol or formula category could not be resolved.
    #[error("unresolvable input: {0}")]
    Unresolvable(#[from] ResolveError),

    /// The protocol does not form a valid execution plan.
    #[error("invalid protocol: {0}")]
    InvalidProtocol(#[from] PlanError),

    /// The measurement was taken on a different plate.
    #[error("measurement `{measurement}` belongs to plate `{actual}`, not `{expected}`")]
    PlateMismatch {
        measurement: String,
        expected: String,
        actual: String,
    },

    /// The plate's well list does not match its dimensions.
    #[error("plate `{0}` has an inconsistent well layout")]
    InconsistentPlate(String),

    /// The result store rejected a write or stayed unreachable.
    #[error("result persistence failed: {0}")]
    Persistence(#[from] StoreError),

    /// The engine could not be configured.
    #[error("configuration error: {0}")]
    Config(String),
}

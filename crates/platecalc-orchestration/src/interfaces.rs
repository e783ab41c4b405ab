//! Orchestration interfaces: the collaborator contracts the engine consumes
//! and the presentation contract it is consumed through.

use std::fmt;
use std::time::Duration;

use platecalc_core::formula::Formula;
use platecalc_core::model::{Measurement, Plate, Protocol, WellValues};
use platecalc_core::plan::ExecutionPlan;
use platecalc_core::status::{FeatureStatus, Outcome};

use crate::report::RunReport;
use crate::store::{FeatureResult, ResultDataset};

/// Identifier of a result dataset.
pub type DatasetId = u64;

/// Kind of external entity a resolver call was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Plate,
    Protocol,
    Measurement,
    WellData,
    Formulas,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Plate => "plate",
            Self::Protocol => "protocol",
            Self::Measurement => "measurement",
            Self::WellData => "well data",
            Self::Formulas => "formula category",
        };
        f.write_str(s)
    }
}

/// Failure to turn an external identifier into data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The identifier does not exist upstream. Never retried.
    #[error("{entity} `{id}` not found")]
    NotFound { entity: Entity, id: String },

    /// The upstream service could not be reached.
    #[error("{entity} `{id}` unavailable: {reason}")]
    Unavailable {
        entity: Entity,
        id: String,
        reason: String,
    },

    /// The call did not complete within its timeout.
    #[error("{entity} `{id}` timed out after {after:?}")]
    Timeout {
        entity: Entity,
        id: String,
        after: Duration,
    },
}

impl ResolveError {
    /// Permanent failure: the identifier is genuinely absent.
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Transient failure: the upstream call could not complete.
    pub fn unavailable(entity: Entity, id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            entity,
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Entity the failed call was about.
    #[must_use]
    pub fn entity(&self) -> Entity {
        match self {
            Self::NotFound { entity, .. }
            | Self::Unavailable { entity, .. }
            | Self::Timeout { entity, .. } => *entity,
        }
    }
}

/// Errors raised by a result store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("result dataset {0} does not exist")]
    UnknownDataset(DatasetId),

    #[error("result dataset {0} is already finished")]
    AlreadyFinished(DatasetId),

    #[error("feature `{feature}` is already recorded in result dataset {dataset}")]
    DuplicateFeature { dataset: DatasetId, feature: String },

    #[error("feature `{feature}` is not recorded in result dataset {dataset}")]
    NotRecorded { dataset: DatasetId, feature: String },

    /// Transient: the store could not be reached.
    #[error("result store unavailable: {0}")]
    Unavailable(String),
}

/// Errors that may succeed when the same call is repeated.
pub trait Retryable {
    /// Whether retrying the failed call may succeed.
    fn is_transient(&self) -> bool;
}

impl Retryable for ResolveError {
    fn is_transient(&self) -> bool {
        !matches!(self, Self::NotFound { .. })
    }
}

impl Retryable for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Resolves plate layouts.
pub trait PlateResolver: Send + Sync {
    fn plate(&self, plate_id: &str) -> Result<Plate, ResolveError>;
}

/// Resolves protocols.
pub trait ProtocolResolver: Send + Sync {
    fn protocol(&self, protocol_id: &str) -> Result<Protocol, ResolveError>;
}

/// Resolves measurements and their well data.
pub trait MeasurementResolver: Send + Sync {
    fn measurement(&self, measurement_id: &str) -> Result<Measurement, ResolveError>;

    /// One value per well, in the plate's row-major well order.
    fn well_data(&self, measurement_id: &str, column: &str) -> Result<Vec<f64>, ResolveError>;
}

/// Formula lookup by category.
pub trait FormulaCatalog: Send + Sync {
    /// Formulas of `category`, in catalog order. Unknown categories are empty.
    fn formulas_by_category(&self, category: &str) -> Result<Vec<Formula>, ResolveError>;
}

/// Result dataset persistence.
pub trait ResultStore: Send + Sync {
    /// Create a dataset in state CREATED.
    fn create(
        &self,
        protocol_id: &str,
        plate_id: &str,
        measurement_id: &str,
    ) -> Result<DatasetId, StoreError>;

    /// Record a feature exactly once, before the dataset is finished.
    fn add_result(
        &self,
        dataset: DatasetId,
        feature_id: &str,
        values: Option<WellValues>,
        status: FeatureStatus,
    ) -> Result<(), StoreError>;

    /// Finalize the dataset. Allowed exactly once.
    fn finish(&self, dataset: DatasetId, outcome: Outcome) -> Result<(), StoreError>;

    /// Read back one recorded feature.
    fn get_result(&self, dataset: DatasetId, feature_id: &str) -> Result<FeatureResult, StoreError>;

    /// Snapshot of the whole dataset.
    fn dataset(&self, dataset: DatasetId) -> Result<ResultDataset, StoreError>;
}

/// Trait for presenting run results to the user.
pub trait ResultPresenter: Send + Sync {
    /// Present a finished run.
    fn present_report(&self, report: &RunReport);

    /// Present a validated execution plan.
    fn present_plan(&self, plan: &ExecutionPlan);

    /// Present an error.
    fn present_error(&self, error: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_permanent() {
        let err = ResolveError::not_found(Entity::Protocol, "PR-404");
        assert!(!err.is_transient());
        assert_eq!(err.entity(), Entity::Protocol);
        assert_eq!(err.to_string(), "protocol `PR-404` not found");
    }

    #[test]
    fn unavailable_and_timeout_are_transient() {
        assert!(ResolveError::unavailable(Entity::Plate, "P1", "connection reset").is_transient());
        let err = ResolveError::Timeout {
            entity: Entity::WellData,
            id: "M1/raw".into(),
            after: Duration::from_millis(50),
        };
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "well data `M1/raw` timed out after 50ms");
    }

    #[test]
    fn only_unavailable_store_errors_are_transient() {
        assert!(StoreError::Unavailable("down".into()).is_transient());
        assert!(!StoreError::AlreadyFinished(1).is_transient());
        assert!(!StoreError::DuplicateFeature {
            dataset: 1,
            feature: "f".into()
        }
        .is_transient());
    }
}

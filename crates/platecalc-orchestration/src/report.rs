//! Run report returned to the caller of a completed run.

use std::time::Duration;

use serde::{Serialize, Serializer};

use platecalc_core::model::WellValues;
use platecalc_core::status::{FeatureStatus, Outcome};

use crate::interfaces::DatasetId;

/// Why a run stopped evaluating before its last stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The cancellation token was triggered.
    Cancelled,
    /// The run ceiling was exceeded.
    TimedOut,
}

/// Result of one feature in a run.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureReport {
    pub feature_id: String,
    pub name: String,
    pub stage: String,
    pub status: FeatureStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<WellValues>,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

/// Terminal report of a run that reached `finish`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub dataset_id: DatasetId,
    pub plate_id: String,
    pub measurement_id: String,
    pub protocol_id: String,
    pub outcome: Outcome,
    /// Features in plan order.
    pub features: Vec<FeatureReport>,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort: Option<AbortReason>,
}

impl RunReport {
    /// Report of the feature with the given name.
    #[must_use]
    pub fn feature(&self, name: &str) -> Option<&FeatureReport> {
        self.features.iter().find(|f| f.name == name)
    }

    /// Number of features with a successful status.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.features.iter().filter(|f| f.status.is_success()).count()
    }

    /// Number of features with a failure status.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.features.len() - self.succeeded()
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use platecalc_core::status::StatusCode;

    fn report() -> RunReport {
        RunReport {
            dataset_id: 1,
            plate_id: "P1".into(),
            measurement_id: "M1".into(),
            protocol_id: "PR1".into(),
            outcome: Outcome::PartialFailure,
            features: vec![
                FeatureReport {
                    feature_id: "1".into(),
                    name: "ratio".into(),
                    stage: "raw".into(),
                    status: FeatureStatus::ok(),
                    values: Some(Arc::from(&[1.0, 2.0][..])),
                    duration: Duration::from_micros(1500),
                },
                FeatureReport {
                    feature_id: "2".into(),
                    name: "norm".into(),
                    stage: "normalize".into(),
                    status: FeatureStatus::failed(StatusCode::DependencyFailed, "ratio failed"),
                    values: None,
                    duration: Duration::ZERO,
                },
            ],
            duration: Duration::from_millis(12),
            abort: None,
        }
    }

    #[test]
    fn counts_and_lookup() {
        let r = report();
        assert_eq!(r.succeeded(), 1);
        assert_eq!(r.failed(), 1);
        assert_eq!(r.feature("norm").unwrap().stage, "normalize");
        assert!(r.feature("absent").is_none());
    }

    #[test]
    fn serializes_durations_in_millis() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["outcome"], "PARTIAL_FAILURE");
        assert_eq!(json["duration_ms"], 12.0);
        assert_eq!(json["features"][0]["duration_ms"], 1.5);
        assert!(json["features"][1].get("values").is_none());
        assert!(json.get("abort").is_none());
    }
}

//! Per-feature status codes, dataset lifecycle states, and run outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed classification of a recorded feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    /// Evaluated successfully.
    Ok,
    /// A declared input column or feature output was absent.
    MissingInput,
    /// An input or output array did not match the plate well count.
    ShapeMismatch,
    /// The formula itself failed (division by zero, non-finite value, ...).
    EvaluationFault,
    /// Skipped because a feature it depends on failed.
    DependencyFailed,
    /// An input column could not be fetched after retries.
    InputUnavailable,
    /// Not evaluated because the run was cancelled or timed out.
    Cancelled,
}

impl StatusCode {
    /// Whether the feature holds a usable result.
    #[must_use]
    pub fn is_success(self) -> bool {
        self == Self::Ok
    }

    /// Stable wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::MissingInput => "MISSING_INPUT",
            Self::ShapeMismatch => "SHAPE_MISMATCH",
            Self::EvaluationFault => "EVALUATION_FAULT",
            Self::DependencyFailed => "DEPENDENCY_FAILED",
            Self::InputUnavailable => "INPUT_UNAVAILABLE",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status code plus free-text detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureStatus {
    /// Machine-readable kind.
    pub code: StatusCode,
    /// Human-readable detail. Empty on success.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl FeatureStatus {
    /// Successful status.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: String::new(),
        }
    }

    /// Failed status with a detail message.
    #[must_use]
    pub fn failed(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Whether the feature holds a usable result.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }
}

/// Terminal classification of a result dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success,
    PartialFailure,
    Failure,
}

impl Outcome {
    /// Derive the outcome from the recorded feature statuses.
    ///
    /// No statuses at all counts as FAILURE: nothing usable was produced.
    pub fn from_statuses<I>(codes: I) -> Self
    where
        I: IntoIterator<Item = StatusCode>,
    {
        let (mut ok, mut failed) = (0usize, 0usize);
        for code in codes {
            if code.is_success() {
                ok += 1;
            } else {
                failed += 1;
            }
        }
        match (ok, failed) {
            (0, _) => Self::Failure,
            (_, 0) => Self::Success,
            _ => Self::PartialFailure,
        }
    }

    /// Stable wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::PartialFailure => "PARTIAL_FAILURE",
            Self::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a result dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetState {
    Created,
    InProgress,
    Finished(Outcome),
}

impl DatasetState {
    /// Whether the dataset has been finalized.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_all_ok_is_success() {
        let outcome = Outcome::from_statuses([StatusCode::Ok, StatusCode::Ok]);
        assert_eq!(outcome, Outcome::Success);
    }

    #[test]
    fn outcome_mixed_is_partial() {
        let outcome = Outcome::from_statuses([StatusCode::Ok, StatusCode::DependencyFailed]);
        assert_eq!(outcome, Outcome::PartialFailure);
    }

    #[test]
    fn outcome_none_ok_is_failure() {
        let outcome =
            Outcome::from_statuses([StatusCode::EvaluationFault, StatusCode::DependencyFailed]);
        assert_eq!(outcome, Outcome::Failure);
        assert_eq!(Outcome::from_statuses(std::iter::empty()), Outcome::Failure);
    }

    #[test]
    fn status_wire_names_match_serde() {
        for code in [
            StatusCode::Ok,
            StatusCode::MissingInput,
            StatusCode::ShapeMismatch,
            StatusCode::EvaluationFault,
            StatusCode::DependencyFailed,
            StatusCode::InputUnavailable,
            StatusCode::Cancelled,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn success_status_omits_message() {
        let json = serde_json::to_string(&FeatureStatus::ok()).unwrap();
        assert_eq!(json, r#"{"code":"OK"}"#);
    }

    #[test]
    fn finished_state() {
        assert!(DatasetState::Finished(Outcome::Failure).is_finished());
        assert!(!DatasetState::InProgress.is_finished());
    }
}

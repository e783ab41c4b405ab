//! Error handling and exit codes.

use platecalc_core::constants::exit_codes;
use platecalc_core::status::Outcome;
use platecalc_orchestration::error::CalcError;
use platecalc_orchestration::report::{AbortReason, RunReport};

use crate::config::ConfigError;
use crate::fixture::FixtureError;

/// Map a fatal error to its exit code.
#[must_use]
pub fn handle_error(err: &anyhow::Error) -> i32 {
    if let Some(calc) = err.downcast_ref::<CalcError>() {
        return calc_exit_code(calc);
    }
    if err.is::<ConfigError>() || err.is::<FixtureError>() {
        return exit_codes::ERROR_CONFIG;
    }
    exit_codes::ERROR_GENERIC
}

fn calc_exit_code(err: &CalcError) -> i32 {
    match err {
        CalcError::Unresolvable(_) => exit_codes::ERROR_UNRESOLVABLE,
        CalcError::InvalidProtocol(_)
        | CalcError::PlateMismatch { .. }
        | CalcError::InconsistentPlate(_)
        | CalcError::Config(_) => exit_codes::ERROR_CONFIG,
        CalcError::Persistence(_) => exit_codes::ERROR_GENERIC,
    }
}

/// Exit code for a run that reached a terminal outcome.
#[must_use]
pub fn outcome_exit_code(report: &RunReport) -> i32 {
    match (report.abort, report.outcome) {
        (Some(AbortReason::Cancelled), _) => exit_codes::ERROR_CANCELED,
        (Some(AbortReason::TimedOut), _) => exit_codes::ERROR_TIMEOUT,
        (None, Outcome::Success) => exit_codes::SUCCESS,
        (None, Outcome::PartialFailure) => exit_codes::PARTIAL_FAILURE,
        (None, Outcome::Failure) => exit_codes::ERROR_GENERIC,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use platecalc_core::plan::PlanError;
    use platecalc_orchestration::interfaces::{Entity, ResolveError, StoreError};

    fn report(outcome: Outcome, abort: Option<AbortReason>) -> RunReport {
        RunReport {
            dataset_id: 1,
            plate_id: "P1".into(),
            measurement_id: "M1".into(),
            protocol_id: "PR1".into(),
            outcome,
            features: Vec::new(),
            duration: Duration::ZERO,
            abort,
        }
    }

    #[test]
    fn fatal_error_codes() {
        let unresolvable = anyhow::Error::new(CalcError::from(ResolveError::not_found(
            Entity::Protocol,
            "PR9",
        )));
        assert_eq!(handle_error(&unresolvable), 5);
        assert_eq!(
            handle_error(&anyhow::Error::new(CalcError::from(PlanError::NoStages))),
            4
        );
        assert_eq!(
            handle_error(&anyhow::Error::new(CalcError::from(StoreError::AlreadyFinished(1)))),
            1
        );
        assert_eq!(handle_error(&anyhow::Error::new(ConfigError::Missing("--plate"))), 4);
        assert_eq!(handle_error(&anyhow::anyhow!("other")), 1);
    }

    #[test]
    fn context_does_not_hide_the_cause() {
        let err = anyhow::Error::new(FixtureError::Format(9)).context("loading fixture");
        assert_eq!(handle_error(&err), 4);
    }

    #[test]
    fn outcome_codes() {
        assert_eq!(outcome_exit_code(&report(Outcome::Success, None)), 0);
        assert_eq!(outcome_exit_code(&report(Outcome::PartialFailure, None)), 3);
        assert_eq!(outcome_exit_code(&report(Outcome::Failure, None)), 1);
        assert_eq!(
            outcome_exit_code(&report(Outcome::Failure, Some(AbortReason::Cancelled))),
            130
        );
        assert_eq!(
            outcome_exit_code(&report(Outcome::Failure, Some(AbortReason::TimedOut))),
            2
        );
    }
}

//! # platecalc-core
//!
//! Core library for the platecalc plate calculation engine: immutable
//! plate/protocol/measurement snapshots, formula bodies and the evaluation
//! engine, validated stage-ordered execution plans, per-feature statuses,
//! and calculation lifecycle events.

pub mod cancel;
pub mod constants;
pub mod evaluator;
pub mod events;
pub(crate) mod expression;
pub mod formula;
pub mod model;
pub(crate) mod native;
pub mod options;
pub mod plan;
pub mod sinks;
pub(crate) mod stats;
pub mod status;

// Re-exports
pub use cancel::CancellationToken;
pub use constants::exit_codes;
pub use evaluator::{EvalInputs, EvaluationFailure, Evaluator, FormulaEngine};
pub use events::{CalculationEvent, EventEmitter, EventSink, EventStatus};
pub use formula::{Aggregate, BinaryOp, Expr, Formula, FormulaBody, Function, InputRef, NativeKernel};
pub use model::{Feature, Measurement, Plate, Protocol, WellValues};
pub use options::{RetryPolicy, RunOptions};
pub use plan::{ExecutionPlan, PlanError, PlannedFeature, StagePlan};
pub use status::{DatasetState, FeatureStatus, Outcome, StatusCode};

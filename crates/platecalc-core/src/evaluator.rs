//! Evaluation capability and the `FormulaEngine` decorator.
//!
//! `Evaluator` is the public trait consumed by orchestration.
//! `FormulaEngine` validates the presence and shape of every declared input,
//! dispatches to the evaluator variant backing the formula body, and checks
//! the output before handing it back.

use std::collections::HashMap;

use crate::expression;
use crate::formula::{Formula, FormulaBody, InputRef};
use crate::model::WellValues;
use crate::native;
use crate::status::StatusCode;

/// Typed evaluation failure. Never a panic, never a silent pad or truncation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationFailure {
    /// A declared input is absent.
    #[error("missing {} `{}`", input_kind(.0), .0.name())]
    MissingInput(InputRef),

    /// An array does not have one value per well.
    #[error("`{name}` has {actual} values, plate has {expected} wells")]
    ShapeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Division by zero at a well.
    #[error("division by zero at well #{well}")]
    DivisionByZero { well: usize },

    /// The result at a well is NaN or infinite.
    #[error("non-finite result at well #{well}")]
    NonFinite { well: usize },

    /// Formula-internal fault.
    #[error("{0}")]
    Fault(String),
}

fn input_kind(input: &InputRef) -> &'static str {
    match input {
        InputRef::Column(_) => "column",
        InputRef::Feature(_) => "feature",
    }
}

impl EvaluationFailure {
    /// Status code recorded for this failure.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingInput(_) => StatusCode::MissingInput,
            Self::ShapeMismatch { .. } => StatusCode::ShapeMismatch,
            Self::DivisionByZero { .. } | Self::NonFinite { .. } | Self::Fault(_) => {
                StatusCode::EvaluationFault
            }
        }
    }
}

/// Inputs of one evaluation: raw columns and earlier feature outputs.
#[derive(Debug, Clone, Default)]
pub struct EvalInputs {
    well_count: usize,
    columns: HashMap<String, WellValues>,
    features: HashMap<String, WellValues>,
}

impl EvalInputs {
    /// Empty inputs for a plate with `well_count` wells.
    #[must_use]
    pub fn new(well_count: usize) -> Self {
        Self {
            well_count,
            ..Self::default()
        }
    }

    /// Builder-style column insertion.
    #[must_use]
    pub fn with_column(mut self, name: impl Into<String>, values: WellValues) -> Self {
        self.insert_column(name, values);
        self
    }

    /// Builder-style feature insertion.
    #[must_use]
    pub fn with_feature(mut self, name: impl Into<String>, values: WellValues) -> Self {
        self.insert_feature(name, values);
        self
    }

    pub fn insert_column(&mut self, name: impl Into<String>, values: WellValues) {
        self.columns.insert(name.into(), values);
    }

    pub fn insert_feature(&mut self, name: impl Into<String>, values: WellValues) {
        self.features.insert(name.into(), values);
    }

    /// Number of wells every array must have.
    #[must_use]
    pub fn well_count(&self) -> usize {
        self.well_count
    }

    /// Look up an input.
    pub fn get(&self, input: &InputRef) -> Result<&WellValues, EvaluationFailure> {
        let found = match input {
            InputRef::Column(name) => self.columns.get(name),
            InputRef::Feature(name) => self.features.get(name),
        };
        found.ok_or_else(|| EvaluationFailure::MissingInput(input.clone()))
    }
}

/// Public evaluation capability.
pub trait Evaluator: Send + Sync {
    /// Evaluate `formula` against `inputs`, producing one value per well.
    fn evaluate(
        &self,
        formula: &Formula,
        inputs: &EvalInputs,
    ) -> Result<Vec<f64>, EvaluationFailure>;

    /// Name of this evaluator.
    fn name(&self) -> &str;
}

/// Default evaluator: input validation around the built-in variants.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormulaEngine;

impl FormulaEngine {
    /// Create a new engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn check_shape(name: &str, expected: usize, actual: usize) -> Result<(), EvaluationFailure> {
        if expected == actual {
            Ok(())
        } else {
            Err(EvaluationFailure::ShapeMismatch {
                name: name.to_string(),
                expected,
                actual,
            })
        }
    }

    fn check_inputs(formula: &Formula, inputs: &EvalInputs) -> Result<(), EvaluationFailure> {
        let declared = formula
            .columns()
            .into_iter()
            .map(|c| InputRef::Column(c.to_string()))
            .chain(
                formula
                    .dependencies()
                    .into_iter()
                    .map(|f| InputRef::Feature(f.to_string())),
            );
        for input in declared {
            let values = inputs.get(&input)?;
            Self::check_shape(input.name(), inputs.well_count(), values.len())?;
        }
        Ok(())
    }
}

impl Evaluator for FormulaEngine {
    fn evaluate(
        &self,
        formula: &Formula,
        inputs: &EvalInputs,
    ) -> Result<Vec<f64>, EvaluationFailure> {
        Self::check_inputs(formula, inputs)?;

        let output = match &formula.body {
            FormulaBody::Expression { expr } => expression::evaluate(expr, inputs)?,
            FormulaBody::Native { kernel } => native::evaluate(kernel, inputs)?,
        };

        Self::check_shape(&formula.id, inputs.well_count(), output.len())?;
        if let Some(well) = output.iter().position(|v| !v.is_finite()) {
            return Err(EvaluationFailure::NonFinite { well });
        }
        Ok(output)
    }

    fn name(&self) -> &str {
        "FormulaEngine"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::formula::{Expr, NativeKernel};

    fn values(v: &[f64]) -> WellValues {
        Arc::from(v)
    }

    #[test]
    fn evaluates_expression() {
        let formula = Formula::expression("f", "double", "raw", Expr::column("a") * Expr::constant(2.0));
        let inputs = EvalInputs::new(3).with_column("a", values(&[1.0, 2.0, 3.0]));
        let out = FormulaEngine::new().evaluate(&formula, &inputs).unwrap();
        assert_eq!(out, vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn missing_column_is_typed() {
        let formula = Formula::expression("f", "f", "raw", Expr::column("absent"));
        let err = FormulaEngine::new()
            .evaluate(&formula, &EvalInputs::new(2))
            .unwrap_err();
        assert_eq!(err, EvaluationFailure::MissingInput(InputRef::Column("absent".into())));
        assert_eq!(err.status_code(), StatusCode::MissingInput);
        assert_eq!(err.to_string(), "missing column `absent`");
    }

    #[test]
    fn short_input_is_shape_mismatch() {
        let formula = Formula::expression("f", "f", "raw", Expr::column("a"));
        let inputs = EvalInputs::new(4).with_column("a", values(&[1.0, 2.0]));
        let err = FormulaEngine::new().evaluate(&formula, &inputs).unwrap_err();
        assert_eq!(
            err,
            EvaluationFailure::ShapeMismatch {
                name: "a".into(),
                expected: 4,
                actual: 2
            }
        );
        assert_eq!(err.status_code(), StatusCode::ShapeMismatch);
    }

    #[test]
    fn non_finite_output_is_fault() {
        let formula = Formula::expression(
            "f",
            "f",
            "raw",
            Expr::call(crate::formula::Function::Sqrt, Expr::column("a")),
        );
        let inputs = EvalInputs::new(2).with_column("a", values(&[4.0, -1.0]));
        let err = FormulaEngine::new().evaluate(&formula, &inputs).unwrap_err();
        assert_eq!(err, EvaluationFailure::NonFinite { well: 1 });
        assert_eq!(err.status_code(), StatusCode::EvaluationFault);
    }

    #[test]
    fn native_kernel_dispatch() {
        let formula = Formula::native(
            "f",
            "pom",
            "raw",
            NativeKernel::PercentOfMean {
                input: InputRef::Column("a".into()),
            },
        );
        let inputs = EvalInputs::new(2).with_column("a", values(&[1.0, 3.0]));
        let out = FormulaEngine::new().evaluate(&formula, &inputs).unwrap();
        assert_eq!(out, vec![50.0, 150.0]);
    }

    #[test]
    fn feature_inputs_are_separate_from_columns() {
        let formula = Formula::expression("f", "f", "late", Expr::feature("x"));
        let inputs = EvalInputs::new(1).with_column("x", values(&[1.0]));
        let err = FormulaEngine::new().evaluate(&formula, &inputs).unwrap_err();
        assert_eq!(err.to_string(), "missing feature `x`");
    }
}

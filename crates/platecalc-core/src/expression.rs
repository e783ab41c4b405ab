//! Expression-tree evaluator.

use crate::evaluator::{EvalInputs, EvaluationFailure};
use crate::formula::{Aggregate, BinaryOp, Expr, Function};
use crate::stats;

/// Evaluate `expr` element-wise over every well.
pub(crate) fn evaluate(expr: &Expr, inputs: &EvalInputs) -> Result<Vec<f64>, EvaluationFailure> {
    let n = inputs.well_count();
    match expr {
        Expr::Const(value) => Ok(vec![*value; n]),
        Expr::Input(input) => Ok(inputs.get(input)?.to_vec()),
        Expr::Neg(inner) => Ok(evaluate(inner, inputs)?.into_iter().map(|v| -v).collect()),
        Expr::Binary { op, lhs, rhs } => {
            let lhs = evaluate(lhs, inputs)?;
            let rhs = evaluate(rhs, inputs)?;
            binary(*op, &lhs, &rhs)
        }
        Expr::Call { func, arg } => {
            let arg = evaluate(arg, inputs)?;
            Ok(arg.into_iter().map(|v| apply(*func, v)).collect())
        }
        Expr::Aggregate { func, arg } => {
            let arg = evaluate(arg, inputs)?;
            let value = reduce(*func, &arg)?;
            Ok(vec![value; n])
        }
    }
}

fn binary(op: BinaryOp, lhs: &[f64], rhs: &[f64]) -> Result<Vec<f64>, EvaluationFailure> {
    lhs.iter()
        .zip(rhs)
        .enumerate()
        .map(|(well, (&a, &b))| match op {
            BinaryOp::Add => Ok(a + b),
            BinaryOp::Sub => Ok(a - b),
            BinaryOp::Mul => Ok(a * b),
            BinaryOp::Div if b == 0.0 => Err(EvaluationFailure::DivisionByZero { well }),
            BinaryOp::Div => Ok(a / b),
            BinaryOp::Pow => Ok(a.powf(b)),
            BinaryOp::Min => Ok(a.min(b)),
            BinaryOp::Max => Ok(a.max(b)),
        })
        .collect()
}

fn apply(func: Function, v: f64) -> f64 {
    match func {
        Function::Abs => v.abs(),
        Function::Sqrt => v.sqrt(),
        Function::Ln => v.ln(),
        Function::Log10 => v.log10(),
        Function::Exp => v.exp(),
    }
}

fn reduce(func: Aggregate, values: &[f64]) -> Result<f64, EvaluationFailure> {
    let value = match func {
        Aggregate::Mean => stats::mean(values),
        Aggregate::Median => stats::median(values),
        Aggregate::Stdev => stats::stdev(values),
        Aggregate::Min => stats::min(values),
        Aggregate::Max => stats::max(values),
        Aggregate::Sum => Some(stats::sum(values)),
    };
    value.ok_or_else(|| {
        EvaluationFailure::Fault(format!(
            "{func:?} is undefined over {} well(s)",
            values.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn inputs(a: &[f64], b: &[f64]) -> EvalInputs {
        EvalInputs::new(a.len())
            .with_column("a", Arc::from(a))
            .with_column("b", Arc::from(b))
    }

    #[test]
    fn arithmetic_is_element_wise() {
        let expr = (Expr::column("a") + Expr::column("b")) * Expr::constant(10.0);
        let out = evaluate(&expr, &inputs(&[1.0, 2.0], &[3.0, 4.0])).unwrap();
        assert_eq!(out, vec![40.0, 60.0]);
    }

    #[test]
    fn division_by_zero_names_the_well() {
        let expr = Expr::column("a") / Expr::column("b");
        let err = evaluate(&expr, &inputs(&[1.0, 1.0, 1.0, 1.0], &[1.0, 2.0, 4.0, 0.0])).unwrap_err();
        assert_eq!(err, EvaluationFailure::DivisionByZero { well: 3 });
    }

    #[test]
    fn aggregate_broadcasts() {
        let expr = Expr::column("a") - Expr::aggregate(Aggregate::Mean, Expr::column("a"));
        let out = evaluate(&expr, &inputs(&[1.0, 2.0, 3.0], &[0.0; 3])).unwrap();
        assert_eq!(out, vec![-1.0, 0.0, 1.0]);
    }

    #[test]
    fn stdev_of_single_well_is_fault() {
        let expr = Expr::aggregate(Aggregate::Stdev, Expr::column("a"));
        let err = evaluate(&expr, &inputs(&[1.0], &[1.0])).unwrap_err();
        assert!(matches!(err, EvaluationFailure::Fault(_)));
    }

    #[test]
    fn functions_and_negation() {
        let expr = -Expr::call(Function::Abs, Expr::column("a"));
        let out = evaluate(&expr, &inputs(&[-2.0, 3.0], &[0.0, 0.0])).unwrap();
        assert_eq!(out, vec![-2.0, -3.0]);

        let expr = Expr::binary(BinaryOp::Max, Expr::column("a"), Expr::constant(0.0));
        let out = evaluate(&expr, &inputs(&[-2.0, 3.0], &[0.0, 0.0])).unwrap();
        assert_eq!(out, vec![0.0, 3.0]);
    }
}

//! Native kernels for common plate normalizations.

use crate::evaluator::{EvalInputs, EvaluationFailure};
use crate::formula::NativeKernel;
use crate::stats;

pub(crate) fn evaluate(
    kernel: &NativeKernel,
    inputs: &EvalInputs,
) -> Result<Vec<f64>, EvaluationFailure> {
    match kernel {
        NativeKernel::Ratio {
            numerator,
            denominator,
        } => {
            let num = inputs.get(numerator)?;
            let den = inputs.get(denominator)?;
            num.iter()
                .zip(den.iter())
                .enumerate()
                .map(|(well, (&n, &d))| {
                    if d == 0.0 {
                        Err(EvaluationFailure::DivisionByZero { well })
                    } else {
                        Ok(n / d)
                    }
                })
                .collect()
        }
        NativeKernel::PercentOfMean { input } => {
            let x = inputs.get(input)?;
            let m = nonzero(stats::mean(x), "mean")?;
            Ok(x.iter().map(|v| 100.0 * v / m).collect())
        }
        NativeKernel::ZScore { input } => {
            let x = inputs.get(input)?;
            let m = stats::mean(x).ok_or_else(|| undefined("mean"))?;
            let sd = nonzero(stats::stdev(x), "standard deviation")?;
            Ok(x.iter().map(|v| (v - m) / sd).collect())
        }
        NativeKernel::PercentEffect {
            input,
            low_controls,
            high_controls,
        } => {
            let x = inputs.get(input)?;
            let low = stats::mean(&controls(x, low_controls, "low")?)
                .ok_or_else(|| undefined("low control mean"))?;
            let high = stats::mean(&controls(x, high_controls, "high")?)
                .ok_or_else(|| undefined("high control mean"))?;
            let window = nonzero(Some(high - low), "control window")?;
            Ok(x.iter().map(|v| 100.0 * (v - low) / window).collect())
        }
        NativeKernel::LogTransform { input, base } => {
            if *base <= 0.0 || (*base - 1.0).abs() < f64::EPSILON {
                return Err(EvaluationFailure::Fault(format!(
                    "invalid logarithm base {base}"
                )));
            }
            let x = inputs.get(input)?;
            let ln_base = base.ln();
            Ok(x.iter().map(|v| v.ln() / ln_base).collect())
        }
    }
}

fn controls(values: &[f64], wells: &[usize], label: &str) -> Result<Vec<f64>, EvaluationFailure> {
    if wells.is_empty() {
        return Err(EvaluationFailure::Fault(format!(
            "no {label} control wells declared"
        )));
    }
    wells
        .iter()
        .map(|&well| {
            values.get(well).copied().ok_or_else(|| {
                EvaluationFailure::Fault(format!(
                    "{label} control well #{well} is outside the plate ({} wells)",
                    values.len()
                ))
            })
        })
        .collect()
}

fn undefined(what: &str) -> EvaluationFailure {
    EvaluationFailure::Fault(format!("{what} is undefined"))
}

fn nonzero(value: Option<f64>, what: &str) -> Result<f64, EvaluationFailure> {
    match value {
        Some(v) if v != 0.0 => Ok(v),
        Some(_) => Err(EvaluationFailure::Fault(format!("{what} is zero"))),
        None => Err(undefined(what)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::formula::InputRef;

    fn col(name: &str) -> InputRef {
        InputRef::Column(name.into())
    }

    fn plate(values: &[f64]) -> EvalInputs {
        EvalInputs::new(values.len()).with_column("x", Arc::from(values))
    }

    #[test]
    fn ratio_reports_zero_denominator_well() {
        let inputs = plate(&[1.0, 2.0]).with_column("y", Arc::from(&[2.0, 0.0][..]));
        let kernel = NativeKernel::Ratio {
            numerator: col("x"),
            denominator: col("y"),
        };
        assert_eq!(
            evaluate(&kernel, &inputs).unwrap_err(),
            EvaluationFailure::DivisionByZero { well: 1 }
        );
    }

    #[test]
    fn z_score_is_centered() {
        let kernel = NativeKernel::ZScore { input: col("x") };
        let out = evaluate(&kernel, &plate(&[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(out, vec![-1.0, 0.0, 1.0]);
    }

    #[test]
    fn z_score_of_constant_plate_is_fault() {
        let kernel = NativeKernel::ZScore { input: col("x") };
        let err = evaluate(&kernel, &plate(&[5.0, 5.0, 5.0])).unwrap_err();
        assert_eq!(err.to_string(), "standard deviation is zero");
    }

    #[test]
    fn percent_effect_uses_controls() {
        let kernel = NativeKernel::PercentEffect {
            input: col("x"),
            low_controls: vec![0],
            high_controls: vec![3],
        };
        let out = evaluate(&kernel, &plate(&[10.0, 15.0, 20.0, 30.0])).unwrap();
        assert_eq!(out, vec![0.0, 25.0, 50.0, 100.0]);
    }

    #[test]
    fn percent_effect_rejects_out_of_range_control() {
        let kernel = NativeKernel::PercentEffect {
            input: col("x"),
            low_controls: vec![0],
            high_controls: vec![9],
        };
        assert!(matches!(
            evaluate(&kernel, &plate(&[1.0, 2.0])),
            Err(EvaluationFailure::Fault(_))
        ));
    }

    #[test]
    fn log_transform_base_two() {
        let kernel = NativeKernel::LogTransform {
            input: col("x"),
            base: 2.0,
        };
        let out = evaluate(&kernel, &plate(&[1.0, 8.0])).unwrap();
        assert!((out[1] - 3.0).abs() < 1e-12);
        assert!(out[0].abs() < 1e-12);
    }

    #[test]
    fn log_transform_rejects_base_one() {
        let kernel = NativeKernel::LogTransform {
            input: col("x"),
            base: 1.0,
        };
        assert!(evaluate(&kernel, &plate(&[1.0])).is_err());
    }
}

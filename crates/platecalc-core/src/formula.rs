//! Formula definitions.
//!
//! A formula body is a closed set of variants: an expression tree or a
//! built-in native kernel. Both expose, statically, the raw columns and the
//! feature names they read, which is what the execution plan validates and
//! what the orchestrator fetches before evaluation.

use std::collections::BTreeSet;
use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// A user-defined formula, persisted independently of any run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    /// Formula identifier.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Category, i.e. the execution stage this formula belongs to.
    pub category: String,
    /// What to compute.
    pub body: FormulaBody,
}

impl Formula {
    /// Create an expression-tree formula.
    #[must_use]
    pub fn expression(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        expr: Expr,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            body: FormulaBody::Expression { expr },
        }
    }

    /// Create a native-kernel formula.
    #[must_use]
    pub fn native(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        kernel: NativeKernel,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            body: FormulaBody::Native { kernel },
        }
    }

    /// Raw well-data columns this formula reads.
    #[must_use]
    pub fn columns(&self) -> BTreeSet<&str> {
        self.inputs()
            .into_iter()
            .filter_map(|input| match input {
                InputRef::Column(name) => Some(name.as_str()),
                InputRef::Feature(_) => None,
            })
            .collect()
    }

    /// Names of the features whose outputs this formula reads.
    #[must_use]
    pub fn dependencies(&self) -> BTreeSet<&str> {
        self.inputs()
            .into_iter()
            .filter_map(|input| match input {
                InputRef::Feature(name) => Some(name.as_str()),
                InputRef::Column(_) => None,
            })
            .collect()
    }

    fn inputs(&self) -> Vec<&InputRef> {
        let mut out = Vec::new();
        match &self.body {
            FormulaBody::Expression { expr } => expr.collect_inputs(&mut out),
            FormulaBody::Native { kernel } => kernel.collect_inputs(&mut out),
        }
        out
    }
}

/// The evaluator variant backing a formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FormulaBody {
    /// Arithmetic expression tree evaluated per well.
    Expression { expr: Expr },
    /// Built-in plate analytics kernel.
    Native { kernel: NativeKernel },
}

impl FormulaBody {
    /// Short name of the evaluator variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Expression { .. } => "expression",
            Self::Native { .. } => "native",
        }
    }
}

/// Reference to a named input: a raw column or an earlier feature's output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputRef {
    /// Raw measurement column.
    Column(String),
    /// Output of a feature from an earlier stage.
    Feature(String),
}

impl InputRef {
    /// The referenced name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Column(name) | Self::Feature(name) => name,
        }
    }
}

/// Expression tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// Constant broadcast to every well.
    Const(f64),
    /// Input array.
    Input(InputRef),
    /// Arithmetic negation.
    Neg(Box<Expr>),
    /// Element-wise binary operation.
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Element-wise function.
    Call { func: Function, arg: Box<Expr> },
    /// Reduction broadcast back to every well.
    Aggregate { func: Aggregate, arg: Box<Expr> },
}

impl Expr {
    /// Constant node.
    #[must_use]
    pub fn constant(value: f64) -> Self {
        Self::Const(value)
    }

    /// Raw column reference.
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        Self::Input(InputRef::Column(name.into()))
    }

    /// Earlier-feature reference.
    #[must_use]
    pub fn feature(name: impl Into<String>) -> Self {
        Self::Input(InputRef::Feature(name.into()))
    }

    /// Binary operation node.
    #[must_use]
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Element-wise function call node.
    #[must_use]
    pub fn call(func: Function, arg: Expr) -> Self {
        Self::Call {
            func,
            arg: Box::new(arg),
        }
    }

    /// Aggregate node.
    #[must_use]
    pub fn aggregate(func: Aggregate, arg: Expr) -> Self {
        Self::Aggregate {
            func,
            arg: Box::new(arg),
        }
    }

    fn collect_inputs<'a>(&'a self, out: &mut Vec<&'a InputRef>) {
        match self {
            Self::Const(_) => {}
            Self::Input(input) => out.push(input),
            Self::Neg(inner) => inner.collect_inputs(out),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_inputs(out);
                rhs.collect_inputs(out);
            }
            Self::Call { arg, .. } | Self::Aggregate { arg, .. } => arg.collect_inputs(out),
        }
    }
}

macro_rules! impl_binary_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait for Expr {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, self, rhs)
            }
        }
    };
}

impl_binary_operator!(Add, add, BinaryOp::Add);
impl_binary_operator!(Sub, sub, BinaryOp::Sub);
impl_binary_operator!(Mul, mul, BinaryOp::Mul);
impl_binary_operator!(Div, div, BinaryOp::Div);

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Neg(Box::new(self))
    }
}

/// Element-wise binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Min,
    Max,
}

/// Element-wise functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Function {
    Abs,
    Sqrt,
    Ln,
    Log10,
    Exp,
}

/// Reductions over all wells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    Mean,
    Median,
    Stdev,
    Min,
    Max,
    Sum,
}

/// Built-in kernels for common plate normalizations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum NativeKernel {
    /// `numerator / denominator` per well.
    Ratio {
        numerator: InputRef,
        denominator: InputRef,
    },
    /// `100 * x / mean(x)`.
    PercentOfMean { input: InputRef },
    /// `(x - mean(x)) / stdev(x)`.
    ZScore { input: InputRef },
    /// `100 * (x - mean(low)) / (mean(high) - mean(low))` using control wells.
    PercentEffect {
        input: InputRef,
        low_controls: Vec<usize>,
        high_controls: Vec<usize>,
    },
    /// `log_base(x)`.
    LogTransform { input: InputRef, base: f64 },
}

impl NativeKernel {
    /// Short kernel name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ratio { .. } => "ratio",
            Self::PercentOfMean { .. } => "percent_of_mean",
            Self::ZScore { .. } => "z_score",
            Self::PercentEffect { .. } => "percent_effect",
            Self::LogTransform { .. } => "log_transform",
        }
    }

    fn collect_inputs<'a>(&'a self, out: &mut Vec<&'a InputRef>) {
        match self {
            Self::Ratio {
                numerator,
                denominator,
            } => {
                out.push(numerator);
                out.push(denominator);
            }
            Self::PercentOfMean { input }
            | Self::ZScore { input }
            | Self::PercentEffect { input, .. }
            | Self::LogTransform { input, .. } => out.push(input),
        }
    }
}

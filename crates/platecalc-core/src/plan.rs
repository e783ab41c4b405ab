//! Execution plan: protocol features grouped into strictly ordered stages.
//!
//! The plan is validated once, when the protocol is loaded. A feature may
//! only read outputs of features in strictly earlier stages, so a valid plan
//! is acyclic by construction and needs no runtime cycle detection.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::formula::Formula;
use crate::model::{Feature, Protocol};

/// Reasons a protocol cannot be turned into an execution plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("protocol declares no stages")]
    NoStages,

    #[error("protocol declares no features")]
    NoFeatures,

    #[error("stage `{0}` is declared more than once")]
    DuplicateStage(String),

    #[error("feature id `{0}` is declared more than once")]
    DuplicateFeatureId(String),

    #[error("feature name `{0}` is declared more than once")]
    DuplicateFeatureName(String),

    #[error("feature `{feature}` declares unknown category `{category}`")]
    UnknownCategory { feature: String, category: String },

    #[error("formula `{formula}` for feature `{feature}` is not in category `{category}`")]
    FormulaNotFound {
        feature: String,
        formula: String,
        category: String,
    },

    #[error("feature `{feature}` reads unknown feature `{dependency}`")]
    UnknownDependency { feature: String, dependency: String },

    #[error(
        "feature `{feature}` in stage `{stage}` reads `{dependency}` from stage `{dependency_stage}`, which does not run earlier"
    )]
    NonEarlierDependency {
        feature: String,
        stage: String,
        dependency: String,
        dependency_stage: String,
    },
}

/// A feature with its formula and statically known inputs.
#[derive(Debug, Clone)]
pub struct PlannedFeature {
    pub feature: Feature,
    pub formula: Arc<Formula>,
    /// Raw columns the formula reads.
    pub columns: Vec<String>,
    /// Names of earlier features the formula reads.
    pub dependencies: Vec<String>,
}

/// All features of one stage.
#[derive(Debug, Clone)]
pub struct StagePlan {
    pub name: String,
    pub index: usize,
    pub features: Vec<PlannedFeature>,
}

/// Validated stage-ordered plan for one protocol.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    protocol_id: String,
    stages: Vec<StagePlan>,
}

impl ExecutionPlan {
    /// Validate `protocol` against the formulas available for its stages.
    ///
    /// `formulas` only needs to contain the formulas of the protocol's
    /// categories; a formula is matched by id *and* category.
    pub fn build(protocol: &Protocol, formulas: &[Formula]) -> Result<Self, PlanError> {
        if protocol.stages.is_empty() {
            return Err(PlanError::NoStages);
        }
        if protocol.features.is_empty() {
            return Err(PlanError::NoFeatures);
        }

        let mut stage_index = HashMap::new();
        for (i, stage) in protocol.stages.iter().enumerate() {
            if stage_index.insert(stage.as_str(), i).is_some() {
                return Err(PlanError::DuplicateStage(stage.clone()));
            }
        }

        let by_id: HashMap<(&str, &str), &Formula> = formulas
            .iter()
            .map(|f| ((f.id.as_str(), f.category.as_str()), f))
            .collect();

        let mut ids = HashSet::new();
        let mut name_stage = HashMap::new();
        for feature in &protocol.features {
            if !ids.insert(feature.id.as_str()) {
                return Err(PlanError::DuplicateFeatureId(feature.id.clone()));
            }
            let Some(&stage) = stage_index.get(feature.category.as_str()) else {
                return Err(PlanError::UnknownCategory {
                    feature: feature.name.clone(),
                    category: feature.category.clone(),
                });
            };
            if name_stage.insert(feature.name.as_str(), stage).is_some() {
                return Err(PlanError::DuplicateFeatureName(feature.name.clone()));
            }
        }

        let mut stages: Vec<StagePlan> = protocol
            .stages
            .iter()
            .enumerate()
            .map(|(index, name)| StagePlan {
                name: name.clone(),
                index,
                features: Vec::new(),
            })
            .collect();

        for feature in &protocol.features {
            let stage = name_stage[feature.name.as_str()];
            let formula = by_id
                .get(&(feature.formula_id.as_str(), feature.category.as_str()))
                .ok_or_else(|| PlanError::FormulaNotFound {
                    feature: feature.name.clone(),
                    formula: feature.formula_id.clone(),
                    category: feature.category.clone(),
                })?;

            let dependencies = to_owned(formula.dependencies());
            for dependency in &dependencies {
                let Some(&dep_stage) = name_stage.get(dependency.as_str()) else {
                    return Err(PlanError::UnknownDependency {
                        feature: feature.name.clone(),
                        dependency: dependency.clone(),
                    });
                };
                if dep_stage >= stage {
                    return Err(PlanError::NonEarlierDependency {
                        feature: feature.name.clone(),
                        stage: protocol.stages[stage].clone(),
                        dependency: dependency.clone(),
                        dependency_stage: protocol.stages[dep_stage].clone(),
                    });
                }
            }

            stages[stage].features.push(PlannedFeature {
                feature: feature.clone(),
                columns: to_owned(formula.columns()),
                dependencies,
                formula: Arc::new((*formula).clone()),
            });
        }

        Ok(Self {
            protocol_id: protocol.id.clone(),
            stages,
        })
    }

    /// Protocol this plan was built from.
    #[must_use]
    pub fn protocol_id(&self) -> &str {
        &self.protocol_id
    }

    /// Stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StagePlan] {
        &self.stages
    }

    /// Total number of features across all stages.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.stages.iter().map(|s| s.features.len()).sum()
    }

    /// Distinct raw columns read anywhere in the plan.
    #[must_use]
    pub fn columns(&self) -> BTreeSet<&str> {
        self.stages
            .iter()
            .flat_map(|s| s.features.iter())
            .flat_map(|f| f.columns.iter().map(String::as_str))
            .collect()
    }
}

fn to_owned(names: BTreeSet<&str>) -> Vec<String> {
    names.into_iter().map(str::to_string).collect()
}

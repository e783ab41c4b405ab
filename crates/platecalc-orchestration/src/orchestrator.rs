//! Core orchestration: resolve inputs, run stages on the worker pool, and
//! drive the result dataset to exactly one terminal state.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info, warn};

use platecalc_core::cancel::CancellationToken;
use platecalc_core::evaluator::{EvalInputs, Evaluator, FormulaEngine};
use platecalc_core::events::{CalculationEvent, EventEmitter, EventStatus};
use platecalc_core::model::{Protocol, WellValues};
use platecalc_core::options::RunOptions;
use platecalc_core::plan::{ExecutionPlan, PlannedFeature, StagePlan};
use platecalc_core::status::{FeatureStatus, Outcome, StatusCode};

use crate::context::{FeatureSlot, RunContext};
use crate::error::CalcError;
use crate::interfaces::{DatasetId, ResultStore, Retryable, StoreError};
use crate::report::{AbortReason, FeatureReport, RunReport};
use crate::resolution::{ResolutionClient, Resolvers};
use crate::retry::with_retry;

/// Identifiers of one calculation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub plate_id: String,
    pub measurement_id: String,
    pub protocol_id: String,
}

impl RunRequest {
    pub fn new(
        plate_id: impl Into<String>,
        measurement_id: impl Into<String>,
        protocol_id: impl Into<String>,
    ) -> Self {
        Self {
            plate_id: plate_id.into(),
            measurement_id: measurement_id.into(),
            protocol_id: protocol_id.into(),
        }
    }
}

/// Inputs resolved before any dataset exists.
struct Prepared {
    plan: ExecutionPlan,
    well_count: usize,
}

/// Cancellation and run-ceiling checks shared by all features of a run.
struct RunGuard<'a> {
    cancel: &'a CancellationToken,
    deadline: Option<Instant>,
}

impl RunGuard<'_> {
    fn check(&self) -> Option<AbortReason> {
        if self.cancel.is_cancelled() {
            Some(AbortReason::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(AbortReason::TimedOut)
        } else {
            None
        }
    }
}

fn abort_message(reason: AbortReason) -> &'static str {
    match reason {
        AbortReason::Cancelled => "run cancelled",
        AbortReason::TimedOut => "run timed out",
    }
}

/// Runs calculations for (plate, measurement, protocol) triples.
pub struct Orchestrator {
    client: ResolutionClient,
    store: Arc<dyn ResultStore>,
    evaluator: Arc<dyn Evaluator>,
    emitter: Arc<EventEmitter>,
    options: RunOptions,
    pool: rayon::ThreadPool,
}

impl Orchestrator {
    /// Create an orchestrator with the default `FormulaEngine`.
    ///
    /// # Errors
    ///
    /// Returns `CalcError::Config` if the worker pool cannot be built.
    pub fn new(
        resolvers: Resolvers,
        store: Arc<dyn ResultStore>,
        options: RunOptions,
    ) -> Result<Self, CalcError> {
        let options = options.normalize();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.worker_threads)
            .thread_name(|i| format!("platecalc-worker-{i}"))
            .build()
            .map_err(|e| CalcError::Config(format!("cannot build worker pool: {e}")))?;
        Ok(Self {
            client: ResolutionClient::new(resolvers, options.call_timeout, options.retry),
            store,
            evaluator: Arc::new(FormulaEngine::new()),
            emitter: Arc::new(EventEmitter::new()),
            options,
            pool,
        })
    }

    /// Replace the evaluator.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Emitter that receives every calculation event.
    #[must_use]
    pub fn emitter(&self) -> &Arc<EventEmitter> {
        &self.emitter
    }

    #[must_use]
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Resolve a protocol and validate its execution plan without running it.
    pub fn plan(&self, protocol_id: &str) -> Result<ExecutionPlan, CalcError> {
        let protocol = self.client.protocol(protocol_id)?;
        self.build_plan(&protocol)
    }

    /// Pull, per declared stage, only the formulas its features reference.
    fn build_plan(&self, protocol: &Protocol) -> Result<ExecutionPlan, CalcError> {
        let mut formulas = Vec::new();
        for stage in &protocol.stages {
            let wanted: HashSet<&str> = protocol
                .features
                .iter()
                .filter(|f| &f.category == stage)
                .map(|f| f.formula_id.as_str())
                .collect();
            if wanted.is_empty() {
                continue;
            }
            formulas.extend(
                self.client
                    .formulas(stage)?
                    .into_iter()
                    .filter(|f| wanted.contains(f.id.as_str())),
            );
        }
        Ok(ExecutionPlan::build(protocol, &formulas)?)
    }

    fn prepare(&self, request: &RunRequest) -> Result<Prepared, CalcError> {
        let protocol = self.client.protocol(&request.protocol_id)?;
        let plate = self.client.plate(&request.plate_id)?;
        let measurement = self.client.measurement(&request.measurement_id)?;

        if measurement.plate_id != plate.id {
            return Err(CalcError::PlateMismatch {
                measurement: measurement.id,
                expected: plate.id,
                actual: measurement.plate_id,
            });
        }
        if !plate.is_consistent() {
            return Err(CalcError::InconsistentPlate(plate.id));
        }

        let plan = self.build_plan(&protocol)?;
        debug!(
            protocol_id = %request.protocol_id,
            stages = plan.stages().len(),
            features = plan.feature_count(),
            "Execution plan validated"
        );
        Ok(Prepared {
            plan,
            well_count: plate.well_count(),
        })
    }

    /// Execute one calculation run.
    ///
    /// # Errors
    ///
    /// Fatal conditions return a `CalcError`: unresolvable inputs and invalid
    /// protocols abort before any dataset is created; persistence failures
    /// abort after a best-effort `finish(FAILURE)`.
    pub fn run(
        &self,
        request: &RunRequest,
        cancel: &CancellationToken,
    ) -> Result<RunReport, CalcError> {
        let started = Instant::now();
        info!(
            plate_id = %request.plate_id,
            measurement_id = %request.measurement_id,
            protocol_id = %request.protocol_id,
            "Calculation scheduled"
        );
        self.emit(request, EventStatus::Scheduled, None, None);

        let prepared = self
            .prepare(request)
            .map_err(|e| self.fail(request, None, e))?;

        let dataset = with_retry(&self.options.retry, "create result dataset", |_| {
            self.store
                .create(&request.protocol_id, &request.plate_id, &request.measurement_id)
        })
        .map_err(|e| self.fail(request, None, e.into()))?;
        self.emit(request, EventStatus::InProgress, Some(dataset), None);

        let guard = RunGuard {
            cancel,
            deadline: started.checked_add(self.options.run_timeout),
        };
        let ctx = RunContext::new(&request.measurement_id, prepared.well_count);

        let mut features = Vec::with_capacity(prepared.plan.feature_count());
        let mut abort = None;
        for stage in prepared.plan.stages() {
            debug!(stage = %stage.name, features = stage.features.len(), "Stage started");
            let results: Vec<Result<FeatureReport, StoreError>> = self.pool.install(|| {
                stage
                    .features
                    .par_iter()
                    .map(|planned| self.run_feature(dataset, stage, planned, &ctx, &guard))
                    .collect()
            });
            for result in results {
                let report = result.map_err(|e| self.fail_persistence(request, dataset, e))?;
                if report.status.code == StatusCode::Cancelled && abort.is_none() {
                    abort = guard.check();
                }
                features.push(report);
            }
        }

        let outcome = if abort.is_some() {
            Outcome::Failure
        } else {
            Outcome::from_statuses(features.iter().map(|f| f.status.code))
        };
        with_retry(&self.options.retry, "finish result dataset", |_| {
            self.store.finish(dataset, outcome)
        })
        .map_err(|e| self.fail(request, Some(dataset), e.into()))?;

        let report = RunReport {
            dataset_id: dataset,
            plate_id: request.plate_id.clone(),
            measurement_id: request.measurement_id.clone(),
            protocol_id: request.protocol_id.clone(),
            outcome,
            features,
            duration: started.elapsed(),
            abort,
        };

        let message = match (abort, outcome) {
            (Some(reason), _) => Some(abort_message(reason).to_string()),
            (None, Outcome::Success) => None,
            (None, _) => Some(format!(
                "{} of {} features failed",
                report.failed(),
                report.features.len()
            )),
        };
        info!(
            dataset_id = dataset,
            %outcome,
            succeeded = report.succeeded(),
            failed = report.failed(),
            duration = ?report.duration,
            "Calculation finished"
        );
        self.emit(request, outcome.into(), Some(dataset), message);
        Ok(report)
    }

    fn run_feature(
        &self,
        dataset: DatasetId,
        stage: &StagePlan,
        planned: &PlannedFeature,
        ctx: &RunContext,
        guard: &RunGuard<'_>,
    ) -> Result<FeatureReport, StoreError> {
        let started = Instant::now();
        let feature = &planned.feature;

        let (values, status) = if let Some(reason) = guard.check() {
            (None, FeatureStatus::failed(StatusCode::Cancelled, abort_message(reason)))
        } else if let Some(dependency) = ctx.first_failed(&planned.dependencies) {
            (
                None,
                FeatureStatus::failed(
                    StatusCode::DependencyFailed,
                    format!("dependency `{dependency}` failed"),
                ),
            )
        } else {
            match self.gather_inputs(planned, ctx) {
                Err(status) => (None, status),
                Ok(inputs) => match self.evaluator.evaluate(&planned.formula, &inputs) {
                    Ok(output) => (Some(WellValues::from(output)), FeatureStatus::ok()),
                    Err(failure) => (
                        None,
                        FeatureStatus::failed(failure.status_code(), failure.to_string()),
                    ),
                },
            }
        };

        if !status.is_success() {
            debug!(
                feature = %feature.name,
                stage = %stage.name,
                code = %status.code,
                detail = %status.message,
                "Feature failed"
            );
        }

        let slot = match &values {
            Some(v) => FeatureSlot::Ready(Arc::clone(v)),
            None => FeatureSlot::Failed(status.code),
        };
        ctx.record(&feature.name, slot);

        with_retry(&self.options.retry, "record feature result", |_| {
            self.store
                .add_result(dataset, &feature.id, values.clone(), status.clone())
        })?;

        Ok(FeatureReport {
            feature_id: feature.id.clone(),
            name: feature.name.clone(),
            stage: stage.name.clone(),
            status,
            values,
            duration: started.elapsed(),
        })
    }

    /// Collect declared columns through the run cache and earlier outputs.
    fn gather_inputs(
        &self,
        planned: &PlannedFeature,
        ctx: &RunContext,
    ) -> Result<EvalInputs, FeatureStatus> {
        let mut inputs = EvalInputs::new(ctx.well_count());
        for column in &planned.columns {
            let fetched = ctx.column(column, || {
                self.client.well_data(ctx.measurement_id(), column)
            });
            match fetched {
                Ok(values) => inputs.insert_column(column.clone(), values),
                Err(e) if e.is_transient() => {
                    return Err(FeatureStatus::failed(
                        StatusCode::InputUnavailable,
                        format!("column `{column}` unavailable: {e}"),
                    ));
                }
                Err(_) => {
                    return Err(FeatureStatus::failed(
                        StatusCode::MissingInput,
                        format!("missing column `{column}`"),
                    ));
                }
            }
        }
        for dependency in &planned.dependencies {
            if let Some(values) = ctx.output(dependency) {
                inputs.insert_feature(dependency.clone(), values);
            }
        }
        Ok(inputs)
    }

    /// Persistence failure mid-run: finish as FAILURE on a best-effort basis.
    fn fail_persistence(
        &self,
        request: &RunRequest,
        dataset: DatasetId,
        err: StoreError,
    ) -> CalcError {
        if let Err(finish_err) = self.store.finish(dataset, Outcome::Failure) {
            warn!(dataset_id = dataset, error = %finish_err, "Could not finish dataset after persistence failure");
        }
        self.fail(request, Some(dataset), err.into())
    }

    /// Log and emit the FAILURE event for a fatal error.
    fn fail(&self, request: &RunRequest, dataset: Option<DatasetId>, err: CalcError) -> CalcError {
        warn!(
            plate_id = %request.plate_id,
            protocol_id = %request.protocol_id,
            error = %err,
            "Calculation aborted"
        );
        self.emit(request, EventStatus::Failure, dataset, Some(err.to_string()));
        err
    }

    fn emit(
        &self,
        request: &RunRequest,
        status: EventStatus,
        dataset: Option<DatasetId>,
        message: Option<String>,
    ) {
        let mut event = CalculationEvent::new(
            request.plate_id.as_str(),
            request.measurement_id.as_str(),
            request.protocol_id.as_str(),
            status,
        );
        if let Some(id) = dataset {
            event = event.with_dataset(id);
        }
        if let Some(message) = message {
            event = event.with_message(message);
        }
        self.emitter.emit(&event);
    }
}

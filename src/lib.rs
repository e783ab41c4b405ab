//! Collaborator doubles shared by the cross-crate scenario tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use platecalc_core::evaluator::{EvalInputs, EvaluationFailure, Evaluator, FormulaEngine};
use platecalc_core::formula::Formula;
use platecalc_core::model::{Measurement, Plate, Protocol, WellValues};
use platecalc_core::status::{FeatureStatus, Outcome};
use platecalc_orchestration::catalog::InMemoryFormulaCatalog;
use platecalc_orchestration::interfaces::{
    DatasetId, Entity, MeasurementResolver, PlateResolver, ProtocolResolver, ResolveError,
    ResultStore, StoreError,
};
use platecalc_orchestration::resolution::Resolvers;
use platecalc_orchestration::store::{FeatureResult, InMemoryResultStore, ResultDataset};

/// In-memory plates, protocols and measurements that count upstream calls.
#[derive(Default)]
pub struct Lab {
    plates: HashMap<String, Plate>,
    protocols: HashMap<String, Protocol>,
    measurements: HashMap<String, Measurement>,
    columns: HashMap<String, Vec<f64>>,
    fetch_delay: Duration,
    protocol_calls: AtomicUsize,
    fetches: Mutex<HashMap<String, usize>>,
}

impl Lab {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_plate(mut self, plate: Plate) -> Self {
        self.plates.insert(plate.id.clone(), plate);
        self
    }

    #[must_use]
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocols.insert(protocol.id.clone(), protocol);
        self
    }

    /// Measurement `id` on `plate_id`, with its well data columns.
    #[must_use]
    pub fn with_measurement(mut self, id: &str, plate_id: &str, columns: &[(&str, &[f64])]) -> Self {
        self.measurements.insert(
            id.to_string(),
            Measurement {
                id: id.to_string(),
                plate_id: plate_id.to_string(),
                columns: columns.iter().map(|(name, _)| (*name).to_string()).collect(),
            },
        );
        for (name, values) in columns {
            self.columns.insert((*name).to_string(), values.to_vec());
        }
        self
    }

    /// Slow down every well data fetch.
    #[must_use]
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    /// Upstream fetches of `column`.
    pub fn fetches(&self, column: &str) -> usize {
        self.fetches.lock().get(column).copied().unwrap_or(0)
    }

    /// Upstream fetches across all columns.
    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().values().sum()
    }

    pub fn protocol_calls(&self) -> usize {
        self.protocol_calls.load(Ordering::SeqCst)
    }

    /// Resolvers backed by this lab and the given formulas.
    pub fn resolvers(self: &Arc<Self>, formulas: Vec<Formula>) -> Resolvers {
        let catalog: InMemoryFormulaCatalog = formulas.into_iter().collect();
        Resolvers {
            plates: self.clone(),
            protocols: self.clone(),
            measurements: self.clone(),
            formulas: Arc::new(catalog),
        }
    }
}

impl PlateResolver for Lab {
    fn plate(&self, plate_id: &str) -> Result<Plate, ResolveError> {
        self.plates
            .get(plate_id)
            .cloned()
            .ok_or_else(|| ResolveError::not_found(Entity::Plate, plate_id))
    }
}

impl ProtocolResolver for Lab {
    fn protocol(&self, protocol_id: &str) -> Result<Protocol, ResolveError> {
        self.protocol_calls.fetch_add(1, Ordering::SeqCst);
        self.protocols
            .get(protocol_id)
            .cloned()
            .ok_or_else(|| ResolveError::not_found(Entity::Protocol, protocol_id))
    }
}

impl MeasurementResolver for Lab {
    fn measurement(&self, measurement_id: &str) -> Result<Measurement, ResolveError> {
        self.measurements
            .get(measurement_id)
            .cloned()
            .ok_or_else(|| ResolveError::not_found(Entity::Measurement, measurement_id))
    }

    fn well_data(&self, measurement_id: &str, column: &str) -> Result<Vec<f64>, ResolveError> {
        *self.fetches.lock().entry(column.to_string()).or_default() += 1;
        if !self.fetch_delay.is_zero() {
            std::thread::sleep(self.fetch_delay);
        }
        self.columns.get(column).cloned().ok_or_else(|| {
            ResolveError::not_found(Entity::WellData, format!("{measurement_id}/{column}"))
        })
    }
}

/// `FormulaEngine` that records which formulas it was asked to evaluate.
#[derive(Default)]
pub struct CountingEvaluator {
    inner: FormulaEngine,
    calls: Mutex<Vec<String>>,
}

impl CountingEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Formula ids evaluated so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn was_called(&self, formula_id: &str) -> bool {
        self.calls.lock().iter().any(|id| id == formula_id)
    }
}

impl Evaluator for CountingEvaluator {
    fn evaluate(
        &self,
        formula: &Formula,
        inputs: &EvalInputs,
    ) -> Result<Vec<f64>, EvaluationFailure> {
        self.calls.lock().push(formula.id.clone());
        self.inner.evaluate(formula, inputs)
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// How a `FaultyStore` misbehaves on `add_result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFault {
    /// Fail transiently this many times, then behave.
    Transient(usize),
    /// Stay unreachable.
    Down,
}

/// `InMemoryResultStore` with injected `add_result` failures and call counts.
pub struct FaultyStore {
    inner: InMemoryResultStore,
    fault: StoreFault,
    add_calls: AtomicUsize,
    finish_calls: AtomicUsize,
}

impl FaultyStore {
    #[must_use]
    pub fn new(fault: StoreFault) -> Self {
        Self {
            inner: InMemoryResultStore::new(),
            fault,
            add_calls: AtomicUsize::new(0),
            finish_calls: AtomicUsize::new(0),
        }
    }

    pub fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    pub fn finish_calls(&self) -> usize {
        self.finish_calls.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl ResultStore for FaultyStore {
    fn create(
        &self,
        protocol_id: &str,
        plate_id: &str,
        measurement_id: &str,
    ) -> Result<DatasetId, StoreError> {
        self.inner.create(protocol_id, plate_id, measurement_id)
    }

    fn add_result(
        &self,
        dataset: DatasetId,
        feature_id: &str,
        values: Option<WellValues>,
        status: FeatureStatus,
    ) -> Result<(), StoreError> {
        let call = self.add_calls.fetch_add(1, Ordering::SeqCst);
        let failing = match self.fault {
            StoreFault::Transient(n) => call < n,
            StoreFault::Down => true,
        };
        if failing {
            return Err(StoreError::Unavailable("injected".into()));
        }
        self.inner.add_result(dataset, feature_id, values, status)
    }

    fn finish(&self, dataset: DatasetId, outcome: Outcome) -> Result<(), StoreError> {
        self.finish_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.finish(dataset, outcome)
    }

    fn get_result(&self, dataset: DatasetId, feature_id: &str) -> Result<FeatureResult, StoreError> {
        self.inner.get_result(dataset, feature_id)
    }

    fn dataset(&self, dataset: DatasetId) -> Result<ResultDataset, StoreError> {
        self.inner.dataset(dataset)
    }
}

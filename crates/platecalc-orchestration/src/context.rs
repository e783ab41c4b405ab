//! Per-run caches: single-flight well-data columns and write-once feature
//! outputs. A `RunContext` belongs to exactly one run and is dropped with it.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use platecalc_core::model::WellValues;
use platecalc_core::status::StatusCode;

use crate::interfaces::ResolveError;

type ColumnCell = Arc<OnceLock<Result<WellValues, ResolveError>>>;

/// Recorded state of one feature within a run.
#[derive(Debug, Clone)]
pub enum FeatureSlot {
    Ready(WellValues),
    Failed(StatusCode),
}

/// Caches owned by a single run.
pub struct RunContext {
    measurement_id: String,
    well_count: usize,
    columns: Mutex<HashMap<String, ColumnCell>>,
    features: RwLock<HashMap<String, FeatureSlot>>,
}

impl RunContext {
    #[must_use]
    pub fn new(measurement_id: impl Into<String>, well_count: usize) -> Self {
        Self {
            measurement_id: measurement_id.into(),
            well_count,
            columns: Mutex::new(HashMap::new()),
            features: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn measurement_id(&self) -> &str {
        &self.measurement_id
    }

    #[must_use]
    pub fn well_count(&self) -> usize {
        self.well_count
    }

    /// Fetch `column` at most once per run.
    ///
    /// Concurrent callers for the same column block on the first caller's
    /// fetch and share its result, failures included. The map lock is held
    /// only to find the cell, never during the fetch.
    pub fn column<F>(&self, column: &str, fetch: F) -> Result<WellValues, ResolveError>
    where
        F: FnOnce() -> Result<WellValues, ResolveError>,
    {
        let cell = Arc::clone(self.columns.lock().entry(column.to_string()).or_default());
        cell.get_or_init(|| {
            debug!(measurement_id = %self.measurement_id, column, "Fetching well data");
            fetch()
        })
        .clone()
    }

    /// Record a feature's slot. The first write wins; returns whether this
    /// call performed it.
    pub fn record(&self, feature_name: &str, slot: FeatureSlot) -> bool {
        let mut features = self.features.write();
        if features.contains_key(feature_name) {
            return false;
        }
        features.insert(feature_name.to_string(), slot);
        true
    }

    /// Successful output of an earlier feature.
    #[must_use]
    pub fn output(&self, feature_name: &str) -> Option<WellValues> {
        match self.features.read().get(feature_name) {
            Some(FeatureSlot::Ready(values)) => Some(Arc::clone(values)),
            _ => None,
        }
    }

    /// Whether a feature was recorded with a failure status.
    #[must_use]
    pub fn is_failed(&self, feature_name: &str) -> bool {
        matches!(
            self.features.read().get(feature_name),
            Some(FeatureSlot::Failed(_))
        )
    }

    /// First of `names` that failed, if any.
    #[must_use]
    pub fn first_failed<'a>(&self, names: &'a [String]) -> Option<&'a str> {
        let features = self.features.read();
        names
            .iter()
            .find(|n| matches!(features.get(n.as_str()), Some(FeatureSlot::Failed(_))))
            .map(String::as_str)
    }
}

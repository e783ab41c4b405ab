//! In-memory result dataset store.
//!
//! Each dataset sits behind its own mutex, so concurrent `add_result` calls
//! for one dataset are serialized while different datasets never contend.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::debug;

use platecalc_core::model::WellValues;
use platecalc_core::status::{DatasetState, FeatureStatus, Outcome};

use crate::interfaces::{DatasetId, ResultStore, StoreError};

/// One recorded feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureResult {
    /// One value per well, present only on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<WellValues>,
    pub status: FeatureStatus,
}

/// Snapshot of a result dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultDataset {
    pub id: DatasetId,
    pub protocol_id: String,
    pub plate_id: String,
    pub measurement_id: String,
    pub state: DatasetState,
    /// Recorded features keyed by feature id.
    pub results: BTreeMap<String, FeatureResult>,
}

impl ResultDataset {
    /// Terminal outcome, once finished.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        match self.state {
            DatasetState::Finished(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// Thread-safe in-memory `ResultStore`.
pub struct InMemoryResultStore {
    next_id: AtomicU64,
    datasets: RwLock<HashMap<DatasetId, Arc<Mutex<ResultDataset>>>>,
}

impl InMemoryResultStore {
    /// Create an empty store. Dataset ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            datasets: RwLock::new(HashMap::new()),
        }
    }

    /// Number of datasets ever created.
    #[must_use]
    pub fn len(&self) -> usize {
        self.datasets.read().len()
    }

    /// Whether no dataset was ever created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, dataset: DatasetId) -> Result<Arc<Mutex<ResultDataset>>, StoreError> {
        self.datasets
            .read()
            .get(&dataset)
            .map(Arc::clone)
            .ok_or(StoreError::UnknownDataset(dataset))
    }
}

impl Default for InMemoryResultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultStore for InMemoryResultStore {
    fn create(
        &self,
        protocol_id: &str,
        plate_id: &str,
        measurement_id: &str,
    ) -> Result<DatasetId, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let dataset = ResultDataset {
            id,
            protocol_id: protocol_id.to_string(),
            plate_id: plate_id.to_string(),
            measurement_id: measurement_id.to_string(),
            state: DatasetState::Created,
            results: BTreeMap::new(),
        };
        self.datasets
            .write()
            .insert(id, Arc::new(Mutex::new(dataset)));
        debug!(dataset_id = id, protocol_id, plate_id, measurement_id, "Result dataset created");
        Ok(id)
    }

    fn add_result(
        &self,
        dataset: DatasetId,
        feature_id: &str,
        values: Option<WellValues>,
        status: FeatureStatus,
    ) -> Result<(), StoreError> {
        let entry = self.entry(dataset)?;
        let mut ds = entry.lock();
        if ds.state.is_finished() {
            return Err(StoreError::AlreadyFinished(dataset));
        }
        if ds.results.contains_key(feature_id) {
            return Err(StoreError::DuplicateFeature {
                dataset,
                feature: feature_id.to_string(),
            });
        }
        ds.results
            .insert(feature_id.to_string(), FeatureResult { values, status });
        ds.state = DatasetState::InProgress;
        Ok(())
    }

    fn finish(&self, dataset: DatasetId, outcome: Outcome) -> Result<(), StoreError> {
        let entry = self.entry(dataset)?;
        let mut ds = entry.lock();
        if ds.state.is_finished() {
            return Err(StoreError::AlreadyFinished(dataset));
        }
        ds.state = DatasetState::Finished(outcome);
        debug!(dataset_id = dataset, %outcome, features = ds.results.len(), "Result dataset finished");
        Ok(())
    }

    fn get_result(&self, dataset: DatasetId, feature_id: &str) -> Result<FeatureResult, StoreError> {
        let entry = self.entry(dataset)?;
        let ds = entry.lock();
        ds.results
            .get(feature_id)
            .cloned()
            .ok_or_else(|| StoreError::NotRecorded {
                dataset,
                feature: feature_id.to_string(),
            })
    }

    fn dataset(&self, dataset: DatasetId) -> Result<ResultDataset, StoreError> {
        Ok(self.entry(dataset)?.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platecalc_core::status::StatusCode;

    fn values(v: &[f64]) -> Option<WellValues> {
        Some(Arc::from(v))
    }

    #[test]
    fn lifecycle_created_in_progress_finished() {
        let store = InMemoryResultStore::new();
        let id = store.create("PR", "P", "M").unwrap();
        assert_eq!(store.dataset(id).unwrap().state, DatasetState::Created);

        store
            .add_result(id, "f1", values(&[1.0, 2.0]), FeatureStatus::ok())
            .unwrap();
        assert_eq!(store.dataset(id).unwrap().state, DatasetState::InProgress);

        store.finish(id, Outcome::Success).unwrap();
        let ds = store.dataset(id).unwrap();
        assert_eq!(ds.outcome(), Some(Outcome::Success));
        assert_eq!(ds.results.len(), 1);
    }

    #[test]
    fn feature_entries_are_write_once() {
        let store = InMemoryResultStore::new();
        let id = store.create("PR", "P", "M").unwrap();
        store.add_result(id, "f1", values(&[1.0]), FeatureStatus::ok()).unwrap();
        let err = store
            .add_result(id, "f1", values(&[9.0]), FeatureStatus::ok())
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateFeature { .. }));
        assert_eq!(store.get_result(id, "f1").unwrap().values, values(&[1.0]));
    }

    #[test]
    fn finished_dataset_is_immutable() {
        let store = InMemoryResultStore::new();
        let id = store.create("PR", "P", "M").unwrap();
        store.finish(id, Outcome::Failure).unwrap();
        assert_eq!(
            store.add_result(id, "f1", None, FeatureStatus::failed(StatusCode::Cancelled, "late")),
            Err(StoreError::AlreadyFinished(id))
        );
        assert_eq!(store.finish(id, Outcome::Success), Err(StoreError::AlreadyFinished(id)));
        assert_eq!(store.dataset(id).unwrap().outcome(), Some(Outcome::Failure));
    }

    #[test]
    fn results_readable_in_any_state() {
        let store = InMemoryResultStore::new();
        let id = store.create("PR", "P", "M").unwrap();
        assert!(matches!(
            store.get_result(id, "f1"),
            Err(StoreError::NotRecorded { .. })
        ));
        store
            .add_result(
                id,
                "f1",
                None,
                FeatureStatus::failed(StatusCode::EvaluationFault, "division by zero at well #3"),
            )
            .unwrap();
        let result = store.get_result(id, "f1").unwrap();
        assert_eq!(result.status.code, StatusCode::EvaluationFault);
        store.finish(id, Outcome::Failure).unwrap();
        assert!(store.get_result(id, "f1").is_ok());
    }

    #[test]
    fn unknown_dataset() {
        let store = InMemoryResultStore::new();
        assert!(store.is_empty());
        assert_eq!(store.finish(42, Outcome::Success), Err(StoreError::UnknownDataset(42)));
    }

    #[test]
    fn concurrent_writes_for_one_feature_admit_exactly_one() {
        let store = Arc::new(InMemoryResultStore::new());
        let id = store.create("PR", "P", "M").unwrap();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .add_result(id, "shared", values(&[f64::from(i)]), FeatureStatus::ok())
                        .is_ok()
                })
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
    }

    #[test]
    fn dataset_serializes_without_missing_values() {
        let store = InMemoryResultStore::new();
        let id = store.create("PR", "P", "M").unwrap();
        store
            .add_result(id, "f1", None, FeatureStatus::failed(StatusCode::MissingInput, "missing column `raw`"))
            .unwrap();
        let json = serde_json::to_value(store.dataset(id).unwrap()).unwrap();
        assert!(json["results"]["f1"].get("values").is_none());
        assert_eq!(json["results"]["f1"]["status"]["code"], "MISSING_INPUT");
        assert_eq!(json["state"], "IN_PROGRESS");
    }
}

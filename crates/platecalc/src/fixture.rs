//! JSON fixture backing every collaborator of a run.
//!
//! A fixture holds plates, measurements with their well data, protocols and
//! the formula catalog:
//!
//! ```json
//! {
//!   "format": 1,
//!   "plates": [{ "id": "P1", "rows": 2, "columns": 2 }],
//!   "measurements": [{ "id": "M1", "plate_id": "P1", "data": { "signal": [1, 2, 3, 4] } }],
//!   "protocols": [{ "id": "PR1", "stages": ["raw"], "features": [...] }],
//!   "formulas": [{ "id": "f", "name": "f", "category": "raw", "body": {...} }]
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use platecalc_core::formula::Formula;
use platecalc_core::model::{Measurement, Plate, Protocol};
use platecalc_orchestration::catalog::InMemoryFormulaCatalog;
use platecalc_orchestration::interfaces::{
    Entity, MeasurementResolver, PlateResolver, ProtocolResolver, ResolveError,
};
use platecalc_orchestration::resolution::Resolvers;

/// Fixture format this build reads.
pub const FORMAT_VERSION: u32 = 1;

/// A fixture file that cannot be used.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("cannot read fixture {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse fixture {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("unsupported fixture format {0} (expected {FORMAT_VERSION})")]
    Format(u32),

    #[error("duplicate {kind} `{id}` in fixture")]
    Duplicate { kind: &'static str, id: String },
}

/// A measurement with its well data columns.
#[derive(Debug, Clone, Deserialize)]
pub struct MeasurementRecord {
    pub id: String,
    pub plate_id: String,
    /// Column name to one value per well.
    #[serde(default)]
    pub data: BTreeMap<String, Vec<f64>>,
}

/// Parsed fixture file.
#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    #[serde(default = "default_format")]
    pub format: u32,
    #[serde(default)]
    pub plates: Vec<Plate>,
    #[serde(default)]
    pub measurements: Vec<MeasurementRecord>,
    #[serde(default)]
    pub protocols: Vec<Protocol>,
    #[serde(default)]
    pub formulas: Vec<Formula>,
}

fn default_format() -> u32 {
    FORMAT_VERSION
}

impl Fixture {
    /// Read and parse a fixture file.
    ///
    /// # Errors
    ///
    /// Returns a `FixtureError` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let text = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| FixtureError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Index the fixture into resolvers and a formula catalog.
    ///
    /// # Errors
    ///
    /// Returns a `FixtureError` for an unsupported format or duplicate ids.
    pub fn into_resolvers(self) -> Result<Resolvers, FixtureError> {
        if self.format != FORMAT_VERSION {
            return Err(FixtureError::Format(self.format));
        }
        let data = FixtureData {
            plates: index("plate", self.plates, |p| p.id.clone())?,
            protocols: index("protocol", self.protocols, |p| p.id.clone())?,
            measurements: index("measurement", self.measurements, |m| m.id.clone())?,
        };
        let data = Arc::new(data);
        let catalog: InMemoryFormulaCatalog = self.formulas.into_iter().collect();
        Ok(Resolvers {
            plates: data.clone(),
            protocols: data.clone(),
            measurements: data,
            formulas: Arc::new(catalog),
        })
    }
}

fn index<T>(
    kind: &'static str,
    items: Vec<T>,
    key: impl Fn(&T) -> String,
) -> Result<HashMap<String, T>, FixtureError> {
    let mut map = HashMap::with_capacity(items.len());
    for item in items {
        let id = key(&item);
        if map.contains_key(&id) {
            return Err(FixtureError::Duplicate { kind, id });
        }
        map.insert(id, item);
    }
    Ok(map)
}

struct FixtureData {
    plates: HashMap<String, Plate>,
    protocols: HashMap<String, Protocol>,
    measurements: HashMap<String, MeasurementRecord>,
}

impl PlateResolver for FixtureData {
    fn plate(&self, plate_id: &str) -> Result<Plate, ResolveError> {
        self.plates
            .get(plate_id)
            .cloned()
            .ok_or_else(|| ResolveError::not_found(Entity::Plate, plate_id))
    }
}

impl ProtocolResolver for FixtureData {
    fn protocol(&self, protocol_id: &str) -> Result<Protocol, ResolveError> {
        self.protocols
            .get(protocol_id)
            .cloned()
            .ok_or_else(|| ResolveError::not_found(Entity::Protocol, protocol_id))
    }
}

impl MeasurementResolver for FixtureData {
    fn measurement(&self, measurement_id: &str) -> Result<Measurement, ResolveError> {
        let record = self
            .measurements
            .get(measurement_id)
            .ok_or_else(|| ResolveError::not_found(Entity::Measurement, measurement_id))?;
        Ok(Measurement {
            id: record.id.clone(),
            plate_id: record.plate_id.clone(),
            columns: record.data.keys().cloned().collect(),
        })
    }

    fn well_data(&self, measurement_id: &str, column: &str) -> Result<Vec<f64>, ResolveError> {
        self.measurements
            .get(measurement_id)
            .and_then(|m| m.data.get(column))
            .cloned()
            .ok_or_else(|| {
                ResolveError::not_found(Entity::WellData, format!("{measurement_id}/{column}"))
            })
    }
}

//! Resolution of external inputs with per-call timeouts and bounded retry.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use platecalc_core::formula::Formula;
use platecalc_core::model::{Measurement, Plate, Protocol, WellValues};
use platecalc_core::options::RetryPolicy;

use crate::interfaces::{
    Entity, FormulaCatalog, MeasurementResolver, PlateResolver, ProtocolResolver, ResolveError,
};
use crate::retry::{call_with_timeout, with_retry};

/// The external collaborators a run resolves its inputs from.
#[derive(Clone)]
pub struct Resolvers {
    pub plates: Arc<dyn PlateResolver>,
    pub protocols: Arc<dyn ProtocolResolver>,
    pub measurements: Arc<dyn MeasurementResolver>,
    pub formulas: Arc<dyn FormulaCatalog>,
}

/// Wraps every collaborator call in a timeout and retries transient failures.
#[derive(Clone)]
pub struct ResolutionClient {
    resolvers: Resolvers,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ResolutionClient {
    #[must_use]
    pub fn new(resolvers: Resolvers, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            resolvers,
            timeout,
            retry,
        }
    }

    fn resolve<T, F>(&self, entity: Entity, id: &str, call: F) -> Result<T, ResolveError>
    where
        T: Send + 'static,
        F: Fn() -> Result<T, ResolveError> + Clone + Send + 'static,
    {
        let what = format!("resolve {entity} {id}");
        with_retry(&self.retry, &what, |attempt| {
            debug!(%entity, id, attempt, "Resolving");
            call_with_timeout(self.timeout, entity, id, call.clone())
        })
    }

    pub fn plate(&self, plate_id: &str) -> Result<Plate, ResolveError> {
        let plates = Arc::clone(&self.resolvers.plates);
        let id = plate_id.to_string();
        self.resolve(Entity::Plate, plate_id, move || plates.plate(&id))
    }

    pub fn protocol(&self, protocol_id: &str) -> Result<Protocol, ResolveError> {
        let protocols = Arc::clone(&self.resolvers.protocols);
        let id = protocol_id.to_string();
        self.resolve(Entity::Protocol, protocol_id, move || protocols.protocol(&id))
    }

    pub fn measurement(&self, measurement_id: &str) -> Result<Measurement, ResolveError> {
        let measurements = Arc::clone(&self.resolvers.measurements);
        let id = measurement_id.to_string();
        self.resolve(Entity::Measurement, measurement_id, move || {
            measurements.measurement(&id)
        })
    }

    /// Fetch one column of well data.
    pub fn well_data(&self, measurement_id: &str, column: &str) -> Result<WellValues, ResolveError> {
        let measurements = Arc::clone(&self.resolvers.measurements);
        let (mid, col) = (measurement_id.to_string(), column.to_string());
        let key = format!("{measurement_id}/{column}");
        self.resolve(Entity::WellData, &key, move || {
            measurements.well_data(&mid, &col).map(WellValues::from)
        })
    }

    /// Formulas of one category.
    pub fn formulas(&self, category: &str) -> Result<Vec<Formula>, ResolveError> {
        let formulas = Arc::clone(&self.resolvers.formulas);
        let cat = category.to_string();
        self.resolve(Entity::Formulas, category, move || {
            formulas.formulas_by_category(&cat)
        })
    }
}

//! # platecalc-orchestration
//!
//! Input resolution with timeouts and retry, result dataset lifecycle, and
//! stage-ordered parallel calculation runs.

pub mod catalog;
pub mod context;
pub mod error;
pub mod interfaces;
pub mod orchestrator;
pub mod report;
pub mod resolution;
pub mod retry;
pub mod store;

pub use catalog::InMemoryFormulaCatalog;
pub use error::CalcError;
pub use interfaces::{
    DatasetId, Entity, FormulaCatalog, MeasurementResolver, PlateResolver, ProtocolResolver,
    ResolveError, ResultPresenter, ResultStore, Retryable, StoreError,
};
pub use orchestrator::{Orchestrator, RunRequest};
pub use report::{AbortReason, FeatureReport, RunReport};
pub use resolution::{ResolutionClient, Resolvers};
pub use store::{FeatureResult, InMemoryResultStore, ResultDataset};

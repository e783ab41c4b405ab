//! platecalc library: application logic for the plate calculation CLI.

pub mod app;
pub mod config;
pub mod errors;
pub mod fixture;
pub mod version;

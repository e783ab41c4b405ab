//! # platecalc-cli
//!
//! Console presentation of calculation runs and plans, report files, and
//! shell completion.

pub mod completion;
pub mod output;
pub mod presenter;
pub mod ui;

pub use presenter::CLIResultPresenter;

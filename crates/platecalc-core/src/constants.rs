//! Constants for run limits, retry behavior, and exit codes.

use std::time::Duration;

/// Default number of worker threads evaluating features within a stage.
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Default timeout applied to each external resolution or fetch call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Default ceiling for the cumulative duration of a whole run.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(300);

/// Default number of attempts (first call included) for transient failures.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Upper bound on any single backoff delay.
pub const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Multiplier applied to the backoff after each failed attempt.
pub const RETRY_BACKOFF_FACTOR: u32 = 2;

/// Standard 96-well plate: 8 rows.
pub const DEFAULT_PLATE_ROWS: usize = 8;

/// Standard 96-well plate: 12 columns.
pub const DEFAULT_PLATE_COLUMNS: usize = 12;

/// Process exit codes.
pub mod exit_codes {
    /// Run completed with outcome SUCCESS.
    pub const SUCCESS: i32 = 0;
    /// Generic error, or run completed with outcome FAILURE.
    pub const ERROR_GENERIC: i32 = 1;
    /// Run exceeded its time ceiling.
    pub const ERROR_TIMEOUT: i32 = 2;
    /// Run completed with outcome PARTIAL_FAILURE.
    pub const PARTIAL_FAILURE: i32 = 3;
    /// Invalid configuration or fixture.
    pub const ERROR_CONFIG: i32 = 4;
    /// Plate, protocol, or measurement could not be resolved.
    pub const ERROR_UNRESOLVABLE: i32 = 5;
    /// Run cancelled by user (Ctrl+C).
    pub const ERROR_CANCELED: i32 = 130;
}

//! Application configuration from CLI flags and environment.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use platecalc_core::options::{RetryPolicy, RunOptions};
use platecalc_orchestration::orchestrator::RunRequest;

/// Invalid or incomplete command line.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid duration `{value}` for {flag} (expected e.g. 500ms, 30s, 5m, 1h)")]
    InvalidDuration { flag: &'static str, value: String },
}

/// platecalc: run protocol calculations against measured plate data.
#[derive(Parser, Debug)]
#[command(name = "platecalc", version, long_version = crate::version::LONG_VERSION, about)]
pub struct AppConfig {
    /// JSON fixture with plates, measurements, protocols and formulas.
    #[arg(short, long, env = "PLATECALC_FIXTURE")]
    pub fixture: Option<PathBuf>,

    /// Plate id.
    #[arg(short, long, env = "PLATECALC_PLATE")]
    pub plate: Option<String>,

    /// Measurement id.
    #[arg(short, long, env = "PLATECALC_MEASUREMENT")]
    pub measurement: Option<String>,

    /// Protocol id.
    #[arg(short = 'r', long, env = "PLATECALC_PROTOCOL")]
    pub protocol: Option<String>,

    /// Validate the protocol and print its stage order without evaluating.
    #[arg(long)]
    pub plan_only: bool,

    /// Worker threads evaluating the features of a stage.
    #[arg(short, long, default_value = "4", env = "PLATECALC_WORKERS")]
    pub workers: usize,

    /// Timeout for each resolver call (e.g. "500ms", "10s").
    #[arg(long, default_value = "10s", env = "PLATECALC_CALL_TIMEOUT")]
    pub call_timeout: String,

    /// Ceiling for the whole run (e.g. "5m", "1h").
    #[arg(long, default_value = "5m", env = "PLATECALC_RUN_TIMEOUT")]
    pub run_timeout: String,

    /// Total attempts for transient resolver and store failures.
    #[arg(long, default_value = "3", env = "PLATECALC_RETRIES")]
    pub retries: u32,

    /// Delay before the first retry; doubles on each further retry.
    #[arg(long, default_value = "100ms", env = "PLATECALC_BACKOFF")]
    pub backoff: String,

    /// Write the run report as JSON to this path.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write calculation events as JSON lines to this path.
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// Verbose output (feature values, INFO logging).
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode (only print the outcome).
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Generate shell completion.
    #[arg(long, value_enum)]
    pub completion: Option<clap_complete::Shell>,
}

impl AppConfig {
    /// Parse CLI arguments.
    #[must_use]
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Run options from the timeout, worker and retry flags.
    pub fn run_options(&self) -> Result<RunOptions, ConfigError> {
        let call_timeout = duration_arg("--call-timeout", &self.call_timeout)?;
        let run_timeout = duration_arg("--run-timeout", &self.run_timeout)?;
        let backoff = duration_arg("--backoff", &self.backoff)?;
        Ok(RunOptions {
            worker_threads: self.workers,
            call_timeout,
            run_timeout,
            retry: RetryPolicy {
                max_attempts: self.retries,
                initial_backoff: backoff,
                ..RetryPolicy::default()
            },
        }
        .normalize())
    }

    /// The (plate, measurement, protocol) triple to run.
    pub fn request(&self) -> Result<RunRequest, ConfigError> {
        Ok(RunRequest::new(
            self.plate.as_deref().ok_or(ConfigError::Missing("--plate"))?,
            self.measurement
                .as_deref()
                .ok_or(ConfigError::Missing("--measurement"))?,
            self.protocol
                .as_deref()
                .ok_or(ConfigError::Missing("--protocol"))?,
        ))
    }
}

fn duration_arg(flag: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value).ok_or_else(|| ConfigError::InvalidDuration {
        flag,
        value: value.to_string(),
    })
}

/// Parse a duration string like "500ms", "30s", "5m", "1h". Bare numbers are seconds.
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        Some(Duration::from_millis(ms.parse().ok()?))
    } else if let Some(mins) = s.strip_suffix('m') {
        let n: u64 = mins.parse().ok()?;
        Some(Duration::from_secs(n.checked_mul(60)?))
    } else if let Some(hours) = s.strip_suffix('h') {
        let n: u64 = hours.parse().ok()?;
        Some(Duration::from_secs(n.checked_mul(3600)?))
    } else if let Some(secs) = s.strip_suffix('s') {
        Some(Duration::from_secs(secs.parse().ok()?))
    } else {
        Some(Duration::from_secs(s.parse().ok()?))
    }
}

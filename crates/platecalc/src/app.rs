//! Application entry point and dispatch.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use tracing::info;

use platecalc_cli::output::write_report;
use platecalc_cli::presenter::CLIResultPresenter;
use platecalc_core::cancel::CancellationToken;
use platecalc_core::constants::exit_codes;
use platecalc_core::events::{CalculationEvent, EventEmitter};
use platecalc_core::sinks::{ChannelEventSink, LoggingEventSink};
use platecalc_orchestration::interfaces::ResultPresenter;
use platecalc_orchestration::orchestrator::Orchestrator;
use platecalc_orchestration::store::InMemoryResultStore;

use crate::config::{AppConfig, ConfigError};
use crate::errors::outcome_exit_code;
use crate::fixture::Fixture;

/// Buffered events between the run and the events file writer.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Run the application and return the process exit code.
pub fn run(config: &AppConfig) -> Result<i32> {
    // Handle shell completion
    if let Some(shell) = config.completion {
        let mut cmd = <AppConfig as clap::CommandFactory>::command();
        platecalc_cli::completion::generate_completion(&mut cmd, shell, &mut std::io::stdout());
        return Ok(exit_codes::SUCCESS);
    }

    let fixture_path = config
        .fixture
        .as_deref()
        .ok_or(ConfigError::Missing("--fixture"))?;
    let options = config.run_options()?;
    let resolvers = Fixture::load(fixture_path)?.into_resolvers()?;
    let store = Arc::new(InMemoryResultStore::new());
    let orchestrator = Orchestrator::new(resolvers, store, options)?;
    let presenter = CLIResultPresenter::new(config.verbose, config.quiet);

    if config.plan_only {
        let protocol = config
            .protocol
            .as_deref()
            .ok_or(ConfigError::Missing("--protocol"))?;
        let plan = orchestrator.plan(protocol)?;
        presenter.present_plan(&plan);
        return Ok(exit_codes::SUCCESS);
    }

    run_calculation(config, &orchestrator, &presenter)
}

fn run_calculation(
    config: &AppConfig,
    orchestrator: &Orchestrator,
    presenter: &CLIResultPresenter,
) -> Result<i32> {
    let request = config.request()?;
    let emitter = orchestrator.emitter();
    emitter.register(Arc::new(LoggingEventSink::new()));
    let event_log = config
        .events
        .as_deref()
        .map(|path| spawn_event_log(path, emitter))
        .transpose()?;

    let cancel = CancellationToken::new();
    ctrlc_handler(cancel.clone())?;

    let result = orchestrator.run(&request, &cancel);

    // Dropping the sinks closes the channel and lets the writer finish.
    emitter.clear();
    if let Some(handle) = event_log {
        let written = handle
            .join()
            .map_err(|_| anyhow::anyhow!("event log writer panicked"))?
            .context("writing events file")?;
        info!(events = written, "Event log written");
    }

    let report = result?;
    presenter.present_report(&report);

    if let Some(path) = &config.output {
        write_report(path, &report)
            .with_context(|| format!("writing report to {}", path.display()))?;
    }

    Ok(outcome_exit_code(&report))
}

/// Stream events to `path` as JSON lines on a dedicated thread.
fn spawn_event_log(
    path: &Path,
    emitter: &EventEmitter,
) -> Result<JoinHandle<std::io::Result<usize>>> {
    let file = File::create(path)
        .with_context(|| format!("creating events file {}", path.display()))?;
    let (tx, rx) = crossbeam_channel::bounded::<CalculationEvent>(EVENT_CHANNEL_CAPACITY);
    emitter.register(Arc::new(ChannelEventSink::new(tx)));

    let handle = std::thread::Builder::new()
        .name("platecalc-events".into())
        .spawn(move || {
            let mut writer = BufWriter::new(file);
            let mut written = 0;
            for event in rx {
                serde_json::to_writer(&mut writer, &event)?;
                writeln!(writer)?;
                written += 1;
            }
            writer.flush()?;
            Ok(written)
        })
        .context("spawning event log writer")?;
    Ok(handle)
}

fn ctrlc_handler(cancel: CancellationToken) -> Result<()> {
    ctrlc::set_handler(move || {
        cancel.cancel();
    })
    .context("installing Ctrl-C handler")
}

//! platecalc: plate calculation engine.

use platecalc_cli::presenter::CLIResultPresenter;
use platecalc_lib::{app, config, errors};
use platecalc_orchestration::interfaces::ResultPresenter;

fn main() {
    let config = config::AppConfig::parse();

    let level = if config.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let code = match app::run(&config) {
        Ok(code) => code,
        Err(err) => {
            CLIResultPresenter::new(config.verbose, config.quiet).present_error(&format!("{err:#}"));
            errors::handle_error(&err)
        }
    };
    std::process::exit(code);
}

//! CLI result presenter.

use platecalc_core::plan::ExecutionPlan;
use platecalc_core::status::Outcome;
use platecalc_orchestration::interfaces::ResultPresenter;
use platecalc_orchestration::report::RunReport;

use crate::output::{format_duration, render_plan, render_report};
use crate::ui;

/// CLI result presenter.
pub struct CLIResultPresenter {
    verbose: bool,
    quiet: bool,
}

impl CLIResultPresenter {
    #[must_use]
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }
}

/// One-line summary of a finished run.
#[must_use]
pub fn summary(report: &RunReport) -> String {
    let mut line = format!(
        "{} of {} features succeeded in {} (dataset {})",
        report.succeeded(),
        report.features.len(),
        format_duration(report.duration),
        report.dataset_id
    );
    if report.abort.is_some() && report.outcome == Outcome::Failure {
        line.push_str(", run aborted");
    }
    line
}

impl ResultPresenter for CLIResultPresenter {
    fn present_report(&self, report: &RunReport) {
        if self.quiet {
            println!("{}", report.outcome);
            return;
        }

        ui::print_header(&format!(
            "Plate {} / Measurement {} / Protocol {}",
            report.plate_id, report.measurement_id, report.protocol_id
        ));
        print!("{}", render_report(report, self.verbose));
        ui::print_outcome(report.outcome, &summary(report));
    }

    fn present_plan(&self, plan: &ExecutionPlan) {
        if self.quiet {
            return;
        }
        ui::print_header(&format!(
            "Protocol {}: {} stages, {} features",
            plan.protocol_id(),
            plan.stages().len(),
            plan.feature_count()
        ));
        print!("{}", render_plan(plan));
    }

    fn present_error(&self, error: &str) {
        ui::print_error(error);
    }
}

//! CLI output formatting and report files.

use std::fmt::Write as _;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use platecalc_core::plan::ExecutionPlan;
use platecalc_orchestration::report::RunReport;

/// Number of well values shown before truncating.
const VALUES_PREVIEW: usize = 6;

/// Format a duration for display.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 0.001 {
        format!("{:.2}µs", secs * 1_000_000.0)
    } else if secs < 1.0 {
        format!("{:.2}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{secs:.3}s")
    } else {
        let mins = (secs / 60.0).floor() as u64;
        let remaining = secs - (mins as f64 * 60.0);
        format!("{mins}m{remaining:.1}s")
    }
}

/// Format well values, truncated unless `verbose`.
#[must_use]
pub fn format_values(values: &[f64], verbose: bool) -> String {
    let shown = if verbose {
        values.len()
    } else {
        values.len().min(VALUES_PREVIEW)
    };
    let mut s = values[..shown]
        .iter()
        .map(|v| format!("{v:.4}"))
        .collect::<Vec<_>>()
        .join(", ");
    if shown < values.len() {
        let _ = write!(s, ", ... ({} wells)", values.len());
    }
    format!("[{s}]")
}

/// Render the per-feature table of a run.
#[must_use]
pub fn render_report(report: &RunReport, verbose: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<24} {:<14} {:<18} {:>10}",
        "FEATURE", "STAGE", "STATUS", "DURATION"
    );
    let _ = writeln!(out, "{:-<69}", "");
    for feature in &report.features {
        let _ = writeln!(
            out,
            "{:<24} {:<14} {:<18} {:>10}",
            feature.name,
            feature.stage,
            feature.status.code.as_str(),
            format_duration(feature.duration)
        );
        if !feature.status.message.is_empty() {
            let _ = writeln!(out, "    {}", feature.status.message);
        } else if verbose {
            if let Some(values) = &feature.values {
                let _ = writeln!(out, "    {}", format_values(values, true));
            }
        }
    }
    out
}

/// Render the stage order of a validated plan.
#[must_use]
pub fn render_plan(plan: &ExecutionPlan) -> String {
    let mut out = String::new();
    for stage in plan.stages() {
        let _ = writeln!(out, "Stage {} `{}`", stage.index + 1, stage.name);
        for planned in &stage.features {
            let mut inputs: Vec<&str> = planned.columns.iter().map(String::as_str).collect();
            inputs.extend(planned.dependencies.iter().map(String::as_str));
            let _ = writeln!(
                out,
                "  {:<24} {:<10} <- {}",
                planned.feature.name,
                planned.formula.body.kind(),
                inputs.join(", ")
            );
        }
    }
    out
}

/// Write the run report as pretty JSON.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be created or written.
pub fn write_report(path: &Path, report: &RunReport) -> io::Result<()> {
    let mut writer = BufWriter::new(std::fs::File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)?;
    writer.flush()
}

//! UI helpers for CLI display.

use console::style;

use platecalc_core::status::Outcome;

/// Check if color output is disabled via `NO_COLOR` env var.
#[must_use]
pub fn is_color_disabled() -> bool {
    std::env::var("NO_COLOR").is_ok()
}

/// Print a styled header.
pub fn print_header(text: &str) {
    if is_color_disabled() {
        println!("=== {text} ===");
    } else {
        println!("{}", style(format!("=== {text} ===")).bold().cyan());
    }
}

/// Print the terminal outcome of a run, colored by severity.
pub fn print_outcome(outcome: Outcome, detail: &str) {
    let tag = format!("[{outcome}]");
    if is_color_disabled() {
        println!("{tag} {detail}");
        return;
    }
    let tag = match outcome {
        Outcome::Success => style(tag).green().bold(),
        Outcome::PartialFailure => style(tag).yellow().bold(),
        Outcome::Failure => style(tag).red().bold(),
    };
    println!("{tag} {detail}");
}

/// Print an error message.
pub fn print_error(text: &str) {
    if is_color_disabled() {
        eprintln!("[ERROR] {text}");
    } else {
        eprintln!("{} {text}", style("[ERROR]").red().bold());
    }
}

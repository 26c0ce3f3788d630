use chinaland_core::BatchReport;
use owo_colors::OwoColorize;

use crate::VERSION;

/// Print a styled banner for verbose mode
pub fn print_banner() {
    eprintln!(
        "\n{} {} {}",
        "chinaland".bold().bright_blue(),
        "v".dimmed(),
        VERSION.dimmed()
    );
    eprintln!("{}", "中国土地 journal archive exporter\n".dimmed());
}

/// Print a styled step message
pub fn print_step(step: usize, total: usize, message: &str) {
    eprintln!("{} {}", format!("[{}/{}]", step, total).dimmed(), message.bright_cyan());
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green(), message.bright_green());
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue(), message.bright_blue());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message.bright_yellow());
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message.bright_red());
}

/// Print the outcome of a batch export: written files, then every failure.
pub fn print_report(report: &BatchReport) {
    for path in &report.written {
        print_success(&format!("Wrote {}", path.display().bright_white()));
    }

    if report.is_clean() {
        return;
    }

    eprintln!("\n{}", "═".repeat(60).dimmed());
    eprintln!("{}", "Failures".bold().red());
    eprintln!("{}", "═".repeat(60).dimmed());
    for failure in &report.failures {
        print_error(&failure.to_string());
    }
    eprintln!();
    print_warning(&format!(
        "{} written, {} failed",
        report.written.len(),
        report.failures.len()
    ));
}

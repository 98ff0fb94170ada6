//! The `examtally run` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use examtally_core::report::AggregationReport;
use examtally_core::statistics::{format_clock_ms, standard_accuracy_per_user, NOT_APPLICABLE};
use examtally_report::{
    append_standard_accuracy, write_general_statistics, write_html_report, write_user_csvs,
};
use examtally_transcribe::config::load_config_from;

use super::{aggregate, load_catalog};

const FORMATS: [&str; 3] = ["json", "csv", "html"];

pub fn execute(
    input: PathBuf,
    catalog_path: Option<PathBuf>,
    grades: Option<PathBuf>,
    output: Option<PathBuf>,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let formats: Vec<&str> = if format == "all" {
        FORMATS.to_vec()
    } else {
        format.split(',').map(str::trim).collect()
    };
    for fmt in &formats {
        anyhow::ensure!(
            FORMATS.contains(fmt),
            "unknown format '{fmt}' (expected json, csv, html or all)"
        );
    }

    let catalog = load_catalog(catalog_path.as_deref(), config.catalog.as_deref())?;
    let aggregated = aggregate(&input, &catalog, grades.as_deref())?;
    let report = AggregationReport::new(
        input.display().to_string(),
        aggregated.catalog_size,
        aggregated.users,
        aggregated.grades_applied,
    );

    eprintln!(
        "examtally v{}: {} users ({} submitted, {} in progress)",
        env!("CARGO_PKG_VERSION"),
        report.summary.total_users,
        report.summary.submitted_users,
        report.summary.in_progress_users
    );
    if report.grades_applied > 0 {
        eprintln!("Manual grades changed {} answer(s)", report.grades_applied);
    }
    print_summary(&report);

    let output = output.unwrap_or(config.output_dir);
    std::fs::create_dir_all(&output)?;

    for fmt in &formats {
        match *fmt {
            "json" => {
                let path = output.join("report.json");
                report.save_json(&path)?;
                eprintln!("Results saved to: {}", path.display());
            }
            "csv" => {
                let users = write_user_csvs(report.users.values(), &output)?;
                write_general_statistics(
                    &report.summary.to_table(),
                    report.users.values(),
                    &output,
                )?;
                // Fresh file per run; `examtally accuracy` is the appending entry point.
                append_standard_accuracy(
                    &standard_accuracy_per_user(report.users.values()),
                    &output
                        .join("general_statistics")
                        .join("standard_accuracy_per_user.csv"),
                    true,
                )?;
                eprintln!("CSV reports for {users} user(s): {}", output.display());
            }
            "html" => {
                let path = output.join("report.html");
                write_html_report(&report, &path)?;
                eprintln!("HTML report: {}", path.display());
            }
            other => anyhow::bail!("unknown format: {other}"),
        }
    }

    Ok(())
}

fn print_summary(report: &AggregationReport) {
    let mut table = Table::new();
    table.set_header(vec![
        "Slice",
        "Correct",
        "Incorrect",
        "Accuracy",
        "Answers",
        "Avg Time",
    ]);

    for (label, slice) in report.summary.labelled_slices() {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(slice.accuracy.correct),
            Cell::new(slice.accuracy.incorrect),
            Cell::new(
                slice
                    .accuracy
                    .accuracy()
                    .map_or_else(|| NOT_APPLICABLE.to_string(), |a| format!("{:.1}%", a * 100.0)),
            ),
            Cell::new(slice.timing.answers),
            Cell::new(
                slice
                    .timing
                    .mean_ms()
                    .map_or_else(|| NOT_APPLICABLE.to_string(), format_clock_ms),
            ),
        ]);
    }

    eprintln!("\n{table}");
}

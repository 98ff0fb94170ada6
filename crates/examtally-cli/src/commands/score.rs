//! The `examtally score` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use examtally_core::statistics::score;
use examtally_transcribe::config::load_config_from;

use super::{aggregate, load_catalog};

pub fn execute(
    input: PathBuf,
    catalog_path: Option<PathBuf>,
    grades: Option<PathBuf>,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let catalog = load_catalog(catalog_path.as_deref(), config.catalog.as_deref())?;
    let aggregated = aggregate(&input, &catalog, grades.as_deref())?;
    let summary = score(aggregated.users.values());

    match format.as_str() {
        "text" => {
            for (metric, value) in summary.to_table().iter() {
                println!("{metric}: {value}");
            }
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        "table" => {
            let mut table = Table::new();
            table.set_header(vec!["Metric", "Value"]);
            for (metric, value) in summary.to_table().iter() {
                table.add_row(vec![Cell::new(metric), Cell::new(value)]);
            }
            println!("{table}");
        }
        other => anyhow::bail!("unknown format '{other}' (expected text, json or table)"),
    }

    Ok(())
}

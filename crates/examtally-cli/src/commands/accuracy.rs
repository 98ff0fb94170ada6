//! The `examtally accuracy` command.

use std::path::PathBuf;

use anyhow::Result;

use examtally_core::statistics::standard_accuracy_per_user;
use examtally_report::append_standard_accuracy;
use examtally_transcribe::config::load_config_from;

use super::{aggregate, load_catalog};

pub fn execute(
    input: PathBuf,
    catalog_path: Option<PathBuf>,
    grades: Option<PathBuf>,
    output: PathBuf,
    truncate: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let catalog = load_catalog(catalog_path.as_deref(), config.catalog.as_deref())?;
    let aggregated = aggregate(&input, &catalog, grades.as_deref())?;
    let rows = standard_accuracy_per_user(aggregated.users.values());

    append_standard_accuracy(&rows, &output, truncate)?;

    let verb = if truncate { "Wrote" } else { "Appended" };
    println!("{verb} {} row(s) to {}", rows.len(), output.display());
    Ok(())
}

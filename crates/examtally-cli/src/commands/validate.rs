//! The `examtally validate` command.

use std::path::PathBuf;

use anyhow::Result;

use examtally_core::catalog::{validate_catalog, QuestionCatalog};

pub fn execute(catalog_path: Option<PathBuf>) -> Result<()> {
    let (name, catalog) = match &catalog_path {
        Some(path) => (path.display().to_string(), QuestionCatalog::load(path)?),
        None => ("built-in".to_string(), QuestionCatalog::builtin()),
    };

    println!("Catalog: {name} ({} questions)", catalog.len());

    let warnings = validate_catalog(&catalog);
    for w in &warnings {
        println!("  [{}] WARNING: {}", w.question_id, w.message);
    }

    if warnings.is_empty() {
        println!("Catalog valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}

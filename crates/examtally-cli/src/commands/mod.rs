pub mod accuracy;
pub mod init;
pub mod run;
pub mod score;
pub mod transcribe;
pub mod validate;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;

use examtally_core::aggregator::aggregate_export;
use examtally_core::catalog::QuestionCatalog;
use examtally_core::export::ExamExport;
use examtally_core::grading::apply_manual_grades;
use examtally_core::model::UserRecord;
use examtally_report::read_manual_grades;

/// Users aggregated from one export, with grade overrides applied.
pub struct Aggregated {
    pub users: BTreeMap<String, UserRecord>,
    pub catalog_size: usize,
    pub grades_applied: usize,
}

/// Catalog from the flag, else the config, else the built-in one.
pub fn load_catalog(flag: Option<&Path>, configured: Option<&Path>) -> Result<QuestionCatalog> {
    match flag.or(configured) {
        Some(path) => QuestionCatalog::load(path),
        None => Ok(QuestionCatalog::builtin()),
    }
}

/// Load, aggregate and regrade.
pub fn aggregate(
    input: &Path,
    catalog: &QuestionCatalog,
    grades_dir: Option<&Path>,
) -> Result<Aggregated> {
    let export = ExamExport::load(input)?;
    tracing::debug!(
        "{}: {} progress record(s), {} result record(s)",
        input.display(),
        export.progress.len(),
        export.results.len()
    );
    let users = aggregate_export(&export, catalog);

    let (users, grades_applied) = match grades_dir {
        Some(dir) => {
            let grades = read_manual_grades(dir)?;
            apply_manual_grades(&users, &grades)
        }
        None => (users, 0),
    };

    Ok(Aggregated {
        users,
        catalog_size: catalog.len(),
        grades_applied,
    })
}

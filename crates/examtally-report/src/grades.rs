//! Manual grade import from reviewed `answers.csv` sheets.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use examtally_core::grading::ManualGrades;

#[derive(Debug, Deserialize)]
struct GradeRow {
    #[serde(rename = "Question ID")]
    question_id: String,
    #[serde(rename = "Correct", default)]
    correct: String,
    #[serde(rename = "Wrong", default)]
    wrong: String,
}

impl GradeRow {
    /// Any non-blank mark counts. `Correct` wins when both are marked.
    fn verdict(&self) -> Option<bool> {
        if !self.correct.trim().is_empty() {
            Some(true)
        } else if !self.wrong.trim().is_empty() {
            Some(false)
        } else {
            None
        }
    }
}

/// Read one reviewed sheet into `(question_id, correct)` pairs.
///
/// Rows without a mark are skipped.
pub fn read_grade_sheet(path: &Path) -> Result<Vec<(String, bool)>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open grade sheet {}", path.display()))?;
    let mut verdicts = Vec::new();
    for row in reader.deserialize() {
        let row: GradeRow =
            row.with_context(|| format!("malformed grade row in {}", path.display()))?;
        if let Some(correct) = row.verdict() {
            verdicts.push((row.question_id.trim().to_string(), correct));
        }
    }
    Ok(verdicts)
}

/// Load every `<dir>/<userId>/answers.csv` below `dir`.
///
/// Directories without a sheet are ignored.
pub fn read_manual_grades(dir: &Path) -> Result<ManualGrades> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read grades directory {}", dir.display()))?;

    let mut grades = ManualGrades::new();
    let mut sheets = 0usize;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let sheet = entry.path().join("answers.csv");
        if !sheet.exists() {
            continue;
        }
        let user_id = entry.file_name().to_string_lossy().into_owned();
        for (question_id, correct) in read_grade_sheet(&sheet)? {
            grades.insert(&user_id, &question_id, correct);
        }
        sheets += 1;
    }

    tracing::info!(
        "loaded {} manual grade(s) from {sheets} sheet(s) in {}",
        grades.len(),
        dir.display()
    );
    Ok(grades)
}

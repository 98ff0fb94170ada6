//! Aggregation report with JSON persistence.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::UserRecord;
use crate::statistics::{score, user_scores, ScoreSummary, UserScore};

/// Everything one pipeline run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// The export the users were aggregated from.
    pub source: String,
    /// Number of questions in the catalog used.
    pub catalog_size: usize,
    /// Answers whose correctness came from manual grading.
    #[serde(default)]
    pub grades_applied: usize,
    pub users: BTreeMap<String, UserRecord>,
    pub summary: ScoreSummary,
}

impl AggregationReport {
    /// Score `users` and wrap the result.
    pub fn new(
        source: impl Into<String>,
        catalog_size: usize,
        users: BTreeMap<String, UserRecord>,
        grades_applied: usize,
    ) -> Self {
        let summary = score(users.values());
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            source: source.into(),
            catalog_size,
            grades_applied,
            users,
            summary,
        }
    }

    /// Per-user accuracy, best first.
    pub fn user_scores(&self) -> Vec<UserScore> {
        user_scores(self.users.values())
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: AggregationReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate_export;
    use crate::catalog::QuestionCatalog;
    use crate::export::ExamExport;
    use crate::model::{Correctness, Transcript};

    fn report() -> AggregationReport {
        let export = ExamExport::from_json_str(
            r#"{
                "examProgress": {"u1": {"submitted": true}},
                "examResults": {"u1": {"-A": {
                    "email": "u1@example.com",
                    "timeSpent": 300,
                    "answers": {
                        "section2_standard_Q1": {"text": "8", "timeToAnswerMs": 1200},
                        "section3_standard_Q1": {"audioUrl": "https://cdn/a.webm", "transcription": "TRANSCRIPTION_FAILED"}
                    },
                    "analysis": {"section2_standard_Q1": {"correct": true}}
                }}}
            }"#,
        )
        .unwrap();
        let catalog = QuestionCatalog::builtin();
        let users = aggregate_export(&export, &catalog);
        AggregationReport::new("final.json", catalog.len(), users, 0)
    }

    #[test]
    fn scores_on_construction() {
        let report = report();
        assert_eq!(report.summary.total_users, 1);
        assert_eq!(report.summary.overall.accuracy.correct, 1);
        assert_eq!(report.user_scores().len(), 1);
    }

    #[test]
    fn json_roundtrip() {
        let report = report();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");

        report.save_json(&path).unwrap();
        let loaded = AggregationReport::load_json(&path).unwrap();

        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.summary, report.summary);
        let user = &loaded.users["u1"];
        assert_eq!(
            user.answers["section2_standard_Q1"].is_correct,
            Correctness::Correct
        );
        let audio = user.answers["section3_standard_Q1"].audio.as_ref().unwrap();
        assert_eq!(audio.transcript, Transcript::Failed);
    }

    #[test]
    fn load_missing_file_names_path() {
        let err = AggregationReport::load_json(Path::new("/nonexistent/report.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/report.json"));
    }
}

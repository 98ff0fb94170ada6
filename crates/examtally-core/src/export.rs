//! Raw exam export model.
//!
//! Loads the exported JSON document (`examProgress`, `examResults`) into typed
//! records. Parsing is lenient: malformed numbers become absent, and a record
//! that cannot be parsed at all is logged and skipped instead of failing the
//! whole batch.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// One raw answer as stored in either section of the export.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAnswer {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub audio_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub audio_question_duration_ms: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub time_to_answer_ms: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub answered_at: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub question_displayed_at: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub transcription: Option<String>,
}

/// Per-question grading stored alongside a finalized result.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub correct: Option<bool>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub expected_answers: Vec<String>,
    /// The answer as graded; holds the transcript for audio answers.
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub user_answer: Option<String>,
}

/// A user's exam state captured before (or at) submission.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    /// Only a literal `true` counts as submitted.
    #[serde(default, deserialize_with = "lenient::strict_true")]
    pub submitted: bool,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub tab_change_count: Option<i64>,
    /// Epoch milliseconds.
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub start_timestamp: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub current_section: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub current_question_index: Option<i64>,
    #[serde(default, deserialize_with = "lenient::answer_map")]
    pub answers: BTreeMap<String, RawAnswer>,
}

/// The finalized, graded submission of a user.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub score: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub correct_answers: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub answered_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub total_questions: Option<i64>,
    /// Seconds.
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub time_spent: Option<f64>,
    /// ISO-8601 submission time.
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub tab_change_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient::answer_map")]
    pub answers: BTreeMap<String, RawAnswer>,
    #[serde(default, deserialize_with = "lenient::analysis_map")]
    pub analysis: BTreeMap<String, Analysis>,
}

/// Correctness and expected answers attached to a finalized answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GradingOutcome {
    /// `None` when the analysis entry carries no verdict.
    pub is_correct: Option<bool>,
    pub expected_answers: Vec<String>,
}

/// One source's view of a user's answer to a single question.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerEvent {
    pub text_response: Option<String>,
    pub audio_url: Option<String>,
    pub audio_duration_ms: Option<i64>,
    pub time_to_answer_ms: Option<i64>,
    pub answered_at: Option<i64>,
    pub question_displayed_at: Option<i64>,
    pub transcription_text: Option<String>,
    /// Only present on events from finalized results.
    pub grading: Option<GradingOutcome>,
}

impl From<&RawAnswer> for AnswerEvent {
    fn from(raw: &RawAnswer) -> Self {
        Self {
            text_response: raw.text.clone(),
            audio_url: raw.audio_url.clone(),
            audio_duration_ms: raw.audio_question_duration_ms,
            time_to_answer_ms: raw.time_to_answer_ms,
            answered_at: raw.answered_at,
            question_displayed_at: raw.question_displayed_at,
            transcription_text: raw.transcription.clone(),
            grading: None,
        }
    }
}

impl ProgressRecord {
    /// The in-progress event for a question, if one was recorded.
    pub fn event(&self, question_id: &str) -> Option<AnswerEvent> {
        self.answers.get(question_id).map(AnswerEvent::from)
    }
}

impl ResultRecord {
    /// The finalized event for a question.
    ///
    /// Combines `answers[qid]` with `analysis[qid]`. Audio answers without a
    /// stored transcription take the graded `userAnswer` as their transcript.
    /// A question that only appears in `analysis` becomes a text event whose
    /// response is the graded `userAnswer`, or a bare verdict when that is
    /// missing.
    pub fn event(&self, question_id: &str) -> Option<AnswerEvent> {
        let analysis = self.analysis.get(question_id);
        let grading = analysis.map(|a| GradingOutcome {
            is_correct: a.correct,
            expected_answers: a.expected_answers.clone(),
        });
        let graded_answer = analysis.and_then(|a| a.user_answer.clone());

        match self.answers.get(question_id) {
            Some(raw) => {
                let mut event = AnswerEvent::from(raw);
                let has_audio = event.audio_url.as_deref().is_some_and(|u| !u.is_empty());
                let has_transcript = event
                    .transcription_text
                    .as_deref()
                    .is_some_and(|t| !t.trim().is_empty());
                if has_audio && !has_transcript {
                    event.transcription_text = graded_answer;
                }
                event.grading = grading;
                Some(event)
            }
            None => analysis.map(|_| AnswerEvent {
                text_response: graded_answer,
                grading,
                ..Default::default()
            }),
        }
    }

    /// Every question id this record mentions.
    pub fn question_ids(&self) -> impl Iterator<Item = &String> {
        self.answers.keys().chain(self.analysis.keys())
    }
}

/// The parsed export: progress and (selected) result record per user.
#[derive(Debug, Clone, Default)]
pub struct ExamExport {
    pub progress: BTreeMap<String, ProgressRecord>,
    pub results: BTreeMap<String, ResultRecord>,
}

impl ExamExport {
    /// Load an export from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read export: {}", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("failed to parse export: {}", path.display()))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content).context("export is not valid JSON")?;
        Self::from_value(&value)
    }

    /// Build from an already-parsed document.
    pub fn from_value(document: &Value) -> Result<Self> {
        let root = document
            .as_object()
            .context("export root must be a JSON object")?;

        let mut export = ExamExport::default();

        if let Some(progress) = root.get("examProgress").and_then(Value::as_object) {
            for (user_id, record) in progress {
                match ProgressRecord::deserialize(record) {
                    Ok(parsed) => {
                        export.progress.insert(user_id.clone(), parsed);
                    }
                    Err(e) => tracing::warn!("skipping progress record for {user_id}: {e}"),
                }
            }
        }

        if let Some(results) = root.get("examResults").and_then(Value::as_object) {
            for (user_id, by_result_id) in results {
                let Some(by_result_id) = by_result_id.as_object() else {
                    tracing::warn!("skipping results for {user_id}: not an object");
                    continue;
                };
                // Result ids are chronological push ids; the earliest wins.
                let ordered: BTreeMap<&String, &Value> = by_result_id.iter().collect();
                if ordered.len() > 1 {
                    tracing::debug!(
                        "{user_id} has {} result records, using the earliest",
                        ordered.len()
                    );
                }
                let selected = ordered.into_iter().find_map(|(result_id, record)| {
                    match ResultRecord::deserialize(record) {
                        Ok(parsed) => Some(parsed),
                        Err(e) => {
                            tracing::warn!("skipping result {result_id} for {user_id}: {e}");
                            None
                        }
                    }
                });
                if let Some(record) = selected {
                    export.results.insert(user_id.clone(), record);
                }
            }
        }

        let orphans = export
            .results
            .keys()
            .filter(|id| !export.progress.contains_key(*id))
            .count();
        if orphans > 0 {
            tracing::warn!("{orphans} user(s) have results but no progress record; ignoring them");
        }

        Ok(export)
    }

    /// Ids of every user with a progress record.
    pub fn user_ids(&self) -> BTreeSet<&String> {
        self.progress.keys().collect()
    }
}

/// Coercing deserializers for loosely-typed export fields.
mod lenient {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::{Analysis, RawAnswer};

    fn to_i64(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                })
            }
            _ => None,
        }
    }

    pub fn opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(to_i64(&Value::deserialize(d)?))
    }

    pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|f| f.is_finite()))
    }

    pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn opt_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => Some(b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        })
    }

    pub fn strict_true<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(matches!(Value::deserialize(d)?, Value::Bool(true)))
    }

    pub fn text_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            Value::String(s) => vec![s],
            _ => Vec::new(),
        })
    }

    fn entries<'de, D, T>(d: D, what: &str) -> Result<BTreeMap<String, T>, D::Error>
    where
        D: Deserializer<'de>,
        T: serde::de::DeserializeOwned,
    {
        let Value::Object(map) = Value::deserialize(d)? else {
            return Ok(BTreeMap::new());
        };
        Ok(map
            .into_iter()
            .filter_map(|(question_id, entry)| match serde_json::from_value(entry) {
                Ok(parsed) => Some((question_id, parsed)),
                Err(e) => {
                    tracing::warn!("skipping malformed {what} for {question_id}: {e}");
                    None
                }
            })
            .collect())
    }

    pub fn answer_map<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<BTreeMap<String, RawAnswer>, D::Error> {
        entries(d, "answer")
    }

    pub fn analysis_map<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<BTreeMap<String, Analysis>, D::Error> {
        entries(d, "analysis")
    }
}

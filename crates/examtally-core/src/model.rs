//! Core data model types for examtally.
//!
//! These are the reconciled, immutable records the rest of the system
//! consumes: question definitions, canonical answers, and user records.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Value stored in place of a transcript when the speech-to-text step failed.
pub const TRANSCRIPTION_FAILED: &str = "TRANSCRIPTION_FAILED";

/// Question group, taken from the middle token of a question id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Demographic / meta questions. Never scored.
    Accommodation,
    /// Scored knowledge questions.
    Standard,
    /// Duplicate questions used as a consistency check.
    Control,
}

impl Category {
    /// Whether answers in this category count towards accuracy.
    pub fn is_scored(self) -> bool {
        !matches!(self, Category::Accommodation)
    }

    /// Derive the category from an id such as `section2_standard_Q1`.
    pub fn from_question_id(id: &str) -> Option<Self> {
        QuestionRef::parse(id).map(|r| r.category)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Accommodation => write!(f, "accommodation"),
            Category::Standard => write!(f, "standard"),
            Category::Control => write!(f, "control"),
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            // The exported exam spells it with a single "m".
            "accommodation" | "accomodation" => Ok(Category::Accommodation),
            "standard" => Ok(Category::Standard),
            "control" => Ok(Category::Control),
            other => Err(format!("unknown question category: {other}")),
        }
    }
}

/// The parts of a `section{n}_{category}_{Qk}` question id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRef {
    pub section: u32,
    pub category: Category,
    /// The trailing `Qk` token.
    pub ordinal: String,
}

impl QuestionRef {
    /// Parse a question id. Returns `None` for ids that do not follow the
    /// `section{n}_{category}_{Qk}` convention.
    pub fn parse(id: &str) -> Option<Self> {
        let mut parts = id.splitn(3, '_');
        let section = parts.next()?.strip_prefix("section")?.parse().ok()?;
        let category = parts.next()?.parse().ok()?;
        let ordinal = parts.next()?;
        if !ordinal.starts_with('Q') || ordinal.len() < 2 {
            return None;
        }
        Some(Self {
            section,
            category,
            ordinal: ordinal.to_string(),
        })
    }
}

/// How a question was presented to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresentationType {
    #[serde(alias = "blank")]
    FreeText,
    #[serde(alias = "multiple")]
    MultipleChoice,
    #[serde(alias = "audio")]
    SpokenResponse,
    /// The question id has no catalog entry.
    #[default]
    Unknown,
}

impl fmt::Display for PresentationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresentationType::FreeText => write!(f, "free-text"),
            PresentationType::MultipleChoice => write!(f, "multiple-choice"),
            PresentationType::SpokenResponse => write!(f, "spoken-response"),
            PresentationType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Static metadata for one exam question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionDefinition {
    /// `section{n}_{category}_{Qk}`.
    #[serde(default)]
    pub id: String,
    /// Text shown to the user.
    #[serde(alias = "question", alias = "prompt")]
    pub prompt_text: String,
    #[serde(rename = "type", default)]
    pub presentation_type: PresentationType,
    /// Text read aloud, only for spoken-response questions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tts_text: Option<String>,
    /// Acceptable correct answers, in preference order.
    #[serde(default, alias = "correct_answers", skip_serializing_if = "Vec::is_empty")]
    pub expected_answers: Vec<String>,
    /// Choices for multiple-choice questions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl QuestionDefinition {
    pub fn category(&self) -> Option<Category> {
        Category::from_question_id(&self.id)
    }
}

/// The input mode of an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Audio,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Text => write!(f, "text"),
            Modality::Audio => write!(f, "audio"),
        }
    }
}

/// Tri-state grading outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Correctness {
    Correct,
    Incorrect,
    /// No grading outcome exists for the answer.
    #[default]
    Unknown,
}

impl Correctness {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Correctness::Correct => Some(true),
            Correctness::Incorrect => Some(false),
            Correctness::Unknown => None,
        }
    }

    pub fn is_graded(self) -> bool {
        self != Correctness::Unknown
    }
}

impl From<Option<bool>> for Correctness {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Correctness::Correct,
            Some(false) => Correctness::Incorrect,
            None => Correctness::Unknown,
        }
    }
}

impl fmt::Display for Correctness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Correctness::Correct => write!(f, "correct"),
            Correctness::Incorrect => write!(f, "incorrect"),
            Correctness::Unknown => write!(f, "unknown"),
        }
    }
}

/// State of the speech-to-text output for an audio answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "lowercase")]
pub enum Transcript {
    Available(String),
    Failed,
    Pending,
}

impl Transcript {
    /// Classify a raw `transcription` field.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(TRANSCRIPTION_FAILED) => Transcript::Failed,
            Some(text) if !text.is_empty() => Transcript::Available(text.to_string()),
            _ => Transcript::Pending,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Transcript::Available(text) => Some(text),
            _ => None,
        }
    }
}

/// Audio-specific details of a canonical answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioAnswer {
    pub url: String,
    /// Length of the spoken question, in milliseconds.
    #[serde(default)]
    pub duration_ms: Option<u64>,
    pub transcript: Transcript,
}

/// The single reconciled record for one user's response to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalAnswer {
    pub question_id: String,
    /// `None` when the question id has no catalog entry.
    pub question_text: Option<String>,
    pub presentation_type: PresentationType,
    #[serde(default)]
    pub category: Option<Category>,
    pub modality: Modality,
    /// Text response, or the transcript of an audio response (empty if none).
    pub user_response_text: String,
    /// Never negative; `0` when the source had no usable value.
    pub time_to_answer_ms: u64,
    pub is_correct: Correctness,
    pub expected_answers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tts_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioAnswer>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub answered_at: Option<i64>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub question_displayed_at: Option<i64>,
}

impl CanonicalAnswer {
    /// Whether this answer participates in accuracy computations.
    pub fn is_scored(&self) -> bool {
        self.category.is_none_or(Category::is_scored)
    }
}

/// Whether the user finished the exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionStatus {
    InProgress,
    Submitted,
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionStatus::InProgress => write!(f, "In Progress"),
            SubmissionStatus::Submitted => write!(f, "Submitted"),
        }
    }
}

/// Everything known about one user after aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    /// Only known once a result record exists.
    pub email: Option<String>,
    pub submission_status: SubmissionStatus,
    /// Focus-loss events during the session.
    pub tab_change_count: u32,
    /// Keyed by question id.
    pub answers: BTreeMap<String, CanonicalAnswer>,
    /// Only present for submitted users.
    pub time_spent_seconds: Option<f64>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_section: Option<String>,
    #[serde(default)]
    pub current_question_index: Option<u32>,
    #[serde(default)]
    pub total_questions: Option<u32>,
    #[serde(default)]
    pub answered_count: Option<u32>,
    /// Score recorded by the exam application itself.
    #[serde(default)]
    pub exam_score: Option<f64>,
}

impl UserRecord {
    pub fn is_submitted(&self) -> bool {
        self.submission_status == SubmissionStatus::Submitted
    }

    /// A user with no answers and no email did nothing worth reporting.
    pub fn has_activity(&self) -> bool {
        !self.answers.is_empty() || self.email.is_some()
    }

    pub fn answers_by(&self, modality: Modality) -> impl Iterator<Item = &CanonicalAnswer> {
        self.answers.values().filter(move |a| a.modality == modality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_ref_parses_both_spellings() {
        let r = QuestionRef::parse("section1_accomodation_Q3").unwrap();
        assert_eq!(r.section, 1);
        assert_eq!(r.category, Category::Accommodation);
        assert_eq!(r.ordinal, "Q3");

        let r = QuestionRef::parse("section3_control_Q12").unwrap();
        assert_eq!(r.section, 3);
        assert_eq!(r.category, Category::Control);
        assert_eq!(
            Category::from_question_id("section1_accommodation_Q1"),
            Some(Category::Accommodation)
        );
    }

    #[test]
    fn question_ref_rejects_malformed_ids() {
        assert!(QuestionRef::parse("q1").is_none());
        assert!(QuestionRef::parse("section_standard_Q1").is_none());
        assert!(QuestionRef::parse("section2_bonus_Q1").is_none());
        assert!(QuestionRef::parse("section2_standard_1").is_none());
        assert!(QuestionRef::parse("section2_standard").is_none());
    }

    #[test]
    fn presentation_type_accepts_legacy_names() {
        let t: PresentationType = serde_json::from_str("\"blank\"").unwrap();
        assert_eq!(t, PresentationType::FreeText);
        let t: PresentationType = serde_json::from_str("\"audio\"").unwrap();
        assert_eq!(t, PresentationType::SpokenResponse);
        let t: PresentationType = serde_json::from_str("\"multiple-choice\"").unwrap();
        assert_eq!(t, PresentationType::MultipleChoice);
        assert_eq!(PresentationType::SpokenResponse.to_string(), "spoken-response");
    }

    #[test]
    fn transcript_classification() {
        assert_eq!(Transcript::from_raw(None), Transcript::Pending);
        assert_eq!(Transcript::from_raw(Some("  ")), Transcript::Pending);
        assert_eq!(
            Transcript::from_raw(Some(TRANSCRIPTION_FAILED)),
            Transcript::Failed
        );
        assert_eq!(
            Transcript::from_raw(Some(" merge sort ")).text(),
            Some("merge sort")
        );
    }

    #[test]
    fn correctness_from_option() {
        assert_eq!(Correctness::from(Some(true)), Correctness::Correct);
        assert_eq!(Correctness::from(Some(false)), Correctness::Incorrect);
        assert_eq!(Correctness::from(None), Correctness::Unknown);
        assert!(!Correctness::Unknown.is_graded());
        let json = serde_json::to_string(&Correctness::Unknown).unwrap();
        assert_eq!(json, "\"unknown\"");
    }
}

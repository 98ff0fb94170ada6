//! CSV report generator.
//!
//! Layout under the output directory:
//!
//! ```text
//! users/<userId>/summary.csv
//! users/<userId>/answers.csv
//! general_statistics/summary.csv
//! general_statistics/users.csv
//! ```
//!
//! The per-user standard accuracy file is written separately by
//! [`append_standard_accuracy`] because it accumulates across runs.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use examtally_core::model::{CanonicalAnswer, Modality, Transcript, UserRecord, TRANSCRIPTION_FAILED};
use examtally_core::statistics::{
    format_clock_ms, format_clock_secs, round_to, AccuracyTally, StandardAccuracy, SummaryTable,
    NOT_APPLICABLE,
};

pub const ANSWER_HEADERS: [&str; 12] = [
    "Question ID",
    "Question Text",
    "Answer Type",
    "User Answer (Text)",
    "Audio URL",
    "Transcription (Audio Answers)",
    "Time to Answer (mm:ss)",
    "Answered At (Timestamp)",
    "Question Displayed At (Timestamp)",
    "Audio Question Duration (mm:ss)",
    "Correct",
    "Wrong",
];

const USER_HEADERS: [&str; 15] = [
    "User ID",
    "Email",
    "Status",
    "Total Questions (Count)",
    "Answered (Count)",
    "Unanswered (Count)",
    "Correct (Count)",
    "Wrong (Count)",
    "Text Answers (Count)",
    "Audio Answers (Count)",
    "Average Time to Answer (mm:ss)",
    "Tab Changes (Count)",
    "Time Spent (mm:ss)",
    "Current Section",
    "Submission Time (Date/Time)",
];

const STANDARD_ACCURACY_HEADERS: [&str; 7] = [
    "User ID",
    "Text Right",
    "Text Wrong",
    "Text Accuracy",
    "Audio Right",
    "Audio Wrong",
    "Audio Accuracy",
];

const PENDING_TRANSCRIPT: &str = "Not transcribed yet";
const GRADE_MARK: &str = "x";
const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Write `summary.csv` and `answers.csv` for every user.
///
/// Returns the number of user directories written.
pub fn write_user_csvs<'a>(
    users: impl IntoIterator<Item = &'a UserRecord>,
    output_dir: &Path,
) -> Result<usize> {
    let mut written = 0;
    for user in users {
        let dir = user_dir(output_dir, &user.user_id);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        write_table(&user_summary(user), &dir.join("summary.csv"))?;
        write_answers(user, &dir.join("answers.csv"))?;
        written += 1;
    }
    tracing::info!("wrote CSVs for {written} user(s)");
    Ok(written)
}

/// Write `general_statistics/summary.csv` and `general_statistics/users.csv`.
pub fn write_general_statistics<'a>(
    table: &SummaryTable,
    users: impl IntoIterator<Item = &'a UserRecord>,
    output_dir: &Path,
) -> Result<()> {
    let dir = output_dir.join("general_statistics");
    std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    write_table(table, &dir.join("summary.csv"))?;

    let path = dir.join("users.csv");
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record(USER_HEADERS)?;
    for user in users {
        writer.write_record(user_row(user))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Append per-user standard-category accuracy rows to `path`.
///
/// The header is written only when the file is created. Appending to an
/// existing file duplicates users from earlier runs unless `truncate` is set.
pub fn append_standard_accuracy(
    rows: &[StandardAccuracy],
    path: &Path,
    truncate: bool,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let fresh = truncate || !path.exists() || std::fs::metadata(path)?.len() == 0;
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(!truncate)
        .truncate(truncate)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut writer = csv::Writer::from_writer(file);
    if fresh {
        writer.write_record(STANDARD_ACCURACY_HEADERS)?;
    }
    for row in rows {
        writer.write_record([
            row.user_id.clone(),
            row.text.correct.to_string(),
            row.text.incorrect.to_string(),
            ratio_cell(&row.text),
            row.audio.correct.to_string(),
            row.audio.incorrect.to_string(),
            ratio_cell(&row.audio),
        ])?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Read a `Metric`/`Value` table back from disk.
pub fn read_summary_table(path: &Path) -> Result<SummaryTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("malformed row in {}", path.display()))?;
        let metric = record.get(0).unwrap_or_default().to_string();
        let value = record.get(1).unwrap_or_default().to_string();
        rows.push((metric, value));
    }
    Ok(rows.into_iter().collect())
}

/// Directory holding a user's CSVs. The id always maps to a single path
/// component below `<output_dir>/users`.
pub fn user_dir(output_dir: &Path, user_id: &str) -> PathBuf {
    let mut name = user_id.replace(['/', '\\'], "_");
    if name.chars().all(|c| c == '.') {
        name = "_".repeat(name.len().max(1));
    }
    if name != user_id {
        tracing::warn!("user id {user_id:?} is not a safe directory name, writing to {name}");
    }
    output_dir.join("users").join(name)
}

fn write_table(table: &SummaryTable, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record(["Metric", "Value"])?;
    for (metric, value) in table.iter() {
        writer.write_record([metric, value])?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn write_answers(user: &UserRecord, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record(ANSWER_HEADERS)?;
    for answer in user.answers.values() {
        writer.write_record(answer_row(answer))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn user_summary(user: &UserRecord) -> SummaryTable {
    let tally = scored_tally(user);
    let mut table = SummaryTable::default();
    table.push("Email", user.email.as_deref().unwrap_or(NOT_APPLICABLE));
    table.push("Status", user.submission_status);
    if let Some(at) = user.submitted_at {
        table.push("Submission Time (Date/Time)", at.format(DATE_TIME_FORMAT));
    }
    if let Some(answered) = user.answered_count {
        table.push("Answered Count (Total)", answered);
    }
    if let Some(total) = user.total_questions {
        table.push("Total Questions (Count)", total);
        table.push(
            "Unanswered Questions (Count)",
            i64::from(total) - i64::from(user.answered_count.unwrap_or(0)),
        );
    }
    table.push("Correct Answers (Count)", tally.correct);
    table.push("Wrong Answers (Count)", tally.incorrect);
    table.push(
        "Accuracy (%)",
        tally
            .accuracy()
            .map_or_else(|| NOT_APPLICABLE.to_string(), |a| format!("{:.2}", a * 100.0)),
    );
    if let Some(seconds) = user.time_spent_seconds {
        table.push("Time Spent (mm:ss)", format_clock_secs(seconds));
    }
    if let Some(at) = user.started_at {
        table.push("Start Time (Date/Time)", at.format(DATE_TIME_FORMAT));
    }
    if let Some(section) = &user.current_section {
        table.push("Current Section", section);
    }
    if let Some(index) = user.current_question_index {
        table.push("Current Question Index", index);
    }
    table.push("Tab Change Count (Total)", user.tab_change_count);
    table.push("Audio Question IDs", question_ids(user, Modality::Audio));
    table.push("Written Question IDs", question_ids(user, Modality::Text));
    table
}

fn user_row(user: &UserRecord) -> Vec<String> {
    let tally = scored_tally(user);
    let times: Vec<u64> = user
        .answers
        .values()
        .map(|a| a.time_to_answer_ms)
        .filter(|&ms| ms > 0)
        .collect();
    let average = if times.is_empty() {
        NOT_APPLICABLE.to_string()
    } else {
        format_clock_ms(times.iter().sum::<u64>() as f64 / times.len() as f64)
    };
    let unanswered = user.total_questions.map_or_else(
        || NOT_APPLICABLE.to_string(),
        |total| (i64::from(total) - i64::from(user.answered_count.unwrap_or(0))).to_string(),
    );

    vec![
        user.user_id.clone(),
        user.email.clone().unwrap_or_else(|| NOT_APPLICABLE.to_string()),
        user.submission_status.to_string(),
        or_na(user.total_questions),
        user.answered_count.unwrap_or(0).to_string(),
        unanswered,
        tally.correct.to_string(),
        tally.incorrect.to_string(),
        user.answers_by(Modality::Text).count().to_string(),
        user.answers_by(Modality::Audio).count().to_string(),
        average,
        user.tab_change_count.to_string(),
        user.time_spent_seconds
            .map_or_else(|| NOT_APPLICABLE.to_string(), format_clock_secs),
        user.current_section
            .clone()
            .unwrap_or_else(|| NOT_APPLICABLE.to_string()),
        user.submitted_at
            .map_or_else(|| NOT_APPLICABLE.to_string(), |at| at.format(DATE_TIME_FORMAT).to_string()),
    ]
}

/// One `answers.csv` row. The Correct/Wrong marks are prefilled from the
/// recorded correctness so a reviewer only has to touch ungraded rows.
fn answer_row(answer: &CanonicalAnswer) -> Vec<String> {
    let (answer_type, text, url, transcript, duration) = match &answer.audio {
        Some(audio) => (
            "Audio",
            String::new(),
            audio.url.clone(),
            match &audio.transcript {
                Transcript::Available(text) => text.clone(),
                Transcript::Failed => TRANSCRIPTION_FAILED.to_string(),
                Transcript::Pending => PENDING_TRANSCRIPT.to_string(),
            },
            audio
                .duration_ms
                .filter(|&ms| ms > 0)
                .map(|ms| format_clock_ms(ms as f64))
                .unwrap_or_default(),
        ),
        None => (
            "Text",
            answer.user_response_text.clone(),
            String::new(),
            String::new(),
            String::new(),
        ),
    };
    let mark = |verdict: bool| {
        if answer.is_correct.as_bool() == Some(verdict) {
            GRADE_MARK.to_string()
        } else {
            String::new()
        }
    };

    vec![
        answer.question_id.clone(),
        answer
            .question_text
            .clone()
            .unwrap_or_else(|| NOT_APPLICABLE.to_string()),
        answer_type.to_string(),
        text,
        url,
        transcript,
        if answer.time_to_answer_ms > 0 {
            format_clock_ms(answer.time_to_answer_ms as f64)
        } else {
            String::new()
        },
        answer.answered_at.map(|t| t.to_string()).unwrap_or_default(),
        answer
            .question_displayed_at
            .map(|t| t.to_string())
            .unwrap_or_default(),
        duration,
        mark(true),
        mark(false),
    ]
}

fn scored_tally(user: &UserRecord) -> AccuracyTally {
    let mut tally = AccuracyTally::default();
    for answer in user.answers.values().filter(|a| a.is_scored()) {
        tally.record(answer.is_correct);
    }
    tally
}

fn question_ids(user: &UserRecord, modality: Modality) -> String {
    user.answers_by(modality)
        .map(|a| a.question_id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn ratio_cell(tally: &AccuracyTally) -> String {
    tally
        .accuracy()
        .map(|a| round_to(a, 3).to_string())
        .unwrap_or_default()
}

fn or_na(value: Option<u32>) -> String {
    value.map_or_else(|| NOT_APPLICABLE.to_string(), |v| v.to_string())
}

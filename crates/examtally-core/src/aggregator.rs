//! User aggregator.
//!
//! Builds one [`UserRecord`] per user from the progress record and the
//! optional finalized result record.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeZone, Utc};

use crate::catalog::QuestionCatalog;
use crate::export::{ExamExport, ProgressRecord, ResultRecord};
use crate::model::{SubmissionStatus, UserRecord};
use crate::normalizer::normalize;

/// Merge one user's sources into a [`UserRecord`].
///
/// Every question id seen in either source is normalized, so an answer that
/// only exists in the progress record survives even when a result exists.
pub fn aggregate_user(
    user_id: &str,
    progress: &ProgressRecord,
    result: Option<&ResultRecord>,
    catalog: &QuestionCatalog,
) -> UserRecord {
    let submission_status = if progress.submitted {
        SubmissionStatus::Submitted
    } else {
        SubmissionStatus::InProgress
    };

    let mut question_ids: BTreeSet<&String> = progress.answers.keys().collect();
    if let Some(result) = result {
        question_ids.extend(result.question_ids());
    }

    let mut answers = BTreeMap::new();
    for question_id in question_ids {
        let in_progress = progress.event(question_id);
        let finalized = result.and_then(|r| r.event(question_id));
        if let Some(answer) = normalize(
            question_id,
            in_progress.as_ref(),
            finalized.as_ref(),
            catalog.get(question_id),
        ) {
            answers.insert(question_id.clone(), answer);
        }
    }

    let tab_change_count = progress
        .tab_change_count
        .or_else(|| result.and_then(|r| r.tab_change_count))
        .map_or(0, clamp_count);

    let time_spent_seconds = match submission_status {
        SubmissionStatus::Submitted => result
            .and_then(|r| r.time_spent)
            .map(|seconds| seconds.max(0.0)),
        SubmissionStatus::InProgress => None,
    };

    if progress.submitted && result.is_none() {
        tracing::debug!("{user_id}: submitted without a result record, using progress only");
    }

    UserRecord {
        user_id: user_id.to_string(),
        email: result.and_then(|r| r.email.clone()).filter(|e| !e.is_empty()),
        submission_status,
        tab_change_count,
        answers,
        time_spent_seconds,
        started_at: progress.start_timestamp.and_then(from_epoch_ms),
        submitted_at: result
            .and_then(|r| r.timestamp.as_deref())
            .and_then(parse_timestamp),
        current_section: progress.current_section.clone(),
        current_question_index: progress.current_question_index.map(clamp_count),
        total_questions: result.and_then(|r| r.total_questions).map(clamp_count),
        answered_count: result.and_then(|r| r.answered_count).map(clamp_count),
        exam_score: result.and_then(|r| r.score),
    }
}

/// Aggregate every user in the export, dropping users who did nothing.
pub fn aggregate_export(
    export: &ExamExport,
    catalog: &QuestionCatalog,
) -> BTreeMap<String, UserRecord> {
    let mut users = BTreeMap::new();
    let mut dropped = 0usize;

    for (user_id, progress) in &export.progress {
        let record = aggregate_user(user_id, progress, export.results.get(user_id), catalog);
        if record.has_activity() {
            users.insert(user_id.clone(), record);
        } else {
            dropped += 1;
        }
    }

    tracing::info!(
        "aggregated {} user(s), dropped {dropped} without activity",
        users.len()
    );
    users
}

fn clamp_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn from_epoch_ms(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!("ignoring unparseable submission timestamp {raw:?}: {e}");
            None
        }
    }
}

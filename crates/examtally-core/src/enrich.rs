//! Transcription enrichment of a raw export document.
//!
//! Walks every audio answer in both `examProgress` and `examResults`, fetches
//! the audio, runs it through a [`Transcriber`] and writes the text back into
//! the answer's `transcription` field. The document is edited in place as a
//! [`serde_json::Value`], so fields this crate does not model survive.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TranscriptionError;
use crate::model::TRANSCRIPTION_FAILED;
use crate::traits::{AudioRef, AudioSource, TranscribeHint, Transcriber};

/// Configuration for an enrichment pass.
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    /// Re-transcribe answers that already have a transcript.
    pub force: bool,
    /// Retries on transient transcriber errors.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each attempt.
    pub retry_delay: Duration,
    pub hint: TranscribeHint,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            force: false,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            hint: TranscribeHint::default(),
        }
    }
}

/// Counters for one enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichStats {
    pub total: usize,
    pub transcribed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// What happened to one audio answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichOutcome {
    Transcribed(String),
    /// Already had a transcript.
    Skipped,
    /// Audio could not be fetched; the answer was left untouched.
    Unavailable(String),
    /// Transcription failed; the sentinel was written.
    Failed(String),
}

/// Progress reporting trait.
pub trait EnrichProgress: Send + Sync {
    fn on_answer_start(&self, audio: &AudioRef);
    fn on_answer_done(&self, audio: &AudioRef, outcome: &EnrichOutcome);
    fn on_complete(&self, stats: &EnrichStats, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopProgress;

impl EnrichProgress for NoopProgress {
    fn on_answer_start(&self, _: &AudioRef) {}
    fn on_answer_done(&self, _: &AudioRef, _: &EnrichOutcome) {}
    fn on_complete(&self, _: &EnrichStats, _: Duration) {}
}

struct Target {
    pointer: String,
    audio: AudioRef,
    existing: Option<String>,
}

/// Transcribe every audio answer in `document`.
///
/// A single failure never aborts the pass: unfetchable audio is counted as
/// failed and left as is, and an engine failure stores
/// [`TRANSCRIPTION_FAILED`] on that answer. Answers holding the sentinel are
/// attempted again on every pass.
pub async fn enrich_transcriptions(
    document: &mut Value,
    source: &dyn AudioSource,
    transcriber: &dyn Transcriber,
    config: &EnrichConfig,
    progress: &dyn EnrichProgress,
) -> Result<EnrichStats> {
    if !document.is_object() {
        bail!("export root must be a JSON object");
    }

    let start = Instant::now();
    let targets = collect_targets(document);
    let mut stats = EnrichStats {
        total: targets.len(),
        ..Default::default()
    };
    tracing::info!(
        "found {} audio answer(s), transcribing with {}",
        stats.total,
        transcriber.name()
    );

    // The same recording often appears in both sections.
    let mut by_url: HashMap<String, String> = HashMap::new();

    for target in targets {
        progress.on_answer_start(&target.audio);

        let already_done = target
            .existing
            .as_deref()
            .map(str::trim)
            .is_some_and(|t| !t.is_empty() && t != TRANSCRIPTION_FAILED);
        let outcome = if already_done && !config.force {
            EnrichOutcome::Skipped
        } else if let Some(text) = by_url.get(&target.audio.url) {
            EnrichOutcome::Transcribed(text.clone())
        } else {
            match source.fetch(&target.audio).await {
                Err(e) => EnrichOutcome::Unavailable(e.to_string()),
                Ok(bytes) => match transcribe_with_retry(transcriber, &bytes, config).await {
                    Ok(text) => {
                        by_url.insert(target.audio.url.clone(), text.clone());
                        EnrichOutcome::Transcribed(text)
                    }
                    Err(e) => EnrichOutcome::Failed(e.to_string()),
                },
            }
        };

        match &outcome {
            EnrichOutcome::Transcribed(text) => {
                set_transcription(document, &target.pointer, text);
                stats.transcribed += 1;
            }
            EnrichOutcome::Skipped => stats.skipped += 1,
            EnrichOutcome::Unavailable(reason) => {
                tracing::warn!(
                    "{}/{}: audio unavailable: {reason}",
                    target.audio.user_id,
                    target.audio.question_id
                );
                stats.failed += 1;
            }
            EnrichOutcome::Failed(reason) => {
                tracing::warn!(
                    "{}/{}: transcription failed: {reason}",
                    target.audio.user_id,
                    target.audio.question_id
                );
                set_transcription(document, &target.pointer, TRANSCRIPTION_FAILED);
                stats.failed += 1;
            }
        }
        progress.on_answer_done(&target.audio, &outcome);
    }

    progress.on_complete(&stats, start.elapsed());
    Ok(stats)
}

async fn transcribe_with_retry(
    transcriber: &dyn Transcriber,
    audio: &[u8],
    config: &EnrichConfig,
) -> Result<String, TranscriptionError> {
    let mut retry_delay = config.retry_delay;
    let mut last_error = None;

    for retry in 0..=config.max_retries {
        if retry > 0 {
            tokio::time::sleep(retry_delay).await;
            retry_delay = (retry_delay * 2).min(Duration::from_secs(60));
        }
        match transcriber.transcribe(audio, &config.hint).await {
            Ok(text) if text.trim().is_empty() => return Err(TranscriptionError::EmptyTranscript),
            Ok(text) => return Ok(text.trim().to_string()),
            Err(e) if e.is_permanent() => return Err(e),
            Err(e) => {
                tracing::debug!("transcription attempt {} failed: {e}", retry + 1);
                if let Some(ms) = e.retry_after_ms() {
                    retry_delay = Duration::from_millis(ms);
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or(TranscriptionError::EmptyTranscript))
}

fn collect_targets(document: &Value) -> Vec<Target> {
    let mut targets = Vec::new();

    if let Some(progress) = document.get("examProgress").and_then(Value::as_object) {
        for (user_id, record) in progress {
            let base = format!("/examProgress/{}", escape(user_id));
            collect_answers(&mut targets, user_id, &base, record);
        }
    }

    if let Some(results) = document.get("examResults").and_then(Value::as_object) {
        for (user_id, by_result_id) in results {
            let Some(by_result_id) = by_result_id.as_object() else {
                continue;
            };
            for (result_id, record) in by_result_id {
                let base = format!("/examResults/{}/{}", escape(user_id), escape(result_id));
                collect_answers(&mut targets, user_id, &base, record);
            }
        }
    }

    targets
}

fn collect_answers(targets: &mut Vec<Target>, user_id: &str, base: &str, record: &Value) {
    let Some(answers) = record.get("answers").and_then(Value::as_object) else {
        return;
    };
    for (question_id, answer) in answers {
        let Some(url) = answer
            .get("audioUrl")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
        else {
            continue;
        };
        targets.push(Target {
            pointer: format!("{base}/answers/{}", escape(question_id)),
            audio: AudioRef {
                user_id: user_id.to_string(),
                question_id: question_id.clone(),
                url: url.to_string(),
            },
            existing: answer
                .get("transcription")
                .and_then(Value::as_str)
                .map(str::to_string),
        });
    }
}

fn set_transcription(document: &mut Value, pointer: &str, text: &str) {
    if let Some(answer) = document.pointer_mut(pointer).and_then(Value::as_object_mut) {
        answer.insert("transcription".to_string(), Value::String(text.to_string()));
    }
}

/// Escape a key for use as a JSON pointer token.
fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

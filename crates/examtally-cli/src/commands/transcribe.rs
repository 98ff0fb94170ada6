//! The `examtally transcribe` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;

use examtally_core::enrich::{enrich_transcriptions, EnrichOutcome, EnrichProgress, EnrichStats};
use examtally_core::traits::AudioRef;
use examtally_transcribe::config::{create_transcriber, load_config_from};
use examtally_transcribe::HttpAudioSource;

/// Console progress reporter.
struct ConsoleReporter;

impl EnrichProgress for ConsoleReporter {
    fn on_answer_start(&self, audio: &AudioRef) {
        eprintln!("  Transcribing: {} :: {}", audio.user_id, audio.question_id);
    }

    fn on_answer_done(&self, audio: &AudioRef, outcome: &EnrichOutcome) {
        match outcome {
            EnrichOutcome::Transcribed(text) => {
                let preview: String = text.chars().take(60).collect();
                eprintln!("  Done: {} :: {} \"{preview}\"", audio.user_id, audio.question_id);
            }
            EnrichOutcome::Skipped => {}
            EnrichOutcome::Unavailable(reason) => {
                eprintln!("  NO AUDIO: {} :: {}: {reason}", audio.user_id, audio.question_id);
            }
            EnrichOutcome::Failed(reason) => {
                eprintln!("  ERROR: {} :: {}: {reason}", audio.user_id, audio.question_id);
            }
        }
    }

    fn on_complete(&self, stats: &EnrichStats, elapsed: Duration) {
        eprintln!(
            "\nComplete: {} transcribed, {} failed, {} skipped of {} ({:.1}s)",
            stats.transcribed,
            stats.failed,
            stats.skipped,
            stats.total,
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(
    input: PathBuf,
    output: PathBuf,
    force: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let transcriber_config = config.transcriber.as_ref().context(
        "no transcriber configured: add a [transcriber] table to examtally.toml or set EXAMTALLY_OPENAI_KEY",
    )?;
    let transcriber = create_transcriber(transcriber_config)?;
    let source = HttpAudioSource::new(&config.audio_cache_dir)?;

    let content = std::fs::read_to_string(&input)
        .with_context(|| format!("failed to read export: {}", input.display()))?;
    let mut document: Value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse export JSON: {}", input.display()))?;

    eprintln!(
        "examtally v{}: transcribing {} with {}",
        env!("CARGO_PKG_VERSION"),
        input.display(),
        transcriber.name()
    );

    let stats = enrich_transcriptions(
        &mut document,
        &source,
        transcriber.as_ref(),
        &config.enrich_config(force),
        &ConsoleReporter,
    )
    .await?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&document).context("failed to serialize export")?;
    std::fs::write(&output, json)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "Wrote {} ({} transcribed, {} failed)",
        output.display(),
        stats.transcribed,
        stats.failed
    );
    Ok(())
}

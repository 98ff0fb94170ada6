//! The `examtally init` command.

use std::path::Path;

use anyhow::{Context, Result};

use examtally_core::catalog::QuestionCatalog;

const CONFIG_FILE: &str = "examtally.toml";
const CATALOG_FILE: &str = "questions.json";

pub fn execute() -> Result<()> {
    if Path::new(CONFIG_FILE).exists() {
        println!("{CONFIG_FILE} already exists, skipping.");
    } else {
        std::fs::write(CONFIG_FILE, SAMPLE_CONFIG)
            .with_context(|| format!("failed to write {CONFIG_FILE}"))?;
        println!("Created {CONFIG_FILE}");
    }

    if Path::new(CATALOG_FILE).exists() {
        println!("{CATALOG_FILE} already exists, skipping.");
    } else {
        let json = QuestionCatalog::builtin().to_json_pretty()?;
        std::fs::write(CATALOG_FILE, json)
            .with_context(|| format!("failed to write {CATALOG_FILE}"))?;
        println!("Created {CATALOG_FILE}");
    }

    println!("\nNext steps:");
    println!("  1. Edit {CONFIG_FILE} and choose a transcriber");
    println!("  2. Run: examtally transcribe --input export.json --output export-transcribed.json");
    println!("  3. Run: examtally run --input export-transcribed.json");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examtally configuration

# Question catalog (the built-in 53-question exam is used when omitted)
catalog = "questions.json"

output_dir = "./examtally-output"
audio_cache_dir = "./audio_files"

# Transient transcription failures are retried with exponential backoff
max_retries = 3
retry_delay_ms = 1000

# Spoken language of the audio answers
language = "en"

# OpenAI-compatible Whisper API
[transcriber]
type = "openai"
api_key = "${OPENAI_API_KEY}"
# base_url = "https://api.openai.com"
# model = "whisper-1"

# Or a local engine; {input}, {language} and {prompt} are substituted
# [transcriber]
# type = "command"
# program = "whisper-cli"
# args = ["-m", "models/ggml-small.bin", "-f", "{input}", "-l", "{language}", "--prompt", "{prompt}", "-nt"]
# timeout_secs = 300
"#;

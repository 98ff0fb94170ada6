//! Local speech-to-text engine driven through a command line.
//!
//! The audio is written to a temporary file and the configured program is run
//! with placeholders substituted in its arguments:
//!
//! - `{input}`: path of the audio file
//! - `{language}`: language code from the hint
//! - `{prompt}`: initial prompt from the hint
//!
//! Whatever the program prints to stdout is the transcript.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use examtally_core::error::TranscriptionError;
use examtally_core::traits::{TranscribeHint, Transcriber};

/// Runs an external transcription program per audio answer.
pub struct CommandTranscriber {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandTranscriber {
    pub fn new(program: &str, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.to_string(),
            args,
            timeout,
        }
    }

    fn expand_args(&self, input: &str, hint: &TranscribeHint) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{input}", input)
                    .replace("{language}", &hint.language)
                    .replace("{prompt}", &hint.initial_prompt)
            })
            .collect()
    }
}

#[async_trait]
impl Transcriber for CommandTranscriber {
    fn name(&self) -> &str {
        &self.program
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        hint: &TranscribeHint,
    ) -> Result<String, TranscriptionError> {
        let file = tempfile::Builder::new()
            .prefix("examtally-")
            .suffix(".webm")
            .tempfile()
            .map_err(|e| TranscriptionError::EngineFailed(format!("failed to create temp file: {e}")))?;
        tokio::fs::write(file.path(), audio)
            .await
            .map_err(|e| TranscriptionError::EngineFailed(format!("failed to write audio: {e}")))?;

        let input = file.path().to_string_lossy().into_owned();
        let mut cmd = Command::new(&self.program);
        cmd.args(self.expand_args(&input, hint))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| TranscriptionError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| {
                TranscriptionError::EngineFailed(format!("failed to run {}: {e}", self.program))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscriptionError::EngineFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

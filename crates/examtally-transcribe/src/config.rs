//! Configuration loading and transcriber factory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examtally_core::enrich::EnrichConfig;
use examtally_core::traits::{TranscribeHint, Transcriber, DEFAULT_INITIAL_PROMPT};

use crate::command::CommandTranscriber;
use crate::mock::MockTranscriber;
use crate::whisper_api::WhisperApiTranscriber;

/// Which speech-to-text backend to use.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TranscriberConfig {
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default = "default_command_timeout")]
        timeout_secs: u64,
    },
    Mock {
        #[serde(default = "default_mock_response")]
        response: String,
    },
}

impl std::fmt::Debug for TranscriberConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriberConfig::OpenAI {
                api_key: _,
                base_url,
                model,
                timeout_secs,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("model", model)
                .field("timeout_secs", timeout_secs)
                .finish(),
            TranscriberConfig::Command {
                program,
                args,
                timeout_secs,
            } => f
                .debug_struct("Command")
                .field("program", program)
                .field("args", args)
                .field("timeout_secs", timeout_secs)
                .finish(),
            TranscriberConfig::Mock { response } => {
                f.debug_struct("Mock").field("response", response).finish()
            }
        }
    }
}

fn default_command_timeout() -> u64 {
    300
}
fn default_mock_response() -> String {
    "mock transcript".to_string()
}

/// Top-level examtally configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamtallyConfig {
    /// Question catalog JSON. The built-in catalog is used when absent.
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    /// Output directory for reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Where downloaded audio answers are kept.
    #[serde(default = "default_audio_cache_dir")]
    pub audio_cache_dir: PathBuf,
    /// Max retries on transient transcription errors.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Spoken language of the audio answers.
    #[serde(default = "default_language")]
    pub language: String,
    /// Vocabulary primer; the built-in technical prompt when absent.
    #[serde(default)]
    pub initial_prompt: Option<String>,
    #[serde(default)]
    pub transcriber: Option<TranscriberConfig>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./examtally-output")
}
fn default_audio_cache_dir() -> PathBuf {
    PathBuf::from("./audio_files")
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1000
}
fn default_language() -> String {
    "en".to_string()
}

impl Default for ExamtallyConfig {
    fn default() -> Self {
        Self {
            catalog: None,
            output_dir: default_output_dir(),
            audio_cache_dir: default_audio_cache_dir(),
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            language: default_language(),
            initial_prompt: None,
            transcriber: None,
        }
    }
}

impl ExamtallyConfig {
    /// Decoding parameters for every transcription call.
    pub fn hint(&self) -> TranscribeHint {
        TranscribeHint {
            language: self.language.clone(),
            initial_prompt: self
                .initial_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_INITIAL_PROMPT.to_string()),
            temperature: 0.0,
        }
    }

    pub fn enrich_config(&self, force: bool) -> EnrichConfig {
        EnrichConfig {
            force,
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            hint: self.hint(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Resolve env vars in a transcriber config.
fn resolve_transcriber_config(config: &TranscriberConfig) -> TranscriberConfig {
    match config {
        TranscriberConfig::OpenAI {
            api_key,
            base_url,
            model,
            timeout_secs,
        } => TranscriberConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_ref().map(|u| resolve_env_vars(u)),
            model: model.clone(),
            timeout_secs: *timeout_secs,
        },
        TranscriberConfig::Command {
            program,
            args,
            timeout_secs,
        } => TranscriberConfig::Command {
            program: resolve_env_vars(program),
            args: args.iter().map(|a| resolve_env_vars(a)).collect(),
            timeout_secs: *timeout_secs,
        },
        TranscriberConfig::Mock { response } => TranscriberConfig::Mock {
            response: response.clone(),
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examtally.toml` in the current directory
/// 2. `~/.config/examtally/config.toml`
///
/// Environment variable override: `EXAMTALLY_OPENAI_KEY`.
pub fn load_config() -> Result<ExamtallyConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamtallyConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("examtally.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ExamtallyConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExamtallyConfig::default(),
    };

    // Apply env var override
    if let Ok(key) = std::env::var("EXAMTALLY_OPENAI_KEY") {
        match &mut config.transcriber {
            Some(TranscriberConfig::OpenAI { api_key, .. }) => *api_key = key,
            Some(_) => {}
            None => {
                config.transcriber = Some(TranscriberConfig::OpenAI {
                    api_key: key,
                    base_url: None,
                    model: None,
                    timeout_secs: None,
                })
            }
        }
    }

    config.transcriber = config.transcriber.as_ref().map(resolve_transcriber_config);

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examtally"))
}

/// Create a transcriber instance from its configuration.
pub fn create_transcriber(config: &TranscriberConfig) -> Result<Box<dyn Transcriber>> {
    match config {
        TranscriberConfig::OpenAI {
            api_key,
            base_url,
            model,
            timeout_secs,
        } => {
            if api_key.is_empty() {
                anyhow::bail!("OpenAI transcriber has an empty api_key");
            }
            Ok(Box::new(WhisperApiTranscriber::new(
                api_key,
                base_url.clone(),
                model.clone(),
                *timeout_secs,
            )?))
        }
        TranscriberConfig::Command {
            program,
            args,
            timeout_secs,
        } => Ok(Box::new(CommandTranscriber::new(
            program,
            args.clone(),
            Duration::from_secs(*timeout_secs),
        ))),
        TranscriberConfig::Mock { response } => {
            Ok(Box::new(MockTranscriber::with_fixed_response(response)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_EXAMTALLY_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_EXAMTALLY_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_EXAMTALLY_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("unterminated ${OOPS"), "unterminated ${OOPS");
        std::env::remove_var("_EXAMTALLY_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = ExamtallyConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.language, "en");
        assert!(config.transcriber.is_none());
        assert_eq!(config.hint().initial_prompt, DEFAULT_INITIAL_PROMPT);
        assert_eq!(config.enrich_config(true).retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn parse_transcriber_config() {
        let toml_str = r#"
catalog = "questions.json"
max_retries = 5
language = "ro"

[transcriber]
type = "command"
program = "whisper-cli"
args = ["-f", "{input}", "-l", "{language}", "--no-timestamps"]
"#;
        let config: ExamtallyConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.catalog, Some(PathBuf::from("questions.json")));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.hint().language, "ro");
        match config.transcriber {
            Some(TranscriberConfig::Command { program, args, timeout_secs }) => {
                assert_eq!(program, "whisper-cli");
                assert_eq!(args.len(), 5);
                assert_eq!(timeout_secs, 300);
            }
            other => panic!("unexpected transcriber: {other:?}"),
        }
    }

    #[test]
    fn debug_masks_api_key() {
        let config = TranscriberConfig::OpenAI {
            api_key: "sk-secret".into(),
            base_url: None,
            model: None,
            timeout_secs: None,
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("examtally.toml");
        std::fs::write(
            &path,
            "output_dir = \"out\"\n[transcriber]\ntype = \"mock\"\nresponse = \"hi\"\n",
        )
        .unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert!(matches!(
            config.transcriber,
            Some(TranscriberConfig::Mock { ref response }) if response == "hi"
        ));

        let missing = load_config_from(Some(&dir.path().join("nope.toml")));
        assert!(missing.is_err());
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let config = TranscriberConfig::OpenAI {
            api_key: String::new(),
            base_url: None,
            model: None,
            timeout_secs: None,
        };
        assert!(create_transcriber(&config).is_err());
    }
}

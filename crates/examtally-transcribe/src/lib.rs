//! examtally-transcribe: Speech-to-text backends.
//!
//! Implements the `Transcriber` and `AudioSource` traits from
//! `examtally-core`: an OpenAI-compatible HTTP API, a local command-line
//! engine, and in-memory mocks, plus configuration loading.

pub mod audio;
pub mod command;
pub mod config;
pub mod mock;
pub mod whisper_api;

pub use audio::HttpAudioSource;
pub use config::{
    create_transcriber, load_config, load_config_from, ExamtallyConfig, TranscriberConfig,
};

//! Capability traits for speech-to-text and audio retrieval.
//!
//! Implemented by the `examtally-transcribe` crate. The core only ever sees
//! these traits, so tests can substitute in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TranscriptionError;

/// A speech-to-text engine.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Human-readable engine name (e.g. "openai").
    fn name(&self) -> &str;

    /// Transcribe one audio file. A successful result may still be empty;
    /// callers decide what an empty transcript means.
    async fn transcribe(
        &self,
        audio: &[u8],
        hint: &TranscribeHint,
    ) -> Result<String, TranscriptionError>;
}

/// Where an audio answer lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioRef {
    pub user_id: String,
    pub question_id: String,
    pub url: String,
}

/// Fetches the bytes of an audio answer.
#[async_trait]
pub trait AudioSource: Send + Sync {
    async fn fetch(&self, audio: &AudioRef) -> Result<Vec<u8>, TranscriptionError>;
}

/// Fixed decoding parameters passed to every transcription call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscribeHint {
    /// ISO-639-1 language code.
    pub language: String,
    /// Vocabulary primer for the decoder.
    pub initial_prompt: String,
    pub temperature: f32,
}

impl Default for TranscribeHint {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            initial_prompt: DEFAULT_INITIAL_PROMPT.to_string(),
            temperature: 0.0,
        }
    }
}

/// Primes the decoder with the technical vocabulary the spoken questions use.
pub const DEFAULT_INITIAL_PROMPT: &str = "Computer science exam. Technical terms: merge sort, \
heap sort, bubble sort, quick sort, insertion sort, binary search, linear search, polymorphism, \
inheritance, encapsulation, overloading, overriding, RAM, ROM, DRAM, SRAM, CPU, ALU, cache, \
control unit, LAN, WAN, network, router, switch, HTTP, HTTPS, port, binary, algorithm, \
data structure, queue, stack, tree, graph, complexity, Big O notation, SQL, WHERE, TRUNCATE.";

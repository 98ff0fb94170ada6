//! Mock transcriber and audio source for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use examtally_core::error::TranscriptionError;
use examtally_core::traits::{AudioRef, AudioSource, TranscribeHint, Transcriber};

/// A mock transcriber for exercising enrichment without a real engine.
///
/// Returns configurable transcripts based on the audio content.
pub struct MockTranscriber {
    /// Map of audio-content substring → transcript.
    responses: HashMap<String, String>,
    /// Transcript if no content matches.
    default_response: String,
    /// Calls that fail with a transient error before responses start.
    fail_first: u32,
    /// Number of calls made.
    call_count: AtomicU32,
    /// Hint received by the last call.
    last_hint: Mutex<Option<TranscribeHint>>,
}

impl MockTranscriber {
    /// Create a mock with the given content→transcript mappings.
    pub fn new(responses: HashMap<String, String>) -> Self {
        Self {
            responses,
            default_response: "mock transcript".to_string(),
            fail_first: 0,
            call_count: AtomicU32::new(0),
            last_hint: Mutex::new(None),
        }
    }

    /// Create a mock that always returns the same transcript.
    pub fn with_fixed_response(response: &str) -> Self {
        Self {
            default_response: response.to_string(),
            ..Self::new(HashMap::new())
        }
    }

    /// Fail the first `n` calls with a timeout before answering.
    pub fn failing_first(mut self, n: u32) -> Self {
        self.fail_first = n;
        self
    }

    /// Get the number of calls made to this transcriber.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Get the hint passed to the last call.
    pub fn last_hint(&self) -> Option<TranscribeHint> {
        self.last_hint
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    fn name(&self) -> &str {
        "mock"
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        hint: &TranscribeHint,
    ) -> Result<String, TranscriptionError> {
        let call = self.call_count.fetch_add(1, Ordering::Relaxed);
        *self
            .last_hint
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(hint.clone());

        if call < self.fail_first {
            return Err(TranscriptionError::Timeout(0));
        }

        let content = String::from_utf8_lossy(audio);
        Ok(self
            .responses
            .iter()
            .find(|(key, _)| content.contains(key.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.default_response.clone()))
    }
}

/// Serves audio bytes from memory, keyed by URL.
#[derive(Default)]
pub struct StaticAudioSource {
    files: HashMap<String, Vec<u8>>,
}

impl StaticAudioSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, url: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(url.to_string(), bytes.into());
        self
    }
}

#[async_trait]
impl AudioSource for StaticAudioSource {
    async fn fetch(&self, audio: &AudioRef) -> Result<Vec<u8>, TranscriptionError> {
        self.files
            .get(&audio.url)
            .cloned()
            .ok_or_else(|| TranscriptionError::AudioUnavailable(audio.url.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_response() {
        let transcriber = MockTranscriber::with_fixed_response("quick sort");
        let text = transcriber
            .transcribe(b"anything", &TranscribeHint::default())
            .await
            .unwrap();
        assert_eq!(text, "quick sort");
        assert_eq!(transcriber.call_count(), 1);
        assert_eq!(transcriber.last_hint().unwrap().language, "en");
    }

    #[tokio::test]
    async fn content_matching_and_failures() {
        let mut responses = HashMap::new();
        responses.insert("tcp".to_string(), "transmission control protocol".to_string());
        let transcriber = MockTranscriber::new(responses).failing_first(1);

        let hint = TranscribeHint::default();
        assert!(transcriber.transcribe(b"tcp", &hint).await.is_err());
        assert_eq!(
            transcriber.transcribe(b"...tcp...", &hint).await.unwrap(),
            "transmission control protocol"
        );
        assert_eq!(transcriber.transcribe(b"udp", &hint).await.unwrap(), "mock transcript");
        assert_eq!(transcriber.call_count(), 3);
    }

    #[tokio::test]
    async fn static_source_serves_known_urls() {
        let source = StaticAudioSource::new().with_file("https://cdn/a.webm", b"abc".to_vec());
        let known = AudioRef {
            user_id: "u".into(),
            question_id: "q".into(),
            url: "https://cdn/a.webm".into(),
        };
        assert_eq!(source.fetch(&known).await.unwrap(), b"abc");

        let unknown = AudioRef {
            url: "https://cdn/b.webm".into(),
            ..known
        };
        assert!(matches!(
            source.fetch(&unknown).await,
            Err(TranscriptionError::AudioUnavailable(_))
        ));
    }
}

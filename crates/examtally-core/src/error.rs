//! Transcription error types.
//!
//! Defined in `examtally-core` so the enrichment engine can classify failures
//! for retry decisions without string matching.

use thiserror::Error;

/// Errors that can occur while fetching or transcribing an audio answer.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request or engine run timed out.
    #[error("timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The audio file could not be fetched or read.
    #[error("audio unavailable: {0}")]
    AudioUnavailable(String),

    /// The local engine exited with a failure.
    #[error("transcription engine failed: {0}")]
    EngineFailed(String),

    /// The engine produced no text.
    #[error("transcription was empty")]
    EmptyTranscript,
}

impl TranscriptionError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        match self {
            TranscriptionError::AuthenticationFailed(_)
            | TranscriptionError::AudioUnavailable(_)
            | TranscriptionError::EmptyTranscript => true,
            TranscriptionError::ApiError { status, .. } => (400..500).contains(status),
            _ => false,
        }
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            TranscriptionError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

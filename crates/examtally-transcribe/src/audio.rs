//! Audio retrieval over HTTP with an on-disk cache.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::instrument;

use examtally_core::error::TranscriptionError;
use examtally_core::traits::{AudioRef, AudioSource};

const DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// Downloads audio answers, keeping a copy per answer in `cache_dir`.
///
/// Cached files are named `<userId>_<questionId>.webm` and reused on later
/// runs without touching the network.
pub struct HttpAudioSource {
    cache_dir: PathBuf,
    client: reqwest::Client,
}

impl HttpAudioSource {
    pub fn new(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .with_context(|| format!("failed to create audio cache: {}", cache_dir.display()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            cache_dir: cache_dir.to_path_buf(),
            client,
        })
    }

    /// Where the audio for an answer is cached.
    pub fn cache_path(&self, audio: &AudioRef) -> PathBuf {
        let name = format!("{}_{}.webm", audio.user_id, audio.question_id)
            .replace(['/', '\\'], "_");
        self.cache_dir.join(name)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, TranscriptionError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                TranscriptionError::Timeout(DOWNLOAD_TIMEOUT_SECS)
            } else {
                TranscriptionError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranscriptionError::AudioUnavailable(format!(
                "HTTP {} for {url}",
                status.as_u16()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TranscriptionError::NetworkError(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl AudioSource for HttpAudioSource {
    #[instrument(skip(self, audio), fields(user = %audio.user_id, question = %audio.question_id))]
    async fn fetch(&self, audio: &AudioRef) -> Result<Vec<u8>, TranscriptionError> {
        let path = self.cache_path(audio);
        if let Ok(bytes) = tokio::fs::read(&path).await {
            tracing::debug!("using cached audio {}", path.display());
            return Ok(bytes);
        }

        let bytes = self.download(&audio.url).await?;
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            tracing::warn!("failed to cache audio at {}: {e}", path.display());
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn audio_ref(url: String) -> AudioRef {
        AudioRef {
            user_id: "u1".into(),
            question_id: "section3_standard_Q1".into(),
            url,
        }
    }

    #[tokio::test]
    async fn downloads_once_then_uses_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.webm"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"webm-bytes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let source = HttpAudioSource::new(dir.path()).unwrap();
        let audio = audio_ref(format!("{}/a.webm", server.uri()));

        assert_eq!(source.fetch(&audio).await.unwrap(), b"webm-bytes");
        assert!(dir.path().join("u1_section3_standard_Q1.webm").exists());
        assert_eq!(source.fetch(&audio).await.unwrap(), b"webm-bytes");
    }

    #[tokio::test]
    async fn missing_audio_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let source = HttpAudioSource::new(dir.path()).unwrap();
        let err = source
            .fetch(&audio_ref(format!("{}/gone.webm", server.uri())))
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::AudioUnavailable(_)));
    }

    #[test]
    fn cache_names_cannot_escape_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let source = HttpAudioSource::new(dir.path()).unwrap();
        let path = source.cache_path(&AudioRef {
            user_id: "../evil".into(),
            question_id: "q".into(),
            url: String::new(),
        });
        assert_eq!(path.parent(), Some(dir.path()));
    }
}

//! Core `RecognitionService` trait and error taxonomy.
//!
//! [`RecognitionService`] is the interface the capture loop consumes.  It is
//! object-safe and `Send + Sync` so it can be held behind an
//! `Arc<dyn RecognitionService>`.
//!
//! [`MockRecognizer`] (available under `#[cfg(test)]`) replays a scripted
//! sequence of outcomes — useful for unit-testing the capture loop without a
//! network connection.

use async_trait::async_trait;
use thiserror::Error;

use crate::audio::AudioBlock;

// ---------------------------------------------------------------------------
// RecognizeError
// ---------------------------------------------------------------------------

/// All errors that can arise from the recognition subsystem.
///
/// `NoSpeech` is the service saying "I heard audio but no words" — the
/// capture loop reports it as an unrecognized cycle.  Everything else is a
/// service-layer failure.
#[derive(Debug, Clone, Error)]
pub enum RecognizeError {
    /// The service could not map the audio to any text.
    #[error("no speech recognized in audio")]
    NoSpeech,

    /// HTTP transport or connection error.
    #[error("recognition request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("recognition request timed out")]
    Timeout,

    /// The response could not be parsed as expected JSON.
    #[error("failed to parse recognition response: {0}")]
    Parse(String),

    /// The audio payload could not be encoded for transport.
    #[error("failed to encode audio payload: {0}")]
    Encode(String),
}

impl From<reqwest::Error> for RecognizeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RecognizeError::Timeout
        } else {
            RecognizeError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// RecognitionService trait
// ---------------------------------------------------------------------------

/// Async interface for speech-to-text services.
///
/// Implementors must be `Send + Sync` so they can be shared across threads
/// (e.g. wrapped in `Arc<dyn RecognitionService>`).
///
/// # Contract
///
/// - `block` is mono signed 16-bit PCM tagged with its sample rate.
/// - `Ok(text)` carries a non-empty transcript.
/// - `Err(RecognizeError::NoSpeech)` means the service understood the
///   request but found no words; other errors are transport/service
///   failures.
#[async_trait]
pub trait RecognitionService: Send + Sync {
    /// Transcribe one audio block.
    async fn recognize(&self, block: &AudioBlock) -> Result<String, RecognizeError>;
}

// ---------------------------------------------------------------------------
// MockRecognizer  (test-only)
// ---------------------------------------------------------------------------

/// A test double that replays a scripted sequence of outcomes.
///
/// Each call pops the next scripted response; once the script is exhausted
/// every further call returns [`RecognizeError::NoSpeech`].  The mock also
/// records the `(len, sample_rate)` of every block it was handed.
#[cfg(test)]
pub struct MockRecognizer {
    script: std::sync::Mutex<std::collections::VecDeque<Result<String, RecognizeError>>>,
    seen: std::sync::Mutex<Vec<(usize, u32)>>,
}

#[cfg(test)]
impl MockRecognizer {
    /// Create a mock that replays `script` in order.
    pub fn script(script: Vec<Result<String, RecognizeError>>) -> Self {
        Self {
            script: std::sync::Mutex::new(script.into()),
            seen: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Number of `recognize` calls made so far.
    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// `(len, sample_rate)` of every block handed to the mock, in order.
    pub fn seen(&self) -> Vec<(usize, u32)> {
        self.seen.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl RecognitionService for MockRecognizer {
    async fn recognize(&self, block: &AudioBlock) -> Result<String, RecognizeError> {
        self.seen
            .lock()
            .unwrap()
            .push((block.len(), block.sample_rate));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(RecognizeError::NoSpeech))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn silence(len: usize) -> AudioBlock {
        AudioBlock {
            samples: vec![0; len],
            sample_rate: 16_000,
        }
    }

    #[tokio::test]
    async fn mock_replays_script_in_order() {
        let mock = MockRecognizer::script(vec![
            Ok("hello".into()),
            Err(RecognizeError::NoSpeech),
            Err(RecognizeError::Request("boom".into())),
        ]);

        assert_eq!(mock.recognize(&silence(100)).await.unwrap(), "hello");
        assert!(matches!(
            mock.recognize(&silence(100)).await.unwrap_err(),
            RecognizeError::NoSpeech
        ));
        assert!(matches!(
            mock.recognize(&silence(100)).await.unwrap_err(),
            RecognizeError::Request(_)
        ));
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn mock_exhausted_script_yields_no_speech() {
        let mock = MockRecognizer::script(vec![]);
        assert!(matches!(
            mock.recognize(&silence(10)).await.unwrap_err(),
            RecognizeError::NoSpeech
        ));
    }

    #[tokio::test]
    async fn mock_records_block_shape() {
        let mock = MockRecognizer::script(vec![Ok("x".into())]);
        let _ = mock.recognize(&silence(48_000)).await;
        assert_eq!(mock.seen(), vec![(48_000, 16_000)]);
    }

    /// If this test compiles, the trait is object-safe.
    #[test]
    fn box_dyn_recognition_service_compiles() {
        let _service: Box<dyn RecognitionService> = Box::new(MockRecognizer::script(vec![]));
    }

    #[test]
    fn error_display_no_speech() {
        assert!(RecognizeError::NoSpeech.to_string().contains("no speech"));
    }

    #[test]
    fn error_display_timeout() {
        assert!(RecognizeError::Timeout.to_string().contains("timed out"));
    }
}

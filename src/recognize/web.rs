//! HTTP client for a cloud speech-API endpoint.
//!
//! `WebSpeechClient` posts WAV-encoded audio to a `speech-api/v2/recognize`
//! style endpoint and parses the JSON-lines response body.  All connection
//! details come from [`RecognitionConfig`]; nothing is hardcoded.
//!
//! The endpoint returns one JSON object per line; lines with an empty
//! `result` array precede the line carrying the transcript:
//!
//! ```text
//! {"result":[]}
//! {"result":[{"alternative":[{"transcript":"turn on the lights","confidence":0.92}],"final":true}],"result_index":0}
//! ```

use std::io::Cursor;

use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};

use crate::audio::AudioBlock;
use crate::config::RecognitionConfig;
use crate::recognize::service::{RecognitionService, RecognizeError};

// ---------------------------------------------------------------------------
// WAV payload encoding
// ---------------------------------------------------------------------------

/// Encode a block as a mono 16-bit PCM WAV byte buffer.
pub fn encode_wav(block: &AudioBlock) -> Result<Vec<u8>, RecognizeError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: block.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| RecognizeError::Encode(e.to_string()))?;
        for &sample in &block.samples {
            writer
                .write_sample(sample)
                .map_err(|e| RecognizeError::Encode(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| RecognizeError::Encode(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Extract the first non-empty transcript from a JSON-lines response body.
///
/// Returns [`RecognizeError::NoSpeech`] when every line carries an empty
/// `result` array (the endpoint's "could not understand audio" signal) and
/// [`RecognizeError::Parse`] when a line is not valid JSON.
pub fn parse_transcript(body: &str) -> Result<String, RecognizeError> {
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let json: serde_json::Value =
            serde_json::from_str(line).map_err(|e| RecognizeError::Parse(e.to_string()))?;

        if let Some(results) = json["result"].as_array() {
            for result in results {
                if let Some(text) = result["alternative"][0]["transcript"].as_str() {
                    let text = text.trim();
                    if !text.is_empty() {
                        return Ok(text.to_string());
                    }
                }
            }
        }
    }

    Err(RecognizeError::NoSpeech)
}

// ---------------------------------------------------------------------------
// WebSpeechClient
// ---------------------------------------------------------------------------

/// Calls a speech-API HTTP endpoint with WAV payloads.
///
/// # No hardcoded URLs
/// All connection details (`base_url`, `api_key`, `language`, timeout) come
/// exclusively from the [`RecognitionConfig`] passed to
/// [`WebSpeechClient::from_config`].
pub struct WebSpeechClient {
    client: reqwest::Client,
    config: RecognitionConfig,
}

impl WebSpeechClient {
    /// Build a `WebSpeechClient` from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.  A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails (should never happen in
    /// practice).
    pub fn from_config(config: &RecognitionConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/speech-api/v2/recognize",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl RecognitionService for WebSpeechClient {
    /// Send one block to the configured endpoint and return its transcript.
    ///
    /// The `key` query parameter is attached **only** when
    /// `config.api_key` is `Some(key)` and `key` is non-empty.
    async fn recognize(&self, block: &AudioBlock) -> Result<String, RecognizeError> {
        let wav = encode_wav(block)?;

        let mut query: Vec<(&str, String)> = vec![
            ("output", "json".into()),
            ("lang", self.config.language.clone()),
        ];
        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            query.push(("key", key.to_string()));
        }

        let response = self
            .client
            .post(self.endpoint())
            .query(&query)
            .header(
                "Content-Type",
                format!("audio/wav; rate={}", block.sample_rate),
            )
            .body(wav)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RecognizeError::Request(format!(
                "service returned HTTP {status}"
            )));
        }

        let body = response.text().await?;
        parse_transcript(&body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

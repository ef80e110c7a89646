use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use log::{debug, error, warn};
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::SynthesisError;
use crate::synthesis::{SynthesisOutput, SynthesisRequest, Synthesizer};
use crate::timing::RawBoundaryEvent;

/// Speech gateway request body
#[derive(Debug, Serialize)]
struct GatewayRequest<'a> {
    text: &'a str,
    voice: &'a str,
    language: &'a str,
    rate: &'a str,
    volume: &'a str,
}

/// Speech gateway response body
#[derive(Debug, Deserialize)]
struct GatewayResponse {
    /// Base64-encoded audio
    audio_base64: String,
    /// Audio container, e.g. `mp3`
    #[serde(default = "default_audio_format")]
    audio_format: String,
    /// Audio length in milliseconds
    duration_ms: f64,
    /// Per-word events; `null` entries are words without timing
    #[serde(default)]
    boundaries: Vec<Option<RawBoundaryEvent>>,
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

/// Client for a JSON speech gateway
///
/// `POST {endpoint}/synthesize` with the request as JSON; transport errors,
/// 429 and 5xx responses are retried with exponential backoff and jitter.
#[derive(Debug, Clone)]
pub struct HttpSynthesizer {
    /// HTTP client for API requests
    client: Client,
    /// Gateway base URL
    endpoint: Url,
    /// Bearer token, if the gateway requires one
    api_key: Option<String>,
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
}

impl HttpSynthesizer {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, SynthesisError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| SynthesisError::RequestFailed(format!("invalid endpoint '{}': {}", endpoint, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SynthesisError::RequestFailed(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            max_retries,
            backoff_base_ms,
        })
    }

    fn synthesize_url(&self) -> String {
        format!("{}/synthesize", self.endpoint.as_str().trim_end_matches('/'))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.backoff_base_ms.saturating_mul(1u64 << (attempt.min(16) - 1));
        let jitter = if self.backoff_base_ms > 0 {
            rand::rng().random_range(0..=self.backoff_base_ms / 2)
        } else {
            0
        };
        Duration::from_millis(base + jitter)
    }

    /// Map a non-success status to a typed error and whether to retry it
    fn classify_status(status: StatusCode, body: String, voice: &str) -> (SynthesisError, bool) {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                (SynthesisError::AuthenticationError(body), false)
            }
            StatusCode::TOO_MANY_REQUESTS => (SynthesisError::RateLimitExceeded(body), true),
            s if (s == StatusCode::BAD_REQUEST
                || s == StatusCode::NOT_FOUND
                || s == StatusCode::UNPROCESSABLE_ENTITY)
                && body.to_lowercase().contains("voice") =>
            {
                (SynthesisError::InvalidVoice(format!("{}: {}", voice, body)), false)
            }
            s => (
                SynthesisError::ApiError {
                    status_code: s.as_u16(),
                    message: body,
                },
                s.is_server_error(),
            ),
        }
    }

    fn decode_response(response: GatewayResponse) -> Result<SynthesisOutput, SynthesisError> {
        let audio = STANDARD
            .decode(response.audio_base64.trim())
            .map_err(|e| SynthesisError::InvalidResponse(format!("audio is not valid base64: {}", e)))?;

        if !response.duration_ms.is_finite() || response.duration_ms < 0.0 {
            return Err(SynthesisError::InvalidResponse(format!(
                "invalid audio duration {}",
                response.duration_ms
            )));
        }

        // Used as a file extension in the artifact directory
        let format_ok = (1..=5).contains(&response.audio_format.len())
            && response
                .audio_format
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
        if !format_ok {
            return Err(SynthesisError::InvalidResponse(format!(
                "unsupported audio format {:?}",
                response.audio_format
            )));
        }

        Ok(SynthesisOutput {
            audio: Bytes::from(audio),
            audio_format: response.audio_format,
            duration_ms: response.duration_ms.round() as u64,
            boundaries: response.boundaries,
        })
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisOutput, SynthesisError> {
        let url = self.synthesize_url();
        let body = GatewayRequest {
            text: &request.text,
            voice: &request.voice,
            language: &request.language,
            rate: &request.rate,
            volume: &request.volume,
        };

        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.max_retries {
            let mut builder = self.client.post(&url).json(&body);
            if let Some(key) = &self.api_key {
                builder = builder.bearer_auth(key);
            }

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed: GatewayResponse = response.json().await.map_err(|e| {
                            SynthesisError::InvalidResponse(format!("failed to parse gateway response: {}", e))
                        })?;
                        let output = Self::decode_response(parsed)?;
                        debug!(
                            "Synthesized {} bytes of {} ({}ms, {} boundaries)",
                            output.audio.len(),
                            output.audio_format,
                            output.duration_ms,
                            output.boundaries.len()
                        );
                        return Ok(output);
                    }

                    let text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Failed to get error response text".to_string());
                    let (err, retryable) = Self::classify_status(status, text, &request.voice);
                    if !retryable {
                        error!("Speech gateway error ({}): {}", status, err);
                        return Err(err);
                    }
                    error!(
                        "Speech gateway error ({}): {} - attempt {}/{}",
                        status,
                        err,
                        attempt + 1,
                        self.max_retries + 1
                    );
                    last_error = Some(err);
                }
                Err(e) => {
                    let err = SynthesisError::ConnectionError(e.to_string());
                    error!(
                        "Speech gateway network error: {} - attempt {}/{}",
                        err,
                        attempt + 1,
                        self.max_retries + 1
                    );
                    last_error = Some(err);
                }
            }

            attempt += 1;

            if attempt <= self.max_retries {
                let delay = self.backoff(attempt);
                warn!("Retrying synthesis in {}ms", delay.as_millis());
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SynthesisError::RequestFailed(format!(
                "synthesis failed after {} attempts",
                self.max_retries + 1
            ))
        }))
    }

    fn name(&self) -> &str {
        "http"
    }
}

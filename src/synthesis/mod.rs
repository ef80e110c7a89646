/*!
 * Speech synthesis boundary.
 *
 * This module contains the `Synthesizer` trait and its implementations:
 * - `HttpSynthesizer`: JSON speech gateway client
 * - `MockSynthesizer`: deterministic synthesizer for tests
 *
 * `SynthesisDeduplicator` sits in front of any synthesizer and guarantees at
 * most one in-flight request per text fingerprint.
 */

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::errors::SynthesisError;
use crate::timing::RawBoundaryEvent;

pub mod dedup;
pub mod fingerprint;
pub mod http;
pub mod mock;

pub use dedup::SynthesisDeduplicator;
pub use fingerprint::Fingerprint;
pub use http::HttpSynthesizer;
pub use mock::{MockSynthesisBehavior, MockSynthesizer};

/// What to synthesize and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    /// Normalized script text
    pub text: String,
    /// Voice identifier, e.g. `es-ES-ElviraNeural`
    pub voice: String,
    /// Locale tag, e.g. `es-ES`
    pub language: String,
    /// Relative speaking rate, e.g. `+0%`
    pub rate: String,
    /// Relative volume, e.g. `+0%`
    pub volume: String,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, voice: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: voice.into(),
            language: language.into(),
            rate: "+0%".to_string(),
            volume: "+0%".to_string(),
        }
    }
}

/// Narration audio plus the raw per-word timing feed
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOutput {
    /// Encoded audio
    pub audio: Bytes,
    /// Container/codec extension, e.g. `mp3`
    pub audio_format: String,
    /// Audio length in milliseconds
    pub duration_ms: u64,
    /// Per-word events by ordinal; `None` marks a word without timing
    pub boundaries: Vec<Option<RawBoundaryEvent>>,
}

/// Common trait for all speech synthesizers
///
/// Dropping the returned future cancels the request.
#[async_trait]
pub trait Synthesizer: Send + Sync + Debug {
    /// Synthesize narration audio and word timings for a request
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisOutput, SynthesisError>;

    /// Short name used in logs
    fn name(&self) -> &str;
}

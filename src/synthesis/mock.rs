/*!
 * Mock synthesizer for testing.
 *
 * This module provides a deterministic synthesizer that simulates the
 * timing feeds real services produce:
 * - `MockSynthesizer::working()` - every word has a boundary
 * - `MockSynthesizer::sparse(n)` - only every Nth word has a boundary
 * - `MockSynthesizer::failing()` - always fails with an API error
 */

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::SynthesisError;
use crate::synthesis::{SynthesisOutput, SynthesisRequest, Synthesizer};
use crate::text::tokenize;
use crate::timing::RawBoundaryEvent;

/// Behavior mode for the mock synthesizer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockSynthesisBehavior {
    /// Every word gets a boundary event
    Working,
    /// Only every Nth word gets a boundary event
    Sparse { keep_every: usize },
    /// Audio without any boundary events
    NoBoundaries,
    /// Always fails with an API error
    Failing,
    /// Rejects the requested voice
    InvalidVoice,
    /// Works after a delay (for concurrency and cancellation tests)
    Slow { delay_ms: u64 },
}

/// Mock synthesizer producing fake audio and regular word timings
#[derive(Debug, Clone)]
pub struct MockSynthesizer {
    behavior: MockSynthesisBehavior,
    request_count: Arc<AtomicUsize>,
    word_ms: u64,
    gap_ms: u64,
    latency: Option<Duration>,
}

impl MockSynthesizer {
    pub fn new(behavior: MockSynthesisBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            word_ms: 400,
            gap_ms: 100,
            latency: None,
        }
    }

    pub fn working() -> Self {
        Self::new(MockSynthesisBehavior::Working)
    }

    pub fn sparse(keep_every: usize) -> Self {
        Self::new(MockSynthesisBehavior::Sparse { keep_every })
    }

    pub fn failing() -> Self {
        Self::new(MockSynthesisBehavior::Failing)
    }

    /// Set the spoken length of each word and the pause after it
    pub fn with_word_timing(mut self, word_ms: u64, gap_ms: u64) -> Self {
        self.word_ms = word_ms;
        self.gap_ms = gap_ms;
        self
    }

    /// Delay every response, whatever the behavior
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Shared counter of synthesize calls
    pub fn request_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.request_count)
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    fn build_output(&self, request: &SynthesisRequest, keep_every: Option<usize>) -> SynthesisOutput {
        let words: Vec<String> = tokenize(&request.text, true)
            .into_iter()
            .filter(|t| t.is_word())
            .map(|t| t.raw_text)
            .collect();

        let slot = self.word_ms + self.gap_ms;
        let boundaries = words
            .iter()
            .enumerate()
            .map(|(i, word)| {
                let keep = match keep_every {
                    Some(0) => false,
                    Some(n) => i % n == 0,
                    None => true,
                };
                keep.then(|| {
                    RawBoundaryEvent::new(word.clone(), (i as u64 * slot) as f64, self.word_ms as f64)
                })
            })
            .collect();

        SynthesisOutput {
            audio: Bytes::from(format!("MOCKAUDIO:{}", request.text)),
            audio_format: "mp3".to_string(),
            duration_ms: (words.len() as u64 * slot).max(slot),
            boundaries,
        }
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisOutput, SynthesisError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.behavior {
            MockSynthesisBehavior::Working => Ok(self.build_output(request, None)),
            MockSynthesisBehavior::Sparse { keep_every } => {
                Ok(self.build_output(request, Some(keep_every)))
            }
            MockSynthesisBehavior::NoBoundaries => Ok(self.build_output(request, Some(0))),
            MockSynthesisBehavior::Failing => Err(SynthesisError::ApiError {
                status_code: 503,
                message: "Simulated synthesis failure".to_string(),
            }),
            MockSynthesisBehavior::InvalidVoice => {
                Err(SynthesisError::InvalidVoice(request.voice.clone()))
            }
            MockSynthesisBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(self.build_output(request, None))
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/*!
 * Reconciliation of raw synthesizer timings into a complete word timeline.
 *
 * Synthesizers report per-word boundary events that may be missing, out of
 * order, overlapping or longer than the audio. The reconciler matches events
 * to WORD tokens by ordinal position, keeps the usable ones as OBSERVED, and
 * fills every remaining word with an INTERPOLATED slot carved proportionally
 * out of the silence between its observed neighbours.
 */

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;
use crate::text::Token;

/// One per-word timing event as reported by a synthesizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBoundaryEvent {
    /// Word text as the synthesizer heard it; informational only
    #[serde(default)]
    pub text: String,
    /// Offset from the start of the audio in milliseconds
    #[serde(rename = "audio_offset_ms")]
    pub start_offset_ms: f64,
    /// Spoken duration in milliseconds
    pub duration_ms: f64,
}

impl RawBoundaryEvent {
    pub fn new(text: impl Into<String>, start_offset_ms: f64, duration_ms: f64) -> Self {
        Self {
            text: text.into(),
            start_offset_ms,
            duration_ms,
        }
    }
}

/// Where a word boundary came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryOrigin {
    Observed,
    Interpolated,
}

/// Final timing of one WORD token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordBoundary {
    /// `sequence_index` of the WORD token
    pub token_index: usize,
    pub start_ms: u64,
    pub duration_ms: u64,
    pub origin: BoundaryOrigin,
}

impl WordBoundary {
    pub fn end_ms(&self) -> u64 {
        self.start_ms + self.duration_ms
    }
}

/// What to do when the synthesizer reported no usable timings at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ZeroBoundaryPolicy {
    /// Spread the whole audio across all words by character length
    #[default]
    Distribute,
    /// Fail with `TimingDataMissing`
    Fail,
}

/// Reconciler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReconcilerConfig {
    #[serde(default)]
    pub zero_boundary_policy: ZeroBoundaryPolicy,
}

/// Complete per-word timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledTimeline {
    /// One boundary per WORD token, in token order
    pub boundaries: Vec<WordBoundary>,
    /// Number of interpolated boundaries
    pub interpolated_count: usize,
    /// `interpolated_count / boundaries.len()`, 0 for an empty timeline
    pub interpolated_fraction: f64,
    pub audio_duration_ms: u64,
    /// Events beyond the last word
    pub ignored_events: usize,
}

impl ReconciledTimeline {
    /// Boundary for a token, if it is a word
    pub fn boundary_for(&self, token_index: usize) -> Option<&WordBoundary> {
        self.boundaries
            .binary_search_by_key(&token_index, |b| b.token_index)
            .ok()
            .map(|i| &self.boundaries[i])
    }
}

/// Reconciles raw boundary feeds against a token stream
#[derive(Debug, Clone, Default)]
pub struct TimingReconciler {
    config: ReconcilerConfig,
}

impl TimingReconciler {
    pub fn new(config: ReconcilerConfig) -> Self {
        Self { config }
    }

    /// Produce exactly one boundary per WORD token in `tokens`
    pub fn reconcile(
        &self,
        tokens: &[Token],
        feed: &[Option<RawBoundaryEvent>],
        audio_duration_ms: u64,
    ) -> Result<ReconciledTimeline, PipelineError> {
        if audio_duration_ms == 0 {
            return Err(PipelineError::TimingDataMissing(
                "audio duration is zero".to_string(),
            ));
        }

        for (ordinal, event) in feed.iter().enumerate() {
            if let Some(event) = event {
                validate_event(ordinal, event)?;
            }
        }

        let words: Vec<&Token> = tokens.iter().filter(|t| t.is_word()).collect();
        let ignored_events = feed.len().saturating_sub(words.len());
        if ignored_events > 0 {
            warn!(
                "Ignoring {} boundary events beyond the last of {} words",
                ignored_events,
                words.len()
            );
        }

        if words.is_empty() {
            return Ok(ReconciledTimeline {
                boundaries: Vec::new(),
                interpolated_count: 0,
                interpolated_fraction: 0.0,
                audio_duration_ms,
                ignored_events,
            });
        }

        let mut observed = observed_spans(&words, feed, audio_duration_ms);

        if observed.iter().all(Option::is_none) {
            match self.config.zero_boundary_policy {
                ZeroBoundaryPolicy::Fail => {
                    return Err(PipelineError::TimingDataMissing(
                        "synthesizer reported no usable word timings".to_string(),
                    ));
                }
                ZeroBoundaryPolicy::Distribute => {
                    warn!(
                        "No word timings observed; distributing {}ms across {} words",
                        audio_duration_ms,
                        words.len()
                    );
                }
            }
        }

        truncate_overlaps(&mut observed);

        let mut spans: Vec<(u64, u64, BoundaryOrigin)> = Vec::with_capacity(words.len());
        let mut index = 0;
        while index < words.len() {
            if let Some((start, end)) = observed[index] {
                spans.push((start, end, BoundaryOrigin::Observed));
                index += 1;
                continue;
            }

            // Maximal run of gaps bounded by observed neighbours or the stream edges
            let run_start = index;
            while index < words.len() && observed[index].is_none() {
                index += 1;
            }
            let window_start = spans.last().map(|&(_, end, _)| end).unwrap_or(0);
            let window_end = observed
                .get(index)
                .copied()
                .flatten()
                .map(|(start, _)| start)
                .unwrap_or(audio_duration_ms)
                .max(window_start);

            let weights: Vec<u64> = words[run_start..index]
                .iter()
                .map(|w| w.char_len().max(1) as u64)
                .collect();
            for (start, end) in distribute(window_start, window_end, &weights) {
                spans.push((start, end, BoundaryOrigin::Interpolated));
            }
        }

        let boundaries: Vec<WordBoundary> = words
            .iter()
            .zip(spans)
            .map(|(word, (start, end, origin))| WordBoundary {
                token_index: word.sequence_index,
                start_ms: start,
                duration_ms: end - start,
                origin,
            })
            .collect();

        let interpolated_count = boundaries
            .iter()
            .filter(|b| b.origin == BoundaryOrigin::Interpolated)
            .count();
        let interpolated_fraction = interpolated_count as f64 / boundaries.len() as f64;

        debug!(
            "Reconciled {} words ({} interpolated) over {}ms",
            boundaries.len(),
            interpolated_count,
            audio_duration_ms
        );

        Ok(ReconciledTimeline {
            boundaries,
            interpolated_count,
            interpolated_fraction,
            audio_duration_ms,
            ignored_events,
        })
    }
}

fn validate_event(ordinal: usize, event: &RawBoundaryEvent) -> Result<(), PipelineError> {
    let usable = |v: f64| v.is_finite() && v >= 0.0;
    if !usable(event.start_offset_ms) || !usable(event.duration_ms) {
        return Err(PipelineError::TimingDataMissing(format!(
            "boundary event {} ('{}') has invalid offset {} or duration {}",
            ordinal, event.text, event.start_offset_ms, event.duration_ms
        )));
    }
    Ok(())
}

/// Map the feed onto words, demoting unusable events to gaps
fn observed_spans(
    words: &[&Token],
    feed: &[Option<RawBoundaryEvent>],
    audio_duration_ms: u64,
) -> Vec<Option<(u64, u64)>> {
    let mut last_start: Option<u64> = None;

    (0..words.len())
        .map(|ordinal| {
            let event = feed.get(ordinal)?.as_ref()?;
            let start = event.start_offset_ms.round() as u64;
            let duration = event.duration_ms.round() as u64;

            if duration == 0 {
                debug!("Word {} has no duration; interpolating", ordinal);
                return None;
            }
            if start >= audio_duration_ms {
                warn!(
                    "Word {} starts at {}ms, past the {}ms audio; interpolating",
                    ordinal, start, audio_duration_ms
                );
                return None;
            }
            if last_start.is_some_and(|previous| start < previous) {
                warn!("Word {} starts before its predecessor; interpolating", ordinal);
                return None;
            }

            last_start = Some(start);
            Some((start, (start + duration).min(audio_duration_ms)))
        })
        .collect()
}

/// Cut each observed span at the start of the next observed one
fn truncate_overlaps(observed: &mut [Option<(u64, u64)>]) {
    let mut previous: Option<usize> = None;
    for index in 0..observed.len() {
        let Some((start, _)) = observed[index] else {
            continue;
        };
        if let Some(prev) = previous {
            if let Some((prev_start, prev_end)) = observed[prev] {
                if prev_end > start {
                    observed[prev] = Some((prev_start, start));
                }
            }
        }
        previous = Some(index);
    }
}

/// Split `[start, end]` into contiguous slots proportional to `weights`
///
/// Slot edges are rounded from cumulative weights so the slots tile the
/// window exactly with no accumulated drift.
pub fn distribute(start: u64, end: u64, weights: &[u64]) -> Vec<(u64, u64)> {
    let span = end.saturating_sub(start) as u128;
    let total: u128 = weights.iter().map(|&w| w as u128).sum::<u128>().max(1);

    let mut slots = Vec::with_capacity(weights.len());
    let mut cumulative: u128 = 0;
    let mut slot_start = start;
    for &weight in weights {
        cumulative += weight as u128;
        let slot_end = start + ((span * cumulative + total / 2) / total) as u64;
        slots.push((slot_start, slot_end));
        slot_start = slot_end;
    }
    slots
}

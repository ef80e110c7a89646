/*!
 * Caption composition from a script and a boundary feed.
 *
 * Runs the stages that need no synthesizer or renderer, so the offline
 * `captions` command and the full pipeline share them.
 */

use log::{info, warn};

use crate::captions::{Segmentation, Segmenter, SubtitleStyle, generate_ass_file};
use crate::errors::PipelineError;
use crate::pipeline::{PipelineConfig, PipelineStage};
use crate::text::{NormalizedScript, Normalizer};
use crate::timing::{RawBoundaryEvent, ReconciledTimeline, TimingReconciler};

/// Captions built from a script and a timing feed
#[derive(Debug, Clone)]
pub struct ComposedCaptions {
    pub script: NormalizedScript,
    pub timeline: ReconciledTimeline,
    pub segmentation: Segmentation,
    /// Full ASS document
    pub markup: String,
}

/// The pure stages of the pipeline: normalize, reconcile, segment and
/// generate markup
///
/// No I/O happens here, so the same composer serves live runs and offline
/// caption generation from a recorded boundary feed.
#[derive(Debug, Clone)]
pub struct CaptionComposer {
    normalizer: Normalizer,
    reconciler: TimingReconciler,
    segmenter: Segmenter,
    style: SubtitleStyle,
    play_res: (u32, u32),
    max_script_chars: usize,
}

impl CaptionComposer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            normalizer: Normalizer::new(config.normalization.clone(), &config.language),
            reconciler: TimingReconciler::new(config.reconciler.clone()),
            segmenter: Segmenter::new(config.segmentation.clone(), config.style.use_uppercase()),
            style: config.style.clone(),
            play_res: (config.planner.output_width, config.planner.output_height),
            max_script_chars: config.max_script_chars,
        }
    }

    pub fn style(&self) -> &SubtitleStyle {
        &self.style
    }

    /// Decode, bound-check, normalize and tokenize a script
    pub fn normalize(&self, script: &[u8]) -> Result<NormalizedScript, PipelineError> {
        let text = std::str::from_utf8(script)?;

        let chars = text.chars().count();
        if chars > self.max_script_chars {
            return Err(PipelineError::ScriptTooLong {
                chars,
                limit: self.max_script_chars,
            });
        }

        let normalized = self.normalizer.process(text);
        if normalized.word_count() == 0 {
            return Err(PipelineError::EmptyScript);
        }
        Ok(normalized)
    }

    pub fn reconcile(
        &self,
        script: &NormalizedScript,
        feed: &[Option<RawBoundaryEvent>],
        audio_duration_ms: u64,
    ) -> Result<ReconciledTimeline, PipelineError> {
        let timeline = self.reconciler.reconcile(&script.tokens, feed, audio_duration_ms)?;
        if timeline.interpolated_count > 0 {
            warn!(
                "Interpolated {} of {} word timings ({:.1}%)",
                timeline.interpolated_count,
                timeline.boundaries.len(),
                timeline.interpolated_fraction * 100.0
            );
        }
        Ok(timeline)
    }

    pub fn segment(&self, script: &NormalizedScript, timeline: &ReconciledTimeline) -> Segmentation {
        self.segmenter.segment(&script.tokens, timeline)
    }

    pub fn markup(&self, segmentation: &Segmentation) -> String {
        generate_ass_file(&segmentation.events, &self.style, self.play_res)
    }

    /// Run the pure stages end to end
    ///
    /// On failure, the stage that failed is returned with the error.
    pub fn compose(
        &self,
        script: &[u8],
        feed: &[Option<RawBoundaryEvent>],
        audio_duration_ms: u64,
    ) -> Result<ComposedCaptions, (PipelineStage, PipelineError)> {
        let script = self
            .normalize(script)
            .map_err(|e| (PipelineStage::Normalize, e))?;
        let timeline = self
            .reconcile(&script, feed, audio_duration_ms)
            .map_err(|e| (PipelineStage::Reconcile, e))?;
        let segmentation = self.segment(&script, &timeline);
        let markup = self.markup(&segmentation);

        info!(
            "Composed {} caption events for {} words",
            segmentation.events.len(),
            script.word_count()
        );

        Ok(ComposedCaptions {
            script,
            timeline,
            segmentation,
            markup,
        })
    }
}

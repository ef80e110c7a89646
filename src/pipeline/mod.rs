/*!
 * Caption pipeline.
 *
 * Stages run strictly in order:
 * `Normalize -> Synthesize -> Reconcile -> Segment -> GenerateMarkup ->
 * PlanAlignment -> Render`. The first failing stage halts the run; the
 * result names that stage and keeps every artifact produced before it.
 *
 * - `CaptionComposer`: the pure text-to-markup stages, usable offline
 * - `Pipeline`: the full run with synthesis, caching and rendering
 */

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};

use crate::captions::{SegmentationConfig, Segmentation, SubtitleStyle};
use crate::errors::PipelineError;
use crate::render::{AlignmentPlan, PlannerConfig};
use crate::synthesis::{Fingerprint, SynthesisOutput};
use crate::text::{NormalizationConfig, NormalizedScript};
use crate::timing::{ReconciledTimeline, ReconcilerConfig};

pub mod compose;
pub mod orchestrator;

pub use compose::{CaptionComposer, ComposedCaptions};
pub use orchestrator::Pipeline;

/// Default ceiling on script length in characters
pub const DEFAULT_MAX_SCRIPT_CHARS: usize = 5_000;

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Normalize,
    Synthesize,
    Reconcile,
    Segment,
    GenerateMarkup,
    PlanAlignment,
    Render,
}

impl PipelineStage {
    pub fn all() -> [PipelineStage; 7] {
        [
            PipelineStage::Normalize,
            PipelineStage::Synthesize,
            PipelineStage::Reconcile,
            PipelineStage::Segment,
            PipelineStage::GenerateMarkup,
            PipelineStage::PlanAlignment,
            PipelineStage::Render,
        ]
    }

    /// Human readable label for progress output
    pub fn label(&self) -> &'static str {
        match self {
            PipelineStage::Normalize => "Normalizing script",
            PipelineStage::Synthesize => "Synthesizing narration",
            PipelineStage::Reconcile => "Reconciling word timings",
            PipelineStage::Segment => "Segmenting captions",
            PipelineStage::GenerateMarkup => "Generating karaoke markup",
            PipelineStage::PlanAlignment => "Planning background alignment",
            PipelineStage::Render => "Rendering video",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Normalize => "normalize",
            PipelineStage::Synthesize => "synthesize",
            PipelineStage::Reconcile => "reconcile",
            PipelineStage::Segment => "segment",
            PipelineStage::GenerateMarkup => "generate_markup",
            PipelineStage::PlanAlignment => "plan_alignment",
            PipelineStage::Render => "render",
        };
        write!(f, "{}", name)
    }
}

/// Resolved settings for one pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Script locale, e.g. `es-ES`
    pub language: String,
    /// Synthesizer voice
    pub voice: String,
    /// Relative speaking rate, e.g. `+0%`
    pub rate: String,
    /// Relative volume, e.g. `+0%`
    pub volume: String,
    pub normalization: NormalizationConfig,
    pub reconciler: ReconcilerConfig,
    pub segmentation: SegmentationConfig,
    pub style: SubtitleStyle,
    pub planner: PlannerConfig,
    /// Scripts longer than this are rejected
    pub max_script_chars: usize,
    /// Artifact cache root; `None` disables caching
    pub artifact_dir: Option<PathBuf>,
}

impl PipelineConfig {
    /// Settings for a locale and voice with every other value at its default
    pub fn new(language: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            voice: voice.into(),
            rate: "+0%".to_string(),
            volume: "+0%".to_string(),
            normalization: NormalizationConfig::default(),
            reconciler: ReconcilerConfig::default(),
            segmentation: SegmentationConfig::default(),
            style: SubtitleStyle::default(),
            planner: PlannerConfig::default(),
            max_script_chars: DEFAULT_MAX_SCRIPT_CHARS,
            artifact_dir: None,
        }
    }
}

/// Everything produced so far by a run
#[derive(Debug, Clone, Default)]
pub struct PipelineArtifacts {
    pub script: Option<NormalizedScript>,
    pub synthesis: Option<Arc<SynthesisOutput>>,
    /// Narration audio on disk
    pub audio_path: Option<PathBuf>,
    pub timeline: Option<ReconciledTimeline>,
    pub segmentation: Option<Segmentation>,
    /// Full ASS document
    pub markup: Option<String>,
    pub plan: Option<AlignmentPlan>,
}

/// Outcome of one pipeline run
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub success: bool,
    /// Identifier of this run, used in logs and temp paths
    pub invocation_id: String,
    pub narration_duration_ms: u64,
    pub word_count: usize,
    pub segment_count: usize,
    /// Share of words whose timing was interpolated, in `[0, 1]`
    pub interpolated_fraction: f64,
    /// Words wider than a caption line, emitted alone
    pub overflow_count: usize,
    pub fingerprint: Option<Fingerprint>,
    /// Whether narration came from the artifact cache
    pub cache_hit: bool,
    pub output_path: Option<PathBuf>,
    pub failed_stage: Option<PipelineStage>,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<PipelineError>,
    #[serde(skip)]
    pub artifacts: PipelineArtifacts,
}

fn serialize_error<S: Serializer>(error: &Option<PipelineError>, serializer: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

impl PipelineResult {
    pub(crate) fn new(invocation_id: String) -> Self {
        Self {
            success: false,
            invocation_id,
            narration_duration_ms: 0,
            word_count: 0,
            segment_count: 0,
            interpolated_fraction: 0.0,
            overflow_count: 0,
            fingerprint: None,
            cache_hit: false,
            output_path: None,
            failed_stage: None,
            error: None,
            artifacts: PipelineArtifacts::default(),
        }
    }

    /// Mark the run as failed at `stage`
    pub(crate) fn fail(mut self, stage: PipelineStage, error: PipelineError) -> Self {
        self.success = false;
        self.failed_stage = Some(stage);
        self.error = Some(error);
        self
    }

    /// Statistics recorded in the artifact metadata
    pub fn stats_json(&self) -> serde_json::Value {
        serde_json::json!({
            "audio_duration_ms": self.narration_duration_ms,
            "word_count": self.word_count,
            "segment_count": self.segment_count,
            "interpolated_words_pct": (self.interpolated_fraction * 1000.0).round() / 10.0,
            "overflow_count": self.overflow_count,
        })
    }
}

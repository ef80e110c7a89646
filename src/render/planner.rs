/*!
 * Alignment planning between background video and narration.
 *
 * Pure and deterministic: given the background's geometry and length and
 * the narration length, decide the crop rectangle and whether the
 * background is looped, frozen on its last frame or trimmed. The narration
 * length is authoritative.
 */

use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;
use crate::render::MediaInfo;

/// Centered crop rectangle in source pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    #[serde(rename = "w")]
    pub width: u32,
    #[serde(rename = "h")]
    pub height: u32,
}

/// How the background length is matched to the narration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationPolicy {
    /// Repeat the background (hard cut at the seam)
    Loop,
    /// Cut the background at the target duration
    Trim,
    /// Hold the last frame until the target duration
    FreezeLastFrame,
}

/// Declarative render plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentPlan {
    /// `None` when no crop is needed or the crop would be the full frame
    pub crop_rect: Option<CropRect>,
    pub duration_policy: DurationPolicy,
    /// Output duration; always the narration duration
    pub target_duration_ms: u64,
    pub source_duration_ms: u64,
    /// Source plays needed to cover the target (1 unless looping)
    pub repeat_count: u32,
}

/// Planner settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    // @field: Output frame width
    #[serde(default = "default_output_width")]
    pub output_width: u32,

    // @field: Output frame height
    #[serde(default = "default_output_height")]
    pub output_height: u32,

    // @field: Aspect ratio difference tolerated without cropping
    #[serde(default = "default_aspect_tolerance")]
    pub aspect_tolerance: f64,

    // @field: Freeze the last frame instead of looping short backgrounds
    #[serde(default)]
    pub prefer_freeze_last_frame: bool,
}

fn default_output_width() -> u32 {
    1080
}

fn default_output_height() -> u32 {
    1920
}

fn default_aspect_tolerance() -> f64 {
    0.01
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            output_width: default_output_width(),
            output_height: default_output_height(),
            aspect_tolerance: default_aspect_tolerance(),
            prefer_freeze_last_frame: false,
        }
    }
}

impl PlannerConfig {
    pub fn target_aspect(&self) -> f64 {
        self.output_width as f64 / self.output_height as f64
    }
}

/// Compute the alignment plan for a background and a narration length
pub fn plan_alignment(
    source: &MediaInfo,
    narration_duration_ms: u64,
    config: &PlannerConfig,
) -> Result<AlignmentPlan, PipelineError> {
    if source.width == 0 || source.height == 0 {
        return Err(PipelineError::InvalidMedia(format!(
            "background has invalid dimensions {}x{}",
            source.width, source.height
        )));
    }
    if source.duration_ms == 0 {
        return Err(PipelineError::InvalidMedia(
            "background has zero duration".to_string(),
        ));
    }
    if narration_duration_ms == 0 {
        return Err(PipelineError::InvalidMedia(
            "narration has zero duration".to_string(),
        ));
    }
    if config.output_width == 0 || config.output_height == 0 {
        return Err(PipelineError::InvalidMedia(format!(
            "output has invalid dimensions {}x{}",
            config.output_width, config.output_height
        )));
    }

    let crop_rect = compute_crop(source.width, source.height, config);

    let (duration_policy, repeat_count) = if source.duration_ms < narration_duration_ms {
        if config.prefer_freeze_last_frame {
            (DurationPolicy::FreezeLastFrame, 1)
        } else {
            let repeats = narration_duration_ms.div_ceil(source.duration_ms);
            (DurationPolicy::Loop, u32::try_from(repeats).unwrap_or(u32::MAX))
        }
    } else {
        (DurationPolicy::Trim, 1)
    };

    Ok(AlignmentPlan {
        crop_rect,
        duration_policy,
        target_duration_ms: narration_duration_ms,
        source_duration_ms: source.duration_ms,
        repeat_count,
    })
}

/// Centered full-height crop to the output aspect, never wider than the source
fn compute_crop(width: u32, height: u32, config: &PlannerConfig) -> Option<CropRect> {
    let target_aspect = config.target_aspect();
    let source_aspect = width as f64 / height as f64;
    if (source_aspect - target_aspect).abs() <= config.aspect_tolerance {
        return None;
    }

    let crop_width = ((height as f64 * target_aspect).round() as u32).min(width);
    if crop_width == width {
        // Narrower than the target: the renderer letterboxes instead
        return None;
    }

    Some(CropRect {
        x: (width - crop_width) / 2,
        y: 0,
        width: crop_width,
        height,
    })
}

/*!
 * Video rendering: alignment planning and the renderer boundary.
 *
 * The planner decides how the background must be cropped and how its length
 * is matched to the narration. A `Renderer` turns that plan, the narration
 * audio and the caption file into the final video.
 */

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::errors::PipelineError;

pub mod ffmpeg;
pub mod planner;

pub use ffmpeg::{FfmpegRenderer, RendererConfig};
pub use planner::{AlignmentPlan, CropRect, DurationPolicy, PlannerConfig, plan_alignment};

/// Receives `true` when the caller wants the render aborted
pub type CancelSignal = watch::Receiver<bool>;

/// Create a cancellation pair; send `true` to cancel
pub fn cancel_channel() -> (watch::Sender<bool>, CancelSignal) {
    watch::channel(false)
}

/// Resolves once cancellation is requested; never resolves if the sender is gone
pub async fn cancelled(signal: &mut CancelSignal) {
    loop {
        if *signal.borrow_and_update() {
            return;
        }
        if signal.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Properties of a background video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    pub duration_ms: u64,
}

/// Everything a renderer needs for one output video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderJob {
    /// Background video
    pub background: PathBuf,
    /// Narration audio
    pub audio: PathBuf,
    /// ASS caption file
    pub subtitles: PathBuf,
    /// Destination video file
    pub output: PathBuf,
    /// Crop and duration instructions
    pub plan: AlignmentPlan,
}

/// Renderer boundary
#[async_trait]
pub trait Renderer: Send + Sync + Debug {
    /// Fail with `MissingDependency` when the renderer cannot run at all
    async fn ensure_available(&self) -> Result<(), PipelineError>;

    /// Read dimensions and duration of a media file
    async fn probe(&self, path: &Path) -> Result<MediaInfo, PipelineError>;

    /// Produce `job.output`, honouring the timeout and `cancel`
    ///
    /// On any failure the partially written output is removed.
    async fn render(&self, job: &RenderJob, cancel: CancelSignal) -> Result<PathBuf, PipelineError>;
}

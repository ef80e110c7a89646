/*!
 * FFmpeg-based renderer.
 *
 * Drives `ffprobe` to inspect backgrounds and `ffmpeg` to burn the captions
 * into the final vertical video. Both run through `tokio::process` with a
 * timeout; `ffmpeg` additionally listens for cancellation and is killed
 * before any partial output is removed.
 */

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

use crate::errors::PipelineError;
use crate::render::{
    AlignmentPlan, CancelSignal, DurationPolicy, MediaInfo, RenderJob, Renderer, cancelled,
};

/// Encoder and process settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererConfig {
    // @field: ffmpeg binary
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    // @field: ffprobe binary
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,

    // @field: Output frame width
    #[serde(default = "default_width")]
    pub width: u32,

    // @field: Output frame height
    #[serde(default = "default_height")]
    pub height: u32,

    // @field: Output frame rate
    #[serde(default = "default_fps")]
    pub fps: u32,

    // @field: Video encoder
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    // @field: Audio encoder
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    // @field: x264 constant rate factor
    #[serde(default = "default_crf")]
    pub crf: u8,

    // @field: x264 speed preset
    #[serde(default = "default_preset")]
    pub preset: String,

    // @field: Render timeout in seconds
    #[serde(default = "default_render_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Probe timeout in seconds
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_width() -> u32 {
    1080
}

fn default_height() -> u32 {
    1920
}

fn default_fps() -> u32 {
    30
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_crf() -> u8 {
    23
}

fn default_preset() -> String {
    "medium".to_string()
}

fn default_render_timeout_secs() -> u64 {
    600
}

fn default_probe_timeout_secs() -> u64 {
    60
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            crf: default_crf(),
            preset: default_preset(),
            timeout_secs: default_render_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

enum RenderOutcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Renderer backed by the ffmpeg command line tools
#[derive(Debug, Clone, Default)]
pub struct FfmpegRenderer {
    config: RendererConfig,
}

impl FfmpegRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Video filter chain for a plan
    ///
    /// A crop is followed by a plain scale; without one the frame is scaled
    /// to fit and padded so it is never stretched.
    pub fn build_filter_chain(&self, plan: &AlignmentPlan, subtitles_name: &str) -> String {
        let (w, h) = (self.config.width, self.config.height);
        let mut filters = Vec::new();

        match plan.crop_rect {
            Some(crop) => {
                filters.push(format!("crop={}:{}:{}:{}", crop.width, crop.height, crop.x, crop.y));
                filters.push(format!("scale={}:{}", w, h));
            }
            None => {
                filters.push(format!("scale={}:{}:force_original_aspect_ratio=decrease", w, h));
                filters.push(format!("pad={}:{}:(ow-iw)/2:(oh-ih)/2:color=black", w, h));
            }
        }
        filters.push("setsar=1".to_string());
        filters.push(format!("fps={}", self.config.fps));

        if plan.duration_policy == DurationPolicy::FreezeLastFrame {
            let hold_ms = plan.target_duration_ms.saturating_sub(plan.source_duration_ms);
            filters.push(format!(
                "tpad=stop_mode=clone:stop_duration={}",
                format_seconds(hold_ms)
            ));
        }

        filters.push(format!(
            "subtitles=filename='{}'",
            escape_filter_value(subtitles_name)
        ));
        filters.join(",")
    }

    /// Full ffmpeg argument list for a job
    ///
    /// The subtitles file is referenced by name only; the process runs with
    /// its directory as working directory so the path needs no escaping.
    pub fn build_args(&self, job: &RenderJob, background: &Path, audio: &Path, output: &Path) -> Vec<String> {
        let subtitles_name = job
            .subtitles
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut args: Vec<String> = vec![
            "-y".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
        ];
        if job.plan.duration_policy == DurationPolicy::Loop {
            args.extend(["-stream_loop".into(), "-1".into()]);
        }
        args.extend([
            "-i".into(),
            background.to_string_lossy().into_owned(),
            "-i".into(),
            audio.to_string_lossy().into_owned(),
            "-vf".into(),
            self.build_filter_chain(&job.plan, &subtitles_name),
            "-map".into(),
            "0:v:0".into(),
            "-map".into(),
            "1:a:0".into(),
            "-c:v".into(),
            self.config.video_codec.clone(),
            "-preset".into(),
            self.config.preset.clone(),
            "-crf".into(),
            self.config.crf.to_string(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-c:a".into(),
            self.config.audio_codec.clone(),
            "-t".into(),
            format_seconds(job.plan.target_duration_ms),
            "-shortest".into(),
            output.to_string_lossy().into_owned(),
        ]);
        args
    }

    async fn check_binary(&self, binary: &str) -> Result<(), PipelineError> {
        let result = Command::new(binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match result {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(PipelineError::MissingDependency {
                binary: binary.to_string(),
                detail: format!("'{} -version' exited with {}", binary, status),
            }),
            Err(e) => Err(PipelineError::MissingDependency {
                binary: binary.to_string(),
                detail: e.to_string(),
            }),
        }
    }

    /// Filter ffmpeg stderr to the lines that explain a failure
    fn filter_ffmpeg_stderr(stderr: &str) -> String {
        let noise_prefixes = [
            "ffmpeg version",
            "built with",
            "configuration:",
            "Input #",
            "Metadata:",
            "Duration:",
            "Stream #",
            "Output #",
            "Stream mapping:",
            "Press [q]",
        ];

        let meaningful: Vec<&str> = stderr
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| !noise_prefixes.iter().any(|p| line.starts_with(p)))
            .collect();

        if meaningful.is_empty() {
            "unknown ffmpeg error (stderr was empty after filtering)".to_string()
        } else {
            meaningful.join("\n")
        }
    }

    async fn abort(child: &mut Child, output: &Path) {
        if let Err(e) = child.kill().await {
            warn!("Failed to kill ffmpeg: {}", e);
        }
        remove_partial_output(output).await;
    }
}

#[async_trait]
impl Renderer for FfmpegRenderer {
    async fn ensure_available(&self) -> Result<(), PipelineError> {
        self.check_binary(&self.config.ffmpeg_path).await?;
        self.check_binary(&self.config.ffprobe_path).await?;
        Ok(())
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::InvalidMedia(format!(
                "background video not found: {:?}",
                path
            )));
        }

        let ffprobe_future = Command::new(&self.config.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_streams", "-show_format", "-select_streams", "v:0"])
            .arg(path)
            .kill_on_drop(true)
            .output();

        let timeout_duration = Duration::from_secs(self.config.probe_timeout_secs);
        let output = tokio::select! {
            result = ffprobe_future => {
                result.map_err(|e| PipelineError::MissingDependency {
                    binary: self.config.ffprobe_path.clone(),
                    detail: e.to_string(),
                })?
            },
            _ = tokio::time::sleep(timeout_duration) => {
                return Err(PipelineError::InvalidMedia(format!(
                    "ffprobe timed out after {} seconds", self.config.probe_timeout_secs
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("ffprobe failed: {}", stderr);
            return Err(PipelineError::InvalidMedia(format!("ffprobe failed: {}", stderr.trim())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_probe_output(&stdout)
    }

    async fn render(&self, job: &RenderJob, mut cancel: CancelSignal) -> Result<PathBuf, PipelineError> {
        let background = std::path::absolute(&job.background)?;
        let audio = std::path::absolute(&job.audio)?;
        let output = std::path::absolute(&job.output)?;
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let working_dir = job
            .subtitles
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let args = self.build_args(job, &background, &audio, &output);
        debug!("Running {} {}", self.config.ffmpeg_path, args.join(" "));

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .current_dir(&working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PipelineError::MissingDependency {
                binary: self.config.ffmpeg_path.clone(),
                detail: e.to_string(),
            })?;

        // Drain stderr concurrently so a chatty ffmpeg never blocks on the pipe
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buffer = String::new();
                let _ = stderr.read_to_string(&mut buffer).await;
                buffer
            })
        });

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let outcome = tokio::select! {
            status = child.wait() => RenderOutcome::Exited(status),
            _ = tokio::time::sleep(timeout_duration) => RenderOutcome::TimedOut,
            _ = cancelled(&mut cancel) => RenderOutcome::Cancelled,
        };

        let status = match outcome {
            RenderOutcome::Exited(status) => status?,
            RenderOutcome::TimedOut => {
                warn!("Render timed out after {}s; killing ffmpeg", self.config.timeout_secs);
                Self::abort(&mut child, &output).await;
                return Err(PipelineError::RenderTimeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
            RenderOutcome::Cancelled => {
                info!("Render cancelled; killing ffmpeg");
                Self::abort(&mut child, &output).await;
                return Err(PipelineError::RenderCancelled);
            }
        };

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            remove_partial_output(&output).await;
            let filtered = Self::filter_ffmpeg_stderr(&stderr);
            error!("Render failed: {}", filtered);
            return Err(PipelineError::Render {
                exit_code: status.code(),
                stderr: filtered,
            });
        }

        if !output.exists() {
            return Err(PipelineError::Render {
                exit_code: status.code(),
                stderr: "ffmpeg reported success but wrote no output".to_string(),
            });
        }

        info!("Rendered {:?}", output);
        Ok(output)
    }
}

/// Parse `ffprobe -print_format json` output into media properties
pub fn parse_probe_output(stdout: &str) -> Result<MediaInfo, PipelineError> {
    if stdout.trim().is_empty() {
        return Err(PipelineError::InvalidMedia("ffprobe returned no output".to_string()));
    }

    let json: Value = serde_json::from_str(stdout)
        .map_err(|e| PipelineError::InvalidMedia(format!("failed to parse ffprobe JSON: {}", e)))?;

    let stream = json
        .get("streams")
        .and_then(|s| s.as_array())
        .and_then(|s| s.first())
        .ok_or_else(|| PipelineError::InvalidMedia("no video stream found".to_string()))?;

    let dimension = |key: &str| {
        stream
            .get(key)
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0)
    };
    let width = dimension("width");
    let height = dimension("height");

    // Containers report duration as a decimal string of seconds
    let seconds = |v: &Value| -> Option<f64> {
        v.get("duration")
            .and_then(|d| d.as_str())
            .and_then(|d| d.parse::<f64>().ok())
    };
    let duration_secs = json
        .get("format")
        .and_then(seconds)
        .or_else(|| seconds(stream))
        .unwrap_or(0.0);

    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidMedia(
            "video stream has no dimensions".to_string(),
        ));
    }

    Ok(MediaInfo {
        width,
        height,
        duration_ms: (duration_secs * 1000.0).round().max(0.0) as u64,
    })
}

/// Milliseconds as seconds with millisecond precision
fn format_seconds(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

/// Escape a value placed inside single quotes in a filter graph
fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\'', "'\\''")
        .replace(':', "\\:")
}

async fn remove_partial_output(output: &Path) {
    if tokio::fs::try_exists(output).await.unwrap_or(false) {
        match tokio::fs::remove_file(output).await {
            Ok(()) => debug!("Removed partial output {:?}", output),
            Err(e) => warn!("Failed to remove partial output {:?}: {}", output, e),
        }
    }
}

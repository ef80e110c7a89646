/*!
 * # kreel - Karaoke REEL generator
 *
 * A Rust library that turns a plain-text script and a background video into
 * a vertical video with synthesized narration and word-synchronized karaoke
 * captions.
 *
 * ## Features
 *
 * - Script normalization and tokenization (numbers and abbreviations
 *   spoken out for English and Spanish)
 * - Reconciliation of sparse synthesizer word timings into a complete timeline
 * - Single-line caption segmentation
 * - ASS karaoke markup with centisecond-exact highlight tags
 * - Crop and loop/trim planning of the background against the narration
 * - Content-addressed narration cache and in-flight synthesis deduplication
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `text`: Normalizer and tokenizer
 * - `timing`: Timing reconciler
 * - `captions`: Segmenter, subtitle styles and ASS markup generation
 * - `render`: Alignment planner and the ffmpeg renderer
 * - `synthesis`: Synthesizer trait, speech gateway client, mock and deduplication
 * - `pipeline`: Stage orchestration and run results
 * - `app_config`: Configuration management
 * - `file_utils`: File system operations and the artifact store
 * - `language_utils`: Locale tag utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod captions;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod pipeline;
pub mod render;
pub mod synthesis;
pub mod text;
pub mod timing;

// Re-export main types for easier usage
pub use app_config::Config;
pub use captions::{CaptionEvent, Segmenter, SubtitleStyle};
pub use errors::{PipelineError, StyleError, SynthesisError};
pub use language_utils::get_language_name;
pub use pipeline::{CaptionComposer, Pipeline, PipelineConfig, PipelineResult, PipelineStage};
pub use render::{AlignmentPlan, FfmpegRenderer, Renderer, plan_alignment};
pub use synthesis::{HttpSynthesizer, MockSynthesizer, SynthesisDeduplicator, Synthesizer};
pub use text::Normalizer;
pub use timing::TimingReconciler;

/*!
 * Caption building: segmentation into single-line events, validated styles
 * and ASS karaoke markup.
 */

pub mod ass;
pub mod segmenter;
pub mod style;

pub use ass::{MarkupLine, format_ass_timestamp, generate_ass_file, render_event};
pub use segmenter::{
    CaptionEvent, SegmentationConfig, Segmentation, SegmentationOverflow, Segmenter, TimedToken,
};
pub use style::{Alignment, HighlightMode, StylePreset, SubtitleStyle, SubtitleStyleFields};

//! ASS (Advanced SubStation Alpha) karaoke markup generation.
//!
//! Every position is rounded to centiseconds on the absolute timeline and
//! each karaoke tag is the difference between two rounded positions, so the
//! tags of a line always add up to exactly the duration the line is shown.

use super::segmenter::CaptionEvent;
use super::style::SubtitleStyle;

/// One serialized caption line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupLine {
    /// Line start in centiseconds
    pub start_cs: u64,
    /// Line end in centiseconds
    pub end_cs: u64,
    /// Karaoke-tagged text
    pub text: String,
}

impl MarkupLine {
    /// Full `Dialogue:` line
    pub fn to_dialogue(&self, style_name: &str) -> String {
        format!(
            "Dialogue: 0,{start},{end},{style},,0,0,0,,{text}",
            start = format_ass_timestamp_cs(self.start_cs),
            end = format_ass_timestamp_cs(self.end_cs),
            style = style_name,
            text = self.text
        )
    }
}

/// Round milliseconds to the nearest centisecond
pub fn ms_to_cs(ms: u64) -> u64 {
    (ms + 5) / 10
}

/// Format milliseconds as an ASS timestamp (H:MM:SS.cc)
pub fn format_ass_timestamp(ms: u64) -> String {
    format_ass_timestamp_cs(ms_to_cs(ms))
}

fn format_ass_timestamp_cs(cs: u64) -> String {
    let hours = cs / 360_000;
    let minutes = (cs / 6_000) % 60;
    let seconds = (cs / 100) % 60;
    let centiseconds = cs % 100;
    format!("{}:{:02}:{:02}.{:02}", hours, minutes, seconds, centiseconds)
}

/// Escape override braces and backslashes in ASS text
pub fn escape_ass_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('{', "\\{")
        .replace('}', "\\}")
        .replace('\n', "\\N")
}

fn karaoke_tag(tag: &str, centiseconds: u64) -> String {
    format!("{{\\{}{}}}", tag, centiseconds)
}

/// Serialize one caption event into karaoke markup
///
/// Words carry a tag for their own duration. Silence between two words is
/// carried by a tag on the separating space so later words stay in sync
/// and the tags of a line add up to its displayed duration.
/// Punctuation gets a zero tag and is displayed with its word.
pub fn render_event(event: &CaptionEvent, style: &SubtitleStyle) -> MarkupLine {
    let tag = style.highlight_mode().tag();
    let start_cs = ms_to_cs(event.start_ms);
    let mut cursor = start_cs;
    let mut text = String::new();

    for (i, entry) in event.entries.iter().enumerate() {
        let token = &entry.token;
        let display = if style.use_uppercase() {
            token.raw_text.to_uppercase()
        } else {
            token.raw_text.clone()
        };
        let separator = if i > 0 && token.space_before { " " } else { "" };

        match entry.boundary.filter(|_| token.is_word()) {
            Some(boundary) => {
                let word_start = ms_to_cs(boundary.start_ms).max(cursor);
                let word_end = ms_to_cs(boundary.end_ms()).max(word_start);
                if word_start > cursor {
                    text.push_str(&karaoke_tag(tag, word_start - cursor));
                }
                text.push_str(separator);
                text.push_str(&karaoke_tag(tag, word_end - word_start));
                cursor = word_end;
            }
            None => {
                text.push_str(separator);
                text.push_str(&karaoke_tag(tag, 0));
            }
        }
        text.push_str(&escape_ass_text(&display));
    }

    MarkupLine {
        start_cs,
        end_cs: cursor.max(ms_to_cs(event.end_ms)),
        text,
    }
}

/// Generate a complete ASS file for the caption events
///
/// `play_res` must match the rendered video so margins and font size are
/// interpreted in output pixels.
pub fn generate_ass_file(
    events: &[CaptionEvent],
    style: &SubtitleStyle,
    play_res: (u32, u32),
) -> String {
    let mut lines = vec![
        "[Script Info]".to_string(),
        "; Generated by kreel".to_string(),
        "ScriptType: v4.00+".to_string(),
        format!("PlayResX: {}", play_res.0),
        format!("PlayResY: {}", play_res.1),
        // Captions are single-line; never let the renderer wrap them
        "WrapStyle: 2".to_string(),
        "ScaledBorderAndShadow: yes".to_string(),
        String::new(),
        "[V4+ Styles]".to_string(),
        "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding".to_string(),
        style.to_style_line(),
        String::new(),
        "[Events]".to_string(),
        "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text".to_string(),
    ];

    lines.extend(
        events
            .iter()
            .map(|event| render_event(event, style).to_dialogue(style.name())),
    );

    let mut output = lines.join("\n");
    output.push('\n');
    output
}

/*!
 * Single-line caption segmentation.
 *
 * Words and their attached punctuation are packed greedily into caption
 * events that never exceed the line width or word cap. When a line fills
 * up, the break is moved back to the most recent punctuation mark if that
 * keeps enough words on the closed line, so captions tend to end on natural
 * pauses. A word that is wider than a whole line is emitted on its own.
 */

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::text::{Token, TokenKind};
use crate::timing::{ReconciledTimeline, WordBoundary};

const SENTENCE_END_CHARS: &[char] = &['.', '!', '?', '。', '！', '？'];

/// Segmentation limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Maximum rendered characters on one caption line
    #[serde(default = "default_max_chars_per_line")]
    pub max_chars_per_line: usize,

    /// Minimum words before a punctuation or sentence break is taken
    #[serde(default = "default_min_words_per_segment")]
    pub min_words_per_segment: usize,

    /// Hard cap on words per caption
    #[serde(default = "default_max_words_per_segment")]
    pub max_words_per_segment: usize,

    /// Close the caption after `. ! ?` once it has enough words
    #[serde(default = "default_true")]
    pub break_on_sentence_end: bool,
}

fn default_max_chars_per_line() -> usize {
    20
}

fn default_min_words_per_segment() -> usize {
    1
}

fn default_max_words_per_segment() -> usize {
    3
}

fn default_true() -> bool {
    true
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_chars_per_line: default_max_chars_per_line(),
            min_words_per_segment: default_min_words_per_segment(),
            max_words_per_segment: default_max_words_per_segment(),
            break_on_sentence_end: true,
        }
    }
}

impl SegmentationConfig {
    /// Check that the limits describe at least one possible caption
    pub fn validate(&self) -> Result<(), String> {
        if self.max_chars_per_line == 0 {
            return Err("max_chars_per_line must be greater than 0".to_string());
        }
        if self.min_words_per_segment == 0 {
            return Err("min_words_per_segment must be at least 1".to_string());
        }
        if self.max_words_per_segment < self.min_words_per_segment {
            return Err(format!(
                "max_words_per_segment ({}) is below min_words_per_segment ({})",
                self.max_words_per_segment, self.min_words_per_segment
            ));
        }
        Ok(())
    }
}

/// A token together with its word timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedToken {
    pub token: Token,
    /// Present for WORD tokens only
    pub boundary: Option<WordBoundary>,
}

/// One single-line caption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionEvent {
    /// Start of the first word
    pub start_ms: u64,
    /// End of the last word
    pub end_ms: u64,
    /// Words and attached punctuation in script order
    pub entries: Vec<TimedToken>,
}

impl CaptionEvent {
    pub fn word_count(&self) -> usize {
        self.entries.iter().filter(|e| e.token.is_word()).count()
    }

    /// Line text as displayed, optionally upper-cased
    pub fn rendered_text(&self, uppercase: bool) -> String {
        let tokens: Vec<&Token> = self.entries.iter().map(|e| &e.token).collect();
        render_tokens(&tokens, uppercase)
    }
}

/// A word wider than a whole line, emitted alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationOverflow {
    /// `sequence_index` of the oversized word
    pub token_index: usize,
    /// Rendered width of its caption
    pub rendered_len: usize,
    /// Configured line width
    pub limit: usize,
}

/// Segmenter output
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Segmentation {
    pub events: Vec<CaptionEvent>,
    pub overflows: Vec<SegmentationOverflow>,
}

/// A word with the punctuation attached to it
#[derive(Debug, Clone)]
struct Unit<'a> {
    tokens: Vec<&'a Token>,
}

impl Unit<'_> {
    fn word(&self) -> Option<&Token> {
        self.tokens.iter().copied().find(|t| t.is_word())
    }

    fn ends_with_punctuation(&self) -> bool {
        self.tokens
            .last()
            .is_some_and(|t| t.kind == TokenKind::Punctuation)
    }

    fn ends_sentence(&self) -> bool {
        self.tokens.last().is_some_and(|t| {
            t.kind == TokenKind::Punctuation && t.raw_text.contains(SENTENCE_END_CHARS)
        })
    }
}

/// Join tokens with a single space wherever the script had whitespace
fn render_tokens(tokens: &[&Token], uppercase: bool) -> String {
    let mut line = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 && token.space_before {
            line.push(' ');
        }
        if uppercase {
            line.push_str(&token.raw_text.to_uppercase());
        } else {
            line.push_str(&token.raw_text);
        }
    }
    line
}

/// Attach each punctuation token to a neighbouring word
///
/// Punctuation that opens a word (preceded by a space or the line start and
/// glued to the following word, like `¿Qué` or `"Hola`) attaches forward;
/// everything else attaches to the previous word. Punctuation before the
/// first word always attaches forward.
fn build_units(tokens: &[Token]) -> Vec<Unit<'_>> {
    let mut units: Vec<Unit<'_>> = Vec::new();
    let mut pending: Vec<&Token> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Word => {
                let mut unit_tokens = std::mem::take(&mut pending);
                unit_tokens.push(token);
                units.push(Unit {
                    tokens: unit_tokens,
                });
            }
            TokenKind::Punctuation => {
                let opens_next = (token.space_before || i == 0)
                    && tokens
                        .get(i + 1)
                        .is_some_and(|next| next.is_word() && !next.space_before);
                if units.is_empty() || opens_next || !pending.is_empty() {
                    pending.push(token);
                } else if let Some(last) = units.last_mut() {
                    last.tokens.push(token);
                }
            }
            TokenKind::Whitespace => {}
        }
    }

    // Punctuation with no following word closes the last unit
    if !pending.is_empty() {
        if let Some(last) = units.last_mut() {
            last.tokens.extend(pending);
        }
    }

    units
}

/// Greedy single-line segmenter
#[derive(Debug, Clone)]
pub struct Segmenter {
    config: SegmentationConfig,
    uppercase: bool,
}

impl Segmenter {
    /// `uppercase` must match the style so widths are measured as displayed
    pub fn new(config: SegmentationConfig, uppercase: bool) -> Self {
        Self { config, uppercase }
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    fn rendered_len(&self, units: &[Unit<'_>]) -> usize {
        let tokens: Vec<&Token> = units.iter().flat_map(|u| u.tokens.iter().copied()).collect();
        render_tokens(&tokens, self.uppercase).chars().count()
    }

    fn fits(&self, units: &[Unit<'_>]) -> bool {
        units.len() <= self.config.max_words_per_segment
            && self.rendered_len(units) <= self.config.max_chars_per_line
    }

    /// Number of leading units to close when the line is full
    fn split_point(&self, current: &[Unit<'_>]) -> usize {
        let window_start = current.len().saturating_sub(self.config.max_words_per_segment);
        (window_start..current.len())
            .rev()
            .find(|&i| i + 1 >= self.config.min_words_per_segment && current[i].ends_with_punctuation())
            .map(|i| i + 1)
            .unwrap_or(current.len())
    }

    /// Group the token stream into caption events
    pub fn segment(&self, tokens: &[Token], timeline: &ReconciledTimeline) -> Segmentation {
        let mut segmentation = Segmentation::default();
        let mut current: Vec<Unit<'_>> = Vec::new();

        for unit in build_units(tokens) {
            while !current.is_empty() && !self.fits(&with_unit(&current, &unit)) {
                let split = self.split_point(&current);
                let rest = current.split_off(split);
                self.close(std::mem::replace(&mut current, rest), timeline, &mut segmentation);
            }

            if current.is_empty() {
                let width = self.rendered_len(std::slice::from_ref(&unit));
                if width > self.config.max_chars_per_line {
                    if let Some(word) = unit.word() {
                        warn!(
                            "Word '{}' is {} characters wide (limit {}); emitting it alone",
                            word.raw_text, width, self.config.max_chars_per_line
                        );
                        segmentation.overflows.push(SegmentationOverflow {
                            token_index: word.sequence_index,
                            rendered_len: width,
                            limit: self.config.max_chars_per_line,
                        });
                    }
                    self.close(vec![unit], timeline, &mut segmentation);
                    continue;
                }
            }

            let ends_sentence = unit.ends_sentence();
            current.push(unit);

            if self.config.break_on_sentence_end
                && ends_sentence
                && current.len() >= self.config.min_words_per_segment
            {
                self.close(std::mem::take(&mut current), timeline, &mut segmentation);
            }
        }

        if !current.is_empty() {
            self.close(current, timeline, &mut segmentation);
        }

        debug!(
            "Segmented into {} captions ({} overflows)",
            segmentation.events.len(),
            segmentation.overflows.len()
        );
        segmentation
    }

    fn close(
        &self,
        units: Vec<Unit<'_>>,
        timeline: &ReconciledTimeline,
        segmentation: &mut Segmentation,
    ) {
        if units.is_empty() {
            return;
        }

        let entries: Vec<TimedToken> = units
            .iter()
            .flat_map(|u| u.tokens.iter())
            .map(|token| TimedToken {
                token: (*token).clone(),
                boundary: if token.is_word() {
                    timeline.boundary_for(token.sequence_index).copied()
                } else {
                    None
                },
            })
            .collect();

        let mut word_bounds = entries.iter().filter_map(|e| e.boundary);
        let first = word_bounds.next();
        let last = word_bounds.last().or(first);
        let start_ms = first.map(|b| b.start_ms).unwrap_or(0);
        let end_ms = last.map(|b| b.end_ms()).unwrap_or(start_ms).max(start_ms);

        segmentation.events.push(CaptionEvent {
            start_ms,
            end_ms,
            entries,
        });
    }
}

fn with_unit<'a>(current: &[Unit<'a>], unit: &Unit<'a>) -> Vec<Unit<'a>> {
    let mut candidate = current.to_vec();
    candidate.push(unit.clone());
    candidate
}

/*!
 * Script normalization and tokenization.
 *
 * The normalizer turns raw script text into the cleaned form sent to the
 * synthesizer and splits it into an ordered token stream. Every later stage
 * refers back to tokens by their `sequence_index`, so the stream produced
 * here is the single source of truth for what the captions display.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;
use crate::language_utils::SpeechLocale;
use crate::text::numbers;

static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// How numbers and abbreviations reach the synthesizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NumberFormat {
    /// Spell numbers and expand abbreviations in the script locale
    #[default]
    Spoken,
    /// Leave numbers as digits
    Digits,
}

/// Normalization switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationConfig {
    // @field: Collapse whitespace runs to one space and trim
    #[serde(default = "default_true")]
    pub collapse_whitespace: bool,

    // @field: Map typographic quotes to ASCII
    #[serde(default = "default_true")]
    pub normalize_quotes: bool,

    // @field: Map typographic dashes and ellipsis to ASCII
    #[serde(default = "default_true")]
    pub normalize_dashes: bool,

    // @field: Remove control and invisible formatting characters
    #[serde(default = "default_true")]
    pub strip_control_chars: bool,

    // @field: Number/abbreviation expansion policy
    #[serde(default)]
    pub number_format: NumberFormat,

    // @field: Keep `don't` and `co-op` as single words
    #[serde(default = "default_true")]
    pub join_intra_word_marks: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            collapse_whitespace: true,
            normalize_quotes: true,
            normalize_dashes: true,
            strip_control_chars: true,
            number_format: NumberFormat::default(),
            join_intra_word_marks: true,
        }
    }
}

/// Token classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Run of letters and digits
    Word,
    /// Run of punctuation or symbols
    Punctuation,
    /// Run of whitespace; separates tokens and never appears in the stream
    Whitespace,
}

/// One unit of the normalized script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Token classification
    pub kind: TokenKind,
    /// Text exactly as it appears in the normalized script
    pub raw_text: String,
    /// Lowercase form used for comparisons
    pub normalized_text: String,
    /// Position in the token stream
    pub sequence_index: usize,
    /// Whether whitespace separated this token from the previous one
    pub space_before: bool,
}

impl Token {
    pub fn is_word(&self) -> bool {
        self.kind == TokenKind::Word
    }

    /// Length in characters of the raw text
    pub fn char_len(&self) -> usize {
        self.raw_text.chars().count()
    }
}

/// Normalized text together with its token stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedScript {
    /// Text sent to the synthesizer
    pub text: String,
    /// Ordered WORD and PUNCTUATION tokens
    pub tokens: Vec<Token>,
}

impl NormalizedScript {
    /// WORD tokens in order
    pub fn words(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|t| t.is_word())
    }

    pub fn word_count(&self) -> usize {
        self.words().count()
    }
}

/// Script normalizer bound to one locale
#[derive(Debug, Clone)]
pub struct Normalizer {
    config: NormalizationConfig,
    locale: SpeechLocale,
}

impl Normalizer {
    /// Create a normalizer for a locale tag such as `es-ES`
    pub fn new(config: NormalizationConfig, language: &str) -> Self {
        Self {
            config,
            locale: SpeechLocale::from_tag(language),
        }
    }

    pub fn config(&self) -> &NormalizationConfig {
        &self.config
    }

    /// Decode UTF-8 bytes and normalize them
    pub fn normalize_bytes(&self, bytes: &[u8]) -> Result<String, PipelineError> {
        let text = std::str::from_utf8(bytes)?;
        Ok(self.normalize(text))
    }

    /// Apply the configured cleanup steps in order
    pub fn normalize(&self, text: &str) -> String {
        let mut result = if self.config.collapse_whitespace {
            collapse_whitespace(text)
        } else {
            text.to_string()
        };

        if self.config.normalize_quotes {
            result = normalize_quotes(&result);
        }

        if self.config.normalize_dashes {
            result = normalize_dashes(&result);
        }

        if self.config.strip_control_chars {
            result = strip_control_chars(&result);
        }

        if self.config.number_format == NumberFormat::Spoken {
            result = numbers::expand_abbreviations(&result, self.locale);
            result = numbers::expand_numbers(&result, self.locale);
        }

        // Expansion and stripping can leave doubled or edge spaces behind
        if self.config.collapse_whitespace {
            result = collapse_whitespace(&result);
        }

        result
    }

    /// Split normalized text into WORD and PUNCTUATION tokens
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        tokenize(text, self.config.join_intra_word_marks)
    }

    /// Normalize and tokenize in one step
    pub fn process(&self, text: &str) -> NormalizedScript {
        let normalized = self.normalize(text);
        let tokens = self.tokenize(&normalized);
        debug!(
            "Normalized script: {} chars, {} tokens",
            normalized.chars().count(),
            tokens.len()
        );
        NormalizedScript {
            text: normalized,
            tokens,
        }
    }

    /// Decode, normalize and tokenize raw script bytes
    pub fn process_bytes(&self, bytes: &[u8]) -> Result<NormalizedScript, PipelineError> {
        let text = std::str::from_utf8(bytes)?;
        Ok(self.process(text))
    }
}

/// Collapse whitespace runs to one space and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_REGEX.replace_all(text.trim(), " ").into_owned()
}

/// Map curly and angle quotes to their ASCII equivalents
pub fn normalize_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{00AB}' | '\u{00BB}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => '\'',
            other => other,
        })
        .collect()
}

/// Map typographic dashes to `-` and the ellipsis character to `...`
pub fn normalize_dashes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
            | '\u{2212}' => result.push('-'),
            '\u{2026}' => result.push_str("..."),
            other => result.push(other),
        }
    }
    result
}

/// Remove control characters and zero-width/bidi formatting characters
pub fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|&c| {
            let is_control = c.is_control() && !matches!(c, '\n' | '\t' | '\r' | ' ');
            !is_control && !is_invisible_format_char(c)
        })
        .collect()
}

fn is_invisible_format_char(c: char) -> bool {
    matches!(c,
        '\u{00AD}'
        | '\u{200B}'..='\u{200F}'
        | '\u{202A}'..='\u{202E}'
        | '\u{2060}'..='\u{2064}'
        | '\u{FEFF}')
}

/// Letters, digits and combining marks continue a word
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '\u{0300}'..='\u{036F}')
}

fn is_intra_word_mark(c: char) -> bool {
    matches!(c, '\'' | '-' | '\u{2019}')
}

fn classify(c: char) -> TokenKind {
    if c.is_whitespace() {
        TokenKind::Whitespace
    } else if is_word_char(c) {
        TokenKind::Word
    } else {
        TokenKind::Punctuation
    }
}

/// Split text into WORD and PUNCTUATION tokens
///
/// Whitespace runs are consumed and recorded as `space_before` on the
/// following token. With `join_intra_word_marks`, an apostrophe or hyphen
/// with a word character on both sides is part of the word.
pub fn tokenize(text: &str, join_intra_word_marks: bool) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut space_before = false;
    let mut i = 0;

    while i < chars.len() {
        let kind = classify(chars[i]);

        if kind == TokenKind::Whitespace {
            space_before = true;
            i += 1;
            continue;
        }

        let start = i;
        i += 1;
        while i < chars.len() {
            let next = classify(chars[i]);
            if next == kind {
                i += 1;
                continue;
            }
            let joins_word = kind == TokenKind::Word
                && join_intra_word_marks
                && is_intra_word_mark(chars[i])
                && chars.get(i + 1).is_some_and(|&c| is_word_char(c));
            if joins_word {
                i += 2;
                continue;
            }
            break;
        }

        let raw_text: String = chars[start..i].iter().collect();
        tokens.push(Token {
            kind,
            normalized_text: raw_text.to_lowercase(),
            raw_text,
            sequence_index: tokens.len(),
            space_before,
        });
        space_before = false;
    }

    tokens
}

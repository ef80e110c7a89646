/*!
 * Validated subtitle style.
 *
 * `SubtitleStyle` can only be built through validation: colours must be
 * `&HAABBGGRR`, the font size positive, outline and shadow finite and
 * non-negative. Deserializing goes through the same checks, so a style
 * loaded from a JSON file is as trustworthy as a preset.
 */

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::errors::StyleError;

/// Numpad-style anchor of the caption line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum Alignment {
    BottomLeft = 1,
    #[default]
    BottomCenter = 2,
    BottomRight = 3,
    MiddleLeft = 4,
    MiddleCenter = 5,
    MiddleRight = 6,
    TopLeft = 7,
    TopCenter = 8,
    TopRight = 9,
}

impl TryFrom<u8> for Alignment {
    type Error = StyleError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => Self::BottomLeft,
            2 => Self::BottomCenter,
            3 => Self::BottomRight,
            4 => Self::MiddleLeft,
            5 => Self::MiddleCenter,
            6 => Self::MiddleRight,
            7 => Self::TopLeft,
            8 => Self::TopCenter,
            9 => Self::TopRight,
            other => return Err(StyleError::InvalidAlignment(other)),
        })
    }
}

impl From<Alignment> for u8 {
    fn from(alignment: Alignment) -> Self {
        alignment as u8
    }
}

/// Karaoke tag used to highlight the spoken word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HighlightMode {
    /// `\kf`: sweep fill from left to right
    #[default]
    Fill,
    /// `\k`: switch colour at word start
    Instant,
    /// `\ko`: outline highlight
    Outline,
}

impl HighlightMode {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Fill => "kf",
            Self::Instant => "k",
            Self::Outline => "ko",
        }
    }
}

/// Unchecked style fields, as read from configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleStyleFields {
    #[serde(default = "default_style_name")]
    pub name: String,
    #[serde(default = "default_font_name")]
    pub font_name: String,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    /// Colour of words already spoken
    #[serde(default = "default_primary_color")]
    pub primary_color: String,
    /// Colour of words not yet spoken
    #[serde(default = "default_secondary_color")]
    pub secondary_color: String,
    #[serde(default = "default_outline_color")]
    pub outline_color: String,
    #[serde(default = "default_back_color")]
    pub back_color: String,
    #[serde(default = "default_true")]
    pub bold: bool,
    #[serde(default = "default_outline_width")]
    pub outline_width: f64,
    #[serde(default)]
    pub shadow_depth: f64,
    #[serde(default)]
    pub alignment: Alignment,
    #[serde(default = "default_margin_h")]
    pub margin_l: u32,
    #[serde(default = "default_margin_h")]
    pub margin_r: u32,
    #[serde(default = "default_margin_v")]
    pub margin_v: u32,
    #[serde(default = "default_true")]
    pub use_uppercase: bool,
    #[serde(default)]
    pub highlight_mode: HighlightMode,
}

fn default_style_name() -> String {
    "Default".to_string()
}

fn default_font_name() -> String {
    "Arial Bold".to_string()
}

fn default_font_size() -> u32 {
    100
}

fn default_primary_color() -> String {
    "&H00FFFFFF".to_string()
}

fn default_secondary_color() -> String {
    "&H005500FF".to_string()
}

fn default_outline_color() -> String {
    "&H00000000".to_string()
}

fn default_back_color() -> String {
    "&H00000000".to_string()
}

fn default_true() -> bool {
    true
}

fn default_outline_width() -> f64 {
    3.0
}

fn default_margin_h() -> u32 {
    60
}

fn default_margin_v() -> u32 {
    300
}

impl Default for SubtitleStyleFields {
    fn default() -> Self {
        Self {
            name: default_style_name(),
            font_name: default_font_name(),
            font_size: default_font_size(),
            primary_color: default_primary_color(),
            secondary_color: default_secondary_color(),
            outline_color: default_outline_color(),
            back_color: default_back_color(),
            bold: true,
            outline_width: default_outline_width(),
            shadow_depth: 0.0,
            alignment: Alignment::default(),
            margin_l: default_margin_h(),
            margin_r: default_margin_h(),
            margin_v: default_margin_v(),
            use_uppercase: true,
            highlight_mode: HighlightMode::default(),
        }
    }
}

/// A style that passed validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SubtitleStyleFields", into = "SubtitleStyleFields")]
pub struct SubtitleStyle {
    fields: SubtitleStyleFields,
}

impl TryFrom<SubtitleStyleFields> for SubtitleStyle {
    type Error = StyleError;

    fn try_from(fields: SubtitleStyleFields) -> Result<Self, Self::Error> {
        Self::new(fields)
    }
}

impl From<SubtitleStyle> for SubtitleStyleFields {
    fn from(style: SubtitleStyle) -> Self {
        style.fields
    }
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            fields: SubtitleStyleFields::default(),
        }
    }
}

impl SubtitleStyle {
    /// Validate raw fields into a style
    pub fn new(fields: SubtitleStyleFields) -> Result<Self, StyleError> {
        if fields.font_name.trim().is_empty() {
            return Err(StyleError::EmptyFontName);
        }
        if fields.font_size == 0 {
            return Err(StyleError::InvalidFontSize(fields.font_size));
        }
        for (field, value) in [
            ("primary_color", &fields.primary_color),
            ("secondary_color", &fields.secondary_color),
            ("outline_color", &fields.outline_color),
            ("back_color", &fields.back_color),
        ] {
            if !is_ass_color(value) {
                return Err(StyleError::InvalidColor {
                    field,
                    value: value.clone(),
                });
            }
        }
        for (field, value) in [
            ("outline_width", fields.outline_width),
            ("shadow_depth", fields.shadow_depth),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(StyleError::InvalidMetric { field, value });
            }
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &SubtitleStyleFields {
        &self.fields
    }

    pub fn name(&self) -> &str {
        &self.fields.name
    }

    pub fn use_uppercase(&self) -> bool {
        self.fields.use_uppercase
    }

    pub fn highlight_mode(&self) -> HighlightMode {
        self.fields.highlight_mode
    }

    /// `Style:` line for the `[V4+ Styles]` section
    pub fn to_style_line(&self) -> String {
        let f = &self.fields;
        let bold_val = if f.bold { -1 } else { 0 };
        format!(
            "Style: {name},{font},{size},{primary},{secondary},{outline},{back},{bold},0,0,0,100,100,0,0,1,{outline_w},{shadow},{align},{ml},{mr},{mv},1",
            name = f.name,
            font = f.font_name,
            size = f.font_size,
            primary = f.primary_color,
            secondary = f.secondary_color,
            outline = f.outline_color,
            back = f.back_color,
            bold = bold_val,
            outline_w = f.outline_width,
            shadow = f.shadow_depth,
            align = u8::from(f.alignment),
            ml = f.margin_l,
            mr = f.margin_r,
            mv = f.margin_v,
        )
    }
}

/// `&H` followed by exactly eight hex digits
fn is_ass_color(value: &str) -> bool {
    value
        .strip_prefix("&H")
        .is_some_and(|hex| hex.len() == 8 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Built-in looks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StylePreset {
    #[default]
    Default,
    Neon,
    Minimal,
    Bold,
}

impl StylePreset {
    pub fn style(&self) -> SubtitleStyle {
        let base = SubtitleStyleFields::default();
        let fields = match self {
            Self::Default => base,
            Self::Neon => SubtitleStyleFields {
                font_name: "Arial".to_string(),
                font_size: 110,
                secondary_color: "&H00FF00FF".to_string(),
                outline_color: "&H00FF00FF".to_string(),
                back_color: "&H80000000".to_string(),
                outline_width: 4.0,
                shadow_depth: 3.0,
                margin_v: 220,
                ..base
            },
            Self::Minimal => SubtitleStyleFields {
                font_name: "Helvetica".to_string(),
                font_size: 80,
                secondary_color: "&H0000FFFF".to_string(),
                outline_width: 2.5,
                shadow_depth: 1.0,
                margin_v: 150,
                ..base
            },
            Self::Bold => SubtitleStyleFields {
                font_name: "Arial".to_string(),
                font_size: 120,
                secondary_color: "&H000000FF".to_string(),
                back_color: "&HA0000000".to_string(),
                outline_width: 6.0,
                shadow_depth: 4.0,
                margin_v: 250,
                ..base
            },
        };
        SubtitleStyle { fields }
    }

    pub fn all() -> [StylePreset; 4] {
        [Self::Default, Self::Neon, Self::Minimal, Self::Bold]
    }
}

impl fmt::Display for StylePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Default => "default",
            Self::Neon => "neon",
            Self::Minimal => "minimal",
            Self::Bold => "bold",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for StylePreset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "neon" => Ok(Self::Neon),
            "minimal" => Ok(Self::Minimal),
            "bold" => Ok(Self::Bold),
            _ => Err(anyhow!("Unknown style preset: {}", s)),
        }
    }
}

use anyhow::{Result, anyhow};
use isolang::Language;

/// Language utilities for speech locale handling
///
/// Scripts and voices are configured with locale tags such as `es-ES` or
/// `en-US`. The primary subtag is an ISO 639-1 (2-letter) or ISO 639-3
/// (3-letter) language code; the optional region subtag is only used to pick
/// a default voice.
/// Language family used for locale-aware text expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechLocale {
    /// English number words and abbreviations
    English,
    /// Spanish number words and abbreviations
    Spanish,
    /// Any other language; numbers stay as digits
    Other,
}

impl SpeechLocale {
    /// Resolve the expansion locale for a locale tag like `es-ES`
    pub fn from_tag(tag: &str) -> Self {
        match primary_subtag(tag).as_str() {
            "en" | "eng" => Self::English,
            "es" | "spa" => Self::Spanish,
            _ => Self::Other,
        }
    }
}

/// Return the lowercase primary language subtag of a locale tag
pub fn primary_subtag(tag: &str) -> String {
    tag.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Validate a locale tag such as `es-ES`, `en` or `spa`
pub fn validate_locale_tag(tag: &str) -> Result<()> {
    let primary = primary_subtag(tag);
    let known = match primary.len() {
        2 => Language::from_639_1(&primary).is_some(),
        3 => Language::from_639_3(&primary).is_some(),
        _ => false,
    };

    if !known {
        return Err(anyhow!("Invalid language code: {}", tag));
    }

    // Region subtag, when present, must be two letters or three digits
    if let Some(region) = tag.trim().split(['-', '_']).nth(1) {
        let valid_region = (region.len() == 2 && region.chars().all(|c| c.is_ascii_alphabetic()))
            || (region.len() == 3 && region.chars().all(|c| c.is_ascii_digit()));
        if !valid_region {
            return Err(anyhow!("Invalid region in locale tag: {}", tag));
        }
    }

    Ok(())
}

/// Get the English language name for a locale tag
pub fn get_language_name(tag: &str) -> Result<String> {
    let primary = primary_subtag(tag);
    let lang = match primary.len() {
        2 => Language::from_639_1(&primary),
        3 => Language::from_639_3(&primary),
        _ => None,
    }
    .ok_or_else(|| anyhow!("Failed to get language from code: {}", tag))?;

    Ok(lang.to_name().to_string())
}

/// Default neural voice for a locale tag
pub fn default_voice_for_language(tag: &str) -> String {
    match tag.trim() {
        "es-ES" => "es-ES-ElviraNeural".to_string(),
        "en-US" => "en-US-AriaNeural".to_string(),
        "en-GB" => "en-GB-SoniaNeural".to_string(),
        "fr-FR" => "fr-FR-DeniseNeural".to_string(),
        "de-DE" => "de-DE-KatjaNeural".to_string(),
        other => format!("{}-Standard-A", other),
    }
}

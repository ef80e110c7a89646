/*!
 * Tests for language utility functions
 */

use kreel::language_utils::{
    SpeechLocale, default_voice_for_language, get_language_name, primary_subtag,
    validate_locale_tag,
};

/// Test extraction of the primary subtag
#[test]
fn test_primarySubtag_withVariousTags_shouldLowercaseLanguage() {
    assert_eq!(primary_subtag("es-ES"), "es");
    assert_eq!(primary_subtag(" EN_us "), "en");
    assert_eq!(primary_subtag("spa"), "spa");
    assert_eq!(primary_subtag(""), "");
}

/// Test validation of locale tags
#[test]
fn test_validateLocaleTag_withValidAndInvalidTags_shouldValidateCorrectly() {
    for tag in ["es-ES", "en-US", "fr", "deu", "pt_BR", "es-419"] {
        assert!(validate_locale_tag(tag).is_ok(), "{} should be valid", tag);
    }
    for tag in ["zz-ES", "e", "123", "en-USA1", "es-"] {
        assert!(validate_locale_tag(tag).is_err(), "{} should be invalid", tag);
    }
}

/// Test language names for two and three letter codes
#[test]
fn test_getLanguageName_withValidCodes_shouldReturnNames() {
    assert_eq!(get_language_name("en-GB").unwrap(), "English");
    assert_eq!(get_language_name("fra").unwrap(), "French");
    assert!(get_language_name("zz").is_err());
}

/// Test expansion locale resolution
#[test]
fn test_speechLocale_fromTag_shouldOnlyExpandEnglishAndSpanish() {
    assert_eq!(SpeechLocale::from_tag("EN"), SpeechLocale::English);
    assert_eq!(SpeechLocale::from_tag("es-MX"), SpeechLocale::Spanish);
    assert_eq!(SpeechLocale::from_tag("de-DE"), SpeechLocale::Other);
}

/// Test default voices
#[test]
fn test_defaultVoiceForLanguage_shouldMapKnownLocales() {
    assert_eq!(default_voice_for_language("es-ES"), "es-ES-ElviraNeural");
    assert_eq!(default_voice_for_language(" de-DE "), "de-DE-KatjaNeural");
    assert_eq!(default_voice_for_language("pt-BR"), "pt-BR-Standard-A");
}

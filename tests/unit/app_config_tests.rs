/*!
 * Tests for application configuration functionality
 */

use kreel::app_config::{Config, LogLevel};
use kreel::captions::HighlightMode;
use log::LevelFilter;

use crate::common;

/// Test default configuration values
#[test]
fn test_default_config_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.language, "es-ES");
    assert_eq!(config.voice, None);
    assert_eq!(config.synthesis.endpoint, "http://localhost:5002");
    assert_eq!(config.synthesis.max_retries, 3);
    assert_eq!(config.segmentation.max_words_per_segment, 3);
    assert_eq!(config.planner.output_width, 1080);
    assert_eq!(config.planner.output_height, 1920);
    assert!(config.cache_enabled);
    assert_eq!(config.log_level, LogLevel::Info);
}

/// Test that the pipeline settings follow the cache switch
#[test]
fn test_toPipelineConfig_withCacheDisabled_shouldDropArtifactDir() {
    let mut config = Config::default();
    config.artifact_dir = "/tmp/kreel-test".to_string();
    assert_eq!(
        config.to_pipeline_config().unwrap().artifact_dir.unwrap().to_string_lossy(),
        "/tmp/kreel-test"
    );

    config.cache_enabled = false;
    let pipeline_config = config.to_pipeline_config().unwrap();
    assert!(pipeline_config.artifact_dir.is_none());
    assert_eq!(pipeline_config.voice, "es-ES-ElviraNeural");
}

/// Test that a style file overrides the preset
#[test]
fn test_resolveStyle_withStyleFile_shouldUseFile() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(
        dir.path(),
        "style.json",
        r#"{"name": "Promo", "font_size": 90, "highlight_mode": "instant"}"#,
    )
    .unwrap();

    let mut config = Config::default();
    config.style.config_path = Some(path.to_string_lossy().into_owned());
    let style = config.resolve_style().unwrap();
    assert_eq!(style.name(), "Promo");
    assert_eq!(style.fields().font_size, 90);
    assert_eq!(style.highlight_mode(), HighlightMode::Instant);
}

/// Test that an invalid style file is rejected by validation
#[test]
fn test_validate_withInvalidStyleColor_shouldFail() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(dir.path(), "style.json", r#"{"primary_color": "white"}"#).unwrap();

    let mut config = Config::default();
    config.style.config_path = Some(path.to_string_lossy().into_owned());
    assert!(config.validate().is_err());
}

/// Test configuration validation of numeric settings
#[test]
fn test_validate_withOutOfRangeValues_shouldFail() {
    let mut config = Config::default();
    config.planner.aspect_tolerance = 1.5;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.renderer.timeout_secs = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.synthesis.endpoint = "not a url".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.segmentation.max_words_per_segment = 0;
    assert!(config.validate().is_err());
}

/// Test that renderer settings take the frame size from the planner
#[test]
fn test_rendererConfig_shouldUsePlannerFrameSize() {
    let mut config = Config::default();
    config.planner.output_width = 720;
    config.planner.output_height = 1280;
    let renderer = config.renderer_config();
    assert_eq!((renderer.width, renderer.height), (720, 1280));
}

/// Test saving and reloading a configuration
#[test]
fn test_save_thenLoad_shouldRoundTrip() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("nested").join("conf.json");

    let mut config = Config::default();
    config.language = "en-US".to_string();
    config.voice = Some("en-US-GuyNeural".to_string());
    config.log_level = LogLevel::Trace;
    config.save(&path).unwrap();

    let loaded = Config::load_or_create(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.resolved_voice(), "en-US-GuyNeural");
    assert_eq!(loaded.log_level.to_level_filter(), LevelFilter::Trace);
}

use anyhow::{Context, Result, anyhow};
use log::{LevelFilter, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};

use crate::captions::{SegmentationConfig, StylePreset, SubtitleStyle};
use crate::file_utils::FileManager;
use crate::language_utils;
use crate::pipeline::{DEFAULT_MAX_SCRIPT_CHARS, PipelineConfig};
use crate::render::{PlannerConfig, RendererConfig};
use crate::text::NormalizationConfig;
use crate::timing::ReconcilerConfig;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Script locale tag (e.g. `es-ES`)
    #[serde(default = "default_language")]
    pub language: String,

    /// Voice override; the locale's default voice when absent
    #[serde(default)]
    pub voice: Option<String>,

    /// Speech gateway settings
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Text cleanup settings
    #[serde(default)]
    pub normalization: NormalizationConfig,

    /// Timing reconciliation settings
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    /// Caption line settings
    #[serde(default)]
    pub segmentation: SegmentationConfig,

    /// Caption look
    #[serde(default)]
    pub style: StyleConfig,

    /// Background alignment settings
    #[serde(default)]
    pub planner: PlannerConfig,

    /// ffmpeg settings
    #[serde(default)]
    pub renderer: RendererConfig,

    /// Longest accepted script, in characters
    #[serde(default = "default_max_script_chars")]
    pub max_script_chars: usize,

    /// Artifact cache directory
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: String,

    /// Whether synthesized narration is cached and reused
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Speech gateway configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SynthesisConfig {
    // @field: Gateway base URL
    #[serde(default = "default_synthesis_endpoint")]
    pub endpoint: String,

    // @field: Bearer token, empty for none
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Request timeout seconds
    #[serde(default = "default_synthesis_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    // @field: Backoff base in milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    // @field: Relative speaking rate
    #[serde(default = "default_prosody")]
    pub rate: String,

    // @field: Relative volume
    #[serde(default = "default_prosody")]
    pub volume: String,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            endpoint: default_synthesis_endpoint(),
            api_key: String::new(),
            timeout_secs: default_synthesis_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            rate: default_prosody(),
            volume: default_prosody(),
        }
    }
}

/// Caption style selection
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StyleConfig {
    // @field: Built-in preset name
    #[serde(default = "default_style_preset")]
    pub preset: String,

    // @field: JSON style file; overrides the preset when set
    #[serde(default)]
    pub config_path: Option<String>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            preset: default_style_preset(),
            config_path: None,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

static PROSODY_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]\d{1,3}%$").unwrap());

fn default_language() -> String {
    "es-ES".to_string()
}

fn default_synthesis_endpoint() -> String {
    "http://localhost:5002".to_string()
}

fn default_synthesis_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_prosody() -> String {
    "+0%".to_string()
}

fn default_style_preset() -> String {
    "default".to_string()
}

fn default_max_script_chars() -> usize {
    DEFAULT_MAX_SCRIPT_CHARS
}

fn default_artifact_dir() -> String {
    dirs::cache_dir()
        .map(|dir| dir.join("kreel").join("audio"))
        .unwrap_or_else(|| PathBuf::from("data").join("audio"))
        .to_string_lossy()
        .into_owned()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load the configuration file, creating it with defaults if missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = FileManager::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            Ok(config)
        } else {
            warn!("Config file not found at {:?}, creating default config.", path);
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;
        FileManager::write_to_file(path, &json)
    }

    /// Configured voice or the locale's default
    pub fn resolved_voice(&self) -> String {
        self.voice
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| language_utils::default_voice_for_language(&self.language))
    }

    /// Style from the style file if configured, else the preset
    pub fn resolve_style(&self) -> Result<SubtitleStyle> {
        match &self.style.config_path {
            Some(path) => load_style_file(path),
            None => Ok(self.style.preset.parse::<StylePreset>()?.style()),
        }
    }

    /// Renderer settings with the frame size taken from the planner
    pub fn renderer_config(&self) -> RendererConfig {
        RendererConfig {
            width: self.planner.output_width,
            height: self.planner.output_height,
            ..self.renderer.clone()
        }
    }

    /// Resolved settings for the pipeline
    pub fn to_pipeline_config(&self) -> Result<PipelineConfig> {
        Ok(PipelineConfig {
            language: self.language.clone(),
            voice: self.resolved_voice(),
            rate: self.synthesis.rate.clone(),
            volume: self.synthesis.volume.clone(),
            normalization: self.normalization.clone(),
            reconciler: self.reconciler.clone(),
            segmentation: self.segmentation.clone(),
            style: self.resolve_style()?,
            planner: self.planner.clone(),
            max_script_chars: self.max_script_chars,
            artifact_dir: self.cache_enabled.then(|| PathBuf::from(&self.artifact_dir)),
        })
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        language_utils::validate_locale_tag(&self.language)?;
        let _language_name = language_utils::get_language_name(&self.language)?;

        url::Url::parse(&self.synthesis.endpoint)
            .with_context(|| format!("Invalid synthesis endpoint: {}", self.synthesis.endpoint))?;

        if self.synthesis.timeout_secs == 0 {
            return Err(anyhow!("Synthesis timeout must be greater than zero"));
        }

        for (name, value) in [("rate", &self.synthesis.rate), ("volume", &self.synthesis.volume)] {
            if !PROSODY_REGEX.is_match(value) {
                return Err(anyhow!("Invalid synthesis {}: '{}' (expected e.g. +10%)", name, value));
            }
        }

        self.segmentation
            .validate()
            .map_err(|e| anyhow!("Invalid segmentation settings: {}", e))?;

        let _style = self.resolve_style().context("Invalid caption style")?;

        if self.max_script_chars == 0 {
            return Err(anyhow!("max_script_chars must be greater than zero"));
        }

        if self.renderer.timeout_secs == 0 {
            return Err(anyhow!("Render timeout must be greater than zero"));
        }

        if self.planner.output_width == 0 || self.planner.output_height == 0 {
            return Err(anyhow!(
                "Invalid output size {}x{}",
                self.planner.output_width,
                self.planner.output_height
            ));
        }

        if !(0.0..1.0).contains(&self.planner.aspect_tolerance) {
            return Err(anyhow!(
                "Aspect tolerance must be in [0, 1), got {}",
                self.planner.aspect_tolerance
            ));
        }

        Ok(())
    }
}

/// Load a validated style from a JSON file
///
/// Missing fields take their defaults, so a file may override only a few.
pub fn load_style_file<P: AsRef<Path>>(path: P) -> Result<SubtitleStyle> {
    let path = path.as_ref();
    let content = FileManager::read_to_string(path)?;
    let style: SubtitleStyle = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse style file: {:?}", path))?;
    Ok(style)
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            language: default_language(),
            voice: None,
            synthesis: SynthesisConfig::default(),
            normalization: NormalizationConfig::default(),
            reconciler: ReconcilerConfig::default(),
            segmentation: SegmentationConfig::default(),
            style: StyleConfig::default(),
            planner: PlannerConfig::default(),
            renderer: RendererConfig::default(),
            max_script_chars: default_max_script_chars(),
            artifact_dir: default_artifact_dir(),
            cache_enabled: true,
            log_level: LogLevel::default(),
        }
    }
}

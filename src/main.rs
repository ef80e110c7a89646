// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use serde::Deserialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use kreel::app_config::{self, Config};
use kreel::captions::StylePreset;
use kreel::file_utils::FileManager;
use kreel::pipeline::{CaptionComposer, Pipeline};
use kreel::render::{
    FfmpegRenderer, MediaInfo, PlannerConfig, Renderer, cancel_channel, plan_alignment,
};
use kreel::synthesis::HttpSynthesizer;
use kreel::timing::RawBoundaryEvent;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for StylePreset to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliStylePreset {
    Default,
    Neon,
    Minimal,
    Bold,
}

impl From<CliStylePreset> for StylePreset {
    fn from(cli_preset: CliStylePreset) -> Self {
        match cli_preset {
            CliStylePreset::Default => StylePreset::Default,
            CliStylePreset::Neon => StylePreset::Neon,
            CliStylePreset::Minimal => StylePreset::Minimal,
            CliStylePreset::Bold => StylePreset::Bold,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "kreel", version, about = "Karaoke-captioned vertical videos from a script")]
#[command(long_about = "
    Turns a plain-text script and a background video into a vertical video with
    synthesized narration and word-synchronized karaoke captions.

    Configuration is stored in conf.json by default. You can specify a different
    configuration file with --config. Command line options override it.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Narrate a script over a background video with karaoke captions
    Create(CreateArgs),

    /// Build ASS captions from a script and a recorded boundary feed
    Captions(CaptionsArgs),

    /// Print the crop and loop/trim plan for a background
    Plan(PlanArgs),

    /// Generate shell completions for kreel
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Options shared by commands that build captions
#[derive(Parser, Debug)]
struct CommonArgs {
    /// Script locale (e.g. 'es-ES', 'en-US')
    #[arg(long = "lang")]
    language: Option<String>,

    /// Built-in caption style
    #[arg(long, value_enum)]
    style: Option<CliStylePreset>,

    /// JSON style file (overrides --style)
    #[arg(long)]
    style_config: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long = "config", default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

#[derive(Parser, Debug)]
struct CreateArgs {
    /// Script text file (UTF-8)
    #[arg(long)]
    script: PathBuf,

    /// Background video
    #[arg(long = "bg")]
    background: PathBuf,

    /// Output video file
    #[arg(short, long)]
    output: PathBuf,

    /// Voice name (defaults to the locale's voice)
    #[arg(long)]
    voice: Option<String>,

    /// Render timeout in seconds
    #[arg(long)]
    render_timeout: Option<u64>,

    /// Do not read or write the narration cache
    #[arg(long)]
    no_cache: bool,

    /// Print the run result as JSON on stdout
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Parser, Debug)]
struct CaptionsArgs {
    /// Script text file (UTF-8)
    #[arg(long)]
    script: PathBuf,

    /// Boundary JSON: {"duration_ms": .., "boundaries": [..]}
    #[arg(long)]
    boundaries: PathBuf,

    /// Output ASS file
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Parser, Debug)]
struct PlanArgs {
    /// Background width in pixels
    #[arg(long)]
    width: u32,

    /// Background height in pixels
    #[arg(long)]
    height: u32,

    /// Background duration in milliseconds
    #[arg(long)]
    source_ms: u64,

    /// Narration duration in milliseconds
    #[arg(long)]
    narration_ms: u64,

    /// Hold the last frame instead of looping short backgrounds
    #[arg(long)]
    freeze: bool,
}

/// Recorded synthesis timing, as stored next to cached narration
#[derive(Debug, Deserialize)]
struct RecordedFeed {
    duration_ms: u64,
    #[serde(default)]
    boundaries: Vec<Option<RawBoundaryEvent>>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        // The logger itself accepts everything; `set_max_level` does the filtering
        let logger = Box::new(CustomLogger::new(LevelFilter::Trace));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI colour for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                Self::get_emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger once with info level by default
    // We'll update the level after loading the config if needed
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "kreel", &mut std::io::stdout());
            Ok(())
        }
        Commands::Create(args) => run_create(args).await,
        Commands::Captions(args) => run_captions(args),
        Commands::Plan(args) => run_plan(args),
    }
}

/// Load the configuration, apply command line overrides and validate
fn load_config(common: &CommonArgs) -> Result<Config> {
    if let Some(level) = &common.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let mut config = Config::load_or_create(&common.config_path)
        .with_context(|| format!("Failed to load config file: {}", common.config_path))?;

    if let Some(language) = &common.language {
        config.language = language.clone();
    }
    if let Some(style) = &common.style {
        config.style.preset = StylePreset::from(style.clone()).to_string();
    }
    if let Some(path) = &common.style_config {
        config.style.config_path = Some(path.to_string_lossy().into_owned());
    }
    if let Some(level) = &common.log_level {
        config.log_level = level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;

    // If log level was not set via command line, update it from config now
    if common.log_level.is_none() {
        log::set_max_level(config.log_level.to_level_filter());
    }

    Ok(config)
}

async fn run_create(args: CreateArgs) -> Result<()> {
    let mut config = load_config(&args.common)?;
    if let Some(voice) = &args.voice {
        config.voice = Some(voice.clone());
    }
    if let Some(timeout) = args.render_timeout {
        if timeout == 0 {
            return Err(anyhow!("Render timeout must be greater than zero"));
        }
        config.renderer.timeout_secs = timeout;
    }
    if args.no_cache {
        config.cache_enabled = false;
    }

    if !args.background.is_file() {
        return Err(anyhow!("Background video does not exist: {:?}", args.background));
    }

    let renderer = FfmpegRenderer::new(config.renderer_config());
    renderer
        .ensure_available()
        .await
        .context("Renderer is not available")?;

    let synthesizer = HttpSynthesizer::new(
        &config.synthesis.endpoint,
        Some(config.synthesis.api_key.clone()),
        config.synthesis.timeout_secs,
        config.synthesis.max_retries,
        config.synthesis.backoff_base_ms,
    )
    .map_err(|e| anyhow!("Failed to create synthesizer: {}", e))?;

    let pipeline_config = config.to_pipeline_config()?;
    info!(
        "Creating {:?} ({}, voice {})",
        args.output, pipeline_config.language, pipeline_config.voice
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));

    let pipeline = Pipeline::new(pipeline_config, Arc::new(synthesizer), Arc::new(renderer))
        .with_progress(spinner);

    let (cancel_tx, cancel_rx) = cancel_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling...");
            let _ = cancel_tx.send(true);
        }
    });

    let result = pipeline
        .run_file(&args.script, &args.background, &args.output, cancel_rx)
        .await;

    if args.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialize result")?;
        println!("{}", json);
    }

    if result.success {
        info!("Success: {:?}", args.output);
        Ok(())
    } else {
        let stage = result
            .failed_stage
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let detail = result
            .error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        error!("Failed at {}: {}", stage, detail);
        Err(anyhow!("Pipeline failed at {}: {}", stage, detail))
    }
}

fn run_captions(args: CaptionsArgs) -> Result<()> {
    let config = load_config(&args.common)?;
    let composer = CaptionComposer::new(&config.to_pipeline_config()?);

    let script = FileManager::read_script(&args.script)?;
    let feed: RecordedFeed = serde_json::from_str(&FileManager::read_to_string(&args.boundaries)?)
        .with_context(|| format!("Failed to parse boundary file: {:?}", args.boundaries))?;

    let composed = composer
        .compose(&script, &feed.boundaries, feed.duration_ms)
        .map_err(|(stage, e)| anyhow!("Caption generation failed at {}: {}", stage, e))?;

    FileManager::write_to_file(&args.output, &composed.markup)?;
    info!(
        "Wrote {} captions for {} words to {:?} ({:.1}% interpolated)",
        composed.segmentation.events.len(),
        composed.script.word_count(),
        args.output,
        composed.timeline.interpolated_fraction * 100.0
    );
    Ok(())
}

fn run_plan(args: PlanArgs) -> Result<()> {
    let source = MediaInfo {
        width: args.width,
        height: args.height,
        duration_ms: args.source_ms,
    };
    let planner = PlannerConfig {
        prefer_freeze_last_frame: args.freeze,
        ..PlannerConfig::default()
    };
    let plan = plan_alignment(&source, args.narration_ms, &planner)?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

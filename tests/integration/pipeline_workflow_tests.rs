/*!
 * Integration tests for the full caption pipeline with mock boundaries
 */

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use indicatif::ProgressBar;

use kreel::errors::{PipelineError, SynthesisError};
use kreel::file_utils::ArtifactStore;
use kreel::pipeline::{Pipeline, PipelineConfig, PipelineStage};
use kreel::render::{DurationPolicy, MediaInfo, cancel_channel};
use kreel::synthesis::{MockSynthesisBehavior, MockSynthesizer, SynthesisDeduplicator};

use crate::common::{self, MockRenderer, RenderBehavior};

/// Test that a script goes through every stage and reaches the renderer
#[tokio::test]
async fn test_run_withWorkingSynthesizer_shouldRenderCaptions() -> Result<()> {
    common::init_logger();
    let dir = common::create_temp_dir()?;
    let synth = Arc::new(MockSynthesizer::working());
    let renderer = Arc::new(MockRenderer::landscape());
    let pipeline = common::build_pipeline(synth.clone(), renderer.clone(), None);
    let output = dir.path().join("out.mp4");
    let (_cancel, signal) = cancel_channel();

    let result = pipeline
        .run(common::SAMPLE_SCRIPT.as_bytes(), &dir.path().join("bg.mp4"), &output, signal)
        .await;

    assert!(result.success, "run failed: {:?}", result.error);
    assert_eq!(result.failed_stage, None);
    assert_eq!(result.word_count, 11);
    assert_eq!(result.narration_duration_ms, 5_500);
    assert_eq!(result.interpolated_fraction, 0.0);
    assert!(result.segment_count >= 4);
    assert!(!result.cache_hit);
    assert_eq!(result.output_path.as_deref(), Some(output.as_path()));
    assert!(output.exists());
    assert_eq!(synth.request_count(), 1);

    let jobs = renderer.jobs.lock();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].plan.duration_policy, DurationPolicy::Loop);
    assert_eq!(jobs[0].plan.repeat_count, 2);
    assert_eq!(jobs[0].plan.target_duration_ms, 5_500);
    assert_eq!(jobs[0].plan.crop_rect.map(|c| c.width), Some(608));

    let subtitles = renderer.subtitles.lock();
    assert!(subtitles[0].contains("[Events]"));
    assert!(subtitles[0].contains("HOLA"));
    assert!(subtitles[0].contains("DOCTOR"));
    assert!(subtitles[0].contains("VEINTIUNO"));
    Ok(())
}

/// Test that every caption line's tags add up to its duration in a real run
#[tokio::test]
async fn test_run_markup_shouldKeepKaraokeInSync() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let synth = Arc::new(MockSynthesizer::working().with_word_timing(333, 77));
    let pipeline = common::build_pipeline(synth, Arc::new(MockRenderer::landscape()), None);
    let (_cancel, signal) = cancel_channel();

    let result = pipeline
        .run(common::SAMPLE_SCRIPT.as_bytes(), &dir.path().join("bg.mp4"), &dir.path().join("out.mp4"), signal)
        .await;
    assert!(result.success);

    let markup = result.artifacts.markup.unwrap();
    for line in markup.lines().filter(|l| l.starts_with("Dialogue:")) {
        let fields: Vec<&str> = line.splitn(10, ',').collect();
        let to_cs = |ts: &str| -> u64 {
            let parts: Vec<&str> = ts.split([':', '.']).collect();
            parts[0].parse::<u64>().unwrap() * 360_000
                + parts[1].parse::<u64>().unwrap() * 6_000
                + parts[2].parse::<u64>().unwrap() * 100
                + parts[3].parse::<u64>().unwrap()
        };
        let duration = to_cs(fields[2]) - to_cs(fields[1]);
        assert_eq!(common::karaoke_sum(fields[9]), duration, "line: {}", line);
    }
    Ok(())
}

/// Test that a synthesis failure stops the run and keeps earlier artifacts
#[tokio::test]
async fn test_run_withFailingSynthesizer_shouldFailAtSynthesize() -> Result<()> {
    common::init_logger();
    let dir = common::create_temp_dir()?;
    let renderer = Arc::new(MockRenderer::landscape());
    let pipeline = common::build_pipeline(Arc::new(MockSynthesizer::failing()), renderer.clone(), None);
    let (_cancel, signal) = cancel_channel();

    let result = pipeline
        .run(b"Hola mundo", &dir.path().join("bg.mp4"), &dir.path().join("out.mp4"), signal)
        .await;

    assert!(!result.success);
    assert_eq!(result.failed_stage, Some(PipelineStage::Synthesize));
    assert!(matches!(
        result.error,
        Some(PipelineError::Synthesis(SynthesisError::ApiError { status_code: 503, .. }))
    ));
    assert!(result.artifacts.script.is_some());
    assert!(result.artifacts.synthesis.is_none());
    assert!(result.artifacts.markup.is_none());
    assert_eq!(renderer.job_count(), 0);

    let json = serde_json::to_value(&result)?;
    assert_eq!(json["failed_stage"], "synthesize");
    assert!(json["error"].as_str().unwrap().contains("503"));
    Ok(())
}

/// Test that invalid scripts never reach the synthesizer
#[tokio::test]
async fn test_run_withInvalidScripts_shouldFailAtNormalize() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let synth = Arc::new(MockSynthesizer::working());
    let mut config = PipelineConfig::new("es-ES", "es-ES-ElviraNeural");
    config.max_script_chars = 20;
    let pipeline = Pipeline::new(config, synth.clone(), Arc::new(MockRenderer::landscape()));
    let bg = dir.path().join("bg.mp4");
    let out = dir.path().join("out.mp4");

    let (_cancel, signal) = cancel_channel();
    let empty = pipeline.run(b" ... !! ", &bg, &out, signal.clone()).await;
    assert_eq!(empty.failed_stage, Some(PipelineStage::Normalize));
    assert!(matches!(empty.error, Some(PipelineError::EmptyScript)));

    let long = pipeline.run(common::SAMPLE_SCRIPT.as_bytes(), &bg, &out, signal.clone()).await;
    assert!(matches!(long.error, Some(PipelineError::ScriptTooLong { limit: 20, .. })));

    let binary = pipeline.run(&[0xff, 0xfe, 0x00], &bg, &out, signal).await;
    assert!(matches!(binary.error, Some(PipelineError::Encoding(_))));

    assert_eq!(synth.request_count(), 0);
    Ok(())
}

/// Test that a missing script file fails before synthesis
#[tokio::test]
async fn test_runFile_withMissingScript_shouldFailWithIoError() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let pipeline = common::build_pipeline(
        Arc::new(MockSynthesizer::working()),
        Arc::new(MockRenderer::landscape()),
        None,
    );
    let (_cancel, signal) = cancel_channel();

    let result = pipeline
        .run_file(&dir.path().join("nope.txt"), &dir.path().join("bg.mp4"), &dir.path().join("out.mp4"), signal)
        .await;
    assert_eq!(result.failed_stage, Some(PipelineStage::Normalize));
    assert!(matches!(result.error, Some(PipelineError::Io(_))));
    Ok(())
}

/// Test that a second run of the same script reuses the stored narration
#[tokio::test]
async fn test_run_twice_withArtifactDir_shouldHitCache() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let cache = dir.path().join("cache");
    let script_path = common::create_test_file(dir.path(), "script.txt", common::SAMPLE_SCRIPT)?;
    let synth = Arc::new(MockSynthesizer::working());
    let pipeline = common::build_pipeline(synth.clone(), Arc::new(MockRenderer::landscape()), Some(cache.as_path()));
    let bg = dir.path().join("bg.mp4");

    let (_cancel, signal) = cancel_channel();
    let first = pipeline
        .run_file(&script_path, &bg, &dir.path().join("first.mp4"), signal.clone())
        .await;
    let second = pipeline
        .run_file(&script_path, &bg, &dir.path().join("second.mp4"), signal)
        .await;

    assert!(first.success && second.success);
    assert!(!first.cache_hit);
    assert!(second.cache_hit);
    assert_eq!(synth.request_count(), 1);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(first.artifacts.markup, second.artifacts.markup);

    let store = ArtifactStore::new(&cache);
    let fingerprint = second.fingerprint.unwrap();
    let audio = second.artifacts.audio_path.unwrap();
    assert_eq!(audio, store.audio_path(&fingerprint, "mp3"));
    assert!(audio.exists());

    let metadata = store.load_metadata(&fingerprint).unwrap();
    assert_eq!(metadata.config["voice"], "es-ES-ElviraNeural");
    assert_eq!(metadata.stats["word_count"], 11);
    assert_eq!(metadata.stats["audio_duration_ms"], 5_500);
    Ok(())
}

/// Test that a different speaking rate does not reuse stored narration
#[tokio::test]
async fn test_run_withDifferentRate_shouldMissCache() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let cache = dir.path().join("cache");
    let script_path = common::create_test_file(dir.path(), "script.txt", common::SAMPLE_SCRIPT)?;
    let synth = Arc::new(MockSynthesizer::working());
    let renderer = Arc::new(MockRenderer::landscape());
    let normal = common::build_pipeline(synth.clone(), renderer.clone(), Some(cache.as_path()));

    let mut config = PipelineConfig::new("es-ES", "es-ES-ElviraNeural");
    config.artifact_dir = Some(cache.clone());
    config.rate = "+50%".to_string();
    let faster = Pipeline::new(config, synth.clone(), renderer);
    let bg = dir.path().join("bg.mp4");

    let (_cancel, signal) = cancel_channel();
    let first = normal
        .run_file(&script_path, &bg, &dir.path().join("first.mp4"), signal.clone())
        .await;
    let second = faster
        .run_file(&script_path, &bg, &dir.path().join("second.mp4"), signal)
        .await;

    assert!(first.success && second.success);
    assert!(!first.cache_hit);
    assert!(!second.cache_hit);
    assert_eq!(synth.request_count(), 2);
    assert_ne!(first.fingerprint, second.fingerprint);
    Ok(())
}

/// Test that a renderer failure is attributed to the render stage
#[tokio::test]
async fn test_run_withFailingRenderer_shouldFailAtRender() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let renderer = Arc::new(MockRenderer::new(
        MediaInfo {
            width: 1080,
            height: 1920,
            duration_ms: 60_000,
        },
        RenderBehavior::Fail,
    ));
    let pipeline = common::build_pipeline(Arc::new(MockSynthesizer::working()), renderer.clone(), None);
    let (_cancel, signal) = cancel_channel();

    let result = pipeline
        .run(b"Hola mundo", &dir.path().join("bg.mp4"), &dir.path().join("out.mp4"), signal)
        .await;

    assert_eq!(result.failed_stage, Some(PipelineStage::Render));
    assert!(matches!(result.error, Some(PipelineError::Render { exit_code: Some(1), .. })));
    let plan = result.artifacts.plan.unwrap();
    assert_eq!(plan.duration_policy, DurationPolicy::Trim);
    assert_eq!(plan.crop_rect, None);
    assert!(result.artifacts.markup.is_some());
    assert_eq!(renderer.job_count(), 1);
    Ok(())
}

/// Test that cancelling during the render aborts it
#[tokio::test]
async fn test_run_cancelledDuringRender_shouldReportRenderCancelled() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let renderer = Arc::new(MockRenderer::new(
        MediaInfo {
            width: 1920,
            height: 1080,
            duration_ms: 5_000,
        },
        RenderBehavior::WaitForCancel,
    ));
    let pipeline = common::build_pipeline(Arc::new(MockSynthesizer::working()), renderer.clone(), None);
    let (cancel, signal) = cancel_channel();
    let bg = dir.path().join("bg.mp4");
    let out = dir.path().join("out.mp4");

    let (result, _) = tokio::join!(pipeline.run(b"Hola mundo", &bg, &out, signal), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.send(true).ok();
    });

    assert_eq!(result.failed_stage, Some(PipelineStage::Render));
    assert!(matches!(result.error, Some(PipelineError::RenderCancelled)));
    assert_eq!(renderer.job_count(), 1);
    Ok(())
}

/// Test that cancelling while waiting on synthesis stops before rendering
#[tokio::test]
async fn test_run_cancelledDuringSynthesis_shouldStopEarly() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let renderer = Arc::new(MockRenderer::landscape());
    let synth = Arc::new(MockSynthesizer::new(MockSynthesisBehavior::Slow { delay_ms: 10_000 }));
    let pipeline = common::build_pipeline(synth, renderer.clone(), None);
    let (cancel, signal) = cancel_channel();
    let bg = dir.path().join("bg.mp4");
    let out = dir.path().join("out.mp4");

    let (result, _) = tokio::join!(pipeline.run(b"Hola mundo", &bg, &out, signal), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.send(true).ok();
    });

    assert_eq!(result.failed_stage, Some(PipelineStage::Synthesize));
    assert!(matches!(result.error, Some(PipelineError::Cancelled)));
    assert_eq!(renderer.job_count(), 0);
    assert_eq!(pipeline.deduplicator().in_flight_count(), 0);
    Ok(())
}

/// Test that a sparse timing feed is interpolated but still renders
#[tokio::test]
async fn test_run_withSparseBoundaries_shouldReportInterpolation() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let pipeline = common::build_pipeline(
        Arc::new(MockSynthesizer::sparse(3)),
        Arc::new(MockRenderer::landscape()),
        None,
    );
    let (_cancel, signal) = cancel_channel();

    let result = pipeline
        .run(common::SAMPLE_SCRIPT.as_bytes(), &dir.path().join("bg.mp4"), &dir.path().join("out.mp4"), signal)
        .await;

    assert!(result.success);
    assert!(result.interpolated_fraction > 0.5 && result.interpolated_fraction < 1.0);
    let stats = result.stats_json();
    assert!(stats["interpolated_words_pct"].as_f64().unwrap() > 50.0);
    Ok(())
}

/// Test that concurrent runs of the same script synthesize once
#[tokio::test]
async fn test_run_concurrentSameScript_shouldShareSynthesis() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let synth = Arc::new(MockSynthesizer::working().with_latency(Duration::from_millis(200)));
    let dedup = SynthesisDeduplicator::new(synth.clone());
    let config = PipelineConfig::new("es-ES", "es-ES-ElviraNeural");
    let first = Pipeline::with_deduplicator(config.clone(), dedup.clone(), Arc::new(MockRenderer::landscape()));
    let second = Pipeline::with_deduplicator(config, dedup.clone(), Arc::new(MockRenderer::landscape()));
    let bg = dir.path().join("bg.mp4");
    let out_a = dir.path().join("a.mp4");
    let out_b = dir.path().join("b.mp4");
    let (_cancel, signal) = cancel_channel();

    let (a, b) = tokio::join!(
        first.run(b"Hola mundo", &bg, &out_a, signal.clone()),
        second.run(b"HOLA   mundo", &bg, &out_b, signal)
    );

    assert!(a.success && b.success);
    assert_eq!(a.fingerprint, b.fingerprint);
    assert_eq!(synth.request_count(), 1);
    assert_eq!(dedup.in_flight_count(), 0);
    assert!(out_a.exists() && out_b.exists());
    Ok(())
}

/// Test a run driven from synchronous code with a progress spinner attached
#[test]
fn test_run_withProgressBar_shouldFinishSpinner() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let progress = ProgressBar::hidden();
    let pipeline = common::build_pipeline(
        Arc::new(MockSynthesizer::working()),
        Arc::new(MockRenderer::landscape()),
        None,
    )
    .with_progress(progress.clone());
    let (_cancel, signal) = cancel_channel();

    let result = tokio_test::block_on(pipeline.run(
        b"Hola mundo",
        &dir.path().join("bg.mp4"),
        &dir.path().join("out.mp4"),
        signal,
    ));

    assert!(result.success);
    assert!(progress.is_finished());
    assert_eq!(progress.message(), "Done");
    Ok(())
}

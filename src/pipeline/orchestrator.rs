/*!
 * Pipeline runner.
 *
 * Drives one invocation through every stage, tags failures with the stage
 * that raised them and wires in caching, cancellation and progress display.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use indicatif::ProgressBar;
use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::file_utils::{ArtifactStore, FileManager};
use crate::pipeline::{CaptionComposer, PipelineConfig, PipelineResult, PipelineStage};
use crate::render::{CancelSignal, RenderJob, Renderer, cancelled, plan_alignment};
use crate::synthesis::{
    Fingerprint, SynthesisDeduplicator, SynthesisOutput, SynthesisRequest, Synthesizer,
};

type StageResult<T> = Result<T, (PipelineStage, PipelineError)>;

/// Tags an error with the stage it happened in
trait AtStage<T> {
    fn at(self, stage: PipelineStage) -> StageResult<T>;
}

impl<T, E: Into<PipelineError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: PipelineStage) -> StageResult<T> {
        self.map_err(|e| (stage, e.into()))
    }
}

/// Runs scripts through every stage up to the rendered video
pub struct Pipeline {
    // @field: Resolved settings
    config: PipelineConfig,
    // @field: Pure caption stages
    composer: CaptionComposer,
    // @field: Synthesizer behind in-flight deduplication
    synthesis: SynthesisDeduplicator,
    // @field: Video renderer
    renderer: Arc<dyn Renderer>,
    // @field: Artifact cache, if enabled
    store: Option<ArtifactStore>,
    // @field: Stage spinner
    progress: Option<ProgressBar>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("synthesis", &self.synthesis)
            .field("renderer", &self.renderer)
            .field("store", &self.store)
            .finish()
    }
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        synthesizer: Arc<dyn Synthesizer>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self::with_deduplicator(config, SynthesisDeduplicator::new(synthesizer), renderer)
    }

    /// Build a pipeline sharing in-flight synthesis with other pipelines
    pub fn with_deduplicator(
        config: PipelineConfig,
        synthesis: SynthesisDeduplicator,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        let composer = CaptionComposer::new(&config);
        let store = config.artifact_dir.clone().map(ArtifactStore::new);
        Self {
            config,
            composer,
            synthesis,
            renderer,
            store,
            progress: None,
        }
    }

    /// Report the current stage on a progress spinner
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn composer(&self) -> &CaptionComposer {
        &self.composer
    }

    pub fn deduplicator(&self) -> &SynthesisDeduplicator {
        &self.synthesis
    }

    /// Read a script file and run it
    pub async fn run_file(
        &self,
        script_path: &Path,
        background: &Path,
        output: &Path,
        cancel: CancelSignal,
    ) -> PipelineResult {
        match FileManager::read_script(script_path) {
            Ok(script) => self.run(&script, background, output, cancel).await,
            Err(e) => {
                error!("Cannot read script {:?}: {}", script_path, e);
                PipelineResult::new(Uuid::new_v4().to_string()).fail(PipelineStage::Normalize, e)
            }
        }
    }

    /// Run every stage for one script
    ///
    /// Never panics on stage failures: the result carries the failing stage,
    /// the error and all artifacts produced before it.
    pub async fn run(
        &self,
        script: &[u8],
        background: &Path,
        output: &Path,
        cancel: CancelSignal,
    ) -> PipelineResult {
        let started = Instant::now();
        let mut result = PipelineResult::new(Uuid::new_v4().to_string());
        info!("Starting run {}", result.invocation_id);

        match self.execute(script, background, output, cancel, &mut result).await {
            Ok(path) => {
                result.success = true;
                result.output_path = Some(path);
                self.write_metadata(&result);
                info!(
                    "Run {} finished in {:.1}s: {} words, {} captions, {:.1}% interpolated",
                    result.invocation_id,
                    started.elapsed().as_secs_f64(),
                    result.word_count,
                    result.segment_count,
                    result.interpolated_fraction * 100.0
                );
                if let Some(progress) = &self.progress {
                    progress.finish_with_message("Done");
                }
                result
            }
            Err((stage, e)) => {
                error!("Run {} failed at {}: {}", result.invocation_id, stage, e);
                if let Some(progress) = &self.progress {
                    progress.abandon_with_message(format!("Failed at {}", stage));
                }
                result.fail(stage, e)
            }
        }
    }

    fn enter(&self, stage: PipelineStage) {
        debug!("Stage {}", stage);
        if let Some(progress) = &self.progress {
            progress.set_message(stage.label());
        }
    }

    async fn execute(
        &self,
        script: &[u8],
        background: &Path,
        output: &Path,
        mut cancel: CancelSignal,
        result: &mut PipelineResult,
    ) -> StageResult<PathBuf> {
        self.enter(PipelineStage::Normalize);
        let script = self.composer.normalize(script).at(PipelineStage::Normalize)?;
        result.word_count = script.word_count();
        result.artifacts.script = Some(script.clone());

        // Removed on every exit path when dropped
        let workspace = tempfile::Builder::new()
            .prefix("kreel-")
            .tempdir()
            .at(PipelineStage::Synthesize)?;

        self.enter(PipelineStage::Synthesize);
        let mut request = SynthesisRequest::new(&script.text, &self.config.voice, &self.config.language);
        request.rate = self.config.rate.clone();
        request.volume = self.config.volume.clone();
        let fingerprint = Fingerprint::of_request(&request);
        result.fingerprint = Some(fingerprint.clone());

        let synthesis = match self.store.as_ref().and_then(|s| s.load(&fingerprint)) {
            Some(cached) => {
                info!("Reusing cached narration {}", fingerprint.short());
                result.cache_hit = true;
                Arc::new(cached)
            }
            None => {
                tokio::select! {
                    synthesized = self.synthesis.synthesize(&fingerprint, &request) => {
                        synthesized.at(PipelineStage::Synthesize)?
                    }
                    _ = cancelled(&mut cancel) => {
                        return Err((PipelineStage::Synthesize, PipelineError::Cancelled));
                    }
                }
            }
        };
        result.narration_duration_ms = synthesis.duration_ms;
        result.artifacts.synthesis = Some(Arc::clone(&synthesis));

        let audio_path = self
            .persist_audio(&fingerprint, &synthesis, result.cache_hit, workspace.path())
            .at(PipelineStage::Synthesize)?;
        result.artifacts.audio_path = Some(audio_path.clone());

        self.enter(PipelineStage::Reconcile);
        let timeline = self
            .composer
            .reconcile(&script, &synthesis.boundaries, synthesis.duration_ms)
            .at(PipelineStage::Reconcile)?;
        result.interpolated_fraction = timeline.interpolated_fraction;
        result.artifacts.timeline = Some(timeline.clone());

        self.enter(PipelineStage::Segment);
        let segmentation = self.composer.segment(&script, &timeline);
        result.segment_count = segmentation.events.len();
        result.overflow_count = segmentation.overflows.len();

        self.enter(PipelineStage::GenerateMarkup);
        let markup = self.composer.markup(&segmentation);
        result.artifacts.segmentation = Some(segmentation);
        let subtitles = workspace.path().join("captions.ass");
        tokio::fs::write(&subtitles, &markup)
            .await
            .at(PipelineStage::GenerateMarkup)?;
        result.artifacts.markup = Some(markup);

        self.enter(PipelineStage::PlanAlignment);
        let media = self
            .renderer
            .probe(background)
            .await
            .at(PipelineStage::PlanAlignment)?;
        let plan = plan_alignment(&media, synthesis.duration_ms, &self.config.planner)
            .at(PipelineStage::PlanAlignment)?;
        debug!("Alignment plan: {:?}", plan);
        result.artifacts.plan = Some(plan);

        self.enter(PipelineStage::Render);
        let job = RenderJob {
            background: background.to_path_buf(),
            audio: audio_path,
            subtitles,
            output: output.to_path_buf(),
            plan,
        };
        self.renderer
            .render(&job, cancel)
            .await
            .at(PipelineStage::Render)
    }

    /// Put the narration on disk, in the artifact store when enabled
    fn persist_audio(
        &self,
        fingerprint: &Fingerprint,
        synthesis: &SynthesisOutput,
        cache_hit: bool,
        workspace: &Path,
    ) -> Result<PathBuf, PipelineError> {
        if let Some(store) = &self.store {
            if cache_hit {
                return Ok(store.audio_path(fingerprint, &synthesis.audio_format));
            }
            match store.save_synthesis(fingerprint, synthesis) {
                Ok(path) => return Ok(path),
                Err(e) => warn!("Could not cache narration {}: {}", fingerprint.short(), e),
            }
        }

        let path = workspace.join(format!("voice.{}", synthesis.audio_format));
        FileManager::write_atomic(&path, &synthesis.audio)?;
        Ok(path)
    }

    fn write_metadata(&self, result: &PipelineResult) {
        let (Some(store), Some(fingerprint)) = (&self.store, &result.fingerprint) else {
            return;
        };
        let config = serde_json::json!({
            "language": self.config.language,
            "voice": self.config.voice,
            "rate": self.config.rate,
            "volume": self.config.volume,
            "style": self.config.style.name(),
            "highlight_mode": self.config.style.highlight_mode(),
        });
        if let Err(e) = store.save_metadata(fingerprint, config, result.stats_json()) {
            warn!("Could not write metadata for {}: {}", fingerprint.short(), e);
        }
    }
}

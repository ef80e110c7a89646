use anyhow::{Context, Result};
use chrono::Local;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::PipelineError;
use crate::synthesis::{Fingerprint, SynthesisOutput};
use crate::timing::RawBoundaryEvent;

// @module: File and directory utilities

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path).with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file, creating parent directories
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                Self::ensure_dir(parent)?;
            }
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Read raw script bytes
    pub fn read_script<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, PipelineError> {
        let path = path.as_ref();
        fs::read(path).map_err(|e| PipelineError::Io(format!("Failed to read script {:?}: {}", path, e)))
    }

    /// Write bytes next to `path` and rename into place
    ///
    /// Readers never observe a half-written file.
    pub fn write_atomic<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<(), PipelineError> {
        let path = path.as_ref();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(content)?;
        temp.flush()?;
        temp.persist(path)
            .map_err(|e| PipelineError::Io(format!("Failed to persist {:?}: {}", path, e.error)))?;
        Ok(())
    }
}

/// Timing sidecar stored next to cached audio
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BoundaryRecord {
    audio_format: String,
    duration_ms: u64,
    boundaries: Vec<Option<RawBoundaryEvent>>,
}

/// Run metadata written after a successful render
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Full fingerprint
    pub fingerprint: Fingerprint,
    /// Generation settings (language, voice, style...)
    pub config: serde_json::Value,
    /// Run statistics
    pub stats: serde_json::Value,
    /// Local time of writing, RFC 3339
    pub created_at: String,
}

/// Content-addressed store for synthesis artifacts
///
/// Layout: `<base>/<fingerprint prefix>/voice.<ext>`, `boundaries.json`
/// and `metadata.json`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    pub const BOUNDARIES_FILE: &'static str = "boundaries.json";
    pub const METADATA_FILE: &'static str = "metadata.json";

    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory holding the artifacts of one fingerprint
    pub fn artifact_dir(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.base_dir.join(fingerprint.short())
    }

    pub fn audio_path(&self, fingerprint: &Fingerprint, audio_format: &str) -> PathBuf {
        self.artifact_dir(fingerprint).join(format!("voice.{}", audio_format))
    }

    /// Load a previously stored synthesis, if complete
    ///
    /// A directory with missing or unreadable files is treated as a miss.
    pub fn load(&self, fingerprint: &Fingerprint) -> Option<SynthesisOutput> {
        let dir = self.artifact_dir(fingerprint);
        let record_path = dir.join(Self::BOUNDARIES_FILE);
        if !record_path.is_file() {
            return None;
        }

        let record: BoundaryRecord = match fs::read_to_string(&record_path)
            .map_err(|e| e.to_string())
            .and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()))
        {
            Ok(record) => record,
            Err(e) => {
                warn!("Ignoring unreadable artifact {:?}: {}", record_path, e);
                return None;
            }
        };

        let audio_path = self.audio_path(fingerprint, &record.audio_format);
        match fs::read(&audio_path) {
            Ok(audio) => {
                debug!("Artifact cache hit for {}", fingerprint.short());
                Some(SynthesisOutput {
                    audio: audio.into(),
                    audio_format: record.audio_format,
                    duration_ms: record.duration_ms,
                    boundaries: record.boundaries,
                })
            }
            Err(e) => {
                warn!("Cached audio {:?} unreadable: {}", audio_path, e);
                None
            }
        }
    }

    /// Store audio and its timing feed; returns the audio path
    pub fn save_synthesis(
        &self,
        fingerprint: &Fingerprint,
        output: &SynthesisOutput,
    ) -> Result<PathBuf, PipelineError> {
        let audio_path = self.audio_path(fingerprint, &output.audio_format);
        FileManager::write_atomic(&audio_path, &output.audio)?;

        let record = BoundaryRecord {
            audio_format: output.audio_format.clone(),
            duration_ms: output.duration_ms,
            boundaries: output.boundaries.clone(),
        };
        let json = serde_json::to_vec_pretty(&record)
            .map_err(|e| PipelineError::Io(format!("Failed to serialize boundaries: {}", e)))?;
        // Written last: its presence marks the artifact as complete
        FileManager::write_atomic(self.artifact_dir(fingerprint).join(Self::BOUNDARIES_FILE), &json)?;

        debug!("Stored synthesis {} at {:?}", fingerprint.short(), audio_path);
        Ok(audio_path)
    }

    /// Write `metadata.json` for a finished run
    pub fn save_metadata(
        &self,
        fingerprint: &Fingerprint,
        config: serde_json::Value,
        stats: serde_json::Value,
    ) -> Result<PathBuf, PipelineError> {
        let metadata = ArtifactMetadata {
            fingerprint: fingerprint.clone(),
            config,
            stats,
            created_at: Local::now().to_rfc3339(),
        };
        let path = self.artifact_dir(fingerprint).join(Self::METADATA_FILE);
        let json = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| PipelineError::Io(format!("Failed to serialize metadata: {}", e)))?;
        FileManager::write_atomic(&path, &json)?;
        Ok(path)
    }

    pub fn load_metadata(&self, fingerprint: &Fingerprint) -> Option<ArtifactMetadata> {
        let path = self.artifact_dir(fingerprint).join(Self::METADATA_FILE);
        let content = fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }
}

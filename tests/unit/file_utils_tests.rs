/*!
 * Tests for file utilities and the artifact store
 */

use kreel::file_utils::{ArtifactStore, FileManager};
use kreel::synthesis::{Fingerprint, SynthesisOutput};
use kreel::timing::RawBoundaryEvent;
use serde_json::json;

use crate::common;

fn output() -> SynthesisOutput {
    SynthesisOutput {
        audio: bytes::Bytes::from_static(b"RIFFfake"),
        audio_format: "wav".to_string(),
        duration_ms: 900,
        boundaries: vec![Some(RawBoundaryEvent::new("uno", 0.0, 400.0))],
    }
}

/// Test writing and reading a file through nested directories
#[test]
fn test_writeToFile_withNestedPath_shouldCreateParents() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("a").join("b").join("notes.txt");

    FileManager::write_to_file(&path, "hola").unwrap();
    assert!(FileManager::file_exists(&path));
    assert_eq!(FileManager::read_to_string(&path).unwrap(), "hola");
}

/// Test reading scripts as raw bytes
#[test]
fn test_readScript_shouldReturnBytesOrIoError() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(dir.path(), "script.txt", common::SAMPLE_SCRIPT).unwrap();

    assert_eq!(FileManager::read_script(&path).unwrap(), common::SAMPLE_SCRIPT.as_bytes());
    assert!(matches!(
        FileManager::read_script(dir.path().join("missing.txt")),
        Err(kreel::errors::PipelineError::Io(_))
    ));
}

/// Test that an atomic write replaces existing content
#[test]
fn test_writeAtomic_overExistingFile_shouldReplace() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("voice.mp3");
    FileManager::write_atomic(&path, b"old").unwrap();
    FileManager::write_atomic(&path, b"new").unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"new");
}

/// Test that stored artifacts are keyed by fingerprint
#[test]
fn test_artifactStore_withTwoFingerprints_shouldKeepThemApart() {
    let dir = common::create_temp_dir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let stored = Fingerprint::compute("uno", "es-ES", "es-ES-ElviraNeural", "+0%", "+0%");
    let other = Fingerprint::compute("dos", "es-ES", "es-ES-ElviraNeural", "+0%", "+0%");

    store.save_synthesis(&stored, &output()).unwrap();
    assert_eq!(store.load(&stored), Some(output()));
    assert_eq!(store.load(&other), None);
}

/// Test that a corrupted boundary file is a cache miss
#[test]
fn test_artifactStore_withCorruptBoundaries_shouldMiss() {
    let dir = common::create_temp_dir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let fingerprint = Fingerprint::compute("uno", "es-ES", "v", "+0%", "+0%");

    store.save_synthesis(&fingerprint, &output()).unwrap();
    FileManager::write_atomic(
        store.artifact_dir(&fingerprint).join(ArtifactStore::BOUNDARIES_FILE),
        b"{not json",
    )
    .unwrap();
    assert!(store.load(&fingerprint).is_none());
}

/// Test metadata round trip
#[test]
fn test_artifactStore_metadata_shouldRoundTrip() {
    let dir = common::create_temp_dir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let fingerprint = Fingerprint::compute("uno", "es-ES", "v", "+0%", "+0%");

    store
        .save_metadata(&fingerprint, json!({"voice": "v"}), json!({"word_count": 1}))
        .unwrap();
    let metadata = store.load_metadata(&fingerprint).unwrap();
    assert_eq!(metadata.fingerprint, fingerprint);
    assert_eq!(metadata.stats["word_count"], 1);
    assert!(chrono::DateTime::parse_from_rfc3339(&metadata.created_at).is_ok());
}

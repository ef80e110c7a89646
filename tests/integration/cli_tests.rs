/*!
 * Integration tests running the kreel binary
 */

use std::process::Command;

use anyhow::Result;
use serde_json::Value;

use crate::common;

fn kreel() -> Command {
    Command::new(env!("CARGO_BIN_EXE_kreel"))
}

/// Test that the plan command prints the plan as JSON
#[test]
fn test_planCommand_withLandscapeSource_shouldPrintLoopPlan() -> Result<()> {
    let output = kreel()
        .args(["plan", "--width", "1920", "--height", "1080", "--source-ms", "5000", "--narration-ms", "15000"])
        .output()?;
    assert!(output.status.success());

    let plan: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(plan["duration_policy"], "loop");
    assert_eq!(plan["repeat_count"], 3);
    assert_eq!(plan["crop_rect"]["x"], 656);
    Ok(())
}

/// Test offline caption generation from a recorded boundary file
#[test]
fn test_captionsCommand_withRecordedFeed_shouldWriteAssFile() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let script = common::create_test_file(dir.path(), "script.txt", "Hola, mundo!")?;
    let boundaries = common::create_test_file(
        dir.path(),
        "boundaries.json",
        r#"{
            "audio_format": "mp3",
            "duration_ms": 1200,
            "boundaries": [
                {"text": "Hola", "audio_offset_ms": 0, "duration_ms": 500},
                {"text": "mundo", "audio_offset_ms": 600, "duration_ms": 600}
            ]
        }"#,
    )?;
    let config = dir.path().join("conf.json");
    let ass = dir.path().join("captions.ass");

    let output = kreel()
        .arg("captions")
        .arg("--script")
        .arg(&script)
        .arg("--boundaries")
        .arg(&boundaries)
        .arg("-o")
        .arg(&ass)
        .arg("-c")
        .arg(&config)
        .output()?;
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let markup = std::fs::read_to_string(&ass)?;
    assert!(markup.contains("PlayResX: 1080"));
    assert!(markup.contains("{\\kf50}HOLA{\\kf0},{\\kf10} {\\kf60}MUNDO{\\kf0}!"));
    assert!(config.exists());
    Ok(())
}

/// Test that a script without words makes the command fail
#[test]
fn test_captionsCommand_withEmptyScript_shouldFail() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let script = common::create_test_file(dir.path(), "script.txt", "   ")?;
    let boundaries = common::create_test_file(dir.path(), "b.json", r#"{"duration_ms": 1000}"#)?;

    let status = kreel()
        .arg("captions")
        .arg("--script")
        .arg(&script)
        .arg("--boundaries")
        .arg(&boundaries)
        .arg("-o")
        .arg(dir.path().join("out.ass"))
        .arg("-c")
        .arg(dir.path().join("conf.json"))
        .status()?;
    assert!(!status.success());
    Ok(())
}

/// Test that create refuses a missing background before doing any work
#[test]
fn test_createCommand_withMissingBackground_shouldFail() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let script = common::create_test_file(dir.path(), "script.txt", common::SAMPLE_SCRIPT)?;

    let output = kreel()
        .arg("create")
        .arg("--script")
        .arg(&script)
        .arg("--bg")
        .arg(dir.path().join("missing.mp4"))
        .arg("-o")
        .arg(dir.path().join("out.mp4"))
        .arg("-c")
        .arg(dir.path().join("conf.json"))
        .output()?;
    assert!(!output.status.success());
    assert!(!dir.path().join("out.mp4").exists());
    Ok(())
}

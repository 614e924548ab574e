//! FfmpegEncoder integration tests.
//!
//! A shell script stands in for ffmpeg, so these tests verify:
//! - version detection through `-version`
//! - the output file check after a successful exit
//! - stderr capture when the process fails
//! - a full engine batch driving real child processes
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use batchconv_core::{
    testing::{fixtures, RecordingSink},
    AudioFormat, ConversionEngine, EncodeError, EncodeRequest, EncodeSettings, Encoder,
    EncoderConfig, FfmpegEncoder,
};

const STUB_FFMPEG: &str = r#"#!/bin/sh
if [ "$1" = "-version" ]; then
  echo "ffmpeg version 6.1.1-stub Copyright (c) 2000-2023 the FFmpeg developers"
  exit 0
fi
for arg; do last="$arg"; done
case "$3" in
  *broken*)
    echo "Invalid data found when processing input" >&2
    exit 1
    ;;
  *silent*)
    exit 0
    ;;
esac
printf 'stub output' > "$last"
"#;

fn install_stub(dir: &Path) -> PathBuf {
    let path = dir.join("ffmpeg-stub");
    std::fs::write(&path, STUB_FFMPEG).expect("Failed to write stub");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to mark stub executable");
    path
}

fn request(source: PathBuf, destination: PathBuf) -> EncodeRequest {
    EncodeRequest {
        source,
        destination,
        format: AudioFormat::Mp3,
        bitrate: "320k".to_string(),
        extra_args: EncoderConfig::default().extra_args,
    }
}

// Child processes are spawned from a single test so that writing the stub
// never races with a fork from a parallel test.
#[tokio::test]
async fn test_stub_ffmpeg_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let stub = install_stub(temp_dir.path());
    let encoder = FfmpegEncoder::new(&stub);

    // Version detection.
    let info = encoder.validate().await.unwrap();
    assert_eq!(info.name, "ffmpeg");
    assert_eq!(info.version.as_deref(), Some("6.1.1-stub"));

    // Successful encode.
    let source = temp_dir.path().join("ok.m4a");
    std::fs::write(&source, b"x").unwrap();
    let destination = temp_dir.path().join("ok.mp3");
    let output = encoder
        .encode(&request(source, destination.clone()))
        .await
        .unwrap();
    assert_eq!(output.output_path, destination);
    assert_eq!(output.output_size_bytes, "stub output".len() as u64);

    // Failing encode keeps stderr.
    let broken = temp_dir.path().join("broken.m4a");
    std::fs::write(&broken, b"x").unwrap();
    let err = encoder
        .encode(&request(broken, temp_dir.path().join("broken.mp3")))
        .await
        .unwrap_err();
    assert!(matches!(err, EncodeError::Failed { .. }));
    assert!(err.detail().contains("Invalid data found"));

    // Exit code 0 without an output file is still a failure.
    let silent = temp_dir.path().join("silent.m4a");
    std::fs::write(&silent, b"x").unwrap();
    let err = encoder
        .encode(&request(silent, temp_dir.path().join("silent.mp3")))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Output file not created"));

    // A whole batch through the engine.
    let input_dir = temp_dir.path().join("in");
    std::fs::create_dir(&input_dir).unwrap();
    let mut sources = fixtures::create_source_files(&input_dir, 3).unwrap();
    let broken = input_dir.join("broken.m4a");
    std::fs::write(&broken, b"x").unwrap();
    sources.push(broken.clone());

    let output_dir = temp_dir.path().join("out");
    let sink = RecordingSink::new();
    let engine = ConversionEngine::new(encoder, EncodeSettings::default());
    let report = engine.run(&sources, &output_dir, 2, &sink).await.unwrap();

    assert!(!report.succeeded());
    assert_eq!(report.completed, 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source, broken);
    for i in 1..=3 {
        assert!(output_dir.join(format!("track{:02}.mp3", i)).exists());
    }
    assert_eq!(sink.progress(), vec![25.0, 50.0, 75.0]);
}

#[tokio::test]
async fn test_missing_source_is_reported_before_spawning() {
    let encoder = FfmpegEncoder::new("/nonexistent/ffmpeg");
    let err = encoder
        .encode(&request(
            PathBuf::from("/nonexistent/in.m4a"),
            PathBuf::from("/nonexistent/out.mp3"),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EncodeError::SourceNotFound { .. }));
}

#[test]
fn test_locate_falls_back_to_path() {
    let config = EncoderConfig::default().with_ffmpeg_path(PathBuf::from("/nonexistent/ffmpeg"));
    let encoder = FfmpegEncoder::locate(&config);
    assert_eq!(encoder.ffmpeg_path(), Path::new("ffmpeg"));
}

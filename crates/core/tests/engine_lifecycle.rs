//! Conversion engine lifecycle integration tests.
//!
//! These tests drive `ConversionEngine` with the mock encoder and verify:
//! - the concurrency cap and slot refilling
//! - progress and status reporting
//! - partial failure, panics and timeouts
//! - cancellation before and during a run
//! - rejection of overlapping runs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use batchconv_core::{
    engine::CANCELLED_STATUS,
    testing::{fixtures, MockEncoder, RecordingSink},
    ChannelSink, ConversionEngine, EncodeError, EncodeSettings, EngineConfig, EngineError,
    EngineEvent,
};

/// Test helper holding the encoder, sink and directories of one test.
struct TestHarness {
    encoder: MockEncoder,
    sink: Arc<RecordingSink>,
    input_dir: PathBuf,
    output_dir: PathBuf,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let input_dir = temp_dir.path().join("in");
        std::fs::create_dir(&input_dir).expect("Failed to create input dir");

        Self {
            encoder: MockEncoder::new(),
            sink: Arc::new(RecordingSink::new()),
            input_dir,
            output_dir: temp_dir.path().join("out"),
            _temp_dir: temp_dir,
        }
    }

    fn sources(&self, count: usize) -> Vec<PathBuf> {
        fixtures::create_source_files(&self.input_dir, count)
            .expect("Failed to create source files")
    }

    fn engine(&self) -> ConversionEngine<MockEncoder> {
        ConversionEngine::new(self.encoder.clone(), EncodeSettings::default())
    }

    fn output(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }
}

#[tokio::test]
async fn test_full_batch_reports_progress_and_writes_outputs() {
    let harness = TestHarness::new();
    harness.encoder.set_write_outputs(true).await;
    harness.encoder.set_delay(Duration::from_millis(5)).await;
    let sources = harness.sources(5);

    let ok = tokio_test::assert_ok!(
        harness
            .engine()
            .run_batch(&sources, &harness.output_dir, 2, harness.sink.as_ref())
            .await
    );

    assert!(ok);
    assert_eq!(
        harness.sink.progress(),
        vec![20.0, 40.0, 60.0, 80.0, 100.0]
    );
    assert_eq!(
        harness.sink.statuses(),
        (1..=5)
            .map(|i| format!("Converting: {}/5 files completed", i))
            .collect::<Vec<_>>()
    );
    assert!(harness.sink.failures().is_empty());

    for i in 1..=5 {
        assert!(harness.output(&format!("track{:02}.mp3", i)).exists());
    }
    let outputs: Vec<PathBuf> = std::fs::read_dir(&harness.output_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(outputs.len(), 5);
    assert!(outputs
        .iter()
        .all(|p| p.extension().is_some_and(|e| e == "mp3")));
    assert!(harness.encoder.peak_concurrency() <= 2);
}

#[tokio::test]
async fn test_progress_precedes_status() {
    let harness = TestHarness::new();
    let sources = harness.sources(2);

    harness
        .engine()
        .run_batch(&sources, &harness.output_dir, 1, harness.sink.as_ref())
        .await
        .unwrap();

    let events = harness.sink.events();
    assert_eq!(events.len(), 4);
    assert!(matches!(events[0], EngineEvent::Progress { percent } if percent == 50.0));
    assert!(matches!(&events[1], EngineEvent::Status { message } if message == "Converting: 1/2 files completed"));
    assert!(matches!(events[2], EngineEvent::Progress { percent } if percent == 100.0));
}

#[tokio::test]
async fn test_limit_one_completes_in_submission_order() {
    let harness = TestHarness::new();
    let sources = harness.sources(4);
    // Earlier files are slower, so any overlap would reorder completions.
    for (i, source) in sources.iter().enumerate() {
        harness
            .encoder
            .set_source_delay(source, Duration::from_millis(40 - 10 * i as u64))
            .await;
    }

    let ok = harness
        .engine()
        .run_batch(&sources, &harness.output_dir, 1, harness.sink.as_ref())
        .await
        .unwrap();

    assert!(ok);
    assert_eq!(harness.encoder.completion_order().await, sources);
    assert_eq!(harness.encoder.peak_concurrency(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_never_exceeds_limit() {
    let harness = TestHarness::new();
    harness.encoder.set_delay(Duration::from_millis(20)).await;
    let sources = harness.sources(10);

    let ok = harness
        .engine()
        .run_batch(&sources, &harness.output_dir, 3, harness.sink.as_ref())
        .await
        .unwrap();

    assert!(ok);
    assert_eq!(harness.encoder.started_count().await, 10);
    assert_eq!(harness.encoder.peak_concurrency(), 3);
}

#[tokio::test]
async fn test_limit_larger_than_batch() {
    let harness = TestHarness::new();
    harness.encoder.set_delay(Duration::from_millis(20)).await;
    let sources = harness.sources(3);

    let ok = harness
        .engine()
        .run_batch(&sources, &harness.output_dir, 16, harness.sink.as_ref())
        .await
        .unwrap();

    assert!(ok);
    assert_eq!(harness.encoder.peak_concurrency(), 3);
}

#[tokio::test]
async fn test_finished_slot_is_refilled_while_others_run() {
    let harness = TestHarness::new();
    let sources = harness.sources(4);
    harness
        .encoder
        .set_source_delay(&sources[0], Duration::from_millis(300))
        .await;
    harness
        .encoder
        .set_source_delay(&sources[1], Duration::from_millis(10))
        .await;
    harness
        .encoder
        .set_source_delay(&sources[2], Duration::from_millis(10))
        .await;
    harness
        .encoder
        .set_source_delay(&sources[3], Duration::from_millis(10))
        .await;

    let ok = harness
        .engine()
        .run_batch(&sources, &harness.output_dir, 2, harness.sink.as_ref())
        .await
        .unwrap();

    assert!(ok);
    // The slow first file holds one slot; the other three pass through the
    // second slot one after another before it finishes.
    assert_eq!(
        harness.encoder.completion_order().await,
        vec![
            sources[1].clone(),
            sources[2].clone(),
            sources[3].clone(),
            sources[0].clone(),
        ]
    );
}

#[tokio::test]
async fn test_empty_batch_succeeds_and_creates_directory() {
    let harness = TestHarness::new();
    let sources: Vec<PathBuf> = Vec::new();

    let report = harness
        .engine()
        .run(&sources, &harness.output_dir, 3, harness.sink.as_ref())
        .await
        .unwrap();

    assert!(report.succeeded());
    assert_eq!(report.total, 0);
    assert!(harness.output_dir.is_dir());
    assert_eq!(harness.encoder.started_count().await, 0);
    assert!(harness.sink.events().is_empty());
}

#[tokio::test]
async fn test_existing_output_directory_is_reused() {
    let harness = TestHarness::new();
    std::fs::create_dir_all(&harness.output_dir).unwrap();
    let sources = harness.sources(1);

    let ok = harness
        .engine()
        .run_batch(&sources, &harness.output_dir, 1, harness.sink.as_ref())
        .await
        .unwrap();

    assert!(ok);
}

#[tokio::test]
async fn test_directory_creation_failure_aborts_batch() {
    let harness = TestHarness::new();
    let sources = harness.sources(2);
    let blocker = harness.input_dir.join("not-a-dir");
    std::fs::write(&blocker, b"file").unwrap();

    let result = harness
        .engine()
        .run_batch(
            &sources,
            &blocker.join("out"),
            2,
            harness.sink.as_ref(),
        )
        .await;

    assert!(matches!(result, Err(EngineError::DirectoryCreation { .. })));
    assert_eq!(harness.encoder.started_count().await, 0);
    assert!(harness.sink.events().is_empty());
}

#[tokio::test]
async fn test_partial_failure_continues_batch() {
    let harness = TestHarness::new();
    let sources = harness.sources(4);
    harness.encoder.fail_on(&sources[1]).await;

    let report = harness
        .engine()
        .run(&sources, &harness.output_dir, 2, harness.sink.as_ref())
        .await
        .unwrap();

    assert!(!report.succeeded());
    assert_eq!(report.completed, 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source, sources[1]);
    assert!(report.failures[0].error.contains("mock encoder failure"));
    assert!(report.failures[0].error.contains("cannot decode"));

    assert_eq!(harness.encoder.started_count().await, 4);
    assert_eq!(harness.sink.progress(), vec![25.0, 50.0, 75.0]);
    assert_eq!(harness.sink.failures().len(), 1);
    assert_eq!(harness.sink.failures()[0].0, sources[1]);
}

#[tokio::test]
async fn test_all_failures_returns_false() {
    let harness = TestHarness::new();
    let sources = harness.sources(3);
    for source in &sources {
        harness.encoder.fail_on(source).await;
    }

    let ok = harness
        .engine()
        .run_batch(&sources, &harness.output_dir, 2, harness.sink.as_ref())
        .await
        .unwrap();

    assert!(!ok);
    assert!(harness.sink.progress().is_empty());
    assert!(harness.sink.statuses().is_empty());
    assert_eq!(harness.sink.failures().len(), 3);
}

#[tokio::test]
async fn test_panicking_encoder_is_a_job_failure() {
    let harness = TestHarness::new();
    let sources = harness.sources(3);
    harness.encoder.panic_on(&sources[0]).await;

    let report = harness
        .engine()
        .run(&sources, &harness.output_dir, 1, harness.sink.as_ref())
        .await
        .unwrap();

    assert!(!report.succeeded());
    assert_eq!(report.completed, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source, sources[0]);
    assert!(report.failures[0].error.contains("mock encoder panic"));
}

#[tokio::test]
async fn test_job_timeout_is_a_job_failure() {
    let harness = TestHarness::new();
    let sources = harness.sources(2);
    harness
        .encoder
        .set_source_delay(&sources[0], Duration::from_secs(5))
        .await;

    let engine = harness
        .engine()
        .with_config(EngineConfig::default().with_job_timeout(1));
    let report = engine
        .run(&sources, &harness.output_dir, 2, harness.sink.as_ref())
        .await
        .unwrap();

    assert!(!report.succeeded());
    assert_eq!(report.completed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source, sources[0]);
    assert_eq!(
        report.failures[0].error,
        EncodeError::Timeout { timeout_secs: 1 }.to_string()
    );
}

#[tokio::test]
async fn test_source_without_file_name_fails_alone() {
    let harness = TestHarness::new();
    let mut sources = harness.sources(2);
    sources.insert(1, PathBuf::from("/"));

    let report = harness
        .engine()
        .run(&sources, &harness.output_dir, 2, harness.sink.as_ref())
        .await
        .unwrap();

    assert!(!report.succeeded());
    assert_eq!(report.total, 3);
    assert_eq!(report.completed, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source, Path::new("/"));
    assert_eq!(harness.encoder.started_count().await, 2);
}

#[tokio::test]
async fn test_cancel_before_run_does_not_carry_over() {
    let harness = TestHarness::new();
    let sources = harness.sources(3);
    let engine = harness.engine();

    engine.cancel();
    assert!(engine.is_cancelled());

    let ok = engine
        .run_batch(&sources, &harness.output_dir, 2, harness.sink.as_ref())
        .await
        .unwrap();

    assert!(ok);
    assert!(!engine.is_cancelled());
    assert_eq!(harness.encoder.started_count().await, 3);
    assert!(!harness
        .sink
        .statuses()
        .contains(&CANCELLED_STATUS.to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_mid_run_stops_dispatch() {
    let harness = TestHarness::new();
    harness.encoder.hold().await;
    let sources = harness.sources(5);
    let engine = Arc::new(harness.engine());

    let run = {
        let engine = Arc::clone(&engine);
        let sink = Arc::clone(&harness.sink);
        let sources = sources.clone();
        let output_dir = harness.output_dir.clone();
        tokio::spawn(async move { engine.run(&sources, &output_dir, 2, sink.as_ref()).await })
    };

    harness.encoder.wait_for_started(2).await;
    assert!(engine.is_running());
    engine.cancel();
    engine.cancel();

    let report = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("cancelled run should return promptly")
        .unwrap()
        .unwrap();

    assert!(report.cancelled);
    assert!(!report.succeeded());
    assert_eq!(report.completed, 0);
    assert_eq!(report.skipped, 3);
    assert_eq!(harness.sink.statuses(), vec![CANCELLED_STATUS.to_string()]);
    assert!(harness.sink.progress().is_empty());
    assert!(!engine.is_running());

    // In-flight encodes finish in the background; nothing new is started.
    harness.encoder.release(5).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.encoder.started_count().await, 2);
    assert_eq!(harness.encoder.recorded_encodes().await.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_engine_is_reusable_after_cancel() {
    let harness = TestHarness::new();
    harness.encoder.hold().await;
    let sources = harness.sources(3);
    let engine = Arc::new(harness.engine());

    let run = {
        let engine = Arc::clone(&engine);
        let sources = sources.clone();
        let output_dir = harness.output_dir.clone();
        tokio::spawn(async move {
            engine
                .run_batch(&sources, &output_dir, 1, &batchconv_core::NullSink)
                .await
        })
    };

    harness.encoder.wait_for_started(1).await;
    engine.cancel();
    assert!(!run.await.unwrap().unwrap());

    harness.encoder.release(10).await;
    let ok = engine
        .run_batch(&sources, &harness.output_dir, 3, harness.sink.as_ref())
        .await
        .unwrap();
    assert!(ok);
    assert_eq!(harness.sink.progress().last(), Some(&100.0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_run_is_rejected() {
    let harness = TestHarness::new();
    harness.encoder.hold().await;
    let sources = harness.sources(2);
    let engine = Arc::new(harness.engine());

    let first = {
        let engine = Arc::clone(&engine);
        let sources = sources.clone();
        let output_dir = harness.output_dir.clone();
        tokio::spawn(async move {
            engine
                .run_batch(&sources, &output_dir, 2, &batchconv_core::NullSink)
                .await
        })
    };

    harness.encoder.wait_for_started(2).await;
    let second = engine
        .run_batch(&sources, &harness.output_dir, 2, harness.sink.as_ref())
        .await;
    assert!(matches!(second, Err(EngineError::AlreadyRunning)));

    harness.encoder.release(2).await;
    assert!(first.await.unwrap().unwrap());
    assert!(harness.sink.events().is_empty());
}

#[tokio::test]
async fn test_channel_sink_delivers_events() {
    let harness = TestHarness::new();
    let sources = harness.sources(2);
    harness.encoder.fail_on(&sources[1]).await;
    let (sink, mut events) = ChannelSink::channel();

    let ok = harness
        .engine()
        .run_batch(&sources, &harness.output_dir, 1, &sink)
        .await
        .unwrap();
    drop(sink);

    let mut received = Vec::new();
    while let Some(event) = events.recv().await {
        received.push(event);
    }

    assert!(!ok);
    assert_eq!(received.len(), 3);
    assert!(matches!(
        &received[2],
        EngineEvent::JobFailed { source, .. } if source == &sources[1]
    ));
}

#[tokio::test]
async fn test_colliding_destinations_still_run_every_job() {
    let harness = TestHarness::new();
    harness.encoder.set_write_outputs(true).await;
    let nested = harness.input_dir.join("nested");
    std::fs::create_dir(&nested).unwrap();
    let a = harness.input_dir.join("song.m4a");
    let b = nested.join("song.m4a");
    std::fs::write(&a, b"a").unwrap();
    std::fs::write(&b, b"b").unwrap();
    let sources = vec![a, b.clone()];

    let ok = harness
        .engine()
        .run_batch(&sources, &harness.output_dir, 1, harness.sink.as_ref())
        .await
        .unwrap();

    assert!(ok);
    assert_eq!(harness.encoder.started_count().await, 2);
    let written = std::fs::read_to_string(harness.output("song.mp3")).unwrap();
    assert_eq!(written, format!("encoded from {}", b.display()));
}

//! Mock encoder for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};

use crate::encoder::{EncodeError, EncodeOutput, EncodeRequest, Encoder, EncoderInfo};

/// A recorded encode for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedEncode {
    /// The request that was submitted.
    pub request: EncodeRequest,
    /// Whether the encode succeeded.
    pub success: bool,
}

/// Mock implementation of the Encoder trait.
///
/// Provides controllable behavior for testing:
/// - Track requests in start and completion order
/// - Track the peak number of simultaneous encodes
/// - Simulate failures, panics and slow files
/// - Hold encodes at a gate until the test releases them
///
/// Clones share state, so a test can keep a handle after moving the encoder
/// into an engine.
///
/// # Example
///
/// ```rust,ignore
/// use batchconv_core::testing::MockEncoder;
///
/// let encoder = MockEncoder::new();
/// encoder.fail_on("/in/b.m4a").await;
///
/// let engine = ConversionEngine::new(encoder.clone(), EncodeSettings::default());
/// engine.run_batch(&files, out, 2, &NullSink).await?;
///
/// assert!(encoder.peak_concurrency() <= 2);
/// ```
#[derive(Debug, Clone)]
pub struct MockEncoder {
    /// Sources in the order their encodes started.
    started: Arc<RwLock<Vec<PathBuf>>>,
    /// Encodes in the order they finished.
    finished: Arc<RwLock<Vec<RecordedEncode>>>,
    /// Sources that fail.
    failing: Arc<RwLock<HashSet<PathBuf>>>,
    /// Sources that panic.
    panicking: Arc<RwLock<HashSet<PathBuf>>>,
    /// If set, the next encode fails with this error.
    next_error: Arc<RwLock<Option<EncodeError>>>,
    /// Simulated encode duration.
    delay: Arc<RwLock<Duration>>,
    /// Per-source encode duration overrides.
    source_delays: Arc<RwLock<HashMap<PathBuf, Duration>>>,
    /// Whether to write a small file at the destination.
    write_outputs: Arc<RwLock<bool>>,
    /// When set, encodes wait for a permit before finishing.
    gate: Arc<RwLock<Option<Arc<Semaphore>>>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Default for MockEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEncoder {
    /// Create a new mock encoder that succeeds immediately.
    pub fn new() -> Self {
        Self {
            started: Arc::new(RwLock::new(Vec::new())),
            finished: Arc::new(RwLock::new(Vec::new())),
            failing: Arc::new(RwLock::new(HashSet::new())),
            panicking: Arc::new(RwLock::new(HashSet::new())),
            next_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
            source_delays: Arc::new(RwLock::new(HashMap::new())),
            write_outputs: Arc::new(RwLock::new(false)),
            gate: Arc::new(RwLock::new(None)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sources in the order their encodes started.
    pub async fn started(&self) -> Vec<PathBuf> {
        self.started.read().await.clone()
    }

    /// Number of encodes started.
    pub async fn started_count(&self) -> usize {
        self.started.read().await.len()
    }

    /// Encodes in the order they finished.
    pub async fn recorded_encodes(&self) -> Vec<RecordedEncode> {
        self.finished.read().await.clone()
    }

    /// Sources in the order their encodes finished.
    pub async fn completion_order(&self) -> Vec<PathBuf> {
        self.finished
            .read()
            .await
            .iter()
            .map(|r| r.request.source.clone())
            .collect()
    }

    /// Highest number of simultaneous encodes seen.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Encodes currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Make encodes of `source` fail.
    pub async fn fail_on(&self, source: impl AsRef<Path>) {
        self.failing
            .write()
            .await
            .insert(source.as_ref().to_path_buf());
    }

    /// Make encodes of `source` panic.
    pub async fn panic_on(&self, source: impl AsRef<Path>) {
        self.panicking
            .write()
            .await
            .insert(source.as_ref().to_path_buf());
    }

    /// Configure the next encode to fail with the given error.
    pub async fn set_next_error(&self, error: EncodeError) {
        *self.next_error.write().await = Some(error);
    }

    /// Set the simulated encode duration.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Set the simulated encode duration of one source.
    pub async fn set_source_delay(&self, source: impl AsRef<Path>, delay: Duration) {
        self.source_delays
            .write()
            .await
            .insert(source.as_ref().to_path_buf(), delay);
    }

    /// Enable or disable writing a file at each destination.
    pub async fn set_write_outputs(&self, write: bool) {
        *self.write_outputs.write().await = write;
    }

    /// Hold every encode until `release` lets it through.
    pub async fn hold(&self) {
        *self.gate.write().await = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `count` held encodes finish.
    pub async fn release(&self, count: usize) {
        if let Some(gate) = self.gate.read().await.as_ref() {
            gate.add_permits(count);
        }
    }

    /// Wait until at least `count` encodes have started.
    pub async fn wait_for_started(&self, count: usize) {
        while self.started_count().await < count {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    async fn simulate(&self, request: &EncodeRequest) -> Result<EncodeOutput, EncodeError> {
        let gate = self.gate.read().await.clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let delay = self
            .source_delays
            .read()
            .await
            .get(&request.source)
            .copied()
            .unwrap_or(*self.delay.read().await);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.panicking.read().await.contains(&request.source) {
            panic!("mock encoder panic for {:?}", request.source);
        }

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        if self.failing.read().await.contains(&request.source) {
            return Err(EncodeError::failed(
                "mock encoder failure",
                Some(format!("cannot decode {}", request.source.display())),
            ));
        }

        let mut output_size_bytes = 0;
        if *self.write_outputs.read().await {
            let contents = format!("encoded from {}", request.source.display());
            tokio::fs::write(&request.destination, contents.as_bytes()).await?;
            output_size_bytes = contents.len() as u64;
        }

        Ok(EncodeOutput {
            output_path: request.destination.clone(),
            output_size_bytes,
            duration_ms: delay.as_millis() as u64,
        })
    }
}

/// Decrements the in-flight counter even if the encode panics.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Encoder for MockEncoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn encode(&self, request: &EncodeRequest) -> Result<EncodeOutput, EncodeError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(&self.in_flight);
        self.peak.fetch_max(current, Ordering::SeqCst);
        self.started.write().await.push(request.source.clone());

        let result = self.simulate(request).await;

        self.finished.write().await.push(RecordedEncode {
            request: request.clone(),
            success: result.is_ok(),
        });
        result
    }

    async fn validate(&self) -> Result<EncoderInfo, EncodeError> {
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        Ok(EncoderInfo {
            name: "mock".to_string(),
            version: Some("0.0.0".to_string()),
        })
    }
}

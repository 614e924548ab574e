//! Conversion engine implementation.

use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::encoder::{AudioFormat, EncodeError, EncodeRequest, Encoder, EncoderConfig};
use crate::metrics::{BATCHES_TOTAL, JOBS_IN_FLIGHT, JOBS_TOTAL, JOB_DURATION};

use super::config::EngineConfig;
use super::progress::{converting_status, ProgressSink, CANCELLED_STATUS};
use super::types::{BatchReport, Job, JobFailure, JobOutcome};

/// Error type for engine operations.
///
/// These abort the whole batch before any job starts. Per-job failures are
/// never surfaced here.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The output directory could not be created.
    #[error("Failed to create output directory {path}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another batch is running on this engine.
    #[error("A batch is already running on this engine")]
    AlreadyRunning,

    /// Concurrency limit of zero.
    #[error("Concurrency limit must be at least 1")]
    InvalidConcurrency,
}

/// Encoding parameters shared by every job of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    pub format: AudioFormat,
    pub bitrate: String,
    pub extra_args: Vec<String>,
}

impl EncodeSettings {
    fn request_for(&self, job: &Job) -> EncodeRequest {
        EncodeRequest {
            source: job.source.clone(),
            destination: job.destination.clone(),
            format: self.format,
            bitrate: self.bitrate.clone(),
            extra_args: self.extra_args.clone(),
        }
    }
}

impl From<&EncoderConfig> for EncodeSettings {
    fn from(config: &EncoderConfig) -> Self {
        Self {
            format: config.format,
            bitrate: config.bitrate.clone(),
            extra_args: config.extra_args.clone(),
        }
    }
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self::from(&EncoderConfig::default())
    }
}

/// Cancellation signal of a single run.
#[derive(Debug, Default)]
struct CancelSignal {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    /// Returns true the first time it is called.
    fn cancel(&self) -> bool {
        let first = !self.cancelled.swap(true, Ordering::SeqCst);
        self.notify.notify_one();
        first
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the signal is cancelled.
    async fn cancelled(&self) {
        while !self.is_cancelled() {
            self.notify.notified().await;
        }
    }
}

/// Marks the engine busy for the lifetime of a run.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(running: &'a AtomicBool) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(running))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A finished job as returned by its worker task.
struct JobCompletion {
    job: Job,
    outcome: JobOutcome,
}

/// A job that could not be planned.
type PlanFailure = (PathBuf, EncodeError);

/// Runs batches of conversions under a concurrency cap.
///
/// At most one batch runs per engine at a time. `cancel` may be called from
/// any thread; it stops new jobs from starting but never interrupts an encode
/// already in progress.
pub struct ConversionEngine<E: Encoder> {
    encoder: Arc<E>,
    settings: EncodeSettings,
    config: EngineConfig,
    signal: Mutex<Arc<CancelSignal>>,
    running: AtomicBool,
}

impl<E: Encoder + 'static> ConversionEngine<E> {
    /// Creates a new engine.
    pub fn new(encoder: E, settings: EncodeSettings) -> Self {
        Self::from_shared(Arc::new(encoder), settings)
    }

    /// Creates a new engine around an encoder shared with the caller.
    pub fn from_shared(encoder: Arc<E>, settings: EncodeSettings) -> Self {
        Self {
            encoder,
            settings,
            config: EngineConfig::default(),
            signal: Mutex::new(Arc::new(CancelSignal::default())),
            running: AtomicBool::new(false),
        }
    }

    /// Sets the engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Stops dispatching new jobs in the current run.
    ///
    /// Idempotent. Has no effect on runs started afterwards.
    pub fn cancel(&self) {
        let signal = Arc::clone(&self.lock_signal());
        if signal.cancel() {
            info!("Conversion cancellation requested");
        }
    }

    /// Whether the current (or last) run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.lock_signal().is_cancelled()
    }

    /// Whether a batch is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Converts `sources` into `output_dir`.
    ///
    /// Returns `true` iff every job succeeded and the run was not cancelled.
    pub async fn run_batch<P, S>(
        &self,
        sources: &[P],
        output_dir: &Path,
        concurrency_limit: usize,
        sink: &S,
    ) -> Result<bool, EngineError>
    where
        P: AsRef<Path> + Sync,
        S: ProgressSink + ?Sized,
    {
        self.run(sources, output_dir, concurrency_limit, sink)
            .await
            .map(|report| report.succeeded())
    }

    /// Same as `run_batch`, returning the full report.
    ///
    /// On cancellation this returns as soon as the cancellation is observed.
    /// Jobs still encoding at that moment keep running in the background and
    /// their results are discarded.
    pub async fn run<P, S>(
        &self,
        sources: &[P],
        output_dir: &Path,
        concurrency_limit: usize,
        sink: &S,
    ) -> Result<BatchReport, EngineError>
    where
        P: AsRef<Path> + Sync,
        S: ProgressSink + ?Sized,
    {
        if concurrency_limit == 0 {
            return Err(EngineError::InvalidConcurrency);
        }

        let _guard = RunGuard::acquire(&self.running).ok_or(EngineError::AlreadyRunning)?;
        let signal = self.reset_signal();

        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| EngineError::DirectoryCreation {
                path: output_dir.to_path_buf(),
                source,
            })?;

        let planned = self.plan(sources, output_dir);
        let mut report = BatchReport::new(planned.len());

        info!(
            run_id = %report.run_id,
            "Starting batch conversion of {} files into {:?} ({} at a time)",
            report.total,
            output_dir,
            concurrency_limit
        );

        self.schedule(planned, concurrency_limit, &signal, &mut report, sink)
            .await;

        report.finished_at = Some(Utc::now());
        BATCHES_TOTAL
            .with_label_values(&[report.result_label()])
            .inc();

        info!(
            run_id = %report.run_id,
            "Batch conversion {}: {}/{} files, {} failed, {} skipped",
            report.result_label(),
            report.completed,
            report.total,
            report.failures.len(),
            report.skipped
        );

        Ok(report)
    }

    fn lock_signal(&self) -> MutexGuard<'_, Arc<CancelSignal>> {
        self.signal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs a fresh cancellation signal for a new run.
    fn reset_signal(&self) -> Arc<CancelSignal> {
        let fresh = Arc::new(CancelSignal::default());
        *self.lock_signal() = Arc::clone(&fresh);
        fresh
    }

    /// Maps sources to jobs, in submission order.
    fn plan<P: AsRef<Path>>(
        &self,
        sources: &[P],
        output_dir: &Path,
    ) -> Vec<Result<Job, PlanFailure>> {
        let mut destinations: HashMap<PathBuf, PathBuf> = HashMap::new();

        sources
            .iter()
            .enumerate()
            .map(|(index, source)| {
                let source = source.as_ref();
                let job = Job::plan(index, source, output_dir, self.settings.format)
                    .map_err(|e| (source.to_path_buf(), e))?;

                // Last write wins.
                if let Some(previous) =
                    destinations.insert(job.destination.clone(), job.source.clone())
                {
                    warn!(
                        "{:?} and {:?} both convert to {:?}",
                        previous, job.source, job.destination
                    );
                }

                Ok(job)
            })
            .collect()
    }

    /// Bounded worker pool: keeps up to `limit` jobs in flight and refills a
    /// slot as soon as any job finishes.
    async fn schedule<S: ProgressSink + ?Sized>(
        &self,
        planned: Vec<Result<Job, PlanFailure>>,
        limit: usize,
        signal: &Arc<CancelSignal>,
        report: &mut BatchReport,
        sink: &S,
    ) {
        let mut backlog = planned.into_iter();
        let mut in_flight: JoinSet<JobCompletion> = JoinSet::new();

        loop {
            while in_flight.len() < limit && !signal.is_cancelled() {
                let Some(planned) = backlog.next() else {
                    break;
                };
                match planned {
                    Ok(job) => self.dispatch(&mut in_flight, job, signal),
                    Err((source, e)) => {
                        Self::settle(report, &source, JobOutcome::Failure(e), sink)
                    }
                }
            }

            if in_flight.is_empty() && backlog.len() == 0 {
                return;
            }

            if signal.is_cancelled() {
                report.skipped += backlog.len();
                Self::abandon(report, in_flight, sink);
                return;
            }

            let joined = tokio::select! {
                _ = signal.cancelled() => None,
                joined = in_flight.join_next() => joined,
            };

            if let Some(joined) = joined {
                Self::handle_completion(joined, report, sink);
            }
        }
    }

    fn dispatch(
        &self,
        in_flight: &mut JoinSet<JobCompletion>,
        job: Job,
        signal: &Arc<CancelSignal>,
    ) {
        debug!(
            "Dispatching job {}: {:?} -> {:?}",
            job.index, job.source, job.destination
        );

        let encoder = Arc::clone(&self.encoder);
        let request = self.settings.request_for(&job);
        let signal = Arc::clone(signal);
        let timeout = self.config.job_timeout();

        in_flight.spawn(async move {
            let outcome = execute(encoder.as_ref(), &request, &signal, timeout).await;
            JobCompletion { job, outcome }
        });
    }

    fn handle_completion<S: ProgressSink + ?Sized>(
        joined: Result<JobCompletion, JoinError>,
        report: &mut BatchReport,
        sink: &S,
    ) {
        match joined {
            Ok(completion) => {
                Self::settle(report, &completion.job.source, completion.outcome, sink)
            }
            Err(e) => {
                // Tasks are never aborted by the engine, so this only happens
                // when the runtime is shutting down.
                let outcome = JobOutcome::Failure(EncodeError::TaskPanicked {
                    reason: e.to_string(),
                });
                Self::settle(report, Path::new(""), outcome, sink);
            }
        }
    }

    /// Records the outcome of one job and notifies the sink.
    fn settle<S: ProgressSink + ?Sized>(
        report: &mut BatchReport,
        source: &Path,
        outcome: JobOutcome,
        sink: &S,
    ) {
        JOBS_TOTAL.with_label_values(&[outcome.label()]).inc();

        match outcome {
            JobOutcome::Success(output) => {
                report.completed += 1;
                debug!(
                    "Converted {:?} -> {:?} in {} ms",
                    source, output.output_path, output.duration_ms
                );
                sink.on_progress(report.percent_complete());
                sink.on_status(&converting_status(report.completed, report.total));
            }
            JobOutcome::Failure(e) => {
                let detail = e.detail();
                error!("Conversion failed for {:?}: {}", source, detail);
                sink.on_job_failed(source, &e);
                report.failures.push(JobFailure {
                    source: source.to_path_buf(),
                    error: detail,
                });
            }
            JobOutcome::Skipped => {
                report.skipped += 1;
            }
        }
    }

    /// Ends a cancelled run without waiting for in-flight jobs.
    fn abandon<S: ProgressSink + ?Sized>(
        report: &mut BatchReport,
        mut in_flight: JoinSet<JobCompletion>,
        sink: &S,
    ) {
        warn!(
            run_id = %report.run_id,
            "Batch cancelled with {} job(s) still encoding",
            in_flight.len()
        );
        report.cancelled = true;
        sink.on_status(CANCELLED_STATUS);
        in_flight.detach_all();
    }
}

/// Runs one encode on a worker task.
async fn execute<E: Encoder + ?Sized>(
    encoder: &E,
    request: &EncodeRequest,
    signal: &CancelSignal,
    timeout: Option<Duration>,
) -> JobOutcome {
    if signal.is_cancelled() {
        return JobOutcome::Skipped;
    }

    JOBS_IN_FLIGHT.inc();
    let start = Instant::now();

    let encode = AssertUnwindSafe(encoder.encode(request)).catch_unwind();
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, encode).await {
            Ok(result) => result,
            Err(_) => Ok(Err(EncodeError::Timeout {
                timeout_secs: limit.as_secs(),
            })),
        },
        None => encode.await,
    };

    JOBS_IN_FLIGHT.dec();
    JOB_DURATION.observe(start.elapsed().as_secs_f64());

    match result {
        Ok(Ok(output)) => JobOutcome::Success(output),
        Ok(Err(e)) => JobOutcome::Failure(e),
        Err(panic) => JobOutcome::Failure(EncodeError::TaskPanicked {
            reason: panic_message(panic.as_ref()),
        }),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "encoder panicked".to_string()
    }
}

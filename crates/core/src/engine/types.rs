//! Types for the engine module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::encoder::{AudioFormat, EncodeError, EncodeOutput};

/// One source file and the destination it is converted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Position in the submitted batch.
    pub index: usize,
    /// File to convert.
    pub source: PathBuf,
    /// `output_dir/<source stem>.<target extension>`.
    pub destination: PathBuf,
}

impl Job {
    /// Plans the job for `source`.
    ///
    /// Only the source's file stem is used, so the destination is always a
    /// direct child of `output_dir`.
    pub fn plan(
        index: usize,
        source: &Path,
        output_dir: &Path,
        format: AudioFormat,
    ) -> Result<Self, EncodeError> {
        let stem = source
            .file_stem()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| EncodeError::InvalidSource {
                path: source.to_path_buf(),
            })?;

        let mut file_name = OsString::from(stem);
        file_name.push(".");
        file_name.push(format.extension());

        Ok(Self {
            index,
            source: source.to_path_buf(),
            destination: output_dir.join(file_name),
        })
    }
}

/// Result of a single job.
#[derive(Debug)]
pub enum JobOutcome {
    /// The encoder wrote the output file.
    Success(EncodeOutput),
    /// The encoder failed. The batch continues.
    Failure(EncodeError),
    /// Cancellation was observed before the encode started.
    Skipped,
}

impl JobOutcome {
    /// Label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Failure(_) => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// A failed job as recorded in the batch report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    /// Source file of the failed job.
    pub source: PathBuf,
    /// Error text, including encoder stderr when captured.
    pub error: String,
}

/// Summary of one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Unique id of the run, used in logs.
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Number of submitted jobs.
    pub total: usize,
    /// Jobs that completed successfully.
    pub completed: usize,
    /// Jobs that failed.
    pub failures: Vec<JobFailure>,
    /// Jobs never started because of cancellation.
    pub skipped: usize,
    /// Whether cancellation ended the run.
    pub cancelled: bool,
}

impl BatchReport {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            total,
            completed: 0,
            failures: Vec::new(),
            skipped: 0,
            cancelled: false,
        }
    }

    /// True iff every job succeeded and the run was not cancelled.
    pub fn succeeded(&self) -> bool {
        !self.cancelled && self.failures.is_empty() && self.completed == self.total
    }

    /// Progress percentage of completed jobs.
    pub fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.completed as f64 * 100.0) / self.total as f64
    }

    /// Label used for metrics and logs.
    pub fn result_label(&self) -> &'static str {
        if self.cancelled {
            "cancelled"
        } else if self.succeeded() {
            "succeeded"
        } else {
            "failed"
        }
    }
}

/// Progress notifications, as forwarded by `ChannelSink`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Percentage of successfully completed jobs.
    Progress { percent: f64 },
    /// Human-readable status line.
    Status { message: String },
    /// A job failed.
    JobFailed { source: PathBuf, error: String },
}

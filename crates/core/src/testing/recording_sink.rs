//! Progress sink that records every notification.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::encoder::EncodeError;
use crate::engine::{EngineEvent, ProgressSink};

/// Records progress, status and failure notifications in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<EngineEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All events in arrival order.
    pub fn events(&self) -> Vec<EngineEvent> {
        self.lock().clone()
    }

    /// Progress percentages in arrival order.
    pub fn progress(&self) -> Vec<f64> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                EngineEvent::Progress { percent } => Some(*percent),
                _ => None,
            })
            .collect()
    }

    /// Status messages in arrival order.
    pub fn statuses(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                EngineEvent::Status { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Failed sources with their error text.
    pub fn failures(&self) -> Vec<(PathBuf, String)> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                EngineEvent::JobFailed { source, error } => Some((source.clone(), error.clone())),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, percent: f64) {
        self.lock().push(EngineEvent::Progress { percent });
    }

    fn on_status(&self, message: &str) {
        self.lock().push(EngineEvent::Status {
            message: message.to_string(),
        });
    }

    fn on_job_failed(&self, source: &Path, error: &EncodeError) {
        self.lock().push(EngineEvent::JobFailed {
            source: source.to_path_buf(),
            error: error.detail(),
        });
    }
}

//! Progress reporting for batch runs.
//!
//! The engine calls a `ProgressSink` only from its scheduling loop, so calls
//! on one sink never overlap. Sinks that feed a UI thread are responsible for
//! marshaling onto it; `ChannelSink` is the usual way to do that.

use std::path::Path;
use tokio::sync::mpsc;

use crate::encoder::EncodeError;

use super::types::EngineEvent;

/// Status line sent when a run is cancelled.
pub const CANCELLED_STATUS: &str = "Conversion cancelled";

/// Status line sent after each successful job.
pub fn converting_status(completed: usize, total: usize) -> String {
    format!("Converting: {}/{} files completed", completed, total)
}

/// Receiver of progress and status notifications.
pub trait ProgressSink: Send + Sync {
    /// Percentage (0.0 to 100.0) of jobs completed successfully.
    fn on_progress(&self, percent: f64);

    /// Human-readable status line.
    fn on_status(&self, message: &str);

    /// A job failed. The batch keeps going.
    fn on_job_failed(&self, _source: &Path, _error: &EncodeError) {}
}

/// A sink that drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_progress(&self, _percent: f64) {}

    fn on_status(&self, _message: &str) {}
}

/// A sink built from a progress closure and a status closure.
pub struct FnSink<P, S> {
    on_progress: P,
    on_status: S,
}

impl<P, S> FnSink<P, S>
where
    P: Fn(f64) + Send + Sync,
    S: Fn(&str) + Send + Sync,
{
    pub fn new(on_progress: P, on_status: S) -> Self {
        Self {
            on_progress,
            on_status,
        }
    }
}

impl<P, S> ProgressSink for FnSink<P, S>
where
    P: Fn(f64) + Send + Sync,
    S: Fn(&str) + Send + Sync,
{
    fn on_progress(&self, percent: f64) {
        (self.on_progress)(percent)
    }

    fn on_status(&self, message: &str) {
        (self.on_status)(message)
    }
}

/// A sink that forwards every notification as an `EngineEvent`.
///
/// Sending never blocks the scheduling loop. If the receiver is gone the
/// events are dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { tx }
    }

    /// Creates a sink together with its receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl ProgressSink for ChannelSink {
    fn on_progress(&self, percent: f64) {
        let _ = self.tx.send(EngineEvent::Progress { percent });
    }

    fn on_status(&self, message: &str) {
        let _ = self.tx.send(EngineEvent::Status {
            message: message.to_string(),
        });
    }

    fn on_job_failed(&self, source: &Path, error: &EncodeError) {
        let _ = self.tx.send(EngineEvent::JobFailed {
            source: source.to_path_buf(),
            error: error.detail(),
        });
    }
}

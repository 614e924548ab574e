//! Console progress output.

use std::path::Path;
use std::sync::Mutex;

use batchconv_core::{EncodeError, ProgressSink};

/// Prints status lines prefixed with the latest progress percentage.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    percent: Mutex<f64>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn percent(&self) -> f64 {
        self.percent.lock().map(|p| *p).unwrap_or_default()
    }
}

impl ProgressSink for ConsoleSink {
    fn on_progress(&self, percent: f64) {
        if let Ok(mut current) = self.percent.lock() {
            *current = percent;
        }
    }

    fn on_status(&self, message: &str) {
        println!("{}", format_line(self.percent(), message));
    }

    fn on_job_failed(&self, source: &Path, error: &EncodeError) {
        eprintln!("Failed: {}: {}", source.display(), error.detail());
    }
}

fn format_line(percent: f64, message: &str) -> String {
    format!("[{:>3.0}%] {}", percent, message)
}

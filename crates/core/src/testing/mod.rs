//! Testing utilities and mock implementations.
//!
//! This module provides a controllable `Encoder` and a `ProgressSink` that
//! records what the engine reported, so the engine can be exercised without
//! ffmpeg.
//!
//! # Example
//!
//! ```rust,ignore
//! use batchconv_core::testing::{MockEncoder, RecordingSink};
//!
//! let encoder = MockEncoder::new();
//! let sink = RecordingSink::new();
//!
//! encoder.set_delay(Duration::from_millis(10)).await;
//! encoder.fail_on("/in/broken.m4a").await;
//!
//! // Run a batch, then inspect encoder.completion_order() and sink.progress()
//! ```

mod mock_encoder;
mod recording_sink;

pub use mock_encoder::{MockEncoder, RecordedEncode};
pub use recording_sink::RecordingSink;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    /// Source paths `track01.m4a`, `track02.m4a`, ... under `dir`.
    pub fn source_files(dir: &Path, count: usize) -> Vec<PathBuf> {
        (1..=count)
            .map(|i| dir.join(format!("track{:02}.m4a", i)))
            .collect()
    }

    /// Like `source_files`, but also creates each file with dummy content.
    pub fn create_source_files(dir: &Path, count: usize) -> std::io::Result<Vec<PathBuf>> {
        let files = source_files(dir, count);
        for file in &files {
            std::fs::write(file, b"not really audio")?;
        }
        Ok(files)
    }
}

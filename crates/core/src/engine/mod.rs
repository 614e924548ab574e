//! Engine module for batch conversions.
//!
//! This module provides the `ConversionEngine` which:
//! - Creates the output directory and plans one job per source file
//! - Runs up to `concurrency_limit` encodes at once, refilling a slot as soon
//!   as any job finishes
//! - Reports progress and status through a `ProgressSink`
//! - Stops dispatching new jobs when cancelled from another task or thread
//!
//! # Example
//!
//! ```ignore
//! use batchconv_core::engine::{ChannelSink, ConversionEngine, EncodeSettings};
//! use batchconv_core::encoder::FfmpegEncoder;
//!
//! let engine = Arc::new(ConversionEngine::new(
//!     FfmpegEncoder::with_defaults(),
//!     EncodeSettings::default(),
//! ));
//!
//! let (sink, mut events) = ChannelSink::channel();
//! tokio::spawn(async move {
//!     while let Some(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//! });
//!
//! let all_ok = engine.run_batch(&files, Path::new("/music/mp3"), 3, &sink).await?;
//! ```

mod config;
mod progress;
mod runner;
mod types;

pub use config::EngineConfig;
pub use progress::{
    converting_status, ChannelSink, FnSink, NullSink, ProgressSink, CANCELLED_STATUS,
};
pub use runner::{ConversionEngine, EncodeSettings, EngineError};
pub use types::{BatchReport, EngineEvent, Job, JobFailure, JobOutcome};

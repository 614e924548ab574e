//! Encoder module for converting audio files.
//!
//! This module provides the `Encoder` trait, the contract the conversion
//! engine uses for a single file, and an implementation that shells out to
//! FFmpeg.
//!
//! # Example
//!
//! ```ignore
//! use batchconv_core::encoder::{AudioFormat, EncodeRequest, Encoder, FfmpegEncoder};
//!
//! let encoder = FfmpegEncoder::with_defaults();
//!
//! // Validate ffmpeg is available
//! let info = encoder.validate().await?;
//! println!("ffmpeg {}", info.version.unwrap_or_default());
//!
//! let request = EncodeRequest {
//!     source: PathBuf::from("/music/in/track.m4a"),
//!     destination: PathBuf::from("/music/out/track.mp3"),
//!     format: AudioFormat::Mp3,
//!     bitrate: "320k".to_string(),
//!     extra_args: vec!["-hide_banner".to_string()],
//! };
//!
//! let output = encoder.encode(&request).await?;
//! println!("Encoded in {} ms", output.duration_ms);
//! ```

mod config;
mod error;
mod ffmpeg;
mod launch;
mod traits;
mod types;

pub use config::EncoderConfig;
pub use error::EncodeError;
pub use ffmpeg::FfmpegEncoder;
pub use launch::{ProcessLaunchOptions, StdioMode};
pub use traits::Encoder;
pub use types::{AudioFormat, EncodeOutput, EncodeRequest, EncoderInfo};

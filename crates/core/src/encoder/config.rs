//! Configuration for the encoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::types::AudioFormat;

/// Configuration for the ffmpeg-based encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Target format for every job in a batch.
    #[serde(default)]
    pub format: AudioFormat,

    /// Target bitrate for lossy formats.
    #[serde(default = "default_bitrate")]
    pub bitrate: String,

    /// Extra ffmpeg arguments. The defaults keep ffmpeg quiet.
    #[serde(default = "default_extra_args")]
    pub extra_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_bitrate() -> String {
    "320k".to_string()
}

fn default_extra_args() -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "panic".to_string(),
    ]
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            format: AudioFormat::default(),
            bitrate: default_bitrate(),
            extra_args: default_extra_args(),
        }
    }
}

impl EncoderConfig {
    /// Sets the ffmpeg binary path.
    pub fn with_ffmpeg_path(mut self, path: PathBuf) -> Self {
        self.ffmpeg_path = path;
        self
    }

    /// Sets the target format.
    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the target bitrate.
    pub fn with_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.bitrate = bitrate.into();
        self
    }
}

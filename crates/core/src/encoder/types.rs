//! Types for the encoder module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Target audio format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    /// MPEG Audio Layer III
    #[default]
    Mp3,
    /// Advanced Audio Coding in an MPEG-4 container
    Aac,
    /// Ogg Vorbis
    OggVorbis,
    /// Opus
    Opus,
    /// Free Lossless Audio Codec (lossless)
    Flac,
    /// WAVE (uncompressed)
    Wav,
}

impl AudioFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Aac => "m4a",
            Self::OggVorbis => "ogg",
            Self::Opus => "opus",
            Self::Flac => "flac",
            Self::Wav => "wav",
        }
    }

    /// Returns the ffmpeg codec name for this format.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::Mp3 => "libmp3lame",
            Self::Aac => "aac",
            Self::OggVorbis => "libvorbis",
            Self::Opus => "libopus",
            Self::Flac => "flac",
            Self::Wav => "pcm_s16le",
        }
    }

    /// Whether this format is lossless. Bitrate is ignored for these.
    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Flac | Self::Wav)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "aac" | "m4a" => Ok(Self::Aac),
            "ogg" | "vorbis" | "ogg_vorbis" => Ok(Self::OggVorbis),
            "opus" => Ok(Self::Opus),
            "flac" => Ok(Self::Flac),
            "wav" => Ok(Self::Wav),
            other => Err(format!("unknown audio format: {}", other)),
        }
    }
}

/// A single encode invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeRequest {
    /// File to read.
    pub source: PathBuf,
    /// File to write. Overwritten if it exists.
    pub destination: PathBuf,
    /// Target format.
    pub format: AudioFormat,
    /// Target bitrate in ffmpeg notation, e.g. "320k".
    pub bitrate: String,
    /// Extra arguments appended before the output path.
    pub extra_args: Vec<String>,
}

/// Result of a successful encode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeOutput {
    /// Path of the written file.
    pub output_path: PathBuf,
    /// Size of the written file.
    pub output_size_bytes: u64,
    /// Wall-clock duration of the encode.
    pub duration_ms: u64,
}

/// Information reported by a validated encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderInfo {
    /// Encoder implementation name.
    pub name: String,
    /// Version string, if the binary reported one.
    pub version: Option<String>,
}

use clap::Parser;
use std::path::PathBuf;

use batchconv_core::AudioFormat;

#[derive(Debug, Parser)]
#[command(name = "batchconv")]
#[command(author, version, about = "Convert batches of audio files with ffmpeg")]
pub struct Cli {
    /// Files or directories to convert
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory (defaults to [output].directory from the config)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Maximum simultaneous encodes
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Target format (mp3, aac, ogg, opus, flac, wav)
    #[arg(short, long)]
    pub format: Option<AudioFormat>,

    /// Target bitrate for lossy formats, e.g. 320k
    #[arg(short, long)]
    pub bitrate: Option<String>,

    /// Extension of files picked from input directories
    #[arg(long, default_value = "m4a")]
    pub input_ext: String,

    /// Path to the ffmpeg binary
    #[arg(long)]
    pub ffmpeg: Option<PathBuf>,

    /// Per-file timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Path to config file
    #[arg(short, long, env = "BATCHCONV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log as JSON lines and print the final report as JSON
    #[arg(long)]
    pub json_logs: bool,

    /// Print Prometheus metrics after the batch
    #[arg(long)]
    pub metrics: bool,
}

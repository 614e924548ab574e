//! FFmpeg-based encoder implementation.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

use super::config::EncoderConfig;
use super::error::EncodeError;
use super::launch::ProcessLaunchOptions;
use super::traits::Encoder;
use super::types::{EncodeOutput, EncodeRequest, EncoderInfo};

static VERSION_REGEX: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"ffmpeg version (\S+)").ok());

/// Maximum stderr lines kept in a failure.
const STDERR_TAIL_LINES: usize = 20;

/// FFmpeg-based encoder implementation.
pub struct FfmpegEncoder {
    ffmpeg_path: PathBuf,
    launch: ProcessLaunchOptions,
}

impl FfmpegEncoder {
    /// Creates an encoder that runs the given ffmpeg binary.
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            launch: ProcessLaunchOptions::default(),
        }
    }

    /// Creates an encoder with the `ffmpeg` found on `PATH`.
    pub fn with_defaults() -> Self {
        Self::new("ffmpeg")
    }

    /// Resolves the binary from config.
    ///
    /// A configured path that exists on disk is used as is; otherwise the
    /// encoder falls back to `ffmpeg` on `PATH`.
    pub fn locate(config: &EncoderConfig) -> Self {
        let configured = &config.ffmpeg_path;
        let is_bare_name = configured.components().count() == 1;
        if is_bare_name || configured.exists() {
            Self::new(configured.clone())
        } else {
            debug!(
                "Configured ffmpeg {:?} not found, falling back to PATH",
                configured
            );
            Self::with_defaults()
        }
    }

    /// Overrides the process launch options.
    pub fn with_launch_options(mut self, launch: ProcessLaunchOptions) -> Self {
        self.launch = launch;
        self
    }

    /// Path of the ffmpeg binary this encoder runs.
    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    /// Builds ffmpeg arguments for an encode request.
    fn build_args(request: &EncodeRequest) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(), // Overwrite output
            "-i".to_string(),
            request.source.to_string_lossy().to_string(),
            "-vn".to_string(), // Drop embedded cover streams
            "-c:a".to_string(),
            request.format.ffmpeg_codec().to_string(),
        ];

        if !request.format.is_lossless() && !request.bitrate.is_empty() {
            args.extend(["-b:a".to_string(), request.bitrate.clone()]);
        }

        args.extend(request.extra_args.iter().cloned());
        args.push(request.destination.to_string_lossy().to_string());

        args
    }

    fn parse_version(output: &str) -> Option<String> {
        let re = VERSION_REGEX.as_ref()?;
        re.captures(output)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn stderr_tail(stderr: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(stderr);
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.is_empty() {
            return None;
        }
        let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
        Some(lines[start..].join("\n"))
    }

    fn map_spawn_error(&self, e: std::io::Error) -> EncodeError {
        if e.kind() == std::io::ErrorKind::NotFound {
            EncodeError::EncoderNotFound {
                path: self.ffmpeg_path.clone(),
            }
        } else {
            EncodeError::Io(e)
        }
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn encode(&self, request: &EncodeRequest) -> Result<EncodeOutput, EncodeError> {
        if !tokio::fs::try_exists(&request.source).await.unwrap_or(false) {
            return Err(EncodeError::SourceNotFound {
                path: request.source.clone(),
            });
        }

        let start = Instant::now();
        let args = Self::build_args(request);

        let mut command = Command::new(&self.ffmpeg_path);
        command.args(&args);
        self.launch.apply(&mut command);

        let output = command
            .output()
            .await
            .map_err(|e| self.map_spawn_error(e))?;

        if !output.status.success() {
            return Err(EncodeError::failed(
                format!("ffmpeg exited with code: {:?}", output.status.code()),
                Self::stderr_tail(&output.stderr),
            ));
        }

        let output_meta = tokio::fs::metadata(&request.destination)
            .await
            .map_err(|_| EncodeError::failed("Output file not created", None))?;

        Ok(EncodeOutput {
            output_path: request.destination.clone(),
            output_size_bytes: output_meta.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn validate(&self) -> Result<EncoderInfo, EncodeError> {
        let mut command = Command::new(&self.ffmpeg_path);
        command.arg("-version");
        ProcessLaunchOptions::capture_stdout().apply(&mut command);

        let output = command
            .output()
            .await
            .map_err(|e| self.map_spawn_error(e))?;

        if !output.status.success() {
            return Err(EncodeError::failed(
                format!("ffmpeg -version exited with code: {:?}", output.status.code()),
                Self::stderr_tail(&output.stderr),
            ));
        }

        Ok(EncoderInfo {
            name: self.name().to_string(),
            version: Self::parse_version(&String::from_utf8_lossy(&output.stdout)),
        })
    }
}

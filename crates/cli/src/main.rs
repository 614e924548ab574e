mod cli;
mod inputs;
mod sink;

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use prometheus::Registry;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry as Subscriber,
};

use batchconv_core::metrics::{encode_metrics, register_metrics};
use batchconv_core::{
    load_config_or_default, validate_config, BatchReport, Config, ConversionEngine,
    EncodeSettings, Encoder, FfmpegEncoder, LoggingConfig, NullSink, ProgressSink,
};

use cli::Cli;
use inputs::expand_inputs;
use sink::ConsoleSink;

/// Some files failed, or the batch was cancelled.
const EXIT_INCOMPLETE: u8 = 1;
/// Nothing was converted because setup failed.
const EXIT_FATAL: u8 = 2;

// Returning from main shuts the runtime down, which drops encodes still
// running after a cancel and kills their ffmpeg processes.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_INCOMPLETE),
        Err(e) => {
            eprintln!("batchconv: {:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let mut config = load_config_or_default(cli.config.as_deref())
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    apply_overrides(&mut config, &cli);

    let _log_guard = init_logging(&config.logging)?;

    convert(&cli, &config)
        .await
        .inspect_err(|e| error!("Fatal error: {:#}", e))
}

async fn convert(cli: &Cli, config: &Config) -> Result<bool> {
    validate_config(config).context("Configuration validation failed")?;

    let output_dir = resolve_output_dir(cli, config)
        .context("No output directory given; pass --output or set [output].directory")?;

    let sources = expand_inputs(&cli.inputs, &cli.input_ext)?;
    info!("Found {} files to convert", sources.len());

    let registry = Registry::new();
    if cli.metrics {
        register_metrics(&registry).context("Failed to register metrics")?;
    }

    let encoder = FfmpegEncoder::locate(&config.encoder);
    let encoder_info = encoder
        .validate()
        .await
        .with_context(|| format!("ffmpeg is not usable at {:?}", encoder.ffmpeg_path()))?;
    info!(
        "Using {} {} at {:?}",
        encoder_info.name,
        encoder_info.version.as_deref().unwrap_or("(unknown version)"),
        encoder.ffmpeg_path()
    );

    let engine = Arc::new(
        ConversionEngine::new(encoder, EncodeSettings::from(&config.encoder))
            .with_config(config.engine.clone()),
    );

    let canceller = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            shutdown_signal().await;
            warn!("Shutdown signal received, no further files will be started");
            engine.cancel();
        })
    };

    let sink = progress_sink(cli.json_logs);
    let result = engine
        .run(&sources, &output_dir, config.engine.max_concurrent, sink.as_ref())
        .await;
    canceller.abort();

    let report = result.context("Batch conversion failed")?;

    if cli.json_logs {
        println!(
            "{}",
            serde_json::to_string(&report).context("Failed to serialize report")?
        );
    } else {
        print_summary(&report, &output_dir);
    }

    if cli.metrics {
        let metrics = encode_metrics(&registry).context("Failed to encode metrics")?;
        // Stdout carries only the JSON report in JSON mode.
        if cli.json_logs {
            eprint!("{}", metrics);
        } else {
            print!("{}", metrics);
        }
    }

    Ok(report.succeeded())
}

/// Console progress in human mode; nothing in JSON mode.
fn progress_sink(json: bool) -> Box<dyn ProgressSink> {
    if json {
        Box::new(NullSink)
    } else {
        Box::new(ConsoleSink::new())
    }
}

/// Command-line options take precedence over the config file.
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(jobs) = cli.jobs {
        config.engine.max_concurrent = jobs;
    }
    if let Some(timeout) = cli.timeout {
        config.engine.job_timeout_secs = Some(timeout);
    }
    if let Some(format) = cli.format {
        config.encoder.format = format;
    }
    if let Some(bitrate) = &cli.bitrate {
        config.encoder.bitrate = bitrate.clone();
    }
    if let Some(ffmpeg) = &cli.ffmpeg {
        config.encoder.ffmpeg_path = ffmpeg.clone();
    }
    if cli.json_logs {
        config.logging.json = true;
    }
}

fn resolve_output_dir(cli: &Cli, config: &Config) -> Option<PathBuf> {
    cli.output
        .clone()
        .or_else(|| config.output.directory.clone())
}

/// Installs the console layer and, if configured, the log file layer.
///
/// The returned guard flushes the file on drop.
fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let console: Box<dyn Layer<Subscriber> + Send + Sync> = if logging.json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let (file_layer, guard) = match &logging.file {
        Some(path) => {
            let file = open_log_file(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(EnvFilter::new(&logging.file_filter));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console.with_filter(console_filter))
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Opens `path` for appending, creating it and its parent directories.
fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn print_summary(report: &BatchReport, output_dir: &Path) {
    println!(
        "Converted {}/{} files into {}",
        report.completed,
        report.total,
        output_dir.display()
    );
    if !report.failures.is_empty() {
        println!("{} file(s) failed:", report.failures.len());
        for failure in &report.failures {
            println!("  {}: {}", failure.source.display(), failure.error);
        }
    }
    if report.cancelled {
        println!("Cancelled; {} file(s) were not started", report.skipped);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

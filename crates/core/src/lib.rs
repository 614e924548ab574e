pub mod config;
pub mod encoder;
pub mod engine;
pub mod metrics;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError, LoggingConfig, OutputConfig,
};
pub use encoder::{
    AudioFormat, EncodeError, EncodeOutput, EncodeRequest, Encoder, EncoderConfig, EncoderInfo,
    FfmpegEncoder, ProcessLaunchOptions,
};
pub use engine::{
    BatchReport, ChannelSink, ConversionEngine, EncodeSettings, EngineConfig, EngineError,
    EngineEvent, FnSink, NullSink, ProgressSink,
};

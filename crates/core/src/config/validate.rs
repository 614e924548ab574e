use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Concurrency limit is at least 1
/// - Bitrate is set for lossy formats
/// - Job timeout, if set, is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.engine.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(
            "engine.max_concurrent must be at least 1".to_string(),
        ));
    }

    if !config.encoder.format.is_lossless() && config.encoder.bitrate.trim().is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "encoder.bitrate is required for {}",
            config.encoder.format
        )));
    }

    if config.engine.job_timeout_secs == Some(0) {
        return Err(ConfigError::ValidationError(
            "engine.job_timeout_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}

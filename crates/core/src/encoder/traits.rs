//! Trait definitions for the encoder module.

use async_trait::async_trait;

use super::error::EncodeError;
use super::types::{EncodeOutput, EncodeRequest, EncoderInfo};

/// An external encoder that converts one file per call.
///
/// The engine treats `encode` as non-interruptible: once started it runs to
/// completion (or until the engine's optional per-job timeout drops it).
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Returns the name of this encoder implementation.
    fn name(&self) -> &str;

    /// Encodes `request.source` into `request.destination`.
    async fn encode(&self, request: &EncodeRequest) -> Result<EncodeOutput, EncodeError>;

    /// Checks that the encoder is installed and usable.
    async fn validate(&self) -> Result<EncoderInfo, EncodeError>;
}

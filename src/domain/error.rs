use crate::app::InitializationError;
use crate::config::ConfigError;
use crate::metadata::MetadataError;
use thiserror::Error;

/// Top-level error type for forwarder startup.
#[derive(Error, Debug)]
pub enum ForwarderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Metadata client error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Logging error: {0}")]
    Logging(#[from] InitializationError),
}

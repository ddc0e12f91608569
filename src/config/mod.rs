//! Runtime configuration resolution.
//!
//! A [`Config`] is built once at startup from three inputs, in this order of
//! precedence for every field that has a fallback:
//!
//! 1. the TOML config file (with `${env.*}` / `${instance.*}` substitution)
//! 2. a live query against the instance metadata service
//! 3. a built-in default
//!
//! The result is immutable and safe to share across tasks behind an `Arc`.

pub mod context;
mod file;
mod serde_helpers;
pub mod interpolation;

pub use context::{ContextValue, EvaluationContext};
pub use file::RawFileConfig;

use crate::credentials::CredentialsChain;
use crate::domain::Severity;
use crate::environment::EnvironmentSource;
use crate::metadata::{MetadataError, MetadataProvider};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_BUFFER_SIZE: usize = 100;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed config file: {0}")]
    Syntax(#[source] toml::de::Error),
    #[error("Invalid config file: {0}")]
    Decode(#[source] toml::de::Error),
    #[error("Required field '{0}' is empty")]
    EmptyField(&'static str),
    #[error("Unknown variable '{name}' referenced in '{field}'")]
    UnresolvedVariable { name: String, field: String },
    #[error("List variable '{name}' cannot be embedded in a string in '{field}'")]
    ListInString { name: String, field: String },
    #[error("Unterminated variable reference in '{field}'")]
    UnterminatedReference { field: String },
    #[error("Invalid interpolation pattern: {0}")]
    Pattern(regex::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Unable to detect AWS region: {0}")]
    RegionDetection(#[source] MetadataError),
    #[error("Unable to detect EC2 instance id: {0}")]
    InstanceIdDetection(#[source] MetadataError),
    #[error("The provided log filtering '{0}' is unsupported by systemd")]
    UnsupportedPriority(String),
}

/// Fully resolved runtime configuration.
///
/// Every field is populated; the only optional one is the journal directory,
/// where `None` means the host's default journal location.
#[derive(Debug, Clone)]
pub struct Config {
    credentials: CredentialsChain,
    aws_region: String,
    ec2_instance_id: String,
    log_group_name: String,
    log_stream_name: String,
    log_priority: Severity,
    state_file: PathBuf,
    journal_dir: Option<PathBuf>,
    buffer_size: usize,
}

/// What the delivery client needs to reach CloudWatch Logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliverySettings {
    pub region: String,
    pub log_group_name: String,
    pub log_stream_name: String,
    pub buffer_size: usize,
    pub max_retries: u32,
}

/// Secret-free view of a [`Config`], for logs and `--check` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigSummary {
    pub aws_region: String,
    pub ec2_instance_id: String,
    pub log_group: String,
    pub log_stream: String,
    pub log_priority: Severity,
    pub state_file: PathBuf,
    pub journal_dir: Option<PathBuf>,
    pub buffer_size: usize,
    pub credential_sources: Vec<crate::credentials::CredentialSource>,
}

impl Config {
    /// Resolves the config file at `path`.
    pub async fn resolve(
        path: impl AsRef<Path>,
        env: &impl EnvironmentSource,
        metadata: &impl MetadataProvider,
    ) -> Result<Self, ConfigError> {
        let context = Self::evaluation_context(env, metadata).await;
        let raw = RawFileConfig::from_file(path.as_ref(), &context)?;
        Self::from_raw(raw, metadata).await
    }

    /// Same as [`Config::resolve`] for config text already in memory.
    pub async fn resolve_from_str(
        content: &str,
        env: &impl EnvironmentSource,
        metadata: &impl MetadataProvider,
    ) -> Result<Self, ConfigError> {
        let context = Self::evaluation_context(env, metadata).await;
        let raw = RawFileConfig::from_str_with_context(content, &context)?;
        Self::from_raw(raw, metadata).await
    }

    async fn evaluation_context(
        env: &impl EnvironmentSource,
        metadata: &impl MetadataProvider,
    ) -> EvaluationContext {
        let context = EvaluationContext::build(env, metadata).await;
        debug!(
            variables = context.len(),
            instance_metadata = context.has_instance_namespace(),
            "Evaluation context built"
        );
        context
    }

    /// Applies the per-field fallbacks to an already parsed file.
    pub async fn from_raw(
        raw: RawFileConfig,
        metadata: &impl MetadataProvider,
    ) -> Result<Self, ConfigError> {
        let aws_region = if !raw.aws_region.is_empty() {
            debug!(region = %raw.aws_region, "AWS region taken from config file");
            raw.aws_region
        } else {
            let region = metadata
                .region()
                .await
                .map_err(ConfigError::RegionDetection)?;
            debug!(%region, "AWS region detected from instance metadata");
            region
        };

        let ec2_instance_id = if !raw.ec2_instance_id.is_empty() {
            debug!(instance_id = %raw.ec2_instance_id, "Instance id taken from config file");
            raw.ec2_instance_id
        } else {
            let instance_id = metadata
                .instance_id()
                .await
                .map_err(ConfigError::InstanceIdDetection)?;
            debug!(%instance_id, "Instance id detected from instance metadata");
            instance_id
        };

        let log_priority = parse_priority(&raw.log_priority)?;

        let log_stream_name = if raw.log_stream.is_empty() {
            ec2_instance_id.clone()
        } else {
            raw.log_stream
        };

        let buffer_size = if raw.buffer_size == 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            raw.buffer_size
        };

        let journal_dir = if raw.journal_dir.as_os_str().is_empty() {
            None
        } else {
            Some(raw.journal_dir)
        };

        Ok(Self {
            credentials: CredentialsChain::env_then_instance_role(),
            aws_region,
            ec2_instance_id,
            log_group_name: raw.log_group,
            log_stream_name,
            log_priority,
            state_file: raw.state_file,
            journal_dir,
            buffer_size,
        })
    }

    pub fn credentials(&self) -> &CredentialsChain {
        &self.credentials
    }

    pub fn aws_region(&self) -> &str {
        &self.aws_region
    }

    pub fn ec2_instance_id(&self) -> &str {
        &self.ec2_instance_id
    }

    pub fn log_group_name(&self) -> &str {
        &self.log_group_name
    }

    pub fn log_stream_name(&self) -> &str {
        &self.log_stream_name
    }

    pub fn log_priority(&self) -> Severity {
        self.log_priority
    }

    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    pub fn journal_dir(&self) -> Option<&Path> {
        self.journal_dir.as_deref()
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn delivery_settings(&self) -> DeliverySettings {
        DeliverySettings {
            region: self.aws_region.clone(),
            log_group_name: self.log_group_name.clone(),
            log_stream_name: self.log_stream_name.clone(),
            buffer_size: self.buffer_size,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            aws_region: self.aws_region.clone(),
            ec2_instance_id: self.ec2_instance_id.clone(),
            log_group: self.log_group_name.clone(),
            log_stream: self.log_stream_name.clone(),
            log_priority: self.log_priority,
            state_file: self.state_file.clone(),
            journal_dir: self.journal_dir.clone(),
            buffer_size: self.buffer_size,
            credential_sources: self.credentials.sources().to_vec(),
        }
    }
}

/// An unset priority means "log everything".
fn parse_priority(priority: &str) -> Result<Severity, ConfigError> {
    if priority.is_empty() {
        return Ok(Severity::Debug);
    }
    priority
        .parse()
        .map_err(|_| ConfigError::UnsupportedPriority(priority.to_string()))
}

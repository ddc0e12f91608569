// Logging bootstrap for the forwarder process itself (not the forwarded journal).
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Error, Debug)]
pub enum InitializationError {
    #[error("Invalid log level '{input}'. Valid levels: error, warn, info, debug, trace")]
    InvalidLogLevel { input: String },

    #[error("Invalid directive format '{input}'. Expected: 'target=level'")]
    InvalidDirectiveFormat { input: String },

    #[error("Empty target in directive '{input}'")]
    EmptyTarget { input: String },

    #[error("Logging system initialization failed: {details}")]
    LoggingInitFailed { details: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = InitializationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(InitializationError::InvalidLogLevel {
                input: s.to_string(),
            }),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact human-readable lines
    #[default]
    Text,
    /// One JSON object per line, for journald/CloudWatch ingestion
    Json,
}

/// Per-target level override, `target=level`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDirective {
    pub target: String,
    pub level: LogLevel,
}

impl LogDirective {
    pub fn new(target: impl Into<String>, level: LogLevel) -> Self {
        Self {
            target: target.into(),
            level,
        }
    }

    pub fn parse(directive: &str) -> Result<Self, InitializationError> {
        let Some((target, level)) = directive.split_once('=') else {
            return Err(InitializationError::InvalidDirectiveFormat {
                input: directive.to_string(),
            });
        };
        if level.contains('=') {
            return Err(InitializationError::InvalidDirectiveFormat {
                input: directive.to_string(),
            });
        }

        let target = target.trim();
        if target.is_empty() {
            return Err(InitializationError::EmptyTarget {
                input: directive.to_string(),
            });
        }

        Ok(Self::new(target, level.parse()?))
    }

    pub fn to_filter_string(&self) -> String {
        format!("{}={}", self.target, self.level.as_str())
    }
}

/// Builds the `EnvFilter` and installs the global subscriber.
#[derive(Debug, Clone)]
pub struct LoggingSystem {
    default_level: LogLevel,
    format: LogFormat,
    directives: Vec<LogDirective>,
}

impl LoggingSystem {
    pub fn new(default_level: LogLevel, format: LogFormat) -> Self {
        Self {
            default_level,
            format,
            directives: Vec::new(),
        }
    }

    pub fn add_directive(&mut self, directive: &str) -> Result<(), InitializationError> {
        self.directives.push(LogDirective::parse(directive)?);
        Ok(())
    }

    /// HTTP stack chatter from metadata requests is pinned to `warn`.
    pub fn quiet_dependencies(mut self) -> Self {
        for target in ["hyper", "hyper_util", "reqwest", "h2", "rustls"] {
            self.directives.push(LogDirective::new(target, LogLevel::Warn));
        }
        self
    }

    pub fn directive_count(&self) -> usize {
        self.directives.len()
    }

    pub fn filter_string(&self) -> String {
        std::iter::once(self.default_level.as_str().to_string())
            .chain(self.directives.iter().map(LogDirective::to_filter_string))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn install(&self) -> Result<(), InitializationError> {
        let filter_string = self.filter_string();
        let env_filter = EnvFilter::try_new(&filter_string).map_err(|e| {
            InitializationError::LoggingInitFailed {
                details: format!("Failed to create EnvFilter with '{filter_string}': {e}"),
            }
        })?;

        let registry = tracing_subscriber::registry().with(env_filter);
        let result = match self.format {
            LogFormat::Text => registry
                .with(fmt::layer().with_target(true).with_level(true).compact())
                .try_init(),
            LogFormat::Json => registry
                .with(fmt::layer().json().with_current_span(false))
                .try_init(),
        };

        result.map_err(|e| InitializationError::LoggingInitFailed {
            details: format!("Failed to set global tracing subscriber: {e}"),
        })
    }
}

/// Installs process-wide logging once; later calls report the first outcome.
///
/// `directives` are `target=level` overrides applied after the defaults.
/// They are validated on every call, so a bad directive always fails.
pub fn setup_logging(
    level: LogLevel,
    format: LogFormat,
    directives: &[String],
) -> Result<(), InitializationError> {
    static OUTCOME: OnceLock<Result<(), String>> = OnceLock::new();

    let mut system = LoggingSystem::new(level, format).quiet_dependencies();
    for directive in directives {
        system.add_directive(directive)?;
    }

    OUTCOME
        .get_or_init(|| system.install().map_err(|e| e.to_string()))
        .clone()
        .map_err(|details| InitializationError::LoggingInitFailed { details })
}

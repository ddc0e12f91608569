use super::logging::{LogFormat, LogLevel};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/journald-cloudwatch-logs.conf";

#[derive(Parser, Debug, Clone)]
#[command(name = "rask-journal-forwarder", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the forwarder config file
    #[arg(env = "JOURNAL_FORWARDER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Log level of the forwarder's own diagnostics
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Output format of the forwarder's own diagnostics
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    /// Per-target log level override, `target=level` (repeatable)
    #[arg(long = "log-directive", value_name = "TARGET=LEVEL")]
    pub log_directives: Vec<String>,

    /// Timeout for each instance metadata request, in milliseconds
    #[arg(long, env = "METADATA_TIMEOUT_MS", default_value = "1000")]
    pub metadata_timeout_ms: u64,

    /// Resolve the configuration, print it as JSON and exit
    #[arg(long)]
    pub check: bool,
}

impl Cli {
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["rask-journal-forwarder"]).unwrap();
        assert!(!cli.check);
        assert!(cli.log_directives.is_empty());
    }

    #[test]
    fn test_explicit_arguments() {
        let cli = Cli::try_parse_from([
            "rask-journal-forwarder",
            "/tmp/forwarder.conf",
            "--log-level",
            "debug",
            "--log-format",
            "json",
            "--metadata-timeout-ms",
            "250",
            "--log-directive",
            "reqwest=debug",
            "--log-directive",
            "rask_journal_forwarder=trace",
            "--check",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("/tmp/forwarder.conf"));
        assert_eq!(cli.log_level, LogLevel::Debug);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.metadata_timeout(), Duration::from_millis(250));
        assert!(cli.check);
        assert_eq!(
            cli.log_directives,
            vec!["reqwest=debug", "rask_journal_forwarder=trace"]
        );
    }

    #[test]
    fn test_invalid_level_rejected() {
        assert!(Cli::try_parse_from(["rask-journal-forwarder", "--log-level", "loud"]).is_err());
    }
}

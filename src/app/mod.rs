pub mod cli;
pub mod logging;

pub use cli::Cli;
pub use logging::{
    InitializationError, LogDirective, LogFormat, LogLevel, LoggingSystem, setup_logging,
};

use crate::config::{Config, ConfigSummary, DeliverySettings};
use crate::domain::ForwarderError;
use crate::environment::{EnvironmentSource, ProcessEnvironment};
use crate::filter::{PriorityFilter, compile_filter};
use crate::metadata::{Ec2MetadataClient, MetadataClientConfig, MetadataProvider};
use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Startup state handed to the journal shipping loop.
pub struct App {
    config: Arc<Config>,
    filter: PriorityFilter,
}

/// Everything startup resolved, minus secrets.
#[derive(Debug, Clone, Serialize)]
pub struct StartupReport {
    pub config: ConfigSummary,
    pub priority_filter: Vec<String>,
    pub delivery: DeliverySettings,
}

impl App {
    /// Installs the process logger described by the command line.
    pub fn init_logging(cli: &Cli) -> Result<(), ForwarderError> {
        setup_logging(cli.log_level, cli.log_format, &cli.log_directives)?;
        Ok(())
    }

    pub async fn from_cli(cli: &Cli) -> Result<Self, ForwarderError> {
        let env = ProcessEnvironment;
        let metadata_config =
            MetadataClientConfig::from_environment(&env).with_timeout(cli.metadata_timeout());
        let metadata = Ec2MetadataClient::new(metadata_config)?;

        Self::from_sources(&cli.config, &env, &metadata).await
    }

    pub async fn from_sources(
        config_path: &Path,
        env: &impl EnvironmentSource,
        metadata: &impl MetadataProvider,
    ) -> Result<Self, ForwarderError> {
        let config = Config::resolve(config_path, env, metadata).await?;
        let filter = compile_filter(config.log_priority());

        info!(
            region = config.aws_region(),
            log_group = config.log_group_name(),
            log_stream = config.log_stream_name(),
            priority = %config.log_priority(),
            buffer_size = config.buffer_size(),
            "Configuration loaded from {}",
            config_path.display()
        );
        if filter.is_unfiltered() {
            info!("No priority filter, reading every journal record");
        } else {
            info!(matches = ?filter.expressions(), "Journal priority filter compiled");
        }

        Ok(Self {
            config: Arc::new(config),
            filter,
        })
    }

    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    pub fn filter(&self) -> &PriorityFilter {
        &self.filter
    }

    pub fn startup_report(&self) -> StartupReport {
        StartupReport {
            config: self.config.summary(),
            priority_filter: self.filter.expressions(),
            delivery: self.config.delivery_settings(),
        }
    }
}

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

// Main entry point for the application
pub async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    App::init_logging(&cli).context("failed to initialise logging")?;
    info!("Starting rask-journal-forwarder v{}", get_version());

    let app = App::from_cli(&cli).await.with_context(|| {
        format!(
            "failed to resolve configuration from {}",
            cli.config.display()
        )
    })?;

    if cli.check {
        println!("{}", serde_json::to_string_pretty(&app.startup_report())?);
        return Ok(());
    }

    info!(
        state_file = %app.config().state_file().display(),
        journal_dir = ?app.config().journal_dir(),
        "Startup complete"
    );
    Ok(())
}

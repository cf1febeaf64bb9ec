//! # Queue-Batcher CLI
//!
//! Command-line interface for the batching queue consumer.
//!
//! This module provides CLI commands for:
//! - Running a consumer that logs and acknowledges every batch
//! - Sending message bodies to a queue
//! - Validating and printing the resolved configuration
//!
//! Configuration is read from an optional YAML, TOML or JSON file and
//! overridden by environment variables prefixed `QB__`, using `__` as the
//! nesting separator (`QB__CONSUMER__BATCH_SIZE=10` sets `consumer.batch_size`).

use clap::{Parser, Subcommand};
use queue_batcher_core::{
    handler_fn, Acknowledgement, BatchSender, ConsumerBuilder, ConsumerEvent, ConsumerOptions,
};
use queue_runtime::{ProviderConfig, QueueClientFactory, QueueError, ReceivedMessage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Prefix of environment variables that override configuration values
pub const ENV_PREFIX: &str = "QB";

const REDACTED: &str = "<REDACTED>";

// ============================================================================
// CLI Structure
// ============================================================================

/// Queue-Batcher CLI - batching consumer for SQS queues
#[derive(Parser, Debug)]
#[command(name = "queue-batcher")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Batching consumer for SQS queues")]
#[command(
    long_about = "Queue-Batcher polls a queue continuously, groups messages into large batches and acknowledges them in service-sized chunks"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "QUEUE_BATCHER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level
    #[arg(
        short,
        long,
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Consume messages until interrupted, logging and acknowledging each batch
    Consume {
        /// Queue to consume from
        #[arg(short, long)]
        queue_url: Option<String>,

        /// Messages requested per receive call (1-10)
        #[arg(short, long)]
        batch_size: Option<u32>,

        /// Long-poll wait per receive call in seconds (0-20)
        #[arg(short, long)]
        wait_time_seconds: Option<u32>,

        /// Accumulate messages into batches of this size
        #[arg(long)]
        buffer_size: Option<usize>,

        /// Flush a partially filled buffer after this many milliseconds
        #[arg(long)]
        buffer_timeout_ms: Option<u64>,
    },

    /// Send message bodies to a queue
    Send {
        /// Queue to send to
        #[arg(short, long)]
        queue_url: Option<String>,

        /// Read additional bodies from a file, one per non-empty line
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Message bodies
        bodies: Vec<String>,
    },

    /// Validate the configuration and print it with secrets redacted
    Config {
        /// Output format for configuration
        #[arg(short = 'f', long, default_value = "yaml")]
        format: ConfigFormat,
    },
}

/// Configuration format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Invalid consumer configuration: {0}")]
    Consumer(#[from] queue_batcher_core::ConfigurationError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("Send rejected for {failed} of {total} messages")]
    SendIncomplete { failed: usize, total: usize },

    #[error("Logging initialization failed: {message}")]
    Logging { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to render configuration: {message}")]
    Render { message: String },
}

// ============================================================================
// Configuration Types
// ============================================================================

/// Resolved application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Queue provider and its connection settings
    pub provider: ProviderConfig,

    /// Consumer options; `queue_url` is also the target of `send`
    pub consumer: ConsumerOptions,
}

impl AppConfig {
    /// Replace the queue URL when one was given on the command line
    pub fn with_queue_url(mut self, queue_url: Option<String>) -> Self {
        if queue_url.is_some() {
            self.consumer.queue_url = queue_url;
        }
        self
    }

    /// Copy of the configuration that is safe to print
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if let ProviderConfig::AwsSqs(aws) = &mut config.provider {
            for secret in [&mut aws.secret_access_key, &mut aws.session_token] {
                if secret.is_some() {
                    *secret = Some(REDACTED.to_string());
                }
            }
        }
        config
    }
}

/// Load configuration from an optional file layered under `QB__` variables.
///
/// The file format follows its extension.
pub fn load_configuration(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        debug!(path = %path.display(), "Loading configuration file");
        builder = builder.add_source(config::File::from(path));
    }

    let config = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}

/// Render the configuration, secrets redacted
pub fn render_configuration(config: &AppConfig, format: ConfigFormat) -> Result<String, ConfigError> {
    let redacted = config.redacted();
    let rendered = match format {
        ConfigFormat::Yaml => serde_yaml::to_string(&redacted).map_err(|e| e.to_string()),
        ConfigFormat::Json => serde_json::to_string_pretty(&redacted).map_err(|e| e.to_string()),
    };

    rendered.map_err(|message| ConfigError::Render { message })
}

/// Message bodies from a file (one per non-empty line) followed by `bodies`
pub fn collect_bodies(file: Option<&Path>, bodies: Vec<String>) -> Result<Vec<String>, CliError> {
    let mut collected = Vec::new();

    if let Some(file) = file {
        let content = std::fs::read_to_string(file)?;
        collected.extend(
            content
                .lines()
                .map(str::trim_end)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
    }

    collected.extend(bodies);
    Ok(collected)
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    let config = load_configuration(cli.config.as_deref())?;

    match cli.command {
        Commands::Consume {
            queue_url,
            batch_size,
            wait_time_seconds,
            buffer_size,
            buffer_timeout_ms,
        } => {
            let mut config = config.with_queue_url(queue_url);
            let options = &mut config.consumer;
            options.batch_size = batch_size.unwrap_or(options.batch_size);
            options.wait_time_seconds = wait_time_seconds.or(options.wait_time_seconds);
            options.buffer_size = buffer_size.or(options.buffer_size);
            options.buffer_timeout_ms = buffer_timeout_ms.unwrap_or(options.buffer_timeout_ms);

            execute_consume_command(config).await
        }
        Commands::Send {
            queue_url,
            file,
            bodies,
        } => execute_send_command(config.with_queue_url(queue_url), file, bodies).await,
        Commands::Config { format } => execute_config_command(&config, format),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Default filter directive for our own crates at `level`
pub fn default_log_filter(level: &str) -> String {
    format!("queue_batcher_cli={level},queue_batcher_core={level},queue_runtime={level}")
}

/// Initialize logging based on CLI arguments; `RUST_LOG` takes precedence
fn initialize_logging(cli: &Cli) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter(&cli.log_level)));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| CliError::Logging {
        message: e.to_string(),
    })
}

/// Run a consumer until Ctrl-C, then wait for it to report `Stopped`
async fn execute_consume_command(config: AppConfig) -> Result<(), CliError> {
    let client = QueueClientFactory::create_client(config.provider).await?;
    let consumer = ConsumerBuilder::new()
        .options(config.consumer)
        .handler(handler_fn(log_and_acknowledge))
        .build(client)?;

    let mut events = consumer.subscribe();
    consumer.start();

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c(), if consumer.is_running() => {
                signal?;
                info!("Interrupt received, stopping after the current receive");
                consumer.stop();
            }
            event = events.recv() => match event {
                Some(ConsumerEvent::Stopped) | None => break,
                Some(event) => log_event(&event),
            }
        }
    }

    info!(queue = %consumer.queue_url(), "Consumer stopped");
    Ok(())
}

async fn log_and_acknowledge(messages: Vec<ReceivedMessage>, ack: Acknowledgement) {
    for message in &messages {
        info!(
            message_id = %message.message_id,
            receive_count = ?message.receive_count(),
            body = %message.body,
            "Message"
        );
    }

    // Failures are reported again through the ProcessingError event
    if let Err(e) = ack.complete().await {
        debug!(error = %e, "Acknowledgement failed");
    }
}

fn log_event(event: &ConsumerEvent) {
    match event {
        ConsumerEvent::Error(error) => warn!(error = %error, "Receive failed"),
        ConsumerEvent::ProcessingError(error) => warn!(error = %error, "Batch not acknowledged"),
        ConsumerEvent::MessageProcessed(messages) => {
            info!(count = messages.len(), "Batch acknowledged")
        }
        ConsumerEvent::MessageReceived(messages) | ConsumerEvent::Flush(messages) => {
            debug!(event = event.name(), count = messages.len(), "Consumer event")
        }
        ConsumerEvent::Stopped => debug!("Consumer stopped"),
    }
}

/// Execute send command
async fn execute_send_command(
    config: AppConfig,
    file: Option<PathBuf>,
    bodies: Vec<String>,
) -> Result<(), CliError> {
    let bodies = collect_bodies(file.as_deref(), bodies)?;
    if bodies.is_empty() {
        return Err(CliError::InvalidArgument {
            arg: "bodies".to_string(),
            message: "no message bodies given".to_string(),
        });
    }

    let queue_url = config.consumer.parsed_queue_url()?;
    let client = QueueClientFactory::create_client(config.provider).await?;
    let total = bodies.len();

    let outcome = BatchSender::new(client, queue_url).send_bodies(bodies).await?;
    info!(
        sent = outcome.successful.len(),
        failed = outcome.failed.len(),
        "Send complete"
    );

    if !outcome.is_complete() {
        for failure in &outcome.failed {
            warn!(id = %failure.id, code = %failure.code, "Message rejected");
        }
        return Err(CliError::SendIncomplete {
            failed: outcome.failed.len(),
            total,
        });
    }

    Ok(())
}

/// Execute config command
fn execute_config_command(config: &AppConfig, format: ConfigFormat) -> Result<(), CliError> {
    config.consumer.validate()?;
    println!("{}", render_configuration(config, format)?);
    Ok(())
}

//! qscaled — the queuescale daemon.
//!
//! Polls one RabbitMQ queue and adds an instance to one Cloud Foundry
//! application whenever the backlog per consumer exceeds the threshold.
//!
//! # Usage
//!
//! ```text
//! qscaled run --config /etc/qscale/qscale.toml
//! qscaled check --config /etc/qscale/qscale.toml
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use qscale_core::{ConfigOverrides, QscaleConfig};

const DEFAULT_LOG_FILTER: &str = "info,qscale=debug";
const PLATFORM_TOKEN_ENV: &str = "QSCALE_PLATFORM_TOKEN";

#[derive(Parser)]
#[command(name = "qscaled", about = "queuescale daemon", version)]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the autoscaler until interrupted.
    Run {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Validate the configuration and print the effective settings.
    Check {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Args)]
struct ConfigArgs {
    /// Path to qscale.toml.
    #[arg(short, long, default_value = "qscale.toml")]
    config: PathBuf,

    /// Queue to watch (overrides scaler.queue_name).
    #[arg(long)]
    queue: Option<String>,

    /// Application to scale (overrides scaler.application_name).
    #[arg(long)]
    application: Option<String>,

    /// Poll interval in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Scale out when messages per consumer exceed this.
    #[arg(long)]
    threshold: Option<u64>,

    /// Address for the status server, e.g. 127.0.0.1:9464.
    #[arg(long)]
    listen: Option<String>,
}

impl ConfigArgs {
    fn load(self) -> anyhow::Result<QscaleConfig> {
        let overrides = ConfigOverrides {
            queue_name: self.queue,
            application_name: self.application,
            poll_interval_ms: self.interval_ms,
            threshold: self.threshold,
            listen: self.listen,
            platform_token: std::env::var(PLATFORM_TOKEN_ENV).ok(),
        };
        QscaleConfig::from_file(&self.config, overrides)
            .with_context(|| format!("loading {}", self.config.display()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Run { config } => qscaled::run(config.load()?).await,
        Command::Check { config } => {
            let config = config.load()?;
            print!("{}", config.to_redacted_toml()?);
            Ok(())
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

//! eslmon command line monitor
//!
//! Connects to a FreeSWITCH event socket and prints every received event to
//! stdout as one JSON object per line. Logs go to stderr.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eslmon::config::{self, MonitorConfig};
use eslmon::{output, Monitor, Shutdown};

#[derive(Parser)]
#[command(name = "eslmon")]
#[command(about = "eslmon - stream FreeSWITCH events as JSON lines")]
#[command(version)]
struct Args {
    /// Event socket address (host or host:port, default port 8021)
    #[arg(short, long, env = "ESL_ADDR")]
    address: Option<String>,

    /// Event socket password
    #[arg(short, long, env = "ESL_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Event names to print (repeatable); none means every event
    /// Example: --events HEARTBEAT --events "CUSTOM sofia::register"
    #[arg(short, long = "events")]
    events: Vec<String>,

    /// Connection timeout in seconds (0 disables it)
    #[arg(long)]
    dial_timeout: Option<f64>,

    /// Authentication and subscription timeout in seconds (0 disables it)
    #[arg(long)]
    command_timeout: Option<f64>,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Number of events buffered between the socket and stdout
    #[arg(long, default_value_t = 64)]
    buffer: usize,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&args)?;
    let monitor_config = apply_overrides(config, &args)?;

    let (tx, rx) = mpsc::channel(args.buffer.max(1));
    let mut monitor =
        Monitor::from_config(&monitor_config).context("Invalid monitor configuration")?;
    monitor.subscribe(tx, &monitor_config.events)?;

    tracing::info!(
        address = monitor.address(),
        subscription = monitor.subscription_command().as_deref(),
        "eslmon starting"
    );

    let shutdown = Shutdown::new();
    let printer = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { output::write_events(rx, tokio::io::stdout(), &shutdown).await })
    };
    let interrupt = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.cancel_with("interrupted");
            }
        })
    };
    if let Some(secs) = args.duration {
        let after = Duration::try_from_secs_f64(secs).context("Invalid --duration")?;
        shutdown.cancel_after(after, "duration elapsed");
    }

    let reason = match monitor.run(&shutdown).await {
        Ok(never) => match never {},
        Err(reason) => reason,
    };
    interrupt.abort();

    // closes the event channel so the printer drains and exits
    drop(monitor);
    printer
        .await
        .context("Printer task failed")?
        .context("Failed to write events")?;

    if reason.is_cancelled() {
        tracing::info!("{}", reason);
        return Ok(());
    }
    Err(anyhow::Error::new(reason).context("Monitor stopped"))
}

fn load_config(args: &Args) -> Result<MonitorConfig> {
    match &args.config {
        Some(path) => config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path)),
        None => {
            let path = config::default_config_path();
            if !path.exists() {
                return Ok(MonitorConfig::default());
            }
            Ok(config::load_config(&path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {:?}: {}", path, e);
                MonitorConfig::default()
            }))
        }
    }
}

// Command-line values win over the config file
fn apply_overrides(mut config: MonitorConfig, args: &Args) -> Result<MonitorConfig> {
    if let Some(address) = &args.address {
        config.address = address.clone();
    }
    if let Some(password) = &args.password {
        config.password = password.clone();
    }
    if !args.events.is_empty() {
        config.events = args.events.clone();
    }
    if let Some(secs) = args.dial_timeout {
        config.dial_timeout =
            Duration::try_from_secs_f64(secs).context("Invalid --dial-timeout")?;
    }
    if let Some(secs) = args.command_timeout {
        config.command_timeout =
            Duration::try_from_secs_f64(secs).context("Invalid --command-timeout")?;
    }
    Ok(config)
}

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use keygate::config::{KeygateConfig, LogFormat};
use keygate::ratelimit::{RateLimiter, SystemClock};

/// Admit or reject keys read from stdin, one per line.
///
/// Each line is answered with `<key>\t<allowed|rejected>\t<current count>`.
#[derive(Debug, Parser)]
#[command(name = "keygate", version, about)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Requests admitted per window, per key
    #[arg(long)]
    max_requests: Option<u32>,

    /// Window duration in milliseconds
    #[arg(long)]
    window_ms: Option<u64>,

    /// Log output format
    #[arg(long, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,
}

fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    match s {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => Err(format!("unknown log format '{}', expected text or json", other)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => KeygateConfig::from_file(path)?,
        None => KeygateConfig::default(),
    };
    if let Some(max_requests) = args.max_requests {
        config.limiter.max_requests = max_requests;
    }
    if let Some(window_ms) = args.window_ms {
        config.limiter.window_size_ms = window_ms;
    }
    if let Some(format) = args.log_format {
        config.logging.format = format;
    }

    init_tracing(&config);

    info!("Starting Keygate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let settings = config.limiter_settings()?;
    let limiter = Arc::new(RateLimiter::with_clock(settings, Arc::new(SystemClock)));
    info!(
        max_requests = settings.max_requests(),
        window_size_ms = settings.window_size_ms(),
        "Rate limiter initialized"
    );

    tokio::select! {
        result = run(limiter.clone()) => result?,
        _ = shutdown_signal() => {}
    }

    info!(tracked_keys = limiter.tracked_keys(), "Keygate stopped");
    Ok(())
}

/// Answer every line on stdin until EOF.
async fn run(limiter: Arc<RateLimiter>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let key = line.trim();
        if key.is_empty() {
            warn!("Skipping empty key");
            continue;
        }

        let admitted = limiter.allow_request(key);
        let verdict = if admitted { "allowed" } else { "rejected" };
        let reply = format!("{}\t{}\t{}\n", key, verdict, limiter.current_count(key));

        stdout.write_all(reply.as_bytes()).await?;
        stdout.flush().await?;
    }

    info!("Reached end of input");
    Ok(())
}

fn init_tracing(config: &KeygateConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    // Logs go to stderr so stdout carries only verdicts
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}

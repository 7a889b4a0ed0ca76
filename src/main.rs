//! Vigil CLI
//!
//! Command-line interface for the availability monitor.

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;
use vigil::Config;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Single-target availability monitor with escalating alerts")]
#[command(version)]
struct Args {
    /// Run a single check cycle and exit (for CI schedulers)
    #[arg(long)]
    once: bool,

    /// Listen port (overrides the PORT environment variable)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(port) = args.port {
        config.port = port;
    }

    tracing::debug!(
        "Configuration: target={}, interval={:?}, notifications={}",
        config.probe_url(),
        config.check_interval,
        config.telegram_bot_token.is_some() && config.telegram_chat_id.is_some()
    );

    if args.once {
        return vigil::run_once(config).await;
    }

    match vigil::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

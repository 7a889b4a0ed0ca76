//! Vigil - single-target availability monitor
//!
//! Polls one upstream health endpoint, classifies results, and escalates
//! persistent failures into Telegram notifications with durable alert state.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod io;
pub mod message;
pub mod notifier;
pub mod probe;
pub mod state;
pub mod telegram;

pub use config::Config;
pub use error::{Result, VigilError};

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::engine::Engine;
use crate::history::{new_history_handle, HISTORY_CAPACITY};
use crate::io::ReqwestHttpClient;
use crate::message::AlertFormatter;
use crate::notifier::Dispatcher;
use crate::probe::HttpProber;
use crate::state::AlertStateStore;
use crate::telegram::TelegramNotifier;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

fn build_engine(config: &Config) -> Arc<Engine> {
    let http: Arc<dyn io::HttpClient> = Arc::new(ReqwestHttpClient::default());

    let prober = Arc::new(HttpProber::new(
        config.probe_url(),
        config.api_key.clone(),
        PROBE_TIMEOUT,
        Arc::clone(&http),
    ));
    let notifier = Arc::new(TelegramNotifier::new(
        config.telegram_bot_token.clone(),
        config.telegram_chat_id.clone(),
        http,
    ));

    Arc::new(Engine::new(
        prober,
        Dispatcher::new(notifier),
        AlertFormatter::new(config.service_name.clone(), config.service_url.clone()),
        AlertStateStore::new(config.state_file.clone()),
        new_history_handle(HISTORY_CAPACITY),
    ))
}

/// Run the monitor: the HTTP boundary plus the periodic check loop.
/// Blocks until a shutdown signal arrives.
pub async fn run(config: Config) -> Result<()> {
    let engine = build_engine(&config);
    let cancel = CancellationToken::new();

    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for ctrl-c");
        tracing::info!("Shutdown signal received");
        cancel_for_signal.cancel();
    });

    let router = api::build_router(Arc::clone(&engine), config.api_key.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| VigilError::Server(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!("Monitoring server listening on http://{}", addr);

    let cancel_for_server = cancel.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_for_server.cancelled().await;
            })
            .await
            .ok();
        tracing::debug!("HTTP server stopped");
    });

    tracing::info!(
        "Checking {} every {:?}",
        config.probe_url(),
        config.check_interval
    );

    check_loop(engine, config.check_interval, cancel).await;

    let _ = server.await;
    tracing::info!("Monitor stopped");
    Ok(())
}

/// Run one check cycle and return the process exit code.
///
/// Under a CI scheduler an unhealthy result exits non-zero so the runner
/// observes the failure; the alert decision has already persisted its state
/// by the time this returns.
pub async fn run_once(config: Config) -> ExitCode {
    let engine = build_engine(&config);

    let result = engine.check_once().await;

    if !result.is_healthy() && config.ci_mode {
        tracing::info!("Exiting non-zero for the CI scheduler");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn check_loop(engine: Arc<Engine>, interval: Duration, cancel: CancellationToken) {
    loop {
        let result = engine.check_once().await;
        tracing::debug!("Scheduled check completed: {:?}", result.status);

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => {
                tracing::debug!("Check loop cancelled");
                break;
            }
        }
    }
}

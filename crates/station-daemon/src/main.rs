mod error;
mod http;
mod library;
mod media;
mod presence;
mod scheduler;
mod session;
mod ws;

use std::path::PathBuf;
use std::sync::Arc;

use station_proto::config::Config;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::http::AppState;
use crate::presence::PresenceTracker;
use crate::scheduler::Scheduler;

fn init_logging() -> anyhow::Result<PathBuf> {
    let data_dir = station_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("daemon.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,station_daemon=debug")),
        )
        .init();

    Ok(log_path)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_path = init_logging()?;
    info!("Log file: {:?}", log_path);

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());
    for warning in config.validate() {
        warn!("Config: {}", warning);
    }

    let playlist = Arc::new(library::load_playlist(&config.station).await?);

    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&playlist),
        config.station.tick_interval(),
    ));
    let _tick_handle = scheduler.start();

    let presence = Arc::new(PresenceTracker::new(config.presence.stale_after()));
    let _sweep_handle = Arc::clone(&presence).spawn_sweeper(config.presence.sweep_interval());

    let state = AppState {
        scheduler,
        presence,
        playlist,
        library_dir: Arc::new(config.station.library_dir.clone()),
        trust_proxy_headers: config.http.trust_proxy_headers,
        heartbeat_interval: config.presence.heartbeat_interval(),
    };

    info!("Station initialised, serving");
    http::serve(
        &config.http.bind_address,
        config.http.port,
        state,
        shutdown_signal(),
    )
    .await?;

    info!("Station stopped");
    Ok(())
}

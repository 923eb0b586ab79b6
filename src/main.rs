//! tailcast - tails a growing log file and streams new lines to any number
//! of connected browsers over SSE.
//!
//! One background task polls the file for growth; every connected client
//! first receives a replay of the most recent lines, then live appends.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod error;
mod hub;
mod watcher;
mod web;

use config::Config;
pub use error::Error;
use hub::Hub;
use watcher::FileWatcher;

#[derive(Parser)]
#[command(name = "tailcast")]
#[command(about = "Tail a log file and broadcast new lines over SSE")]
#[command(version)]
struct Cli {
    /// Log file to watch
    #[arg(default_value = config::DEFAULT_LOG_PATH)]
    path: std::path::PathBuf,

    /// HTTP listen port
    #[arg(long, short, default_value_t = config::DEFAULT_PORT)]
    port: u16,

    /// Poll interval in milliseconds
    #[arg(long, default_value_t = config::DEFAULT_POLL_INTERVAL_MS)]
    interval: u64,

    /// Number of recent lines replayed to a new client
    #[arg(long, default_value_t = config::DEFAULT_HISTORY_CAPACITY)]
    history: usize,

    /// Bytes read from the end of the file at startup
    #[arg(long, default_value_t = config::DEFAULT_TAIL_WINDOW_BYTES)]
    window: u64,
}

fn main() -> Result<(), Error> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("tailcast=info".parse().unwrap()))
        .init();

    let cli = Cli::parse();
    let config = Config {
        log_path: cli.path,
        poll_interval: Duration::from_millis(cli.interval),
        history_capacity: cli.history,
        tail_window_bytes: cli.window,
        port: cli.port,
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config))
}

async fn run(config: Config) -> Result<(), Error> {
    let hub = Arc::new(Hub::new(config.history_capacity));

    // Seed the replay history from the tail of the file and remember the
    // size it was read at as the baseline for growth detection.
    let initial = watcher::read_initial(
        &config.log_path,
        config.tail_window_bytes,
        config.history_capacity,
    );
    info!(
        path = %config.log_path.display(),
        size = initial.size,
        lines = initial.lines.len(),
        "initial tail loaded"
    );
    hub.preload(initial.lines);

    let shutdown = CancellationToken::new();
    let file_watcher = FileWatcher::new(
        config.log_path.clone(),
        config.poll_interval,
        initial.size,
        Arc::clone(&hub),
    );
    let watcher_task = tokio::spawn(file_watcher.run(shutdown.clone()));

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
                shutdown.cancel();
            }
        }
    });

    let result = web::serve(Arc::clone(&hub), config.port, shutdown.clone()).await;
    shutdown.cancel();
    let _ = watcher_task.await;
    result
}

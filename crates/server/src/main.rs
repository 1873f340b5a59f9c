//! Backbone server entry point.
mod config;
mod subscribers;
mod transport;

use std::path::Path;

use anyhow::{Context, Result};
use backbone::{Dispatcher, EventBus, TaskPool, World};
use config::ServerConfig;
use subscribers::{PacketStats, UntrustedClientLog};
use tokio::net::TcpListener;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use transport::Transport;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = ServerConfig::from_env().context("invalid server configuration")?;

    // Keep the guard alive so buffered log lines are flushed on exit
    let _guard = setup_logging(&config.log_dir)?;

    let pool = TaskPool::with_config(config.backbone.pool.clone());
    pool.start().context("failed to start task pool")?;

    let bus = EventBus::new();
    let stats = PacketStats::new(pool.clone());
    let stats_owner = bus.register_subscriber(std::sync::Arc::clone(&stats));
    let untrusted_owner = bus.register_subscriber(UntrustedClientLog::new());

    let world = World::with_seed(config.backbone.world.seed);
    let dispatcher = Dispatcher::with_builtins(world);
    let commands: Vec<&str> = dispatcher.registry().names().collect();
    tracing::info!(?commands, "Command registry ready");

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(bind = %config.bind_addr, "Listening");

    let transport = Transport::new(bus.clone(), dispatcher, config.max_line_len);
    transport
        .serve(listener, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "Failed to listen for Ctrl-C");
            }
        })
        .await;

    bus.unregister(stats_owner);
    bus.unregister(untrusted_owner);

    let grace = config.backbone.pool.shutdown_grace;
    let report = tokio::task::spawn_blocking(move || pool.shutdown(grace))
        .await
        .context("pool shutdown task failed")?;
    tracing::info!(
        packets = stats.packets(),
        bytes = stats.bytes(),
        graceful = report.graceful,
        "Server stopped"
    );

    Ok(())
}

/// Setup logging to both stderr and file
fn setup_logging(log_dir: &Path) -> Result<WorkerGuard> {
    let file_appender = file_appender(log_dir)?;
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG wins; otherwise everything at info and above
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    tracing::info!("Log file: {}/server.log", log_dir.display());

    Ok(guard)
}

fn file_appender(log_dir: &Path) -> Result<tracing_appender::rolling::RollingFileAppender> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    Ok(tracing_appender::rolling::never(log_dir, "server.log"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_appender_creates_log_dir() {
        let temp = tempfile::tempdir().unwrap();
        let log_dir = temp.path().join("nested").join("logs");

        let mut appender = file_appender(&log_dir).unwrap();
        appender.write_all(b"hello\n").unwrap();
        appender.flush().unwrap();

        let contents = std::fs::read_to_string(log_dir.join("server.log")).unwrap();
        assert_eq!(contents, "hello\n");
    }
}

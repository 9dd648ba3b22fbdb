use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use roomd::Config;
use roomd::Engine;
use roomd::LogLevel;
use roomd::format_diagnostics;
use tracing::error;
use tracing::info;
use tracing_subscriber::prelude::*;

/// Room state daemon: sensor ingestion, automatic control and dashboard API
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Config file; may be given several times, merged in order
    #[arg(short, long = "config", value_name = "FILE")]
    config: Vec<PathBuf>,

    /// Address to listen on, overrides `http.listen`
    #[arg(long)]
    listen: Option<IpAddr>,

    /// Port to listen on, overrides `http.port`
    #[arg(long)]
    port: Option<u16>,

    /// Base log level, overrides `logging.level`
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (mut config, diagnostics) = match Config::from_files(&cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprint!("{}", e);
            std::process::exit(1);
        }
    };

    // Logging isn't up yet, warnings go straight to stderr
    if !diagnostics.is_empty() {
        eprint!("{}", format_diagnostics(&diagnostics));
    }

    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(listen) = cli.listen {
        config.http.listen = listen;
    }
    if let Some(port) = cli.port {
        config.http.port = port;
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(config.logging.targets())
        .init();

    info!("roomd starting");
    for path in &cli.config {
        info!("Loaded config from: {}", path.display());
    }

    let initial = config.room.initial_state();
    info!(
        "Initial mode: {} (temp_threshold={}, light_threshold={})",
        initial.mode(),
        initial.thresholds.temp_threshold,
        initial.thresholds.light_threshold
    );
    let engine = Arc::new(Engine::new(initial));

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let mut server = tokio::spawn(roomd::api::serve(
        engine,
        config.http.socket_addr(),
        shutdown_rx,
    ));

    info!("Press Ctrl+C to exit");

    tokio::select! {
        result = &mut server => {
            // The server only returns on its own if it failed
            result
                .context("HTTP API server task panicked")?
                .context("HTTP API server failed")?;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        },
    }

    shutdown_tx.send(()).ok();
    server
        .await
        .context("HTTP API server task panicked")?
        .context("HTTP API server failed")?;

    info!("roomd shutdown complete");

    Ok(())
}

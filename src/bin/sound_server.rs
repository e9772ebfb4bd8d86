//! Sound Server Application
//!
//! Listens on the sound socket and plays requested notification sounds.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notify_sound_server::{
    audio::SystemRunner,
    config::AppConfig,
    network::SoundServer,
};

#[derive(Parser, Debug)]
#[command(
    name = "sound-server",
    version,
    about = "Play notification sounds requested over a Unix socket"
)]
struct Args {
    /// Config file (defaults to the per-user config directory)
    #[arg(long, env = "NOTIFY_SOUND_CONFIG")]
    config: Option<PathBuf>,

    /// Socket path, overrides the config file
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(socket) = args.socket {
        config.server.socket_path = socket;
        config.validate()?;
    }

    if args.print_config {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting notify sound server");

    let sounds = config.sound_table();
    for name in sounds.names() {
        match sounds.path(name) {
            Some(path) if path.exists() => tracing::info!("  {} -> {}", name, path.display()),
            Some(path) => tracing::warn!("  {} -> {} (missing)", name, path.display()),
            None => {}
        }
    }

    let server = SoundServer::new(&config, Arc::new(SystemRunner));
    let listener = server.bind()?;
    server.serve_until(listener, shutdown_signal()).await;

    tracing::info!("Sound server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

//! Sound request client
//!
//! Sends one request line to the sound server, e.g.
//! `play-sound warning:1.5:default`.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notify_sound_server::{
    constants::DEFAULT_SOCKET_PATH,
    network::send_request,
    protocol::Response,
};

#[derive(Parser, Debug)]
#[command(
    name = "play-sound",
    version,
    about = "Ask the sound server to play a notification sound"
)]
struct Args {
    /// Request line: <sound>[:duration][:all|default][:normalise][:level][:restoreDelayMs]
    message: String,

    /// Server socket
    #[arg(long, env = "PLAY_SOUND_SOCKET", default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    tracing::debug!("Sending {:?} to {}", args.message, args.socket.display());

    match send_request(&args.socket, &args.message).await? {
        Response::Ok => Ok(()),
        Response::Error(reason) => {
            eprintln!("ERROR {}", reason);
            std::process::exit(1);
        }
    }
}

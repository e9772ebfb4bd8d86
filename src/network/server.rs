//! Unix socket server
//!
//! One connection carries one request and one response:
//!
//! ```text
//! Listening → Accepted → Reading → Dispatching → Responding → Closed
//! ```
//!
//! Every connection ends closed, whether the request was played, rejected,
//! or the client went away mid-read. A failing connection never stops the
//! accept loop.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::Instrument;

use crate::audio::command::CommandRunner;
use crate::audio::player::{PlaybackTask, SoundPlayer};
use crate::config::AppConfig;
use crate::constants::ACCEPT_ERROR_BACKOFF;
use crate::error::Result;
use crate::protocol::{self, Response, RuntimeSettings};

/// The sound request service
pub struct SoundServer<R> {
    shared: Arc<Shared<R>>,
    socket_path: PathBuf,
}

impl<R> Clone for SoundServer<R> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            socket_path: self.socket_path.clone(),
        }
    }
}

/// State shared by all connection tasks
struct Shared<R> {
    player: SoundPlayer<R>,
    defaults: RuntimeSettings,
    read_buffer_size: usize,
}

impl<R: CommandRunner> SoundServer<R> {
    pub fn new(config: &AppConfig, runner: Arc<R>) -> Self {
        let player = SoundPlayer::new(config.sound_table(), config.tools.clone(), runner);
        Self {
            shared: Arc::new(Shared {
                player,
                defaults: config.defaults.clone(),
                read_buffer_size: config.server.read_buffer_size,
            }),
            socket_path: config.server.socket_path.clone(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn player(&self) -> &SoundPlayer<R> {
        &self.shared.player
    }

    /// Bind the socket, replacing a stale socket file
    pub fn bind(&self) -> Result<UnixListener> {
        match std::fs::remove_file(&self.socket_path) {
            Ok(()) => tracing::debug!("Removed stale socket {}", self.socket_path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::error!("Error removing existing socket file: {}", e),
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!("Socket server started at {}", self.socket_path.display());
        Ok(listener)
    }

    /// Accept connections forever
    pub async fn serve(&self, listener: UnixListener) {
        self.serve_until(listener, std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves, then remove the socket
    ///
    /// Pending volume restores run before this returns. Connections already
    /// accepted keep running on their own tasks.
    pub async fn serve_until<F>(&self, listener: UnixListener, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut connection_id: u64 = 0;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        connection_id += 1;
                        let shared = self.shared.clone();
                        let span = tracing::debug_span!("connection", id = connection_id);
                        tokio::spawn(
                            async move {
                                if let Err(e) = shared.handle_connection(stream).await {
                                    tracing::warn!("Connection error: {}", e);
                                }
                                tracing::trace!("Closed");
                            }
                            .instrument(span),
                        );
                    }
                    Err(e) => {
                        tracing::error!("Error accepting connection: {}", e);
                        // e.g. out of file descriptors; don't spin
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                }
            }
        }

        drop(listener);
        self.cleanup();
        self.shared.player.volume_guard().shutdown().await;
    }

    /// Remove the socket file
    pub fn cleanup(&self) {
        match std::fs::remove_file(&self.socket_path) {
            Ok(()) => tracing::debug!("Removed socket {}", self.socket_path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::error!("Error cleaning up socket file: {}", e),
        }
    }

    /// Parse a request line and launch playback if it is valid
    pub async fn dispatch(&self, message: &str) -> (Response, Option<PlaybackTask>) {
        self.shared.dispatch(message).await
    }
}

impl<R: CommandRunner> Shared<R> {
    async fn handle_connection(&self, mut stream: UnixStream) -> Result<()> {
        let mut buf = vec![0u8; self.read_buffer_size];
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            tracing::debug!("Client sent nothing");
            return Ok(());
        }

        let message = String::from_utf8_lossy(&buf[..n]);
        let message = message.trim();
        if message.is_empty() {
            tracing::debug!("Blank request");
            return Ok(());
        }

        // playback keeps running after the response is sent
        let (response, _detached) = self.dispatch(message).await;

        stream.write_all(&response.to_wire()).await?;
        stream.shutdown().await?;
        Ok(())
    }

    async fn dispatch(&self, message: &str) -> (Response, Option<PlaybackTask>) {
        match protocol::parse(message, &self.defaults, self.player.sounds()) {
            Ok(request) => {
                tracing::debug!("Request {:?} -> {:?}", message, request.settings);
                let task = self.player.play(&request).await;
                (Response::Ok, task)
            }
            Err(rejection) => {
                tracing::info!("Rejected request {:?}: {}", message, rejection);
                (Response::from(rejection), None)
            }
        }
    }
}

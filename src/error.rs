//! Error types for the notification sound server

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio subsystem errors
///
/// These never reach a socket client; they are logged where they occur and
/// playback degrades instead.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Sink dump failed: {0}")]
    SinkDump(String),

    #[error("Sound file not found: {}", .0.display())]
    SoundFileMissing(PathBuf),

    #[error("Unparsable volume reading for sink {sink}: {reading:?}")]
    UnparsableVolume { sink: String, reading: String },
}

/// External process errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {code:?}: {stderr}")]
    Failed {
        program: String,
        /// `None` when the process was killed by a signal
        code: Option<i32>,
        stderr: String,
    },
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;

//! # Notify Sound Server
//!
//! Plays short notification sounds on request, over a Unix socket, across
//! every PipeWire output sink with temporary volume normalisation.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐  "warning:2:all:true:0.6:250"   ┌───────────────────────────────┐
//! │    client    │ ───────────────────────────────▶│  Socket Server (network)      │
//! │ (play-sound, │ ◀─────────────────────────────── │  one read, one reply, close   │
//! │  socat, ...) │         "OK" / "ERROR ..."      └───────────────┬───────────────┘
//! └──────────────┘                                                 │
//!                                                                  ▼
//!                                                  ┌───────────────────────────────┐
//!                                                  │  Protocol Codec (protocol)    │
//!                                                  │  defaults + overrides         │
//!                                                  └───────────────┬───────────────┘
//!                                                                  │ EffectiveRequest
//!                                                                  ▼
//!   ┌────────────────┐   ┌───────────────────────────────────────────────────────────┐
//!   │ Sink Inventory │◀──│              Playback Orchestrator (audio::player)        │
//!   │   (pw-dump)    │   │  targets → normalise? → launch players → schedule restore │
//!   └────────────────┘   └─────────┬───────────────────────────────┬─────────────────┘
//!                                  │                               │
//!                                  ▼                               ▼
//!                  ┌───────────────────────────────┐   ┌─────────────────────────┐
//!                  │   Volume Guard (wpctl)        │   │  pw-play per sink       │
//!                  │   one cycle at a time,        │   │  (timeout-capped,       │
//!                  │   restore on detached task    │   │   concurrent fan-out)   │
//!                  └───────────────────────────────┘   └─────────────────────────┘
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod network;
pub mod protocol;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    use std::time::Duration;

    /// Well-known socket location
    pub const DEFAULT_SOCKET_PATH: &str = "/tmp/play-sound.sock";

    /// Bytes read from each connection
    pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

    /// Upper bound for a configured read buffer
    pub const MAX_READ_BUFFER_SIZE: usize = 64 * 1024;

    /// Default playback cap in seconds
    pub const DEFAULT_DURATION_SECS: f64 = 2.0;

    /// Longest accepted playback cap in seconds
    pub const MAX_DURATION_SECS: f64 = 30.0;

    /// Default normalisation level (full volume)
    pub const DEFAULT_NORMALISE_LEVEL: f64 = 1.0;

    /// Default delay between player launch and volume restore
    pub const DEFAULT_RESTORE_DELAY_MS: u64 = 150;

    /// Longest accepted restore delay
    pub const MAX_RESTORE_DELAY_MS: u64 = 10_000;

    /// Exit status of `timeout` when it had to stop the command
    pub const TIMEOUT_EXIT_CODE: i32 = 124;

    /// Pause after a failed `accept`
    pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);
}

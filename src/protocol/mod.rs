//! Wire protocol types
//!
//! A request is a single colon-delimited line:
//!
//! ```text
//! <soundName>[:<durationSec>][:<emittingSpeaker>][:<normaliseVolume>][:<normaliseVolumeLevel>][:<volumeRestoreDelayMs>]
//! ```
//!
//! Empty or missing fields inherit the process-wide [`RuntimeSettings`].
//! The response is one line: `OK` or `ERROR <reason>`.

pub mod codec;
pub mod response;

pub use codec::{parse, Rejection};
pub use response::Response;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::*;

/// Which sinks emit a sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmittingSpeaker {
    /// Every active sink, one player per sink
    #[default]
    All,
    /// Only the first discovered sink
    Default,
}

impl EmittingSpeaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmittingSpeaker::All => "all",
            EmittingSpeaker::Default => "default",
        }
    }
}

impl fmt::Display for EmittingSpeaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide playback defaults
///
/// Loaded once at startup; each request works on its own copy with the
/// request's overrides applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Sink selection policy
    pub emitting_speaker: EmittingSpeaker,

    /// Temporarily force target sinks to `normalise_volume_level`
    pub normalise_volume: bool,

    /// Volume applied during normalisation (0.0 - 1.0)
    pub normalise_volume_level: f64,

    /// Delay between player launch and volume restore
    pub volume_restore_delay_ms: u64,

    /// Hard playback cap in seconds, 0 disables the cap
    pub duration: f64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            emitting_speaker: EmittingSpeaker::All,
            normalise_volume: true,
            normalise_volume_level: DEFAULT_NORMALISE_LEVEL,
            volume_restore_delay_ms: DEFAULT_RESTORE_DELAY_MS,
            duration: DEFAULT_DURATION_SECS,
        }
    }
}

impl RuntimeSettings {
    /// Check every field against the bounds the wire protocol enforces.
    ///
    /// Returns the first offending field in protocol order.
    pub fn validate(&self) -> Result<(), Rejection> {
        if !codec::duration_in_range(self.duration) {
            return Err(Rejection::BadDuration);
        }
        if !codec::level_in_range(self.normalise_volume_level) {
            return Err(Rejection::BadNormaliseVolumeLevel);
        }
        if self.volume_restore_delay_ms > MAX_RESTORE_DELAY_MS {
            return Err(Rejection::BadVolumeRestoreDelayMs);
        }
        Ok(())
    }
}

/// A sound name known to the sound table
///
/// Only the codec constructs these, after checking the name against the
/// table, so holding one means the name resolves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SoundName(String);

impl SoundName {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SoundName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated request with defaults filled in
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveRequest {
    pub sound: SoundName,
    pub settings: RuntimeSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert_eq!(RuntimeSettings::default().validate(), Ok(()));
    }

    #[test]
    fn test_validate_reports_first_bad_field() {
        let settings = RuntimeSettings {
            duration: 45.0,
            normalise_volume_level: 2.0,
            ..Default::default()
        };
        assert_eq!(settings.validate(), Err(Rejection::BadDuration));

        let settings = RuntimeSettings {
            normalise_volume_level: -0.1,
            volume_restore_delay_ms: 20_000,
            ..Default::default()
        };
        assert_eq!(settings.validate(), Err(Rejection::BadNormaliseVolumeLevel));

        let settings = RuntimeSettings {
            volume_restore_delay_ms: 10_001,
            ..Default::default()
        };
        assert_eq!(settings.validate(), Err(Rejection::BadVolumeRestoreDelayMs));
    }

    #[test]
    fn test_emitting_speaker_serde_names() {
        let parsed: RuntimeSettings = toml::from_str("emitting_speaker = \"default\"").unwrap();
        assert_eq!(parsed.emitting_speaker, EmittingSpeaker::Default);
        assert_eq!(EmittingSpeaker::All.to_string(), "all");
    }
}

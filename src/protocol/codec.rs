//! Request line parsing
//!
//! Turns one request line into an [`EffectiveRequest`] by overlaying the
//! positional overrides onto a copy of the defaults. Fields are checked in
//! order and the first invalid one decides the rejection.

use thiserror::Error;

use crate::config::SoundTable;
use crate::constants::*;
use crate::protocol::{EffectiveRequest, EmittingSpeaker, RuntimeSettings, SoundName};

/// Field separator on the wire
pub const FIELD_SEPARATOR: char = ':';

/// Why a request line was refused
///
/// `Display` yields the exact reason token sent after `ERROR `.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("invalid_format")]
    InvalidFormat,

    #[error("unknown_sound")]
    UnknownSound,

    #[error("bad_value_duration")]
    BadDuration,

    #[error("bad_value_emittingSpeaker")]
    BadEmittingSpeaker,

    #[error("bad_value_normaliseVolume")]
    BadNormaliseVolume,

    #[error("bad_value_normaliseVolumeLevel")]
    BadNormaliseVolumeLevel,

    #[error("bad_value_volumeRestoreDelayMs")]
    BadVolumeRestoreDelayMs,
}

impl Rejection {
    /// Map a wire reason token back to a rejection
    pub fn from_reason(reason: &str) -> Option<Self> {
        let rejection = match reason {
            "invalid_format" => Rejection::InvalidFormat,
            "unknown_sound" => Rejection::UnknownSound,
            "bad_value_duration" => Rejection::BadDuration,
            "bad_value_emittingSpeaker" => Rejection::BadEmittingSpeaker,
            "bad_value_normaliseVolume" => Rejection::BadNormaliseVolume,
            "bad_value_normaliseVolumeLevel" => Rejection::BadNormaliseVolumeLevel,
            "bad_value_volumeRestoreDelayMs" => Rejection::BadVolumeRestoreDelayMs,
            _ => return None,
        };
        Some(rejection)
    }
}

/// Parse a request line against the given defaults and sound table
pub fn parse(
    message: &str,
    defaults: &RuntimeSettings,
    sounds: &SoundTable,
) -> Result<EffectiveRequest, Rejection> {
    let message = message.trim();
    if message.is_empty() {
        return Err(Rejection::InvalidFormat);
    }

    let fields: Vec<&str> = message.split(FIELD_SEPARATOR).collect();

    let name = fields[0];
    if !sounds.contains(name) {
        return Err(Rejection::UnknownSound);
    }

    let mut settings = defaults.clone();

    if let Some(raw) = field(&fields, 1) {
        settings.duration = parse_duration(raw).ok_or(Rejection::BadDuration)?;
    }
    if let Some(raw) = field(&fields, 2) {
        settings.emitting_speaker =
            parse_emitting_speaker(raw).ok_or(Rejection::BadEmittingSpeaker)?;
    }
    if let Some(raw) = field(&fields, 3) {
        settings.normalise_volume = parse_flag(raw).ok_or(Rejection::BadNormaliseVolume)?;
    }
    if let Some(raw) = field(&fields, 4) {
        settings.normalise_volume_level =
            parse_level(raw).ok_or(Rejection::BadNormaliseVolumeLevel)?;
    }
    if let Some(raw) = field(&fields, 5) {
        settings.volume_restore_delay_ms =
            parse_restore_delay(raw).ok_or(Rejection::BadVolumeRestoreDelayMs)?;
    }

    Ok(EffectiveRequest {
        sound: SoundName::new(name),
        settings,
    })
}

/// A present, non-empty field
fn field<'a>(fields: &[&'a str], index: usize) -> Option<&'a str> {
    fields.get(index).copied().filter(|f| !f.is_empty())
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub(crate) fn duration_in_range(secs: f64) -> bool {
    secs.is_finite() && (0.0..=MAX_DURATION_SECS).contains(&secs)
}

pub(crate) fn level_in_range(level: f64) -> bool {
    level.is_finite() && (0.0..=1.0).contains(&level)
}

fn parse_duration(raw: &str) -> Option<f64> {
    parse_number(raw).filter(|d| duration_in_range(*d))
}

fn parse_emitting_speaker(raw: &str) -> Option<EmittingSpeaker> {
    match raw {
        "all" => Some(EmittingSpeaker::All),
        "default" => Some(EmittingSpeaker::Default),
        _ => None,
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_level(raw: &str) -> Option<f64> {
    parse_number(raw).filter(|v| level_in_range(*v))
}

// "250.0" counts as an integer, "250.5" does not
fn parse_restore_delay(raw: &str) -> Option<u64> {
    let n = parse_number(raw)?;
    if n.fract() != 0.0 || n < 0.0 || n > MAX_RESTORE_DELAY_MS as f64 {
        return None;
    }
    Some(n as u64)
}

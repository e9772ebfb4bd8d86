//! Audio subsystem module
//!
//! Everything here drives external PipeWire tools; no audio is decoded or
//! mixed in-process.

pub mod command;
pub mod player;
pub mod sinks;
pub mod volume;

pub use command::{CommandRunner, SystemRunner};
pub use player::{PlaybackReport, PlaybackTask, SoundPlayer};
pub use sinks::{SinkDescriptor, SinkInventory};
pub use volume::{NormalizationPermit, VolumeGuard, VolumeSnapshot};

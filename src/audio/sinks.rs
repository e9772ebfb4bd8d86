//! Output sink discovery
//!
//! Sinks are read from the PipeWire object dump on every request; devices
//! come and go, so nothing is cached.

use serde_json::Value;
use std::sync::Arc;

use crate::audio::command::CommandRunner;
use crate::error::{AudioError, Result};

/// `media.class` of playback endpoints
pub const SINK_MEDIA_CLASS: &str = "Audio/Sink";

/// An active output endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkDescriptor {
    /// Id accepted by the mixer tool
    pub id: String,
    /// Node name accepted by the player's `--target`
    pub name: String,
}

impl SinkDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One-shot sink enumeration
pub struct SinkInventory<R> {
    runner: Arc<R>,
    dump_tool: String,
}

impl<R: CommandRunner> SinkInventory<R> {
    pub fn new(runner: Arc<R>, dump_tool: impl Into<String>) -> Self {
        Self {
            runner,
            dump_tool: dump_tool.into(),
        }
    }

    /// Currently active sinks, in dump order
    ///
    /// Never fails: any error is logged and yields an empty list, which
    /// callers treat as "play on the default target".
    pub async fn list_sinks(&self) -> Vec<SinkDescriptor> {
        match self.try_list_sinks().await {
            Ok(sinks) => {
                tracing::debug!("Discovered {} sink(s)", sinks.len());
                sinks
            }
            Err(e) => {
                tracing::error!("Sink discovery failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Like [`list_sinks`](Self::list_sinks) but reports why discovery failed
    pub async fn try_list_sinks(&self) -> Result<Vec<SinkDescriptor>> {
        let raw = self.runner.run(&self.dump_tool, &[]).await?;
        Ok(parse_sink_dump(&raw)?)
    }
}

/// Extract sinks from a `pw-dump` JSON array
pub fn parse_sink_dump(raw: &str) -> std::result::Result<Vec<SinkDescriptor>, AudioError> {
    if raw.trim().is_empty() {
        return Err(AudioError::SinkDump("empty output".to_string()));
    }

    let objects: Vec<Value> =
        serde_json::from_str(raw).map_err(|e| AudioError::SinkDump(e.to_string()))?;

    let sinks = objects
        .iter()
        .filter_map(|object| {
            let props = object.get("info")?.get("props")?;
            if props.get("media.class")?.as_str()? != SINK_MEDIA_CLASS {
                return None;
            }
            let name = props.get("node.name")?.as_str()?.to_string();

            let id = props
                .get("object.serial")
                .and_then(id_text)
                .or_else(|| object.get("id").and_then(id_text))
                .or_else(|| props.get("node.id").and_then(id_text))
                .unwrap_or_else(|| name.clone());

            Some(SinkDescriptor::new(id, name))
        })
        .collect();

    Ok(sinks)
}

/// Ids show up both as numbers and as strings
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

//! Application configuration
//!
//! Everything is optional: a missing file, or a file that only sets a few
//! keys, falls back to the built-in defaults below. Default values for the
//! playback settings are checked against the same bounds the wire protocol
//! enforces.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::{Error, Result};
use crate::protocol::RuntimeSettings;

/// Name of the config file inside the per-user config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,

    /// Base directory for relative sound paths
    pub sounds_dir: PathBuf,

    pub server: ServerConfig,

    /// Playback defaults every request starts from
    pub defaults: RuntimeSettings,

    pub tools: ToolConfig,

    /// Sound name to file path
    pub sounds: BTreeMap<String, PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut sounds = BTreeMap::new();
        sounds.insert(
            "warning".to_string(),
            PathBuf::from("mixkit-software-interface-back-2575.wav"),
        );

        Self {
            log_level: "info".to_string(),
            sounds_dir: default_sounds_dir(),
            server: ServerConfig::default(),
            defaults: RuntimeSettings::default(),
            tools: ToolConfig::default(),
            sounds,
        }
    }
}

/// Socket server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Well-known socket path, recreated on startup
    pub socket_path: PathBuf,

    /// Size of the single read performed per connection
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

/// External programs the service drives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Audio topology dump (JSON array on stdout)
    pub sink_dump: String,

    /// Per-sink volume get/set tool
    pub mixer: String,

    /// Player taking `--target <sink>` and a file path
    pub player: String,

    /// Hard-timeout wrapper used for the duration cap
    pub timeout: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            sink_dump: "pw-dump".to_string(),
            mixer: "wpctl".to_string(),
            player: "pw-play".to_string(),
            timeout: "timeout".to_string(),
        }
    }
}

impl AppConfig {
    /// Load the configuration
    ///
    /// An explicit path must exist. Without one, the per-user config file is
    /// used when present and built-in defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Load and validate a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        tracing::debug!("Loaded config from {}", path.display());
        Self::from_toml(&content)
    }

    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Per-user config location, e.g. `~/.config/notify-sound-server/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "notify-sound-server")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if let Err(rejection) = self.defaults.validate() {
            return Err(Error::Config(format!("defaults out of range: {}", rejection)));
        }

        let buffer = self.server.read_buffer_size;
        if buffer == 0 || buffer > MAX_READ_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "read_buffer_size must be between 1 and {}",
                MAX_READ_BUFFER_SIZE
            )));
        }

        if self.server.socket_path.as_os_str().is_empty() {
            return Err(Error::Config("socket_path is empty".to_string()));
        }

        for name in self.sounds.keys() {
            // a name containing the separator could never be requested
            if name.is_empty() || name.contains(crate::protocol::codec::FIELD_SEPARATOR) {
                return Err(Error::Config(format!("invalid sound name {:?}", name)));
            }
        }

        let tools = [
            ("sink_dump", &self.tools.sink_dump),
            ("mixer", &self.tools.mixer),
            ("player", &self.tools.player),
            ("timeout", &self.tools.timeout),
        ];
        for (key, program) in tools {
            if program.trim().is_empty() {
                return Err(Error::Config(format!("tools.{} is empty", key)));
            }
        }

        Ok(())
    }

    /// Build the sound table, resolving relative paths against `sounds_dir`
    pub fn sound_table(&self) -> SoundTable {
        let mut table = SoundTable::new();
        for (name, path) in &self.sounds {
            let resolved = if path.is_absolute() {
                path.clone()
            } else {
                self.sounds_dir.join(path)
            };
            table.insert(name.clone(), resolved);
        }
        table
    }
}

/// `$PROJ_ROOT/assets/sounds`, or the same below the working directory
fn default_sounds_dir() -> PathBuf {
    let root = std::env::var_os("PROJ_ROOT")
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    root.join("assets").join("sounds")
}

/// Static name to absolute path mapping of playable sounds
#[derive(Debug, Clone, Default)]
pub struct SoundTable {
    entries: BTreeMap<String, PathBuf>,
}

impl SoundTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        self.entries.insert(name.into(), path.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn path(&self, name: &str) -> Option<&Path> {
        self.entries.get(name).map(PathBuf::as_path)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

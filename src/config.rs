//! Application configuration
//!
//! Settings come from an optional `skyglass.json` file; command-line flags
//! override whatever the file says.

use clap::Parser;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::clouds::{CloudOptions, CloudTypeTable, DEFAULT_RENDER_SCALE};
use crate::display::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::error::Result;
use crate::precipitation::{PrecipitationTable, DEFAULT_SEED};
use crate::sky::SkyOptions;
use crate::sun::{DEFAULT_GRANULE_CAPACITY, DEFAULT_SPRITE_CAPACITY};
use crate::weather::{DEFAULT_PORT, DEFAULT_TOPIC};

/// Config file looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "skyglass.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            vsync: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    /// Cloud surface divisor, 1-8
    pub cloud_scale: u32,
    pub seed: u64,
    pub sprite_capacity: usize,
    pub granule_capacity: usize,
    /// JSON override for the cloud archetype table
    pub cloud_types: Option<PathBuf>,
    /// JSON override for the precipitation table
    pub precipitation: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            cloud_scale: DEFAULT_RENDER_SCALE,
            seed: DEFAULT_SEED,
            sprite_capacity: DEFAULT_SPRITE_CAPACITY,
            granule_capacity: DEFAULT_GRANULE_CAPACITY,
            cloud_types: None,
            precipitation: None,
        }
    }
}

/// MQTT weather feed. Disabled while `host` is unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub host: Option<String>,
    pub port: u16,
    pub topic: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            topic: DEFAULT_TOPIC.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub window: WindowConfig,
    pub render: RenderConfig,
    pub feed: FeedConfig,
    pub log_level: Option<String>,
    /// Preset shown at startup
    pub start_preset: usize,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Load `path`, falling back to defaults when the file does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            info!(path = %path.display(), "loading config");
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Apply CLI overrides to a loaded config
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.window.width = w;
        }
        if let Some(h) = args.height {
            self.window.height = h;
        }
        if args.no_vsync {
            self.window.vsync = false;
        }
        if let Some(scale) = args.cloud_scale {
            self.render.cloud_scale = scale;
        }
        if let Some(ref path) = args.cloud_types {
            self.render.cloud_types = Some(path.clone());
        }
        if let Some(ref path) = args.precipitation {
            self.render.precipitation = Some(path.clone());
        }
        if let Some(ref host) = args.mqtt_host {
            self.feed.host = Some(host.clone());
        }
        if let Some(port) = args.mqtt_port {
            self.feed.port = port;
        }
        if let Some(ref topic) = args.mqtt_topic {
            self.feed.topic = topic.clone();
        }
        if let Some(ref level) = args.log_level {
            self.log_level = Some(level.clone());
        }
    }

    /// Build renderer options, reading any table overrides from disk
    pub fn sky_options(&self) -> Result<SkyOptions> {
        let table = match &self.render.cloud_types {
            Some(path) => CloudTypeTable::load(path)?,
            None => CloudTypeTable::default(),
        };
        let precipitation = match &self.render.precipitation {
            Some(path) => PrecipitationTable::load(path)?,
            None => PrecipitationTable::default(),
        };
        Ok(SkyOptions {
            clouds: CloudOptions {
                render_scale: self.render.cloud_scale,
                table,
            },
            precipitation,
            seed: self.render.seed,
            sprite_capacity: self.render.sprite_capacity,
            granule_capacity: self.render.granule_capacity,
        })
    }
}

/// skyglass command-line arguments.
///
/// CLI values override settings loaded from the config file.
#[derive(Parser, Debug, Default)]
#[command(name = "skyglass", about = "Animated weather sky")]
pub struct CliArgs {
    /// Window width.
    #[arg(long)]
    pub width: Option<u32>,

    /// Window height.
    #[arg(long)]
    pub height: Option<u32>,

    /// Disable vsync.
    #[arg(long)]
    pub no_vsync: bool,

    /// Cloud render scale divisor (1-8).
    #[arg(long)]
    pub cloud_scale: Option<u32>,

    /// MQTT broker host for live weather.
    #[arg(long)]
    pub mqtt_host: Option<String>,

    /// MQTT broker port.
    #[arg(long)]
    pub mqtt_port: Option<u16>,

    /// MQTT topic carrying weather JSON.
    #[arg(long)]
    pub mqtt_topic: Option<String>,

    /// Cloud archetype table override (JSON).
    #[arg(long)]
    pub cloud_types: Option<PathBuf>,

    /// Precipitation table override (JSON).
    #[arg(long)]
    pub precipitation: Option<PathBuf>,

    /// Path to the config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl CliArgs {
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }
}

// ============================================================================
// Key-value store
// ============================================================================

/// Get/set contract for small pieces of host state
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
}

/// Process-lifetime store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: FxHashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }
}

use std::fs;
use std::path::PathBuf;

use directories::UserDirs;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::policy::value::DAY_MS;
use crate::store::DEFAULT_EVENT_CAPACITY;

/// Engine configuration, persisted at `~/.tidemark/config.toml`.
///
/// Every field carries a serde default, so a partial file and a missing file
/// both yield a working config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite policy store filename, relative to the data dir.
    #[serde(default = "default_store_file")]
    pub store_file: String,

    /// Capacity of the policy change broadcast bus.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Whether startup runs the migration ledger before anything else.
    #[serde(default = "default_true")]
    pub run_migrations_on_startup: bool,

    /// Delay options offered to option lists, in days.
    #[serde(default = "default_delay_presets_days")]
    pub delay_presets_days: Vec<u64>,

    /// Length options offered to option lists, in messages.
    #[serde(default = "default_length_presets")]
    pub length_presets: Vec<u64>,

    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(skip)]
    pub data_dir: PathBuf,
}

fn default_store_file() -> String {
    "policies.db".to_string()
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

fn default_true() -> bool {
    true
}

fn default_delay_presets_days() -> Vec<u64> {
    vec![30, 90, 183, 365]
}

fn default_length_presets() -> Vec<u64> {
    vec![100, 500, 1000, 5000]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_file: default_store_file(),
            event_capacity: default_event_capacity(),
            run_migrations_on_startup: default_true(),
            delay_presets_days: default_delay_presets_days(),
            length_presets: default_length_presets(),
            config_path: PathBuf::new(),
            data_dir: PathBuf::new(),
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .ok_or_else(|| ConfigError::Load("could not find home directory".to_string()))?;
        let tidemark_dir = home.join(".tidemark");
        let config_path = tidemark_dir.join("config.toml");

        if !tidemark_dir.exists() {
            fs::create_dir_all(&tidemark_dir).map_err(ConfigError::Io)?;
        }

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path).map_err(ConfigError::Io)?;
            let mut config: Self =
                toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
            config.config_path = config_path;
            config.data_dir = tidemark_dir;
            Ok(config)
        } else {
            let config = Self {
                config_path,
                data_dir: tidemark_dir,
                ..Self::default()
            };
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("serialize config: {e}"))?;
        fs::write(&self.config_path, toml_str).map_err(ConfigError::Io)?;
        Ok(())
    }

    /// Absolute path of the SQLite policy store.
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.store_file)
    }

    /// Delay presets converted to the engine's millisecond unit.
    #[must_use]
    pub fn delay_presets_ms(&self) -> Vec<u64> {
        self.delay_presets_days
            .iter()
            .map(|days| days * DAY_MS)
            .collect()
    }
}

// Configuration loaded from kurve.toml

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

pub const CONFIG_FILE: &str = "kurve.toml";

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,
    /// Ticks a client waits before consuming a tick
    #[serde(default = "default_delay_ticks")]
    pub delay_ticks: u32,
    #[serde(default = "default_players")]
    pub players: u32,
    /// Match length in server ticks
    #[serde(default = "default_ticks")]
    pub ticks: u32,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub lag: LagConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate_hz(),
            delay_ticks: default_delay_ticks(),
            players: default_players(),
            ticks: default_ticks(),
            seed: default_seed(),
            lag: LagConfig::default(),
            tracing: TracingConfig::default(),
        }
    }
}

impl Config {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.tick_rate_hz.max(1)))
    }
}

/// Artificial network conditions applied on receive
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LagConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Share of messages dropped, 0.0 to 1.0
    #[serde(default)]
    pub loss_rate: f64,
}

impl Default for LagConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            loss_rate: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TracingConfig {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            level: default_level(),
        }
    }
}

fn default_tick_rate_hz() -> u32 {
    60
}

fn default_delay_ticks() -> u32 {
    3
}

fn default_players() -> u32 {
    2
}

fn default_ticks() -> u32 {
    600
}

fn default_seed() -> u64 {
    0x4b55_5256
}

fn default_min_delay_ms() -> u64 {
    20
}

fn default_max_delay_ms() -> u64 {
    60
}

fn default_format() -> String {
    "compact".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

// Load configuration, falling back to defaults. Logging is not up yet, so
// problems go to stderr.
pub fn load_config(path: impl AsRef<Path>) -> Config {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                eprintln!("Configuration loaded from {}", path.display());
                config
            }
            Err(e) => {
                eprintln!("Failed to parse {}: {}", path.display(), e);
                eprintln!("Using default configuration");
                Config::default()
            }
        },
        Err(_) => {
            eprintln!("{} not found, using default configuration", path.display());
            Config::default()
        }
    }
}

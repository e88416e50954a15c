//! Shared configuration for pmlink front ends.
//!
//! TOML profiles merged with `PMLINK_` environment variables, and their
//! translation to `pmlink_core::EngineConfig` plus a shell endpoint. The
//! CLI adds `GlobalOpts`-aware overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use pmlink_core::config::{
    DEFAULT_ERROR_LOG_COMMAND, DEFAULT_PROMPT, DEFAULT_RESET_COMMAND,
};
use pmlink_core::{DeviceModel, EngineConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("unknown profile '{name}'")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by name, falling back to `default_profile`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub auto_reboot: bool,

    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    #[serde(default = "default_dump_settle_ms")]
    pub dump_settle_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            model: default_model(),
            auto_reboot: false,
            command_timeout_ms: default_command_timeout_ms(),
            dump_settle_ms: default_dump_settle_ms(),
        }
    }
}

fn default_output() -> String {
    "plain".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_model() -> String {
    DeviceModel::Npm1300.to_string()
}
fn default_command_timeout_ms() -> u64 {
    5_000
}
fn default_dump_settle_ms() -> u64 {
    250
}

/// A named device profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Shell endpoint, e.g. `tcp://127.0.0.1:4000` for a serial bridge.
    pub endpoint: String,

    /// PMIC model: `npm1300`, `npm1304` or `npm2100`.
    pub model: Option<String>,

    /// Reset the board as soon as the PMIC is reachable again.
    pub auto_reboot: Option<bool>,

    pub command_timeout_ms: Option<u64>,

    pub dump_settle_ms: Option<u64>,

    /// Shell prompt (default `uart:~$`).
    pub prompt: Option<String>,

    pub reset_command: Option<String>,

    pub error_log_command: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "pmlink", "pmlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("pmlink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment.
///
/// A missing file is not an error; defaults and environment still apply.
/// Nested keys use a double underscore: `PMLINK_DEFAULTS__AUTO_REBOOT=true`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PMLINK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Parse a device model name.
pub fn parse_model(name: &str) -> Result<DeviceModel, ConfigError> {
    name.parse().map_err(|_| ConfigError::Validation {
        field: "model".into(),
        reason: format!("expected 'npm1300', 'npm1304' or 'npm2100', got '{name}'"),
    })
}

/// Parse and check a shell endpoint URL.
pub fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let url: Url = raw.parse().map_err(|e| ConfigError::Validation {
        field: "endpoint".into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })?;

    if url.scheme() != "tcp" {
        return Err(ConfigError::Validation {
            field: "endpoint".into(),
            reason: format!("unsupported scheme '{}', expected tcp://host:port", url.scheme()),
        });
    }
    if url.port().is_none() {
        return Err(ConfigError::Validation {
            field: "endpoint".into(),
            reason: format!("missing port in '{raw}'"),
        });
    }
    Ok(url)
}

/// Build an `EngineConfig` from a profile and the global defaults.
pub fn profile_to_engine_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<EngineConfig, ConfigError> {
    let model = parse_model(profile.model.as_deref().unwrap_or(&defaults.model))?;

    Ok(EngineConfig {
        profile: model.profile(),
        command_timeout: Duration::from_millis(
            profile.command_timeout_ms.unwrap_or(defaults.command_timeout_ms),
        ),
        dump_settle: Duration::from_millis(profile.dump_settle_ms.unwrap_or(defaults.dump_settle_ms)),
        auto_reboot: profile.auto_reboot.unwrap_or(defaults.auto_reboot),
        prompt: profile.prompt.clone().unwrap_or_else(|| DEFAULT_PROMPT.into()),
        reset_command: profile
            .reset_command
            .clone()
            .unwrap_or_else(|| DEFAULT_RESET_COMMAND.into()),
        error_log_command: profile
            .error_log_command
            .clone()
            .unwrap_or_else(|| DEFAULT_ERROR_LOG_COMMAND.into()),
    })
}

/// Engine config built from defaults alone, for when no profile exists.
pub fn defaults_to_engine_config(defaults: &Defaults) -> Result<EngineConfig, ConfigError> {
    profile_to_engine_config(&Profile::default(), defaults)
}

// ── Tests ───────────────────────────────────────────────────────────

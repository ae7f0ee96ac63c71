use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::push::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT};

const CONFIG_DIR_NAME: &str = "bidding-data";
const CONFIG_FILE_NAME: &str = "config.toml";
const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Result returned by [`load_config`], capturing the source and any non-fatal issues.
#[derive(Debug, Clone)]
pub struct ConfigLoadResult {
    pub config: FileConfig,
    pub warnings: Vec<String>,
    pub source: ConfigSource,
}

/// Indicates where the configuration was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// No persisted configuration was found or usable; defaults were synthesized.
    Default,
    /// Configuration was read from `config.toml`.
    File,
}

/// Errors that can occur when persisting configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Ser(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "IO error: {err}"),
            ConfigError::Ser(err) => write!(f, "TOML serialization error: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Ser(value)
    }
}

/// Disk-backed configuration schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default = "FileConfig::schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub runtime: RuntimePreferences,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            runtime: RuntimePreferences::default(),
        }
    }
}

impl FileConfig {
    const fn schema_version() -> u32 {
        CURRENT_SCHEMA_VERSION
    }
}

/// Runtime preferences that map closely to CLI flag behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimePreferences {
    /// Section to read; unset reads every section.
    #[serde(default)]
    pub section: Option<String>,
    /// Highest round to read; unset reads every round.
    #[serde(default)]
    pub max_round: Option<u32>,
    #[serde(default = "RuntimePreferences::default_compress")]
    pub compress: bool,
    #[serde(default)]
    pub goniec_enabled: bool,
    #[serde(default = "RuntimePreferences::default_goniec_host")]
    pub goniec_host: String,
    #[serde(default = "RuntimePreferences::default_goniec_port")]
    pub goniec_port: u16,
    #[serde(default)]
    pub force_resend: bool,
    #[serde(default = "RuntimePreferences::default_push_timeout_secs")]
    pub push_timeout_secs: u64,
}

impl Default for RuntimePreferences {
    fn default() -> Self {
        Self {
            section: None,
            max_round: None,
            compress: true,
            goniec_enabled: false,
            goniec_host: Self::default_goniec_host(),
            goniec_port: Self::default_goniec_port(),
            force_resend: false,
            push_timeout_secs: Self::default_push_timeout_secs(),
        }
    }
}

impl RuntimePreferences {
    const fn default_compress() -> bool {
        true
    }

    fn default_goniec_host() -> String {
        DEFAULT_HOST.to_string()
    }

    const fn default_goniec_port() -> u16 {
        DEFAULT_PORT
    }

    const fn default_push_timeout_secs() -> u64 {
        DEFAULT_TIMEOUT.as_secs()
    }
}

/// Represents overrides sourced from runtime inputs (CLI flags).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RuntimeOverrides {
    pub section: Option<String>,
    pub max_round: Option<u32>,
    pub compress: Option<bool>,
    pub goniec_enabled: Option<bool>,
    pub goniec_host: Option<String>,
    pub goniec_port: Option<u16>,
    pub force_resend: Option<bool>,
    pub push_timeout_secs: Option<u64>,
}

impl RuntimeOverrides {
    pub fn is_empty(&self) -> bool {
        self.section.is_none()
            && self.max_round.is_none()
            && self.compress.is_none()
            && self.goniec_enabled.is_none()
            && self.goniec_host.is_none()
            && self.goniec_port.is_none()
            && self.force_resend.is_none()
            && self.push_timeout_secs.is_none()
    }
}

/// Path to the configuration directory.
pub fn config_directory() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Path to `config.toml`.
pub fn config_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

/// Load the configuration, falling back to defaults.
pub fn load_config() -> ConfigLoadResult {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> ConfigLoadResult {
    let mut warnings = Vec::new();

    if path.exists() {
        match fs::read_to_string(path) {
            Ok(raw) => match toml::from_str::<FileConfig>(&raw) {
                Ok(cfg) => {
                    let (cfg, mut sanitize_warnings) = sanitize_config(cfg);
                    warnings.append(&mut sanitize_warnings);
                    return ConfigLoadResult {
                        config: cfg,
                        warnings,
                        source: ConfigSource::File,
                    };
                }
                Err(err) => {
                    warnings.push(format!(
                        "Failed to parse {} as TOML: {}. Falling back to defaults.",
                        CONFIG_FILE_NAME, err
                    ));
                }
            },
            Err(err) => {
                warnings.push(format!(
                    "Failed to read {}: {}. Falling back to defaults.",
                    CONFIG_FILE_NAME, err
                ));
            }
        }
    }

    ConfigLoadResult {
        config: FileConfig::default(),
        warnings,
        source: ConfigSource::Default,
    }
}

/// Persist the configuration to disk.
pub fn save_config(config: &FileConfig) -> Result<(), ConfigError> {
    save_config_to(&config_path(), config)
}

pub fn save_config_to(path: &Path, config: &FileConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let serialized = toml::to_string_pretty(config)?;
    fs::write(path, serialized)?;
    Ok(())
}

fn sanitize_config(mut config: FileConfig) -> (FileConfig, Vec<String>) {
    let mut warnings = Vec::new();

    if config.schema_version != CURRENT_SCHEMA_VERSION {
        warnings.push(format!(
            "Unknown config schema version {}. Resetting to {}.",
            config.schema_version, CURRENT_SCHEMA_VERSION
        ));
        return (FileConfig::default(), warnings);
    }

    let runtime = &mut config.runtime;
    if runtime
        .section
        .as_deref()
        .is_some_and(|section| section.trim().is_empty() || section.trim() == "0")
    {
        runtime.section = None;
    }
    if runtime.max_round == Some(0) {
        runtime.max_round = None;
    }
    if runtime.goniec_host.trim().is_empty() {
        warnings.push(format!(
            "Goniec host is empty. Using {}.",
            DEFAULT_HOST
        ));
        runtime.goniec_host = RuntimePreferences::default_goniec_host();
    }
    if runtime.goniec_port == 0 {
        warnings.push(format!("Goniec port 0 is invalid. Using {}.", DEFAULT_PORT));
        runtime.goniec_port = DEFAULT_PORT;
    }
    if runtime.push_timeout_secs == 0 {
        warnings.push(format!(
            "Push timeout must be at least one second. Using {}.",
            RuntimePreferences::default_push_timeout_secs()
        ));
        runtime.push_timeout_secs = RuntimePreferences::default_push_timeout_secs();
    }

    (config, warnings)
}

/// Merge runtime overrides into the persisted preferences.
pub fn apply_runtime_overrides(
    preferences: &mut RuntimePreferences,
    overrides: &RuntimeOverrides,
    warnings: &mut Vec<String>,
) {
    if let Some(ref section) = overrides.section {
        let section = section.trim();
        preferences.section = if section.is_empty() || section == "0" {
            None
        } else {
            Some(section.to_string())
        };
    }
    if let Some(max_round) = overrides.max_round {
        preferences.max_round = (max_round > 0).then_some(max_round);
    }
    if let Some(value) = overrides.compress {
        preferences.compress = value;
    }
    if let Some(value) = overrides.goniec_enabled {
        preferences.goniec_enabled = value;
    }
    if let Some(ref host) = overrides.goniec_host {
        preferences.goniec_host = host.clone();
    }
    if let Some(port) = overrides.goniec_port {
        if port == 0 {
            warnings.push("Goniec port 0 is invalid. Ignoring override.".to_string());
        } else {
            preferences.goniec_port = port;
        }
    }
    if let Some(value) = overrides.force_resend {
        preferences.force_resend = value;
    }
    if let Some(timeout) = overrides.push_timeout_secs {
        if timeout == 0 {
            warnings.push(
                "Push timeout must be at least one second. Ignoring override.".to_string(),
            );
        } else {
            preferences.push_timeout_secs = timeout;
        }
    }
}

//! Typed settings and the overlay chain that resolves them.

use std::path::PathBuf;

use serde::Deserialize;

use crate::config::profile::{LogLevel, ResourceProfile};
use crate::config::{env_keys, EnvSource};
use crate::errors::{GardenResult, MemoGardenError, StorageError};

/// Encryption-at-rest intent. The kernel records the flag; enforcement
/// lives above the storage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionMode {
    #[default]
    Disabled,
    Required,
}

impl std::str::FromStr for EncryptionMode {
    type Err = MemoGardenError;

    fn from_str(s: &str) -> GardenResult<Self> {
        match s {
            "disabled" => Ok(EncryptionMode::Disabled),
            "required" => Ok(EncryptionMode::Required),
            other => Err(MemoGardenError::validation(format!(
                "encryption must be 'disabled' or 'required', got '{other}'"
            ))),
        }
    }
}

/// Partial settings read from a TOML config file. Every field is
/// optional; absent fields fall through to the profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SettingsOverlay {
    pub resource_profile: Option<ResourceProfile>,
    pub bind_address: Option<String>,
    pub bind_port: Option<u16>,
    pub log_level: Option<LogLevel>,
    pub encryption: Option<EncryptionMode>,
    pub data_dir: Option<PathBuf>,
    pub config_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub view_entries: Option<usize>,
    pub search_limit: Option<usize>,
    pub fossilization_threshold: Option<f64>,
    pub checkpoint_interval_secs: Option<u64>,
}

impl SettingsOverlay {
    /// Parse an overlay from TOML text.
    pub fn from_toml_str(text: &str) -> GardenResult<Self> {
        toml::from_str(text).map_err(|e| {
            StorageError::Serialization {
                message: format!("settings overlay: {e}"),
            }
            .into()
        })
    }
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub profile: ResourceProfile,
    pub view_entries: usize,
    pub search_limit: usize,
    pub fossilization_threshold: f64,
    pub checkpoint_interval_secs: u64,
    pub log_level: LogLevel,
    pub bind_address: String,
    pub bind_port: u16,
    pub encryption: EncryptionMode,
    pub data_dir: Option<PathBuf>,
    pub config_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

impl Settings {
    pub const DEFAULT_BIND_ADDRESS: &'static str = "127.0.0.1";
    pub const DEFAULT_BIND_PORT: u16 = 8077;

    /// Resolve settings through the overlay chain:
    /// env > TOML overlay > resource profile > hard-coded default.
    pub fn resolve(overlay: Option<&SettingsOverlay>, env: &dyn EnvSource) -> GardenResult<Self> {
        let empty = SettingsOverlay::default();
        let overlay = overlay.unwrap_or(&empty);

        let profile = match env.var(env_keys::RESOURCE_PROFILE) {
            Some(raw) => raw.parse()?,
            None => overlay.resource_profile.unwrap_or_default(),
        };
        let defaults = profile.defaults();

        let log_level = match env.var(env_keys::LOG_LEVEL) {
            Some(raw) => raw.parse()?,
            None => overlay.log_level.unwrap_or(defaults.log_level),
        };
        let bind_port = match env.var(env_keys::BIND_PORT) {
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                MemoGardenError::validation(format!("invalid bind port '{raw}'"))
            })?,
            None => overlay.bind_port.unwrap_or(Self::DEFAULT_BIND_PORT),
        };
        let encryption = match env.var(env_keys::ENCRYPTION) {
            Some(raw) => raw.parse()?,
            None => overlay.encryption.unwrap_or_default(),
        };

        Ok(Self {
            profile,
            view_entries: overlay.view_entries.unwrap_or(defaults.view_entries),
            search_limit: overlay.search_limit.unwrap_or(defaults.search_limit),
            fossilization_threshold: overlay
                .fossilization_threshold
                .unwrap_or(defaults.fossilization_threshold),
            checkpoint_interval_secs: overlay
                .checkpoint_interval_secs
                .unwrap_or(defaults.checkpoint_interval_secs),
            log_level,
            bind_address: env
                .var(env_keys::BIND_ADDRESS)
                .or_else(|| overlay.bind_address.clone())
                .unwrap_or_else(|| Self::DEFAULT_BIND_ADDRESS.to_string()),
            bind_port,
            encryption,
            data_dir: env
                .var(env_keys::DATA_DIR)
                .map(PathBuf::from)
                .or_else(|| overlay.data_dir.clone()),
            config_dir: env
                .var(env_keys::CONFIG_DIR)
                .map(PathBuf::from)
                .or_else(|| overlay.config_dir.clone()),
            log_dir: env
                .var(env_keys::LOG_DIR)
                .map(PathBuf::from)
                .or_else(|| overlay.log_dir.clone()),
        })
    }
}
